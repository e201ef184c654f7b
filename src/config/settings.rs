//! Configuration settings.
//!
//! Defines the main `Config` struct and environment variable loading logic.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

fn get_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} must be set in environment"))
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn get_env_bool_or(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

fn get_env_u64_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn get_env_u32_or(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn get_env_usize_or(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP service listens on.
    pub listen_addr: SocketAddr,
    /// Admin keys accepted by `/api/auth/admin` and `/api/auth/sso`.
    pub admin_keys: Vec<String>,
    /// Lifetime of an admin session in seconds.
    pub session_ttl_secs: u64,
    /// Whether the admin cookie carries the `Secure` flag.
    pub secure_cookies: bool,
    /// Timeout for a single outbound relay fetch.
    pub fetch_timeout_secs: u64,
    /// Largest relayed response body, after decompression.
    pub max_relay_body_size: usize,
    /// Fixed `Host` header sent upstream. Unset means the destination host.
    pub relay_spoof_host: Option<String>,
    /// Allow relaying to loopback and private-network destinations.
    pub allow_private_targets: bool,
    /// Initial per-client request ceiling per minute.
    pub rate_limit_per_min: u32,
    /// Request log ring capacity.
    pub request_log_capacity: usize,
    /// Security event ring capacity.
    pub security_log_capacity: usize,
    /// Take the client IP from `X-Forwarded-For` instead of the socket peer.
    pub trust_forwarded_for: bool,
    /// Request header carrying the client's country code.
    pub country_header: String,
    /// Maximum accepted request body for admin POSTs.
    pub max_body_size: usize,
    /// Directory served as opaque static assets.
    pub static_dir: Option<PathBuf>,
    /// Webhook URL for security notifications.
    pub webhook_url: Option<String>,
    /// Bearer token sent with webhook notifications.
    pub webhook_token: Option<String>,
    /// Application name for generated pages.
    pub app_name: String,
    /// Logging format: "json" or "pretty".
    pub log_format: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Panics
    ///
    /// Panics if `ADMIN_KEYS` is missing or empty, or if `LISTEN_ADDR` is not a
    /// valid socket address.
    #[must_use]
    pub fn from_env() -> Arc<Self> {
        let listen_addr = get_env_or("LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .expect("LISTEN_ADDR must be a valid socket address");
        let admin_keys = split_list(&get_env("ADMIN_KEYS"));
        assert!(
            !admin_keys.is_empty(),
            "ADMIN_KEYS must contain at least one key"
        );

        Arc::new(Self {
            listen_addr,
            admin_keys,
            session_ttl_secs: get_env_u64_or("ADMIN_SESSION_TTL_SECS", 3600),
            secure_cookies: get_env_bool_or("SECURE_COOKIES", true),
            fetch_timeout_secs: get_env_u64_or("FETCH_TIMEOUT_SECS", 15).max(1),
            max_relay_body_size: get_env_usize_or("MAX_RELAY_BODY_SIZE", 5 * 1024 * 1024).max(1),
            relay_spoof_host: get_env_opt("RELAY_SPOOF_HOST"),
            allow_private_targets: get_env_bool_or("ALLOW_PRIVATE_TARGETS", false),
            rate_limit_per_min: get_env_u32_or("RATE_LIMIT_PER_MIN", 60).max(1),
            request_log_capacity: get_env_usize_or("REQUEST_LOG_CAPACITY", 1000).max(1),
            security_log_capacity: get_env_usize_or("SECURITY_LOG_CAPACITY", 500).max(1),
            trust_forwarded_for: get_env_bool_or("TRUST_FORWARDED_FOR", false),
            country_header: get_env_or("COUNTRY_HEADER", "cf-ipcountry").to_lowercase(),
            max_body_size: get_env_usize_or("MAX_BODY_SIZE", 65536),
            static_dir: get_env_opt("STATIC_DIR").map(PathBuf::from),
            webhook_url: get_env_opt("WEBHOOK_URL"),
            webhook_token: get_env_opt("WEBHOOK_TOKEN"),
            app_name: get_env_or("APP_NAME", "Nexus"),
            log_format: get_env_or("LOG_FORMAT", "json"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_helpers_defaults() {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            env::remove_var("TEST_MISSING_VAR");
        }
        assert_eq!(get_env_or("TEST_MISSING_VAR", "default"), "default");
        assert_eq!(get_env_u64_or("TEST_MISSING_VAR", 100), 100);
        assert_eq!(get_env_u32_or("TEST_MISSING_VAR", 50), 50);
        assert_eq!(get_env_usize_or("TEST_MISSING_VAR", 1), 1);
        assert!(get_env_bool_or("TEST_MISSING_VAR", true));
        assert!(get_env_opt("TEST_MISSING_VAR").is_none());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    #[should_panic(expected = "TEST_REQ must be set")]
    fn test_get_env_panic() {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            env::remove_var("TEST_REQ");
        }
        get_env("TEST_REQ");
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            env::set_var("LISTEN_ADDR", "127.0.0.1:9090");
            env::set_var("ADMIN_KEYS", "first-key, second-key");
            env::remove_var("ADMIN_SESSION_TTL_SECS");
            env::remove_var("RATE_LIMIT_PER_MIN");
            env::remove_var("FETCH_TIMEOUT_SECS");
            env::remove_var("RELAY_SPOOF_HOST");
            env::remove_var("MAX_RELAY_BODY_SIZE");
            env::set_var("COUNTRY_HEADER", "X-Country");
        }

        let config = Config::from_env();
        assert_eq!(config.listen_addr.port(), 9090);
        assert_eq!(config.admin_keys, vec!["first-key", "second-key"]);
        assert_eq!(config.session_ttl_secs, 3600);
        assert_eq!(config.rate_limit_per_min, 60);
        assert_eq!(config.fetch_timeout_secs, 15);
        assert_eq!(config.request_log_capacity, 1000);
        assert!(config.relay_spoof_host.is_none());
        assert_eq!(config.max_relay_body_size, 5 * 1024 * 1024);
        assert_eq!(config.country_header, "x-country");
    }
}
