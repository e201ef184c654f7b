//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit and integration tests,
//! reducing duplication across the codebase.

#[cfg(any(test, feature = "testing"))]
use crate::config::Config;
#[cfg(any(test, feature = "testing"))]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(any(test, feature = "testing"))]
use std::sync::Arc;

/// Admin key accepted by [`create_test_config`].
#[cfg(any(test, feature = "testing"))]
pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Creates a standard configuration for testing purposes.
///
/// This configuration has:
/// - One admin key, [`TEST_ADMIN_KEY`]
/// - Private targets allowed, so local mock backends are reachable
/// - Default log and rate-limit sizing
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        admin_keys: vec![TEST_ADMIN_KEY.to_string()],
        session_ttl_secs: 3600,
        secure_cookies: true,
        fetch_timeout_secs: 5,
        max_relay_body_size: 1024 * 1024,
        relay_spoof_host: None,
        allow_private_targets: true,
        rate_limit_per_min: 60,
        request_log_capacity: 1000,
        security_log_capacity: 500,
        trust_forwarded_for: false,
        country_header: "cf-ipcountry".to_string(),
        max_body_size: 65536,
        static_dir: None,
        webhook_url: None,
        webhook_token: None,
        app_name: "TestApp".to_string(),
        log_format: "pretty".to_string(),
    })
}
