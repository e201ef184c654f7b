//! Shared control-plane state.
//!
//! One instance per process, shared behind an `Arc`. Every aggregate has its
//! own lock and every operation is a single read-modify-write on it.

use super::analytics::{Analytics, AnalyticsReport};
use super::logs::{LogQuery, LogRing, RequestLogEntry, SECURITY_QUERY_LIMIT, SecurityEvent, Severity};
use crate::config::{Config, NexusError, Result};
use crate::features::webhook::WebhookNotifier;
use crate::relay::{DomainPolicy, RelayMode};
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;
use tracing::{error, info, warn};

/// Which relay modes are switched on. Never both off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayModes {
    pub basic: bool,
    pub advanced: bool,
}

impl Default for RelayModes {
    fn default() -> Self {
        Self {
            basic: true,
            advanced: true,
        }
    }
}

impl RelayModes {
    #[must_use]
    pub const fn allows(self, mode: RelayMode) -> bool {
        match mode {
            RelayMode::Basic => self.basic,
            RelayMode::Advanced => self.advanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStatus {
    pub maintenance_mode: bool,
    pub proxy_methods: RelayModes,
    pub rate_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStats {
    pub active_sessions: usize,
    pub total_requests: u64,
    #[serde(rename = "blockedIPs")]
    pub blocked_ips: usize,
    pub uptime: u64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn normalize_domain(raw: &str) -> String {
    let d = raw.trim().to_ascii_lowercase();
    let d = d.strip_prefix("*.").unwrap_or(d.as_str());
    d.trim_end_matches('.').to_string()
}

pub struct ControlPlane {
    maintenance: AtomicBool,
    modes: RwLock<RelayModes>,
    rate_limit: AtomicU32,
    blocked_ips: RwLock<BTreeSet<String>>,
    blocked_domains: RwLock<BTreeSet<String>>,
    request_log: Mutex<LogRing<RequestLogEntry>>,
    security_log: Mutex<LogRing<SecurityEvent>>,
    analytics: Mutex<Analytics>,
    notifier: Arc<WebhookNotifier>,
    started_at: Instant,
}

impl ControlPlane {
    #[must_use]
    pub fn new(config: &Config, notifier: Arc<WebhookNotifier>) -> Self {
        Self {
            maintenance: AtomicBool::new(false),
            modes: RwLock::new(RelayModes::default()),
            rate_limit: AtomicU32::new(config.rate_limit_per_min.max(1)),
            blocked_ips: RwLock::new(BTreeSet::new()),
            blocked_domains: RwLock::new(BTreeSet::new()),
            request_log: Mutex::new(LogRing::new(config.request_log_capacity)),
            security_log: Mutex::new(LogRing::new(config.security_log_capacity)),
            analytics: Mutex::new(Analytics::new()),
            notifier,
            started_at: Instant::now(),
        }
    }

    /// Flips maintenance mode and returns the new value.
    pub fn toggle_maintenance(&self) -> bool {
        let enabled = !self.maintenance.fetch_xor(true, Ordering::SeqCst);
        info!(maintenance = enabled, "Maintenance mode toggled");
        enabled
    }

    #[must_use]
    pub fn is_maintenance(&self) -> bool {
        self.maintenance.load(Ordering::SeqCst)
    }

    /// Replaces the enabled relay modes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if both modes would be off; the current
    /// modes are left untouched.
    pub fn update_modes(&self, basic: bool, advanced: bool) -> Result<RelayModes> {
        if !basic && !advanced {
            return Err(NexusError::InvalidConfiguration(
                "At least one proxy method must stay enabled.".to_string(),
            ));
        }
        let modes = RelayModes { basic, advanced };
        *self.modes.write().unwrap_or_else(PoisonError::into_inner) = modes;
        info!(basic, advanced, "Proxy methods updated");
        Ok(modes)
    }

    #[must_use]
    pub fn modes(&self) -> RelayModes {
        *self.modes.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_mode_enabled(&self, mode: RelayMode) -> bool {
        self.modes().allows(mode)
    }

    /// Sets the per-client requests-per-minute ceiling.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a zero limit.
    pub fn set_rate_limit(&self, limit: u32) -> Result<u32> {
        if limit == 0 {
            return Err(NexusError::Validation("Invalid rate limit.".to_string()));
        }
        self.rate_limit.store(limit, Ordering::SeqCst);
        info!(limit, "Rate limit updated");
        Ok(limit)
    }

    #[must_use]
    pub fn rate_limit(&self) -> u32 {
        self.rate_limit.load(Ordering::SeqCst)
    }

    /// Blocks a client IP and returns its canonical form.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `raw` is empty or not an IP address.
    pub fn block_ip(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NexusError::Validation("IP address required.".to_string()));
        }
        let ip: IpAddr = raw
            .parse()
            .map_err(|_| NexusError::Validation("Invalid IP address.".to_string()))?;
        let ip = ip.to_string();

        self.blocked_ips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ip.clone());
        self.record_security_event(format!("IP blocked: {ip}"), Severity::Info);
        Ok(ip)
    }

    /// Unblocks a client IP. Unknown addresses are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `raw` is empty.
    pub fn unblock_ip(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NexusError::Validation("IP address required.".to_string()));
        }
        let ip = raw
            .parse::<IpAddr>()
            .map_or_else(|_| raw.to_string(), |ip| ip.to_string());

        self.blocked_ips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ip);
        info!(client_ip = %ip, "IP unblocked");
        Ok(ip)
    }

    #[must_use]
    pub fn blocked_ips(&self) -> Vec<String> {
        self.blocked_ips
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        self.blocked_ips
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(ip)
    }

    /// Blocks a destination domain and its subdomains.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `raw` is empty.
    pub fn block_domain(&self, raw: &str) -> Result<String> {
        let domain = normalize_domain(raw);
        if domain.is_empty() {
            return Err(NexusError::Validation("Domain required.".to_string()));
        }
        self.blocked_domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.clone());
        info!(domain = %domain, action = "BLOCK", "Domain blocked");
        Ok(domain)
    }

    /// Unblocks a destination domain. Unknown domains are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `raw` is empty.
    pub fn unblock_domain(&self, raw: &str) -> Result<String> {
        let domain = normalize_domain(raw);
        if domain.is_empty() {
            return Err(NexusError::Validation("Domain required.".to_string()));
        }
        self.blocked_domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&domain);
        info!(domain = %domain, "Domain unblocked");
        Ok(domain)
    }

    #[must_use]
    pub fn blocked_domains(&self) -> Vec<String> {
        self.blocked_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Appends to the request log and counts the request.
    pub fn record_log(&self, entry: RequestLogEntry) {
        lock(&self.request_log).push(entry);
        lock(&self.analytics).record_request();
    }

    pub fn record_country(&self, country: &str) {
        lock(&self.analytics).record_country(country);
    }

    /// Counts a successful relay to `site` that returned `bytes` of body.
    pub fn record_visit(&self, site: &str, bytes: u64) {
        let mut analytics = lock(&self.analytics);
        analytics.record_visit(site);
        analytics.record_bytes(bytes);
    }

    /// Appends a security event and forwards it to the webhook.
    pub fn record_security_event(
        &self,
        message: impl Into<String>,
        severity: Severity,
    ) -> SecurityEvent {
        let event = SecurityEvent::new(message, severity);
        match severity {
            Severity::Info => info!(severity = severity.as_str(), "{}", event.message),
            Severity::Warning => warn!(severity = severity.as_str(), "{}", event.message),
            Severity::Critical => error!(severity = severity.as_str(), "{}", event.message),
        }
        lock(&self.security_log).push(event.clone());
        self.notifier.notify(&event);
        event
    }

    /// Empties the request log and the security log together.
    pub fn clear_logs(&self) {
        let mut requests = lock(&self.request_log);
        let mut events = lock(&self.security_log);
        requests.clear();
        events.clear();
        info!("Logs cleared");
    }

    #[must_use]
    pub fn query_logs(&self, query: &LogQuery) -> Vec<RequestLogEntry> {
        lock(&self.request_log).query(query)
    }

    #[must_use]
    pub fn security_events(&self) -> Vec<SecurityEvent> {
        lock(&self.security_log).newest(SECURITY_QUERY_LIMIT, |_| true)
    }

    #[must_use]
    pub fn analytics(&self) -> AnalyticsReport {
        lock(&self.analytics).report()
    }

    #[must_use]
    pub fn total_requests(&self) -> u64 {
        lock(&self.analytics).total_requests()
    }

    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    #[must_use]
    pub fn stats(&self, active_sessions: usize) -> ControlStats {
        ControlStats {
            active_sessions,
            total_requests: self.total_requests(),
            blocked_ips: self
                .blocked_ips
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            uptime: self.uptime_secs(),
        }
    }

    #[must_use]
    pub fn status(&self) -> ControlStatus {
        ControlStatus {
            maintenance_mode: self.is_maintenance(),
            proxy_methods: self.modes(),
            rate_limit: self.rate_limit(),
        }
    }
}

impl DomainPolicy for ControlPlane {
    fn is_blocked(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.blocked_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|d| {
                host == *d
                    || host
                        .strip_suffix(d.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            })
    }
}
