//! Admin API.
//!
//! Session-gated operations over the control plane. Replies are JSON values;
//! the gateway decides how they go on the wire.

use super::logs::LogQuery;
use super::state::ControlPlane;
use crate::config::{Config, NexusError, Result};
use crate::core::middleware::{
    SESSION_COOKIE_NAME, SessionStore, format_clear_cookie, format_set_cookie,
};
use crate::core::proxy::response::parse_urlencoded;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    ToggleDev,
    ToggleMaintenance,
    Logout,
    ClearCache,
    ClearLogs,
    UpdateMethods,
    UpdateRateLimit,
    BlockIp,
    UnblockIp,
    BlockDomain,
    UnblockDomain,
    Stats,
    Status,
    BlockedIps,
    BlockedDomains,
    Analytics,
    Logs,
    SecurityEvents,
}

impl AdminAction {
    /// Maps `<method> /api/admin/<name>` to an action.
    #[must_use]
    pub fn from_route(method: &str, name: &str) -> Option<Self> {
        let action = match (method, name) {
            ("POST", "toggle-dev") => Self::ToggleDev,
            ("POST", "toggle-maintenance") => Self::ToggleMaintenance,
            ("POST", "logout") => Self::Logout,
            ("POST", "clear-cache") => Self::ClearCache,
            ("POST", "clear-logs") => Self::ClearLogs,
            ("POST", "update-methods") => Self::UpdateMethods,
            ("POST", "update-rate-limit") => Self::UpdateRateLimit,
            ("POST", "block-ip") => Self::BlockIp,
            ("POST", "unblock-ip") => Self::UnblockIp,
            ("POST", "block-domain") => Self::BlockDomain,
            ("POST", "unblock-domain") => Self::UnblockDomain,
            ("GET", "stats") => Self::Stats,
            ("GET", "status") => Self::Status,
            ("GET", "blocked-ips") => Self::BlockedIps,
            ("GET", "blocked-domains") => Self::BlockedDomains,
            ("GET", "analytics") => Self::Analytics,
            ("GET", "logs") => Self::Logs,
            ("GET", "security-events") => Self::SecurityEvents,
            _ => return None,
        };
        Some(action)
    }
}

/// Fields of an admin POST body, from JSON or a URL-encoded form.
#[derive(Debug, Default)]
pub struct AdminForm {
    fields: Map<String, Value>,
}

impl AdminForm {
    /// Parses `body` as JSON when declared or when it looks like a JSON object,
    /// otherwise as a URL-encoded form. An empty body yields no fields.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed JSON or a JSON body that is not an object.
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let is_json = content_type.is_some_and(|ct| ct.contains("json")) || trimmed.starts_with('{');
        if is_json {
            return match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(fields)) => Ok(Self { fields }),
                Ok(_) => Err(NexusError::Validation(
                    "Request body must be an object.".to_string(),
                )),
                Err(e) => {
                    debug!(error = %e, "Malformed admin request body");
                    Err(NexusError::Validation("Malformed request body.".to_string()))
                }
            };
        }

        let fields = parse_urlencoded(trimmed)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Ok(Self { fields })
    }

    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Truthiness of a field. Missing fields are `false`.
    #[must_use]
    pub fn bool_field(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "on" | "yes"
            ),
            _ => false,
        }
    }

    #[must_use]
    pub fn u32_field(&self, name: &str) -> Option<u32> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Inputs of one admin call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminCall<'a> {
    pub token: Option<&'a str>,
    pub query: &'a [(String, String)],
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl AdminCall<'_> {
    fn query_param(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminReply {
    pub body: Value,
    pub set_cookie: Option<String>,
}

impl AdminReply {
    fn json(body: Value) -> Self {
        Self {
            body,
            set_cookie: None,
        }
    }

    fn message(message: impl Into<String>) -> Self {
        Self::json(json!({ "success": true, "message": message.into() }))
    }
}

pub struct AdminApi {
    config: Arc<Config>,
    control: Arc<ControlPlane>,
    sessions: Arc<SessionStore>,
}

impl AdminApi {
    #[must_use]
    pub const fn new(
        config: Arc<Config>,
        control: Arc<ControlPlane>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            control,
            sessions,
        }
    }

    /// Exchanges an admin key for a session and returns its `Set-Cookie` value.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for a missing or unknown key.
    pub fn login(&self, key: Option<&str>, client_ip: &str) -> Result<String> {
        let session = self.sessions.authenticate(key.unwrap_or(""), client_ip)?;
        Ok(format_set_cookie(
            SESSION_COOKIE_NAME,
            &session.token,
            self.sessions.ttl_secs(),
            self.config.secure_cookies,
        ))
    }

    /// Checks the caller's session.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` without a live session.
    pub fn authorize(&self, token: Option<&str>) -> Result<()> {
        self.sessions.validate(token).map(|_| ())
    }

    /// Runs `action` for an authorized caller.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` without a live session, `Validation` or
    /// `InvalidConfiguration` for bad input.
    pub fn execute(&self, action: AdminAction, call: &AdminCall<'_>) -> Result<AdminReply> {
        let session = self.sessions.validate(call.token)?;
        debug!(action = ?action, client_ip = %session.origin_ip, "Admin action");

        let form = || AdminForm::parse(call.content_type, call.body);

        let reply = match action {
            AdminAction::ToggleDev | AdminAction::ToggleMaintenance => {
                let enabled = self.control.toggle_maintenance();
                let label = if action == AdminAction::ToggleDev {
                    "Developer"
                } else {
                    "Maintenance"
                };
                let state = if enabled { "enabled" } else { "disabled" };
                AdminReply::json(json!({
                    "success": true,
                    "message": format!("{label} mode {state}."),
                    "maintenanceMode": enabled,
                }))
            }
            AdminAction::Logout => {
                self.sessions.revoke(&session.token);
                info!(client_ip = %session.origin_ip, "Admin session terminated");
                AdminReply {
                    body: json!({ "success": true, "message": "Session terminated." }),
                    set_cookie: Some(format_clear_cookie(
                        SESSION_COOKIE_NAME,
                        self.config.secure_cookies,
                    )),
                }
            }
            AdminAction::ClearCache => AdminReply::message("Cache cleared successfully."),
            AdminAction::ClearLogs => {
                self.control.clear_logs();
                AdminReply::message("All logs cleared.")
            }
            AdminAction::UpdateMethods => {
                let form = form()?;
                let modes = self
                    .control
                    .update_modes(form.bool_field("basic"), form.bool_field("advanced"))?;
                AdminReply::json(json!({
                    "success": true,
                    "message": "Proxy methods updated.",
                    "proxyMethods": modes,
                }))
            }
            AdminAction::UpdateRateLimit => {
                let limit = form()?
                    .u32_field("limit")
                    .ok_or_else(|| NexusError::Validation("Invalid rate limit.".to_string()))?;
                let limit = self.control.set_rate_limit(limit)?;
                AdminReply::message(format!("Rate limit set to {limit} req/min."))
            }
            AdminAction::BlockIp => {
                let ip = self.control.block_ip(&form()?.str_field("ip").unwrap_or_default())?;
                AdminReply::message(format!("IP {ip} blocked."))
            }
            AdminAction::UnblockIp => {
                let ip = self
                    .control
                    .unblock_ip(&form()?.str_field("ip").unwrap_or_default())?;
                AdminReply::message(format!("IP {ip} unblocked."))
            }
            AdminAction::BlockDomain => {
                let domain = self
                    .control
                    .block_domain(&form()?.str_field("domain").unwrap_or_default())?;
                AdminReply::message(format!("Domain {domain} blocked."))
            }
            AdminAction::UnblockDomain => {
                let domain = self
                    .control
                    .unblock_domain(&form()?.str_field("domain").unwrap_or_default())?;
                AdminReply::message(format!("Domain {domain} unblocked."))
            }
            AdminAction::Stats => AdminReply::json(json!({
                "success": true,
                "stats": self.control.stats(self.sessions.active_count()),
            })),
            AdminAction::Status => {
                let status = self.control.status();
                AdminReply::json(json!({
                    "success": true,
                    "maintenanceMode": status.maintenance_mode,
                    "proxyMethods": status.proxy_methods,
                    "rateLimit": status.rate_limit,
                }))
            }
            AdminAction::BlockedIps => AdminReply::json(json!({
                "success": true,
                "ips": self.control.blocked_ips(),
            })),
            AdminAction::BlockedDomains => AdminReply::json(json!({
                "success": true,
                "domains": self.control.blocked_domains(),
            })),
            AdminAction::Analytics => {
                let report = self.control.analytics();
                AdminReply::json(json!({
                    "success": true,
                    "topSites": report.top_sites,
                    "geoStats": report.geo_stats,
                    "bandwidth": report.bandwidth,
                }))
            }
            AdminAction::Logs => {
                let query = LogQuery {
                    level: call.query_param("level"),
                    search: call.query_param("search"),
                };
                AdminReply::json(json!({
                    "success": true,
                    "logs": self.control.query_logs(&query),
                }))
            }
            AdminAction::SecurityEvents => AdminReply::json(json!({
                "success": true,
                "events": self.control.security_events(),
            })),
        };

        Ok(reply)
    }
}
