//! Request routing.
//!
//! The `Gateway` turns one `ApiRequest` into one `ApiResponse` without touching
//! the transport: IP block check, request logging, maintenance gate, then the
//! relay, auth, admin, page and asset routes.

use crate::config::{Config, NexusError};
use crate::control::admin::{AdminAction, AdminApi, AdminCall};
use crate::control::logs::{RequestLogEntry, Severity};
use crate::control::state::ControlPlane;
use crate::core::middleware::{RateLimiter, SESSION_COOKIE_NAME, SessionStore, extract_cookie};
use crate::core::proxy::response::parse_urlencoded;
use crate::relay::{DomainPolicy, Fetcher, RelayEngine, RelayMode, RelayPayload, RelayRequest};
use crate::security::sanitizer::HtmlSanitizer;
use crate::security::target::TargetGuard;
use crate::web::assets::{ADMIN_PAGE, Asset, StaticAssets};
use crate::web::ui;
use bytes::Bytes;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const JSON_CONTENT_TYPE: &str = "application/json";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Transport-independent view of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Header names are lowercase.
    pub headers: Vec<(String, String)>,
    pub client_ip: String,
    pub body: Bytes,
}

impl ApiRequest {
    /// Builds a request from a method, a path with optional query string, and the client IP.
    #[must_use]
    pub fn new(method: &str, target: &str, client_ip: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query: parse_urlencoded(query),
            headers: Vec::new(),
            client_ip: client_ip.to_string(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn session_token(&self) -> Option<&str> {
        self.header("cookie")
            .and_then(|c| extract_cookie(c, SESSION_COOKIE_NAME))
    }
}

/// Complete response produced by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
    pub set_cookie: Option<String>,
    pub no_store: bool,
}

impl ApiResponse {
    #[must_use]
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: Bytes::from(value.to_string()),
            set_cookie: None,
            no_store: true,
        }
    }

    #[must_use]
    pub fn html(status: u16, html: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: HTML_CONTENT_TYPE.to_string(),
            body: html.into(),
            set_cookie: None,
            no_store: true,
        }
    }

    #[must_use]
    pub fn asset(asset: &Asset) -> Self {
        Self {
            status: 200,
            content_type: asset.content_type.to_string(),
            body: asset.body.clone(),
            set_cookie: None,
            no_store: false,
        }
    }

    /// Renders `err` as `{"success": false, "error": ...}` with its status.
    #[must_use]
    pub fn from_error(err: &NexusError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            error!(error = %err, status = status, "Request failed");
        } else {
            debug!(error = %err, status = status, "Request rejected");
        }
        Self::json(
            status,
            &json!({ "success": false, "error": err.client_message() }),
        )
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.set_cookie = cookie;
        self
    }

    /// Parses the body as JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Paths that stay reachable during maintenance.
fn is_control_path(path: &str) -> bool {
    ["/api/auth", "/api/admin"]
        .iter()
        .any(|p| path == *p || path.strip_prefix(p).is_some_and(|r| r.starts_with('/')))
}

pub struct Gateway {
    config: Arc<Config>,
    control: Arc<ControlPlane>,
    admin: AdminApi,
    engine: RelayEngine,
    limiter: RateLimiter,
    assets: Arc<StaticAssets>,
}

impl Gateway {
    /// Wires the relay engine and admin API to a shared control plane.
    ///
    /// The control plane doubles as the engine's domain policy.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        control: Arc<ControlPlane>,
        sessions: Arc<SessionStore>,
        fetcher: Arc<dyn Fetcher>,
        sanitizer: Arc<dyn HtmlSanitizer>,
        assets: Arc<StaticAssets>,
    ) -> Self {
        let policy: Arc<dyn DomainPolicy> = control.clone();
        let engine = RelayEngine::new(
            fetcher,
            sanitizer,
            policy,
            TargetGuard::new(config.allow_private_targets),
        );
        let admin = AdminApi::new(config.clone(), control.clone(), sessions);

        Self {
            config,
            control,
            admin,
            engine,
            limiter: RateLimiter::new(),
            assets,
        }
    }

    #[must_use]
    pub const fn control(&self) -> &Arc<ControlPlane> {
        &self.control
    }

    /// Handles one request end to end.
    pub async fn handle(&self, req: &ApiRequest) -> ApiResponse {
        let ip = req.client_ip.as_str();

        if self.control.is_ip_blocked(ip) {
            warn!(client_ip = %ip, http_path = %req.path, action = "BLOCK", "Blocked IP attempt");
            self.control
                .record_security_event(format!("Blocked IP attempt: {ip}"), Severity::Warning);
            return self.status_page(403);
        }

        self.control
            .record_log(RequestLogEntry::new(&req.method, &req.path, ip));
        if let Some(country) = req.header(&self.config.country_header) {
            self.control.record_country(country);
        }

        if self.control.is_maintenance() && !is_control_path(&req.path) {
            debug!(http_path = %req.path, "Maintenance mode response");
            return self.error_page(&NexusError::MaintenanceActive);
        }

        let method = req.method.as_str();
        let path = req.path.as_str();
        match (method, path) {
            ("GET", "/api/proxy/basic") => self.handle_relay(req, RelayMode::Basic).await,
            ("GET", "/api/proxy/advanced") => self.handle_relay(req, RelayMode::Advanced).await,
            ("POST", "/api/auth/admin") => self.handle_admin_login(req),
            ("GET", "/api/auth/sso") => self.handle_sso(req),
            (_, p) if p.starts_with("/api/admin/") => self.handle_admin(req),
            ("GET" | "HEAD", "/admin") => self.handle_admin_page(req),
            ("GET" | "HEAD", p) if p.starts_with("/error/") => self.handle_error_route(p),
            ("GET" | "HEAD", p) if !p.starts_with("/api/") => self
                .assets
                .resolve(p)
                .map_or_else(|| self.status_page(404), ApiResponse::asset),
            _ => ApiResponse::json(404, &json!({ "success": false, "error": "Not found." })),
        }
    }

    /// Renders `err` as the HTML page for its status.
    fn error_page(&self, err: &NexusError) -> ApiResponse {
        self.status_page(err.status_code())
    }

    fn status_page(&self, status: u16) -> ApiResponse {
        ApiResponse::html(
            status,
            ui::get_status_page(status, &self.config, &self.assets),
        )
    }

    async fn handle_relay(&self, req: &ApiRequest, mode: RelayMode) -> ApiResponse {
        let ip = req.client_ip.as_str();

        if !self.control.is_mode_enabled(mode) {
            return ApiResponse::from_error(&NexusError::ModeDisabled(mode.label()));
        }

        let limit = self.control.rate_limit();
        if !self.limiter.check_and_record(ip, limit) {
            warn!(client_ip = %ip, limit = limit, action = "RATE_LIMIT", "Relay rate limit exceeded");
            self.control
                .record_security_event(format!("Rate limit exceeded: {ip}"), Severity::Warning);
            return ApiResponse::from_error(&NexusError::RateLimited {
                client_ip: ip.to_string(),
            });
        }

        let Some(raw) = req
            .query_param("url")
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return ApiResponse::from_error(&NexusError::Validation(
                "URL parameter is required".to_string(),
            ));
        };

        let request = RelayRequest::new(raw, mode, req.query_param("engine").map(str::to_string));
        match self.engine.relay(&request).await {
            Ok(outcome) => match outcome.result.payload {
                RelayPayload::Body(body) => {
                    self.control
                        .record_visit(&outcome.host, body.len() as u64);
                    info!(
                        client_ip = %ip,
                        host = %outcome.host,
                        mode = mode.label(),
                        status = outcome.result.status,
                        "Relayed"
                    );
                    ApiResponse::html(outcome.result.status, body)
                }
                RelayPayload::Error(message) => ApiResponse::json(
                    outcome.result.status,
                    &json!({ "success": false, "error": message }),
                ),
            },
            Err(err) => {
                if let NexusError::Forbidden(ref reason) = err {
                    self.control.record_security_event(
                        format!("Relay refused for {ip}: {reason}"),
                        Severity::Warning,
                    );
                }
                ApiResponse::from_error(&err)
            }
        }
    }

    fn handle_admin_login(&self, req: &ApiRequest) -> ApiResponse {
        let ip = req.client_ip.as_str();
        match self.admin.login(req.header("x-nexus-admin"), ip) {
            Ok(cookie) => ApiResponse::json(
                200,
                &json!({ "success": true, "message": "Admin authenticated." }),
            )
            .with_cookie(Some(cookie)),
            Err(err) => {
                self.control.record_security_event(
                    format!("Failed admin login from {ip}"),
                    Severity::Warning,
                );
                ApiResponse::from_error(&err)
            }
        }
    }

    fn handle_sso(&self, req: &ApiRequest) -> ApiResponse {
        let ip = req.client_ip.as_str();
        match self.admin.login(req.query_param("key"), ip) {
            Ok(cookie) => {
                self.control
                    .record_security_event(format!("SSO login from {ip}"), Severity::Info);
                ApiResponse::html(200, ui::get_sso_success_page(&self.config))
                    .with_cookie(Some(cookie))
            }
            Err(_) => {
                self.control.record_security_event(
                    format!("Failed SSO login from {ip}"),
                    Severity::Warning,
                );
                ApiResponse::html(403, ui::get_sso_failure_page(&self.config))
            }
        }
    }

    fn handle_admin(&self, req: &ApiRequest) -> ApiResponse {
        let name = req.path.trim_start_matches("/api/admin/");
        let Some(action) = AdminAction::from_route(&req.method, name) else {
            return ApiResponse::json(404, &json!({ "success": false, "error": "Not found." }));
        };

        let call = AdminCall {
            token: req.session_token(),
            query: &req.query,
            content_type: req.header("content-type"),
            body: &req.body,
        };
        match self.admin.execute(action, &call) {
            Ok(reply) => ApiResponse::json(200, &reply.body).with_cookie(reply.set_cookie),
            Err(err) => ApiResponse::from_error(&err),
        }
    }

    fn handle_admin_page(&self, req: &ApiRequest) -> ApiResponse {
        if let Err(err) = self.admin.authorize(req.session_token()) {
            return ApiResponse::from_error(&err);
        }
        self.assets.get(ADMIN_PAGE).map_or_else(
            || self.status_page(404),
            |asset| {
                let mut response = ApiResponse::asset(asset);
                response.no_store = true;
                response
            },
        )
    }

    fn handle_error_route(&self, path: &str) -> ApiResponse {
        match path.trim_start_matches("/error/") {
            "403" => self.status_page(403),
            "404" => self.status_page(404),
            "500" => self.status_page(500),
            "503" => self.status_page(503),
            _ => self.status_page(404),
        }
    }
}
