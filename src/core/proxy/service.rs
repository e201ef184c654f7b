//! Proxy service logic.
//!
//! Adapts pingora sessions to the `Gateway`. Every response is produced in
//! `request_filter`; nothing is forwarded to an upstream peer.

use crate::config::Config;
use crate::core::proxy::response::write_api_response;
use crate::core::proxy::router::{ApiRequest, ApiResponse, Gateway};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use pingora::protocols::l4::socket::SocketAddr;
use pingora::proxy::{ProxyHttp, Session};
use pingora::upstreams::peer::HttpPeer;
use pingora::{Error, ErrorType, Result};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Context for a single request.
pub struct RequestCtx {
    pub client_ip: String,
    pub started_at: Instant,
}

/// Main service implementing `ProxyHttp`.
pub struct NexusProxy {
    config: Arc<Config>,
    gateway: Arc<Gateway>,
}

/// Picks the client address: the first `X-Forwarded-For` hop when trusted,
/// otherwise the socket peer.
#[must_use]
pub fn resolve_client_ip(peer: Option<IpAddr>, forwarded_for: Option<&str>, trust_forwarded: bool) -> String {
    if trust_forwarded
        && let Some(first) = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|s| s.parse::<IpAddr>().ok())
    {
        return first.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
}

enum BodyRead {
    Complete(Bytes),
    TooLarge,
}

impl NexusProxy {
    /// Creates a new `NexusProxy` service.
    #[must_use]
    pub const fn new(config: Arc<Config>, gateway: Arc<Gateway>) -> Self {
        Self { config, gateway }
    }

    fn client_ip(&self, session: &Session) -> String {
        let peer = session.client_addr().and_then(|addr| match addr {
            SocketAddr::Inet(inet) => Some(inet.ip()),
            _ => None,
        });
        let forwarded = session
            .req_header()
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());
        resolve_client_ip(peer, forwarded, self.config.trust_forwarded_for)
    }

    async fn read_body(&self, session: &mut Session) -> Result<BodyRead> {
        let limit = self.config.max_body_size;
        let declared = session
            .req_header()
            .headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Ok(BodyRead::TooLarge);
        }

        let mut buf = BytesMut::new();
        while let Some(chunk) = session.read_request_body().await? {
            if buf.len() + chunk.len() > limit {
                return Ok(BodyRead::TooLarge);
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(BodyRead::Complete(buf.freeze()))
    }

    fn build_request(session: &Session, client_ip: &str, body: Bytes) -> ApiRequest {
        let header = session.req_header();
        let target = header
            .uri
            .path_and_query()
            .map_or_else(|| header.uri.path(), |pq| pq.as_str());

        let mut request = ApiRequest::new(header.method.as_str(), target, client_ip).with_body(body);
        for (name, value) in &header.headers {
            if let Ok(value) = value.to_str() {
                request = request.with_header(name.as_str(), value);
            }
        }
        request
    }
}

#[async_trait]
impl ProxyHttp for NexusProxy {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx {
            client_ip: String::new(),
            started_at: Instant::now(),
        }
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        ctx.client_ip = self.client_ip(session);
        let head_only = session.req_header().method == pingora::http::Method::HEAD;

        let body = match self.read_body(session).await? {
            BodyRead::Complete(body) => body,
            BodyRead::TooLarge => {
                warn!(client_ip = %ctx.client_ip, limit = self.config.max_body_size, action = "BLOCK", "Request body too large");
                let response = ApiResponse::json(
                    413,
                    &json!({ "success": false, "error": "Request body too large." }),
                );
                return write_api_response(session, &self.config, &response, head_only).await;
            }
        };

        let request = Self::build_request(session, &ctx.client_ip, body);
        let response = self.gateway.handle(&request).await;
        write_api_response(session, &self.config, &response, head_only).await
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(Error::explain(
            ErrorType::InternalError,
            "all responses are produced in request_filter",
        ))
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        let status = session.response_written().map_or(0, |r| r.status.as_u16());
        let path = session.req_header().uri.path();
        let elapsed_ms = ctx.started_at.elapsed().as_millis();

        if let Some(err) = e {
            warn!(client_ip = %ctx.client_ip, http_path = %path, error = %err, "Request error");
        } else if status >= 500 {
            info!(client_ip = %ctx.client_ip, status = status, http_path = %path, elapsed_ms = elapsed_ms, "Request failed");
        } else {
            debug!(client_ip = %ctx.client_ip, status = status, http_path = %path, elapsed_ms = elapsed_ms, "Request completed");
        }
    }
}
