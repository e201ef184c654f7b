//! Outbound fetch.
//!
//! Issues the single relayed GET with a fixed desktop-browser identity. Every
//! address the client connects to and every redirect hop is screened, and the
//! body is read up to a fixed ceiling.

use super::engine::DomainPolicy;
use super::resolver::ResolvedTarget;
use crate::config::{Config, NexusError, Result};
use crate::security::target::{TargetGuard, is_non_public_ip};
use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::Client;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_REDIRECTS: usize = 10;

/// Fixed header bundle sent upstream, in wire order.
pub const SPOOFED_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
    ),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate, br, zstd"),
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
];

/// What the destination answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPayload {
    /// Response text of a successful fetch.
    Body(String),
    /// Reason phrase of a non-success status.
    Error(String),
}

/// Status plus either a body or an error message, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResult {
    pub status: u16,
    pub payload: RelayPayload,
}

impl RelayResult {
    #[must_use]
    pub fn body(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            payload: RelayPayload::Body(body.into()),
        }
    }

    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: RelayPayload::Error(message.into()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.payload, RelayPayload::Body(_))
    }
}

/// Performs the outbound request for a resolved target.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `target`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamFetch` on DNS, connect, TLS or timeout failure or an
    /// oversized body, and `Forbidden` when a redirect hop or resolved address
    /// is refused. HTTP error statuses are not errors; they come back as
    /// [`RelayPayload::Error`].
    async fn fetch(&self, target: &ResolvedTarget) -> Result<RelayResult>;
}

/// DNS resolver that drops non-public addresses unless private targets are
/// allowed.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningResolver {
    allow_private: bool,
}

impl ScreeningResolver {
    #[must_use]
    pub const fn new(allow_private: bool) -> Self {
        Self { allow_private }
    }

    /// Resolves `host` and keeps the addresses the relay may connect to.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamFetch` when the lookup fails and `Forbidden` when every
    /// address is internal.
    pub async fn lookup(&self, host: &str) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| NexusError::UpstreamFetch(format!("dns lookup for {host}: {e}")))?
            .collect();
        if self.allow_private {
            return Ok(addrs);
        }

        let resolved = addrs.len();
        let public: Vec<SocketAddr> = addrs
            .into_iter()
            .filter(|addr| !is_non_public_ip(addr.ip()))
            .collect();
        if public.is_empty() && resolved > 0 {
            info!(host = %host, action = "BLOCK", "Destination resolves to internal address");
            return Err(NexusError::Forbidden(
                "Destination is not reachable through the relay.".to_string(),
            ));
        }
        Ok(public)
    }
}

impl Resolve for ScreeningResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = *self;
        Box::pin(async move {
            match resolver.lookup(name.as_str()).await {
                Ok(addrs) => Ok(Box::new(addrs.into_iter()) as Addrs),
                Err(e) => Err(Box::new(e) as Box<dyn StdError + Send + Sync>),
            }
        })
    }
}

/// Follows redirects only to destinations the relay would accept directly.
fn redirect_policy(guard: TargetGuard, policy: Arc<dyn DomainPolicy>) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(NexusError::UpstreamFetch("too many redirects".to_string()));
        }
        if let Err(e) = guard.check_url(attempt.url()) {
            return attempt.error(e);
        }
        let host = attempt
            .url()
            .host_str()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if policy.is_blocked(&host) {
            return attempt.error(NexusError::Forbidden(format!("Domain {host} is blocked.")));
        }
        attempt.follow()
    })
}

/// Maps a client error to `Forbidden` when a screening step refused the
/// connection or a redirect hop, and to `UpstreamFetch` otherwise.
fn classify_fetch_error(url: &str, err: &reqwest::Error) -> NexusError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(NexusError::Forbidden(reason)) = e.downcast_ref::<NexusError>() {
            info!(url = %url, reason = %reason, action = "BLOCK", "Relay hop refused");
            return NexusError::Forbidden(reason.clone());
        }
        source = e.source();
    }
    warn!(url = %url, error = %err, "Relay fetch failed");
    NexusError::UpstreamFetch(err.to_string())
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: Client,
    max_body_size: usize,
}

impl HttpFetcher {
    /// Builds the fetcher with the spoofed header bundle as client defaults.
    /// Redirect hops are screened against `policy` and the private-target
    /// setting.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the spoof host is not a valid header value or the
    /// TLS backend cannot be initialised.
    pub fn new(config: &Config, policy: Arc<dyn DomainPolicy>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in SPOOFED_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        if let Some(host) = &config.relay_spoof_host {
            let value = HeaderValue::from_str(host)
                .map_err(|e| NexusError::Config(format!("RELAY_SPOOF_HOST: {e}")))?;
            headers.insert(reqwest::header::HOST, value);
        }

        let guard = TargetGuard::new(config.allow_private_targets);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .dns_resolver(Arc::new(ScreeningResolver::new(guard.allows_private())))
            .redirect(redirect_policy(guard, policy))
            .build()
            .map_err(|e| NexusError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_body_size: config.max_relay_body_size,
        })
    }

    fn body_too_large(&self, url: &str) -> NexusError {
        warn!(url = %url, limit = self.max_body_size, action = "BLOCK", "Relay body too large");
        NexusError::UpstreamFetch(format!(
            "response body exceeds {} bytes",
            self.max_body_size
        ))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &ResolvedTarget) -> Result<RelayResult> {
        let mut response = self
            .client
            .get(&target.url)
            .send()
            .await
            .map_err(|e| classify_fetch_error(&target.url, &e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %target.url, status = status.as_u16(), "Upstream returned error status");
            let reason = status.canonical_reason().unwrap_or("Unknown Status");
            return Ok(RelayResult::error(status.as_u16(), reason));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_size as u64)
        {
            return Err(self.body_too_large(&target.url));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            warn!(url = %target.url, error = %e, "Relay body read failed");
            NexusError::UpstreamFetch(e.to_string())
        })? {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(self.body_too_large(&target.url));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RelayResult::body(
            status.as_u16(),
            String::from_utf8_lossy(&body).into_owned(),
        ))
    }
}
