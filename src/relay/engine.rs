//! Relay pipeline.
//!
//! Composes resolution, destination screening, fetching and (in advanced mode)
//! sanitizing into the two relay modes.

use super::fetcher::{Fetcher, RelayPayload, RelayResult};
use super::resolver::{ResolvedTarget, SEARCH_ENGINES, SearchEngine, resolve};
use crate::config::{NexusError, Result};
use crate::security::sanitizer::HtmlSanitizer;
use crate::security::target::TargetGuard;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Relay fidelity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Raw passthrough.
    Basic,
    /// Passthrough with ad and tracker markup stripped.
    Advanced,
}

impl RelayMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Advanced => "Advanced",
        }
    }
}

/// One relay invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub raw_input: String,
    pub mode: RelayMode,
    pub engine_hint: Option<String>,
}

impl RelayRequest {
    #[must_use]
    pub fn new(raw_input: impl Into<String>, mode: RelayMode, engine_hint: Option<String>) -> Self {
        Self {
            raw_input: raw_input.into(),
            mode,
            engine_hint,
        }
    }
}

/// Decides whether a destination host may be relayed to.
pub trait DomainPolicy: Send + Sync {
    fn is_blocked(&self, host: &str) -> bool;
}

/// Policy that blocks nothing.
pub struct AllowAll;

impl DomainPolicy for AllowAll {
    fn is_blocked(&self, _host: &str) -> bool {
        false
    }
}

/// Result of a relay together with where it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub target: ResolvedTarget,
    pub host: String,
    pub result: RelayResult,
}

pub struct RelayEngine {
    fetcher: Arc<dyn Fetcher>,
    sanitizer: Arc<dyn HtmlSanitizer>,
    policy: Arc<dyn DomainPolicy>,
    guard: TargetGuard,
    engines: &'static [SearchEngine],
}

impl RelayEngine {
    /// Creates a new `RelayEngine` over the built-in search engines.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sanitizer: Arc<dyn HtmlSanitizer>,
        policy: Arc<dyn DomainPolicy>,
        guard: TargetGuard,
    ) -> Self {
        Self {
            fetcher,
            sanitizer,
            policy,
            guard,
            engines: SEARCH_ENGINES,
        }
    }

    /// Relays without modifying the body.
    ///
    /// # Errors
    ///
    /// See [`RelayEngine::relay`].
    pub async fn relay_basic(&self, raw_input: &str, engine_hint: &str) -> Result<RelayResult> {
        let request = RelayRequest::new(raw_input, RelayMode::Basic, Some(engine_hint.to_string()));
        self.relay(&request).await.map(|o| o.result)
    }

    /// Relays and strips ad and tracker markup from a successful body.
    ///
    /// # Errors
    ///
    /// See [`RelayEngine::relay`].
    pub async fn relay_advanced(
        &self,
        raw_input: &str,
        engine_hint: &str,
    ) -> Result<RelayResult> {
        let request =
            RelayRequest::new(raw_input, RelayMode::Advanced, Some(engine_hint.to_string()));
        self.relay(&request).await.map(|o| o.result)
    }

    /// Runs the full pipeline for `request`.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors (`Validation`, `NoEngineMatched`), returns
    /// `Forbidden` for screened or blocked destinations and propagates fetcher
    /// errors (`UpstreamFetch`, or `Forbidden` for a refused redirect hop).
    pub async fn relay(&self, request: &RelayRequest) -> Result<RelayOutcome> {
        let hint = request.engine_hint.as_deref().unwrap_or("");
        let target = resolve(&request.raw_input, hint, self.engines)?;

        let url = self.guard.check(&target.url)?;
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if self.policy.is_blocked(&host) {
            info!(host = %host, action = "BLOCK", "Relay to blocked domain refused");
            return Err(NexusError::Forbidden(format!("Domain {host} is blocked.")));
        }

        debug!(url = %target.url, mode = ?request.mode, "Relaying");
        let mut result = self.fetcher.fetch(&target).await?;

        if request.mode == RelayMode::Advanced
            && let RelayPayload::Body(body) = &result.payload
        {
            let sanitized = self.sanitizer.sanitize(body);
            debug!(
                original_len = body.len(),
                sanitized_len = sanitized.len(),
                "Body sanitized"
            );
            result.payload = RelayPayload::Body(sanitized);
        }

        Ok(RelayOutcome {
            target,
            host,
            result,
        })
    }
}
