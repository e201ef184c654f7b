//! Library definitions.
//!
//! Exports the relay pipeline, the control plane, and the HTTP service.

pub mod config;
pub mod control;
pub mod core;
pub mod features;
pub mod relay;
pub mod security;
pub mod web;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
pub use config::{Config, NexusError, Result};
pub use control::{AdminApi, ControlPlane};
pub use core::middleware::{RateLimiter, SESSION_COOKIE_NAME, SessionStore};
pub use core::proxy::{ApiRequest, ApiResponse, Gateway, NexusProxy};
pub use features::webhook::{WebhookNotifier, WebhookPayload};
pub use relay::{Fetcher, HttpFetcher, RelayEngine, RelayMode, RelayResult};
pub use security::sanitizer::{HtmlSanitizer, PatternSanitizer};
pub use security::target::TargetGuard;
pub use web::assets::StaticAssets;
