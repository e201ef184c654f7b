//! Error types and result aliases.
//!
//! Defines the core `NexusError` enumeration and common `Result` type.

use thiserror::Error;

/// Relay and control-plane errors.
#[derive(Debug, Error)]
pub enum NexusError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// A search query matched none of the known engines.
    #[error("no search engine matched hint '{hint}'")]
    NoEngineMatched { hint: String },

    /// A control-plane mutation would leave the state inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Missing, unknown or expired admin session.
    #[error("Not authorized.")]
    Unauthorized,

    /// Blocked client, blocked destination or bad admin key.
    #[error("{0}")]
    Forbidden(String),

    /// Client exceeded the per-minute request ceiling.
    #[error("rate limit exceeded for {client_ip}")]
    RateLimited { client_ip: String },

    /// The requested relay mode is switched off.
    #[error("{0} proxy method is currently disabled")]
    ModeDisabled(&'static str),

    /// Maintenance mode is on.
    #[error("service under maintenance")]
    MaintenanceActive,

    /// DNS, connect, TLS or timeout failure talking to the destination.
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook delivery error.
    #[error("webhook error: {0}")]
    Webhook(String),
}

impl NexusError {
    /// HTTP status the boundary handler answers with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::NoEngineMatched { .. } | Self::InvalidConfiguration(_) => {
                400
            }
            Self::Unauthorized => 401,
            Self::Forbidden(_) => 403,
            Self::RateLimited { .. } => 429,
            Self::ModeDisabled(_) | Self::MaintenanceActive => 503,
            Self::UpstreamFetch(_) | Self::Config(_) | Self::Webhook(_) => 500,
        }
    }

    /// Message safe to echo back to the client.
    ///
    /// Server-side faults collapse to a generic message; their detail only goes to the log.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::UpstreamFetch(_) | Self::Config(_) | Self::Webhook(_) => {
                "Internal server error".to_string()
            }
            Self::RateLimited { .. } => "Too many requests.".to_string(),
            Self::MaintenanceActive => "Service under maintenance.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for `NexusError`.
pub type Result<T> = std::result::Result<T, NexusError>;
