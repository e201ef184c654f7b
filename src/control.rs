//! Control plane.
//!
//! Runtime switches, blocklists, logs and analytics shared by every request,
//! plus the session-gated admin operations over them.

pub mod admin;
pub mod analytics;
pub mod logs;
pub mod state;

pub use admin::{AdminAction, AdminApi, AdminCall, AdminForm, AdminReply};
pub use analytics::{Analytics, AnalyticsReport};
pub use logs::{LogQuery, RequestLogEntry, SecurityEvent, Severity};
pub use state::{ControlPlane, ControlStats, ControlStatus, RelayModes};
