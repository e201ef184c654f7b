//! HTTP service implementation.
//!
//! Routes every request through the `Gateway` and writes the response itself,
//! with security headers on everything that leaves.

pub mod headers;
pub mod response;
pub mod router;
pub mod service;

pub use router::{ApiRequest, ApiResponse, Gateway};
pub use service::NexusProxy;
