//! Core system components.
//!
//! Contains the HTTP service, the request gateway and its middleware.

pub mod middleware;
pub mod proxy;
