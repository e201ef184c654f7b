//! Security enforcement modules.
//!
//! Markup sanitizing for advanced relays and destination screening.

pub mod sanitizer;
pub mod target;
