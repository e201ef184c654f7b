//! Middleware components.
//!
//! Includes rate limiting and admin session management.

mod ratelimit;
mod session;

pub use ratelimit::RateLimiter;
pub use session::{
    AdminSession, SESSION_COOKIE_NAME, SessionStore, extract_cookie, format_clear_cookie,
    format_set_cookie, generate_session_id,
};
