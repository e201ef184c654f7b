//! UI rendering.
//!
//! Built-in status and SSO pages.

mod pages;

pub use pages::{
    escape_html, get_error_page, get_sso_failure_page, get_sso_success_page, get_status_page,
};
