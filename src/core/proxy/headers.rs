//! Security header injection.
//!
//! Every response leaves with the same hardening headers. Relayed bodies are
//! framed by the browser UI, so framing and CSP stay permissive for them.

use crate::config::Config;
use pingora::Result;
use pingora::http::ResponseHeader;

const CSP: &str = "default-src * data: blob: 'unsafe-inline' 'unsafe-eval'; \
     script-src 'self' 'unsafe-inline'; \
     connect-src 'self'; \
     img-src * data: blob:; \
     frame-src 'self' data: blob:; \
     style-src * data: blob: 'unsafe-inline'; \
     font-src * data: blob:;";

/// Injects the standard security headers and strips fingerprinting ones.
///
/// # Errors
///
/// Returns an error if header insertion fails.
pub fn inject_security_headers(response: &mut ResponseHeader, config: &Config) -> Result<()> {
    for name in ["Server", "X-Powered-By", "Via", "ETag", "Pragma"] {
        response.remove_header(name);
    }

    if config.secure_cookies {
        response.insert_header(
            "Strict-Transport-Security",
            "max-age=63072000; includeSubDomains",
        )?;
    }
    response.insert_header("Content-Security-Policy", CSP)?;
    response.insert_header("X-Content-Type-Options", "nosniff")?;
    response.insert_header("X-Frame-Options", "SAMEORIGIN")?;
    response.insert_header("Referrer-Policy", "no-referrer")?;
    response.insert_header(
        "Permissions-Policy",
        "geolocation=(), microphone=(), camera=(), payment=(), usb=(), \
         gyroscope=(), magnetometer=(), interest-cohort=()",
    )?;
    response.insert_header("Cross-Origin-Resource-Policy", "same-origin")?;

    Ok(())
}
