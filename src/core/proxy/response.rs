//! HTTP response utilities.
//!
//! Writes gateway responses to a pingora session and parses URL-encoded data.

use crate::config::Config;
use crate::core::proxy::headers::inject_security_headers;
use crate::core::proxy::router::ApiResponse;
use percent_encoding::percent_decode_str;
use pingora::Result;
use pingora::http::ResponseHeader;
use pingora::proxy::Session;

/// Writes `response` in full and ends the stream.
///
/// # Errors
///
/// Returns an error if headers cannot be built or response cannot be written.
pub async fn write_api_response(
    session: &mut Session,
    config: &Config,
    response: &ApiResponse,
    head_only: bool,
) -> Result<bool> {
    let mut header = ResponseHeader::build(response.status, None)?;
    header.insert_header("Content-Type", response.content_type.as_str())?;
    header.insert_header("Content-Length", response.body.len().to_string())?;
    if response.no_store {
        header.insert_header(
            "Cache-Control",
            "no-store, no-cache, must-revalidate, max-age=0",
        )?;
        header.insert_header("Expires", "0")?;
    }

    if let Some(ref cookie) = response.set_cookie {
        header.insert_header("Set-Cookie", cookie)?;
    }

    inject_security_headers(&mut header, config)?;

    if head_only || response.body.is_empty() {
        session
            .write_response_header(Box::new(header), true)
            .await?;
        return Ok(true);
    }

    session
        .write_response_header(Box::new(header), false)
        .await?;
    session
        .write_response_body(Some(response.body.clone()), true)
        .await?;
    Ok(true)
}

/// Parses `application/x-www-form-urlencoded` data (also used for query strings).
///
/// Pairs without `=` get an empty value. `+` decodes to a space.
#[must_use]
pub fn parse_urlencoded(data: &str) -> Vec<(String, String)> {
    data.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let dk = percent_decode_str(&k.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned();
            let dv = percent_decode_str(&v.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned();
            (dk, dv)
        })
        .collect()
}
