//! Destination resolution.
//!
//! Turns raw user input into an absolute URL: an explicit URL, a bare domain,
//! or a free-text query routed to a named search engine.

use crate::config::{NexusError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// A search engine a free-text query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchEngine {
    /// Canonical upper-case name, e.g. `GOOGLE`.
    pub name: &'static str,
    /// Base URL ending in `/`; `search?q=` is appended to it.
    pub base_url: &'static str,
}

/// Known engines in matching order. The first match wins.
pub const SEARCH_ENGINES: &[SearchEngine] = &[
    SearchEngine {
        name: "GOOGLE",
        base_url: "https://google.com/",
    },
    SearchEngine {
        name: "BING",
        base_url: "https://bing.com/",
    },
    SearchEngine {
        name: "DUCKDUCKGO",
        base_url: "https://duckduckgo.com/",
    },
    SearchEngine {
        name: "YAHOO",
        base_url: "https://yahoo.com/",
    },
    SearchEngine {
        name: "BAIDU",
        base_url: "https://baidu.com/",
    },
    SearchEngine {
        name: "YANDEX",
        base_url: "https://yandex.com/",
    },
    SearchEngine {
        name: "QWANT",
        base_url: "https://qwant.com/",
    },
    SearchEngine {
        name: "ASK",
        base_url: "https://ask.com/",
    },
];

/// An absolute destination URL derived from a relay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: String,
}

fn bare_domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\.[a-z]{2,}$").expect("valid bare-domain regex"))
}

/// Resolves `raw_input` to an absolute URL.
///
/// The bare-domain check is a suffix heuristic, so a query such as
/// `what is node.js` is treated as a domain.
///
/// # Errors
///
/// Returns `Validation` for empty input and `NoEngineMatched` when a search
/// query matches none of `engines`.
pub fn resolve(
    raw_input: &str,
    engine_hint: &str,
    engines: &[SearchEngine],
) -> Result<ResolvedTarget> {
    if raw_input.trim().is_empty() {
        return Err(NexusError::Validation(
            "URL parameter is required".to_string(),
        ));
    }

    if raw_input.contains("http://") || raw_input.contains("https://") {
        return Ok(ResolvedTarget {
            url: raw_input.to_string(),
        });
    }

    if bare_domain_pattern().is_match(raw_input) {
        return Ok(ResolvedTarget {
            url: format!("https://{raw_input}"),
        });
    }

    match_engine(engine_hint, engines)
        .map(|engine| ResolvedTarget {
            url: format!("{}search?q={raw_input}", engine.base_url),
        })
        .ok_or_else(|| NexusError::NoEngineMatched {
            hint: engine_hint.to_string(),
        })
}

fn match_engine<'a>(hint: &str, engines: &'a [SearchEngine]) -> Option<&'a SearchEngine> {
    if hint.is_empty() {
        return None;
    }
    let hint_lower = hint.to_lowercase();
    engines
        .iter()
        .find(|e| hint == e.name || hint_lower.contains(&e.name.to_lowercase()))
}
