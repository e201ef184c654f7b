//! Ad and tracker stripping for relayed HTML.
//!
//! Pattern-based removal over raw text, not an HTML parser. Overlapping or
//! malformed markup can leave partial matches behind.

use aho_corasick::AhoCorasick;
use regex::Regex;
use tracing::debug;

/// Ad, analytics and video-ad vendors whose `<script>`, `<iframe>` and `<ins>`
/// blocks are removed.
pub const AD_VENDORS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.com/tr",
    "connect.facebook.net",
    "scorecardresearch.com",
    "amazon-adsystem.com",
    "adnxs.com",
    "adsrvr.org",
    "advertising.com",
    "pixel.mathtag.com",
    "analytics.twitter.com",
    "ads-twitter.com",
    "hotjar.com",
    "mouseflow.com",
    "imasdk.googleapis.com",
    "pubads.g.doubleclick.net",
    "video-ad-stats.googlesyndication.com",
    "pagead2.googlesyndication.com",
    "s.ytimg.com/yts/jsbin",
    "static.doubleclick.net",
    "vast.yume.com",
    "ads.youtube.com",
    "adserver.pandora.com",
    "adservice.google.com",
    "innovid.com",
    "fwmrm.net",
    "spotxchange.com",
    "advertising.apple.com",
    "googlesyndication",
];

/// Removal rules in application order.
const RULES: &[(&str, &str)] = &[
    ("analytics-script", r"(?is)<script[^>]*google-analytics[^>]*>.*?</script>"),
    ("gtm-script", r"(?is)<script[^>]*googletagmanager[^>]*>.*?</script>"),
    ("doubleclick-script", r"(?is)<script[^>]*doubleclick[^>]*>.*?</script>"),
    ("syndication-iframe", r"(?is)<iframe[^>]*googlesyndication[^>]*>.*?</iframe>"),
    ("adsbygoogle-ins", r"(?is)<ins[^>]*adsbygoogle[^>]*>.*?</ins>"),
    ("ad-class-div", r#"(?is)<div[^>]*class="[^"]*ad[^"]*"[^>]*>.*?</div>"#),
    ("ad-id-div", r#"(?is)<div[^>]*id="[^"]*ad[^"]*"[^>]*>.*?</div>"#),
    ("ga-comment", r"(?is)<!-- Google Analytics.*?-->"),
    ("fb-pixel-comment", r"(?is)<!-- Facebook Pixel.*?-->"),
    ("imasdk-script", r"(?is)<script[^>]*imasdk[^>]*>.*?</script>"),
    ("pubads-script", r"(?is)<script[^>]*pubads[^>]*>.*?</script>"),
    ("preroll-video", r"(?is)<video[^>]*preroll[^>]*>.*?</video>"),
    ("video-ads-div", r"(?is)<div[^>]*video-ads[^>]*>.*?</div>"),
    ("yt-player-ads", r#"(?is)yt\.setConfig\(['"]PLAYER_VARS['"][^}]*ads[^}]*\}"#),
    ("ad-slots", r"(?is)adSlots.*?\]"),
    ("player-ads", r"(?is)playerAds.*?\}"),
    ("event-handler", r#"(?i)\bon\w+="[^"]*""#),
    ("pixel-img-wh", r#"(?i)<img[^>]*width="1"[^>]*height="1"[^>]*>"#),
    ("pixel-img-hw", r#"(?i)<img[^>]*height="1"[^>]*width="1"[^>]*>"#),
    ("request-ads", r"(?i)\.requestAds\([^)]*\)"),
    ("ad-display-container", r"(?i)initializeAdDisplayContainer\([^)]*\)"),
    ("vast-timeout", r"(?i)vastLoadTimeout.*?\}"),
    ("vast-tag", r"(?is)<VAST[^>]*>.*?</VAST>"),
    ("vmap-tag", r"(?is)<vmap[^>]*>.*?</vmap>"),
];

/// Strips advertising and tracking markup from an HTML document.
///
/// Implementations must be pure: same input, same output, no side effects.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Regex rule sanitizer.
///
/// Rules run in order over the whole document and the full pass repeats until
/// nothing changes, so `sanitize` is idempotent. Every rule deletes text, so the
/// output is never longer than the input.
pub struct PatternSanitizer {
    vendor_rules: Vec<Regex>,
    rules: Vec<(&'static str, Regex)>,
    vendors: AhoCorasick,
}

impl PatternSanitizer {
    /// Compiles the built-in rule set.
    ///
    /// # Panics
    ///
    /// Panics if a built-in pattern fails to compile (compile-time invariant).
    #[must_use]
    pub fn new() -> Self {
        let alternation = AD_VENDORS
            .iter()
            .map(|v| regex::escape(v))
            .collect::<Vec<_>>()
            .join("|");
        let vendor_rules = ["script", "iframe", "ins"]
            .iter()
            .map(|tag| {
                Regex::new(&format!(
                    r"(?is)<{tag}\b[^>]*(?:{alternation})[^>]*>.*?</{tag}>"
                ))
                .expect("Failed to build vendor rule")
            })
            .collect();

        let rules = RULES
            .iter()
            .map(|(name, pattern)| {
                (
                    *name,
                    Regex::new(pattern).expect("Failed to build sanitizer rule"),
                )
            })
            .collect();

        let vendors = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(AD_VENDORS)
            .expect("Failed to build vendor automaton");

        debug!(
            vendor_count = AD_VENDORS.len(),
            rule_count = RULES.len(),
            "Sanitizer initialized"
        );

        Self {
            vendor_rules,
            rules,
            vendors,
        }
    }

    fn single_pass(&self, html: &str) -> String {
        let mut cleaned = html.to_string();

        if self.vendors.is_match(&cleaned) {
            for rule in &self.vendor_rules {
                if let std::borrow::Cow::Owned(next) = rule.replace_all(&cleaned, "") {
                    cleaned = next;
                }
            }
        }

        for (name, rule) in &self.rules {
            if let std::borrow::Cow::Owned(next) = rule.replace_all(&cleaned, "") {
                debug!(rule = name, removed = cleaned.len() - next.len(), "Sanitizer rule applied");
                cleaned = next;
            }
        }

        cleaned
    }
}

impl Default for PatternSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSanitizer for PatternSanitizer {
    fn sanitize(&self, html: &str) -> String {
        let mut current = self.single_pass(html);
        loop {
            let next = self.single_pass(&current);
            if next.len() == current.len() {
                return current;
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(html: &str) -> String {
        PatternSanitizer::new().sanitize(html)
    }

    #[test]
    fn test_vendor_script_removed_surroundings_kept() {
        let html = r#"<html><body><p>hi</p><script async src="https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"></script><p>bye</p></body></html>"#;
        assert_eq!(
            sanitize(html),
            "<html><body><p>hi</p><p>bye</p></body></html>"
        );
    }

    #[test]
    fn test_plain_script_survives() {
        let html = r#"<script src="/app.js"></script><script>let x = 1;</script>"#;
        assert_eq!(sanitize(html), html);
    }

    #[test]
    fn test_vendor_iframe_and_ins_removed() {
        let html = concat!(
            r#"<main><iframe src="https://ad.doubleclick.net/x"></iframe>"#,
            r#"<ins class="adsbygoogle" data-ad-slot="1"></ins>text</main>"#
        );
        assert_eq!(sanitize(html), "<main>text</main>");
    }

    #[test]
    fn test_ad_divs_removed() {
        let html = r#"<div class="sidebar-ad">buy</div><p>a</p><div id="adbox">x</div>"#;
        assert_eq!(sanitize(html), "<p>a</p>");
    }

    #[test]
    fn test_tracking_comments_removed() {
        let html = "<head><!-- Google Analytics tag --><!-- Facebook Pixel Code --></head>";
        assert_eq!(sanitize(html), "<head></head>");
    }

    #[test]
    fn test_event_handlers_stripped() {
        let html = r#"<button onclick="track()" type="button">Go</button>"#;
        assert_eq!(sanitize(html), r#"<button  type="button">Go</button>"#);
    }

    #[test]
    fn test_tracking_pixels_either_order() {
        let html = r#"<p>a</p><img src="p.gif" width="1" height="1"><img height="1" alt="" width="1" src="q.gif"><img src="logo.png" width="100">"#;
        assert_eq!(sanitize(html), r#"<p>a</p><img src="logo.png" width="100">"#);
    }

    #[test]
    fn test_video_ad_calls_removed() {
        let html = "adsLoader.requestAds(request);container.initializeAdDisplayContainer(el);";
        assert_eq!(sanitize(html), "adsLoader;container.;");
    }

    #[test]
    fn test_vast_and_vmap_removed() {
        let html = r#"<x><VAST version="3.0"><Ad/></VAST><vmap:VMAP></vmap:VMAP><vmap id="1">a</vmap></x>"#;
        let out = sanitize(html);
        assert!(!out.contains("<VAST"));
        assert!(!out.contains(r#"<vmap id="1">"#));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            r#"<div class="ad"><div class="ad">x</div></div>"#,
            r#"<p o<script src="//hotjar.com/a"></script>nclick="x">t</p>"#,
            "plain text with no markup",
            r#"<script src="https://www.googletagmanager.com/gtm.js"></script><div id="header">h</div>"#,
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_never_grows() {
        let inputs = [
            "",
            "<html></html>",
            r#"<img width="1" height="1"><div class="ad">x</div>"#,
            "playerAds = {a: 1}; adSlots = [1, 2];",
        ];
        for input in inputs {
            assert!(sanitize(input).len() <= input.len());
        }
    }
}
