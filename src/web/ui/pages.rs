//! HTML page rendering.
//!
//! Status pages come from the asset map (`server/<status>.html`) when present
//! and fall back to the built-in template otherwise.

use crate::config::Config;
use crate::web::assets::StaticAssets;
use chrono::Utc;
use std::fmt::Write;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{{HEAD_EXTRA}}<title>{{TITLE}} | {{APP_NAME}}</title>
<style>
body{font-family:'Montserrat',sans-serif;background:#0d0d0d;color:#f1f1f1;display:flex;justify-content:center;align-items:center;height:100vh;margin:0}
.card{text-align:center;padding:40px;border-radius:12px;max-width:500px;background:{{ACCENT_BG}};border:2px solid {{ACCENT}}}
.card h1{font-size:2rem;margin-bottom:16px}
.card p{color:#b3b3b3;margin-bottom:24px}
.meta-row{display:flex;justify-content:space-between;gap:16px;font-size:.85rem;color:#8a8a8a}
.btn{padding:12px 24px;background:{{ACCENT}};color:#fff;text-decoration:none;border-radius:8px;display:inline-block}
</style>
</head>
<body>
<div class="card">
<h1>{{TITLE}}</h1>
<p>{{DESCRIPTION}}</p>
{{BODY_EXTRA}}{{DETAILS}}<div class="meta-row"><span>{{APP_NAME}}</span><span>{{TIMESTAMP}}</span></div>
</div>
</body>
</html>
"#;

const ERROR_ACCENT: (&str, &str) = ("#ef4444", "rgba(239, 68, 68, 0.1)");
const SUCCESS_ACCENT: (&str, &str) = ("#4CAF50", "rgba(76, 175, 80, 0.1)");

#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

struct Page<'a> {
    title: &'a str,
    description: &'a str,
    accent: (&'a str, &'a str),
    head_extra: &'a str,
    body_extra: &'a str,
    details: Option<Vec<(&'a str, &'a str)>>,
}

fn render(page: &Page<'_>, config: &Config) -> String {
    let mut details_html = String::new();
    if let Some(ref dets) = page.details {
        for (k, v) in dets {
            let _ = write!(
                details_html,
                "<div class=\"meta-row\"><span class=\"label\">{}</span><span class=\"value\">{}</span></div>",
                escape_html(k),
                escape_html(v)
            );
        }
    }

    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    PAGE_TEMPLATE
        .replace("{{HEAD_EXTRA}}", page.head_extra)
        .replace("{{BODY_EXTRA}}", page.body_extra)
        .replace("{{ACCENT_BG}}", page.accent.1)
        .replace("{{ACCENT}}", page.accent.0)
        .replace("{{TITLE}}", &escape_html(page.title))
        .replace("{{DESCRIPTION}}", &escape_html(page.description))
        .replace("{{DETAILS}}", &details_html)
        .replace("{{TIMESTAMP}}", &timestamp)
        .replace("{{APP_NAME}}", &escape_html(&config.app_name))
}

/// Renders a generic error page.
#[must_use]
pub fn get_error_page(
    title: &str,
    description: &str,
    details: Option<Vec<(&str, &str)>>,
    config: &Config,
) -> String {
    render(
        &Page {
            title,
            description,
            accent: ERROR_ACCENT,
            head_extra: "",
            body_extra: "",
            details,
        },
        config,
    )
}

/// Renders the page for `status`, preferring `server/<status>.html` from `assets`.
#[must_use]
pub fn get_status_page(status: u16, config: &Config, assets: &StaticAssets) -> String {
    if let Some(asset) = assets.get(&format!("server/{status}.html")) {
        return String::from_utf8_lossy(&asset.body).into_owned();
    }

    let (title, description) = match status {
        403 => (
            "Access Denied",
            "Your access to this service has been blocked.",
        ),
        404 => (
            "Page Not Found",
            "The page you are looking for does not exist.",
        ),
        503 => (
            "Under Maintenance",
            "The service is temporarily unavailable. Please check back soon.",
        ),
        _ => (
            "Internal Server Error",
            "Something went wrong while handling your request.",
        ),
    };
    get_error_page(title, description, None, config)
}

/// Renders the SSO confirmation page, which forwards to `/admin`.
#[must_use]
pub fn get_sso_success_page(config: &Config) -> String {
    render(
        &Page {
            title: "SSO Authentication Successful",
            description: "Redirecting to admin panel...",
            accent: SUCCESS_ACCENT,
            head_extra: "<meta http-equiv=\"refresh\" content=\"1;url=/admin\">\n",
            body_extra: "",
            details: None,
        },
        config,
    )
}

/// Renders the SSO rejection page.
#[must_use]
pub fn get_sso_failure_page(config: &Config) -> String {
    render(
        &Page {
            title: "Invalid SSO Key",
            description: "The SSO authentication key is invalid or has expired.",
            accent: ERROR_ACCENT,
            head_extra: "",
            body_extra: "<a href=\"/admin/login\" class=\"btn\">Go to Login Page</a>\n",
            details: None,
        },
        config,
    )
}
