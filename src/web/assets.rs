//! Static asset map.
//!
//! Files under the configured directory are read once at startup and served
//! by request path from memory. Nothing touches the filesystem per request.

use bytes::Bytes;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// Page routes that map to a file under a different name.
const PAGE_ROUTES: &[(&str, &str)] = &[
    ("/", "html/index.html"),
    ("/nav/games", "html/games.html"),
    ("/nav/apps", "html/apps.html"),
    ("/admin/login", "html/admin-login.html"),
];

/// Session-gated admin dashboard.
pub const ADMIN_PAGE: &str = "server/admin.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: Bytes,
}

#[must_use]
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "txt" | "md" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Normalizes a request path into a map key, rejecting escapes above the root.
fn asset_key(request_path: &str) -> Option<String> {
    let cleaned = path_clean::clean(format!("/{}", request_path.trim_start_matches('/')));
    let cleaned = cleaned.to_string_lossy().replace('\\', "/");
    let key = cleaned.trim_start_matches('/');
    if key.is_empty() || key.starts_with("..") {
        return None;
    }
    Some(key.to_string())
}

#[derive(Debug, Default)]
pub struct StaticAssets {
    files: HashMap<String, Asset>,
}

impl StaticAssets {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads every regular file below `root`. Unreadable entries are logged and skipped.
    #[must_use]
    pub fn load(root: &Path) -> Self {
        let mut files = HashMap::new();
        Self::walk(root, root, &mut files);
        info!(dir = %root.display(), count = files.len(), "Static assets loaded");
        Self { files }
    }

    fn walk(root: &Path, dir: &Path, files: &mut HashMap<String, Asset>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "Failed to read asset directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                Self::walk(root, &path, files);
            } else if file_type.is_file() {
                let Ok(rel) = path.strip_prefix(root) else {
                    continue;
                };
                let key = rel.to_string_lossy().replace('\\', "/");
                match fs::read(&path) {
                    Ok(data) => {
                        debug!(asset = %key, size = data.len(), "Asset loaded");
                        files.insert(
                            key.clone(),
                            Asset {
                                content_type: content_type_for(&key),
                                body: Bytes::from(data),
                            },
                        );
                    }
                    Err(e) => error!(file = %key, error = %e, "Failed to load asset"),
                }
            }
        }
    }

    /// Builds a map from in-memory `(key, body)` pairs.
    #[must_use]
    pub fn from_entries<I, K, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, B)>,
        K: Into<String>,
        B: Into<Bytes>,
    {
        let files = entries
            .into_iter()
            .map(|(k, b)| {
                let key: String = k.into();
                let asset = Asset {
                    content_type: content_type_for(&key),
                    body: b.into(),
                };
                (key, asset)
            })
            .collect();
        Self { files }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up an asset by its key relative to the asset root.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Asset> {
        self.files.get(key)
    }

    /// Resolves a request path: page aliases first, then the path itself,
    /// then `<path>/index.html`.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<&Asset> {
        if request_path == "/"
            && let Some(asset) = self.files.get("index.html")
        {
            return Some(asset);
        }
        if let Some((_, key)) = PAGE_ROUTES.iter().find(|(route, _)| *route == request_path)
            && let Some(asset) = self.files.get(*key)
        {
            return Some(asset);
        }

        let key = asset_key(request_path)?;
        self.files
            .get(&key)
            .or_else(|| self.files.get(&format!("{key}/index.html")))
    }
}
