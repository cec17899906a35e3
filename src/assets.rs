//! Static asset resolution for standalone documents
//!
//! Framework pages link their stylesheets relative to the server that
//! produced them (`static/extensions/panel/css/markdown.css?v=1.8.7`). Opened
//! as a bare `file://` document those links resolve to nothing, so before
//! rasterizing we point them at the versioned CDN copy instead.

use crate::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Where framework assets live, both relative to a server and on the CDN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Relative prefix the framework uses for its bundled assets
    pub static_prefix: String,
    /// CDN root; the version and `dist/` are appended to it
    pub cdn_base: String,
    /// Framework version the CDN copy is taken from
    pub version: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            static_prefix: "static/extensions/panel/".to_string(),
            cdn_base: "https://cdn.holoviz.org/panel".to_string(),
            version: "1.8.7".to_string(),
        }
    }
}

impl AssetConfig {
    /// `<cdn_base>/<version>/dist/`
    pub fn dist_base(&self) -> Result<Url> {
        let root = format!("{}/", self.cdn_base.trim_end_matches('/'));
        let root = Url::parse(&root)
            .map_err(|e| Error::ConfigError(format!("invalid CDN base '{}': {}", self.cdn_base, e)))?;
        root.join(&format!("{}/dist/", self.version.trim_matches('/')))
            .map_err(|e| Error::ConfigError(format!("invalid asset version '{}': {}", self.version, e)))
    }

    /// The server-relative reference the framework emits for `path`.
    pub fn relative_ref(&self, path: &str) -> String {
        format!("{}{}?v={}", self.static_prefix, path, self.version)
    }
}

/// Rewrite every relative static-asset reference in `html` to its CDN URL.
///
/// A reference is the configured prefix followed by a non-empty path that
/// runs up to a quote, `?` or whitespace. An optional query string (up to the
/// next quote) is dropped. Returns the rewritten document and the number of
/// references replaced.
pub fn rewrite_static_paths(html: &str, assets: &AssetConfig) -> Result<(String, usize)> {
    let prefix = assets.static_prefix.as_str();
    if prefix.is_empty() {
        return Ok((html.to_string(), 0));
    }
    let base = assets.dist_base()?;

    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut count = 0;

    while let Some(pos) = rest.find(prefix) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + prefix.len()..];

        let path_len = after
            .find(|c: char| c == '"' || c == '\'' || c == '?' || c.is_whitespace())
            .unwrap_or(after.len());
        if path_len == 0 {
            out.push_str(prefix);
            rest = after;
            continue;
        }
        let path = &after[..path_len];
        let mut consumed = path_len;

        if after[path_len..].starts_with('?') {
            let query = &after[path_len..];
            consumed += query.find(|c: char| c == '"' || c == '\'').unwrap_or(query.len());
        }

        // A leading '/' would make the join absolute and drop the dist prefix.
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            out.push_str(prefix);
            rest = after;
            continue;
        }

        let resolved = base
            .join(relative)
            .map_err(|e| Error::Serialization(format!("cannot resolve asset '{}': {}", path, e)))?;
        if !resolved.as_str().starts_with(base.as_str()) {
            // `..` segments or a scheme would leave the dist tree; keep the reference as written.
            out.push_str(prefix);
            rest = after;
            continue;
        }
        out.push_str(resolved.as_str());
        count += 1;
        rest = &after[consumed..];
    }
    out.push_str(rest);

    Ok((out, count))
}

/// Rewrite the document at `path` in place. Returns the number of references replaced.
pub fn rewrite_file(path: &Path, assets: &AssetConfig) -> Result<usize> {
    let html = std::fs::read_to_string(path)?;
    let (rewritten, count) = rewrite_static_paths(&html, assets)?;
    if count > 0 {
        std::fs::write(path, rewritten)?;
    }
    debug!("Rewrote {} static asset reference(s) in {}", count, path.display());
    Ok(count)
}
