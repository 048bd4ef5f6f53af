//! Content types for static files, chosen by file extension.

use std::path::Path;

/// How a static file is sent back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// UTF-8 HTML document
    Html,
    /// Raw bytes delivered as `application/octet-stream`
    Binary,
}

impl ContentKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ContentKind::Html => "text/html; charset=utf-8",
            ContentKind::Binary => "application/octet-stream",
        }
    }
}

/// Returns `None` for extensions the server does not serve (415).
///
/// Matching is case-insensitive: `INDEX.HTML` is served like `index.html`.
pub fn content_kind(path: &Path) -> Option<ContentKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    match ext.as_str() {
        "html" => Some(ContentKind::Html),
        "png" | "jpeg" | "jpg" | "txt" => Some(ContentKind::Binary),
        _ => None,
    }
}
