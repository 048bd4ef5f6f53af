use anyhow::Context;

use crate::http::mime::{self, ContentKind};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::sandbox::{PathResolver, SandboxError};

/// Serves `GET` requests from the resource root.
///
/// Resolution failures never echo the requested path back to the client.
pub async fn serve(resolver: &PathResolver, request: &Request) -> anyhow::Result<Response> {
    let path = match resolver.resolve_static(&request.path) {
        Ok(path) => path,
        // A component exists but cannot be traversed (e.g. a file used as a directory)
        Err(SandboxError::Io(e)) => {
            tracing::debug!(path = %request.path, error = %e, "Static path not resolvable");
            return Ok(not_found());
        }
        Err(e) => {
            tracing::warn!(path = %request.path, reason = %e, "Rejected static path");
            let detail = match e {
                SandboxError::MalformedTarget => "Malformed request target",
                _ => "Forbidden Path",
            };
            return Ok(Response::error(e.status(), detail));
        }
    };

    let is_file = tokio::fs::metadata(path.as_path())
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Ok(not_found());
    }

    let Some(kind) = mime::content_kind(path.as_path()) else {
        return Ok(Response::error(
            StatusCode::UnsupportedMediaType,
            "File type not supported",
        ));
    };

    let data = tokio::fs::read(path.as_path())
        .await
        .with_context(|| format!("Failed to read {}", path.as_path().display()))?;

    if kind == ContentKind::Html {
        std::str::from_utf8(&data).context("HTML document is not valid UTF-8")?;
    }

    Ok(Response::ok(kind.content_type(), data))
}

fn not_found() -> Response {
    Response::error(
        StatusCode::NotFound,
        "The requested resource was not found.",
    )
}
