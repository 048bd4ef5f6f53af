use anyhow::Context;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::io::AsyncWriteExt;

use crate::http::parser::ParseError;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::sandbox::{PathResolver, SandboxError, UPLOADS_DIR};

#[derive(Debug, Serialize)]
struct UploadReceipt {
    status: &'static str,
    message: &'static str,
    filepath: String,
}

/// Handles `POST /upload`.
///
/// Checks run in order: JSON content type (415), declared length (411), JSON
/// body (400), upload location (403). The stored file holds the document
/// re-serialized with four-space indentation.
pub async fn handle(resolver: &PathResolver, request: &Request) -> anyhow::Result<Response> {
    if request.content_type().as_deref() != Some("application/json") {
        return Ok(Response::error(
            StatusCode::UnsupportedMediaType,
            "Content-Type must be application/json.",
        ));
    }

    // The parser only attaches a body when Content-Length was declared
    let Some(body) = request.body.as_deref() else {
        let fault = ParseError::LengthRequired;
        return Ok(Response::error(fault.status(), fault.detail()));
    };

    let document: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected upload body");
            return Ok(Response::error(
                StatusCode::BadRequest,
                "Invalid JSON or UTF-8 decoding error.",
            ));
        }
    };

    let target = match resolver.resolve_upload() {
        Ok(target) => target,
        Err(SandboxError::Io(e)) => {
            return Err(e).context("Failed to prepare uploads directory");
        }
        Err(e) => {
            tracing::warn!(reason = %e, "Rejected upload location");
            return Ok(Response::error(
                StatusCode::Forbidden,
                "Cannot create file in the specified location.",
            ));
        }
    };

    let mut contents = Vec::with_capacity(body.len() * 2);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut contents, formatter);
    document
        .serialize(&mut ser)
        .context("Failed to encode upload")?;

    // create_new: an existing upload is never overwritten
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target.as_path())
        .await
        .with_context(|| format!("Failed to create {}", target.as_path().display()))?;
    file.write_all(&contents).await?;
    file.flush().await?;

    let file_name = target
        .as_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Upload path has no file name")?;

    tracing::info!(file = %file_name, bytes = contents.len(), "Upload stored");

    let receipt = UploadReceipt {
        status: "success",
        message: "File created successfully",
        filepath: format!("/{}/{}", UPLOADS_DIR, file_name),
    };

    Ok(ResponseBuilder::new(StatusCode::Created)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(serde_json::to_vec(&receipt)?)
        .build())
}
