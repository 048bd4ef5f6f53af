//! Request dispatch.
//!
//! - `GET <path>` serves a static file from the resource root
//! - `POST /upload` stores a JSON document under `<root>/uploads`
//! - `POST` to any other target answers 404
//! - every other method answers 405

pub mod static_files;
pub mod upload;

use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::sandbox::PathResolver;

pub const UPLOAD_ROUTE: &str = "/upload";

/// Routes parsed requests to the static file and upload handlers.
///
/// An `Err` return is an internal fault; the connection answers 500 and closes.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    resolver: PathResolver,
}

impl RequestHandler {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub async fn handle(&self, request: &Request) -> anyhow::Result<Response> {
        match &request.method {
            Method::GET => static_files::serve(&self.resolver, request).await,
            Method::POST if request.path_without_query() == UPLOAD_ROUTE => {
                upload::handle(&self.resolver, request).await
            }
            Method::POST => Ok(Response::error(
                StatusCode::NotFound,
                "The requested resource was not found.",
            )),
            Method::Other(_) => {
                let mut response = Response::error(
                    StatusCode::MethodNotAllowed,
                    "Only GET and POST are supported.",
                );
                response.set_header("Allow", "GET, POST");
                Ok(response)
            }
        }
    }
}
