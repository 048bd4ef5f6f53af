use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::config::Config;
use crate::handler::RequestHandler;
use crate::http::parser::{ParseError, ParseStatus, RequestParser};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 8192;

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Idle timeout for every socket read
    pub read_timeout: Duration,
    /// Requests served before the connection is closed
    pub max_requests: usize,
    pub max_body_bytes: usize,
}

impl ConnectionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            read_timeout: cfg.read_timeout(),
            max_requests: cfg.server.max_requests_per_connection.max(1),
            max_body_bytes: cfg.server.max_body_bytes,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    parser: RequestParser,
    handler: Arc<RequestHandler>,
    settings: ConnectionSettings,
    served: usize,
    state: ConnectionState,
}

pub enum ConnectionState {
    AwaitingRequest,
    Dispatching(Request),
    /// The flag says whether the connection stays open afterwards
    Responding(ResponseWriter, bool),
    Closed,
}

enum ReadOutcome {
    Request(Request),
    Fault(ParseError),
    /// Peer closed the connection, possibly in the middle of a request
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, handler: Arc<RequestHandler>, settings: ConnectionSettings) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            parser: RequestParser::new(settings.max_body_bytes),
            handler,
            settings,
            served: 0,
            state: ConnectionState::AwaitingRequest,
        }
    }

    /// Number of requests answered so far.
    pub fn served(&self) -> usize {
        self.served
    }

    /// Serves requests until the connection is closed.
    ///
    /// Returns `Err` for transport faults (read timeout, reset, failed write);
    /// no response is attempted for those.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::AwaitingRequest => match self.read_request().await? {
                    ReadOutcome::Request(req) => ConnectionState::Dispatching(req),
                    ReadOutcome::Fault(fault) => {
                        tracing::warn!(
                            status = fault.status().as_u16(),
                            fault = ?fault,
                            "Rejected malformed request"
                        );
                        let response =
                            self.finish(Response::error(fault.status(), fault.detail()), false);
                        ConnectionState::Responding(ResponseWriter::new(&response), false)
                    }
                    ReadOutcome::Closed => ConnectionState::Closed,
                },

                ConnectionState::Dispatching(req) => {
                    let (writer, keep_alive) = self.dispatch(req).await;
                    ConnectionState::Responding(writer, keep_alive)
                }

                ConnectionState::Responding(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        ConnectionState::AwaitingRequest
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        // Best effort; the socket is dropped right after either way
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        loop {
            match self.parser.parse(&mut self.buffer) {
                ParseStatus::Complete(request) => return Ok(ReadOutcome::Request(request)),
                ParseStatus::Fault(fault) => return Ok(ReadOutcome::Fault(fault)),
                ParseStatus::NeedMoreData => {}
            }

            self.buffer.reserve(READ_CHUNK);
            let n = timeout(self.settings.read_timeout, self.stream.read_buf(&mut self.buffer))
                .await
                .context("read timed out")??;

            if n == 0 {
                if self.parser.awaiting_body() || !self.buffer.is_empty() {
                    tracing::debug!("Connection closed before the request was complete");
                }
                return Ok(ReadOutcome::Closed);
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> (ResponseWriter, bool) {
        self.served += 1;

        let response = match guarded(self.handler.handle(&request)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    method = request.method.as_str(),
                    path = %request.path,
                    error = ?e,
                    "Request handler failed"
                );
                Response::error(
                    StatusCode::InternalServerError,
                    "The server encountered an internal error.",
                )
            }
        };

        let keep_alive = request.keep_alive()
            && response.status.is_success()
            && self.served < self.settings.max_requests;

        tracing::info!(
            method = request.method.as_str(),
            path = %request.path,
            version = request.version.as_str(),
            status = response.status.as_u16(),
            keep_alive,
            "Request served"
        );

        let response = self.finish(response, keep_alive);
        (ResponseWriter::new(&response), keep_alive)
    }

    /// Adds the persistence headers.
    fn finish(&self, mut response: Response, keep_alive: bool) -> Response {
        if keep_alive {
            response.set_header("Connection", "keep-alive");
            response.set_header(
                "Keep-Alive",
                format!(
                    "timeout={}, max={}",
                    self.settings.read_timeout.as_secs(),
                    self.settings.max_requests
                ),
            );
        } else {
            response.set_header("Connection", "close");
        }
        response
    }
}

/// Runs a handler future, turning a panic into an error so the client still
/// gets a 500 before the connection closes.
async fn guarded<F>(handler: F) -> anyhow::Result<Response>
where
    F: Future<Output = anyhow::Result<Response>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
