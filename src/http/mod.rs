//! HTTP/1.x protocol implementation.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine; reads requests, dispatches them, writes responses
//! - **`parser`**: Incremental request parser working on the connection's byte buffer
//! - **`request`**: Request representation (method, target, version, headers, body)
//! - **`response`**: Status codes and the response builder
//! - **`writer`**: Serializes and writes responses to the client
//! - **`mime`**: Content type selection by file extension
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← Read and parse until a request is complete
//!        └──────┬───────────┘
//!               │ Request parsed (or protocol fault → error response)
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatching    │ ← Route to the static file or upload handler
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │   Responding     │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → AwaitingRequest (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Peer close, read timeouts and write errors end the connection from any
//! state without a response.

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
