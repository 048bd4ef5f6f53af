//! Warden - static file and JSON upload server
//!
//! Serves files from a sandboxed resource directory over HTTP/1.x, accepts
//! JSON uploads, and bounds concurrent connections with a fixed-size worker
//! pool plus a FIFO overflow queue.

pub mod config;
pub mod handler;
pub mod http;
pub mod sandbox;
pub mod server;
