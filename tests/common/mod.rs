//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, DuplexStream};
use tokio::task::JoinHandle;

use warden::handler::RequestHandler;
use warden::http::connection::{Connection, ConnectionSettings};
use warden::sandbox::PathResolver;

pub const INDEX_HTML: &str = "<html><body><h1>Welcome</h1></body></html>";
pub const NOTES_TXT: &str = "plain notes\n";

/// A response as seen on the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Resource root with a few files of each served kind.
pub fn resources() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), INDEX_HTML).unwrap();
    std::fs::write(dir.path().join("notes.txt"), NOTES_TXT).unwrap();
    std::fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G', 0x00, 0xff]).unwrap();
    std::fs::write(dir.path().join("style.css"), "body {}").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("page.html"), "<p>sub</p>").unwrap();
    dir
}

pub fn handler(root: &Path) -> Arc<RequestHandler> {
    Arc::new(RequestHandler::new(PathResolver::new(root).unwrap()))
}

/// Runs a `Connection` over an in-memory pipe and returns the client end.
pub fn spawn_connection(
    root: &Path,
    settings: ConnectionSettings,
) -> (DuplexStream, JoinHandle<anyhow::Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let handler = handler(root);

    let task = tokio::spawn(async move {
        let mut conn = Connection::new(server, handler, settings);
        conn.run().await
    });

    (client, task)
}

/// Reads one response; `None` if the stream ends before any byte arrives.
pub async fn read_response<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<RawResponse>
where
    R: AsyncRead + Unpin,
{
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let mut chunk = [0u8; 4096];
        let n = reader.read(&mut chunk).await.unwrap();
        if n == 0 {
            assert!(buf.is_empty(), "stream ended inside a response head");
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status: u16 = status_line.split(' ').nth(1).unwrap().parse().unwrap();

    let headers: Vec<(String, String)> = lines
        .map(|line| {
            let (k, v) = line.split_once(':').unwrap();
            (k.trim().to_string(), v.trim().to_string())
        })
        .collect();

    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, v)| v.parse().unwrap())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + content_length {
        let mut chunk = [0u8; 4096];
        let n = reader.read(&mut chunk).await.unwrap();
        assert!(n > 0, "stream ended inside a response body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = buf[body_start..body_start + content_length].to_vec();
    buf.drain(..body_start + content_length);

    Some(RawResponse {
        status,
        headers,
        body,
    })
}

/// Asserts the peer has closed the stream without sending anything more.
pub async fn assert_closed<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "unexpected bytes after close: {:?}", String::from_utf8_lossy(&rest));
}
