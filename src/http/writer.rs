use std::time::SystemTime;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

pub const SERVER_NAME: &str = concat!("warden/", env!("CARGO_PKG_VERSION"));

/// Serializes a response.
///
/// The head is written as status line, `Content-Type`, `Content-Length`,
/// `Date`, `Server`, then any remaining headers in insertion order.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + resp.body.len());

    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    let mut push = |k: &str, v: &str| {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    };

    const LEADING: [&str; 2] = ["Content-Type", "Content-Length"];

    for name in LEADING {
        if let Some(v) = resp.header(name) {
            push(name, v);
        }
    }
    push("Date", &httpdate::fmt_http_date(SystemTime::now()));
    push("Server", SERVER_NAME);

    for (k, v) in &resp.headers {
        let skip = LEADING.iter().any(|l| l.eq_ignore_ascii_case(k))
            || k.eq_ignore_ascii_case("Date")
            || k.eq_ignore_ascii_case("Server");
        if !skip {
            push(k, v);
        }
    }

    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(&resp.body);

    buf
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    pub async fn write_to_stream<S>(&mut self, stream: &mut S) -> anyhow::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}
