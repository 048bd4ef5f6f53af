use bytes::{Buf, BytesMut};

use crate::http::request::{Headers, Method, Request, Version};
use crate::http::response::StatusCode;

/// Largest request head (request line plus headers) the parser will buffer.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Protocol faults detected while decoding a request.
///
/// Every fault is answered with [`ParseError::status`] and ends the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Request line is not exactly `METHOD SP TARGET SP VERSION`
    MalformedRequestLine,
    /// Version token other than `HTTP/1.0` or `HTTP/1.1`
    UnsupportedVersion,
    /// Header line without a `:` separator or with an empty name
    InvalidHeader,
    /// `Content-Length` is present but not a non-negative integer
    BadContentLength,
    /// A body is required but no `Content-Length` was declared
    LengthRequired,
    /// Request line and headers exceed [`MAX_HEAD_BYTES`]
    HeadersTooLarge,
    /// Declared body is larger than the configured limit
    PayloadTooLarge,
    /// `Transfer-Encoding` framing is not implemented
    UnsupportedTransferEncoding,
}

impl ParseError {
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::MalformedRequestLine
            | ParseError::InvalidHeader
            | ParseError::BadContentLength => StatusCode::BadRequest,
            ParseError::UnsupportedVersion => StatusCode::HttpVersionNotSupported,
            ParseError::LengthRequired => StatusCode::LengthRequired,
            ParseError::HeadersTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            ParseError::PayloadTooLarge => StatusCode::PayloadTooLarge,
            ParseError::UnsupportedTransferEncoding => StatusCode::NotImplemented,
        }
    }

    /// Short human readable explanation used in error pages.
    pub fn detail(&self) -> &'static str {
        match self {
            ParseError::MalformedRequestLine => "Malformed request line",
            ParseError::UnsupportedVersion => "Wrong HTTP version",
            ParseError::InvalidHeader => "Malformed header line",
            ParseError::BadContentLength => "Invalid Content-Length value.",
            ParseError::LengthRequired => "Content-Length header is required for POST requests.",
            ParseError::HeadersTooLarge => "Request headers are too large.",
            ParseError::PayloadTooLarge => "Request body is too large.",
            ParseError::UnsupportedTransferEncoding => "Transfer-Encoding is not supported.",
        }
    }
}

/// Result of feeding the buffered bytes to a [`RequestParser`].
#[derive(Debug)]
pub enum ParseStatus {
    /// The buffer does not yet hold a complete request
    NeedMoreData,
    /// A full request was decoded and its bytes removed from the buffer
    Complete(Request),
    Fault(ParseError),
}

/// Incremental HTTP/1.x request parser.
///
/// The parser works on the connection's read buffer. The head is decoded once,
/// as soon as the `CRLF CRLF` boundary is buffered, and removed from the
/// buffer; the parser then waits until `Content-Length` body bytes are
/// available. Bytes past the end of a request stay in the buffer for the next
/// call.
#[derive(Debug)]
pub struct RequestParser {
    /// Offset up to which the buffer has been searched for the head boundary
    scanned: usize,
    pending: Option<PendingRequest>,
    max_body_bytes: usize,
}

#[derive(Debug)]
struct PendingRequest {
    request: Request,
    content_length: Option<usize>,
}

impl RequestParser {
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            scanned: 0,
            pending: None,
            max_body_bytes,
        }
    }

    /// True once a head has been decoded and its body is still being read.
    pub fn awaiting_body(&self) -> bool {
        self.pending.is_some()
    }

    pub fn parse(&mut self, buf: &mut BytesMut) -> ParseStatus {
        if self.pending.is_none() {
            let Some(head_end) = find_headers_end(buf, self.scanned) else {
                if buf.len() > MAX_HEAD_BYTES {
                    return ParseStatus::Fault(ParseError::HeadersTooLarge);
                }
                // The boundary may straddle two reads
                self.scanned = buf.len().saturating_sub(3);
                return ParseStatus::NeedMoreData;
            };

            if head_end + 4 > MAX_HEAD_BYTES {
                return ParseStatus::Fault(ParseError::HeadersTooLarge);
            }

            let (request, content_length) = match parse_head(&buf[..head_end]) {
                Ok(head) => head,
                Err(e) => return ParseStatus::Fault(e),
            };

            if content_length.is_some_and(|n| n > self.max_body_bytes) {
                return ParseStatus::Fault(ParseError::PayloadTooLarge);
            }

            buf.advance(head_end + 4);
            self.scanned = 0;
            self.pending = Some(PendingRequest {
                request,
                content_length,
            });
        }

        let Some(pending) = self.pending.take() else {
            return ParseStatus::NeedMoreData;
        };

        match pending.content_length {
            Some(len) if buf.len() < len => {
                self.pending = Some(pending);
                ParseStatus::NeedMoreData
            }
            Some(len) => {
                let body = buf.split_to(len).to_vec();
                let mut request = pending.request;
                request.body = Some(body);
                ParseStatus::Complete(request)
            }
            None => ParseStatus::Complete(pending.request),
        }
    }
}

/// `Content-Length` is `1*DIGIT`; signs and whitespace inside the value are
/// rejected even where `usize::from_str` would accept them.
fn parse_content_length(value: &str) -> Result<usize, ParseError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::BadContentLength);
    }
    value.parse().map_err(|_| ParseError::BadContentLength)
}

fn find_headers_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + from)
}

/// Decodes the request line and header block (boundary excluded).
fn parse_head(head: &[u8]) -> Result<(Request, Option<usize>), ParseError> {
    let head = std::str::from_utf8(head).map_err(|_| ParseError::MalformedRequestLine)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(ParseError::MalformedRequestLine);
    };

    if method.is_empty() || target.is_empty() {
        return Err(ParseError::MalformedRequestLine);
    }

    let version = Version::parse(version).ok_or(ParseError::UnsupportedVersion)?;

    let mut headers = Headers::new();
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::InvalidHeader);
        }
        headers.insert(name, value.trim());
    }

    if headers.contains("Transfer-Encoding") {
        return Err(ParseError::UnsupportedTransferEncoding);
    }

    let content_length = headers
        .get("Content-Length")
        .map(parse_content_length)
        .transpose()?;

    let request = Request {
        method: Method::parse(method),
        path: target.to_string(),
        version,
        headers,
        body: None,
    };

    Ok((request, content_length))
}
