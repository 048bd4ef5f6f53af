use bytes::BytesMut;
use warden::http::parser::{MAX_HEAD_BYTES, ParseError, ParseStatus, RequestParser};
use warden::http::request::{Method, Request, Version};
use warden::http::response::StatusCode;

const MAX_BODY: usize = 1024;

fn parse_all(bytes: &[u8]) -> (ParseStatus, BytesMut) {
    let mut parser = RequestParser::new(MAX_BODY);
    let mut buf = BytesMut::from(bytes);
    let status = parser.parse(&mut buf);
    (status, buf)
}

fn expect_request(status: ParseStatus) -> Request {
    match status {
        ParseStatus::Complete(request) => request,
        other => panic!("expected a complete request, got {:?}", other),
    }
}

fn expect_fault(status: ParseStatus) -> ParseError {
    match status {
        ParseStatus::Fault(fault) => fault,
        other => panic!("expected a fault, got {:?}", other),
    }
}

#[test]
fn test_parse_simple_get_request() {
    let (status, rest) = parse_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
    let parsed = expect_request(status);

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, Version::Http11);
    assert_eq!(parsed.header("Host"), Some("example.com"));
    assert!(parsed.body.is_none());
    assert!(rest.is_empty());
}

#[test]
fn test_parse_post_request_with_body() {
    let (status, rest) =
        parse_all(b"POST /upload HTTP/1.0\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello");
    let parsed = expect_request(status);

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.version, Version::Http10);
    assert_eq!(parsed.body.as_deref(), Some(&b"hello"[..]));
    assert!(rest.is_empty());
}

#[test]
fn test_header_names_are_case_insensitive() {
    let (status, _) = parse_all(b"GET / HTTP/1.1\r\nCONTENT-type: application/json\r\n\r\n");
    let parsed = expect_request(status);

    assert_eq!(parsed.header("content-type"), Some("application/json"));
    assert_eq!(parsed.header("Content-Type"), Some("application/json"));
}

#[test]
fn test_duplicate_header_last_wins() {
    let (status, _) = parse_all(b"GET / HTTP/1.1\r\nX-Tag: one\r\nx-tag: two\r\n\r\n");
    let parsed = expect_request(status);

    assert_eq!(parsed.header("X-Tag"), Some("two"));
    assert_eq!(parsed.headers.len(), 1);
}

#[test]
fn test_parse_request_with_path_and_query_string() {
    let (status, _) = parse_all(b"GET /search?q=rust HTTP/1.1\r\n\r\n");
    let parsed = expect_request(status);

    assert_eq!(parsed.path, "/search?q=rust");
    assert_eq!(parsed.path_without_query(), "/search");
}

#[test]
fn test_incomplete_head_needs_more_data() {
    let mut parser = RequestParser::new(MAX_BODY);
    let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: example.com\r\n"[..]);

    assert!(matches!(parser.parse(&mut buf), ParseStatus::NeedMoreData));
    assert!(!parser.awaiting_body());

    buf.extend_from_slice(b"\r\n");
    let parsed = expect_request(parser.parse(&mut buf));
    assert_eq!(parsed.header("Host"), Some("example.com"));
}

#[test]
fn test_partial_body_waits_for_declared_length() {
    let mut parser = RequestParser::new(MAX_BODY);
    let mut buf = BytesMut::from(&b"POST /upload HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello"[..]);

    assert!(matches!(parser.parse(&mut buf), ParseStatus::NeedMoreData));
    assert!(parser.awaiting_body());

    buf.extend_from_slice(b"world");
    let parsed = expect_request(parser.parse(&mut buf));
    assert_eq!(parsed.body.as_deref(), Some(&b"helloworld"[..]));
    assert!(!parser.awaiting_body());
}

#[test]
fn test_request_fed_one_byte_at_a_time() {
    let raw = b"POST /upload HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"a\":1,\"b\":2}";
    let mut parser = RequestParser::new(MAX_BODY);
    let mut buf = BytesMut::new();

    for (i, byte) in raw.iter().enumerate() {
        buf.extend_from_slice(&[*byte]);
        match parser.parse(&mut buf) {
            ParseStatus::NeedMoreData => assert!(i < raw.len() - 1),
            ParseStatus::Complete(request) => {
                assert_eq!(i, raw.len() - 1);
                assert_eq!(request.body.as_deref(), Some(&b"{\"a\":1,\"b\":2}"[..]));
                return;
            }
            ParseStatus::Fault(fault) => panic!("unexpected fault {:?}", fault),
        }
    }
    panic!("request never completed");
}

#[test]
fn test_bytes_after_body_stay_buffered_for_next_request() {
    let mut parser = RequestParser::new(MAX_BODY);
    let mut buf = BytesMut::from(
        &b"POST /upload HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}GET /next HTTP/1.1\r\n\r\n"[..],
    );

    let first = expect_request(parser.parse(&mut buf));
    assert_eq!(first.body.as_deref(), Some(&b"{}"[..]));
    assert_eq!(&buf[..], b"GET /next HTTP/1.1\r\n\r\n");

    let second = expect_request(parser.parse(&mut buf));
    assert_eq!(second.path, "/next");
    assert!(buf.is_empty());
}

#[test]
fn test_request_line_must_have_three_tokens() {
    for raw in [
        &b"GET /\r\n\r\n"[..],
        b"GET / HTTP/1.1 extra\r\n\r\n",
        b"\r\n\r\n",
        b"GET  / HTTP/1.1\r\n\r\n",
    ] {
        let (status, _) = parse_all(raw);
        assert_eq!(expect_fault(status), ParseError::MalformedRequestLine);
    }
}

#[test]
fn test_unsupported_versions() {
    for raw in [
        &b"GET / HTTP/2.0\r\n\r\n"[..],
        b"GET / http/1.1\r\n\r\n",
        b"GET / HTTP/1.2\r\n\r\n",
    ] {
        let (status, _) = parse_all(raw);
        assert_eq!(expect_fault(status), ParseError::UnsupportedVersion);
    }
}

#[test]
fn test_unknown_method_is_parsed_not_rejected() {
    let (status, _) = parse_all(b"BREW /pot HTTP/1.1\r\n\r\n");
    let parsed = expect_request(status);

    assert_eq!(parsed.method, Method::Other("BREW".to_string()));
}

#[test]
fn test_parse_malformed_header() {
    let (status, _) = parse_all(b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n");
    assert_eq!(expect_fault(status), ParseError::InvalidHeader);

    let (status, _) = parse_all(b"GET / HTTP/1.1\r\n: no-name\r\n\r\n");
    assert_eq!(expect_fault(status), ParseError::InvalidHeader);
}

#[test]
fn test_non_numeric_content_length() {
    for value in ["abc", "-1", "+2", "1.5", "1_0", ""] {
        let raw = format!("POST /upload HTTP/1.1\r\nContent-Length: {}\r\n\r\n", value);
        let (status, _) = parse_all(raw.as_bytes());
        assert_eq!(expect_fault(status), ParseError::BadContentLength, "value {:?}", value);
    }
}

#[test]
fn test_declared_body_over_limit() {
    let raw = format!("POST /upload HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY + 1);
    let (status, _) = parse_all(raw.as_bytes());

    assert_eq!(expect_fault(status), ParseError::PayloadTooLarge);
}

#[test]
fn test_oversized_head() {
    let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
    while raw.len() <= MAX_HEAD_BYTES {
        raw.extend_from_slice(b"X-Filler: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
    }
    let (status, _) = parse_all(&raw);

    assert_eq!(expect_fault(status), ParseError::HeadersTooLarge);
}

#[test]
fn test_transfer_encoding_not_supported() {
    let (status, _) = parse_all(b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");

    assert_eq!(expect_fault(status), ParseError::UnsupportedTransferEncoding);
}

#[test]
fn test_parse_request_with_empty_body() {
    let (status, _) = parse_all(b"POST /upload HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    let parsed = expect_request(status);

    assert_eq!(parsed.body.as_deref(), Some(&b""[..]));
}

#[test]
fn test_parse_request_with_binary_body() {
    let (status, _) = parse_all(b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03");
    let parsed = expect_request(status);

    assert_eq!(parsed.body, Some(vec![0, 1, 2, 3]));
}

#[test]
fn test_fault_status_codes() {
    assert_eq!(ParseError::MalformedRequestLine.status(), StatusCode::BadRequest);
    assert_eq!(ParseError::UnsupportedVersion.status(), StatusCode::HttpVersionNotSupported);
    assert_eq!(ParseError::InvalidHeader.status(), StatusCode::BadRequest);
    assert_eq!(ParseError::BadContentLength.status(), StatusCode::BadRequest);
    assert_eq!(ParseError::LengthRequired.status(), StatusCode::LengthRequired);
    assert_eq!(ParseError::HeadersTooLarge.status(), StatusCode::RequestHeaderFieldsTooLarge);
    assert_eq!(ParseError::PayloadTooLarge.status(), StatusCode::PayloadTooLarge);
    assert_eq!(ParseError::UnsupportedTransferEncoding.status(), StatusCode::NotImplemented);
}
