//! Minimal single-threaded HTTP/1.1 request-line-and-header parser (§6): the
//! "wire-level HTTP parser" external collaborator, made concrete so the
//! crate runs end to end. No chunked transfer decoding; callers read a
//! fixed-length body once `content_length` has told them how much to expect.
//!
//! This is deliberately the thinnest possible parser, in the same spirit as
//! the sidecar parser `blobgate-server` runs for `/metrics`/`/health`/`/ready`:
//! split on `\r\n`, trust well-formed input, fail closed on anything else.

use blobgate_types::{HeaderMap, HttpMethod};

use crate::request::{IncomingRequest, SubResource};

/// A request the wire parser recognized but that is not blob traffic:
/// `GET /peers?name=H&port=P` is answered by the server directly rather than
/// through the pipeline (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeersQuery {
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRequest {
    Blob(IncomingRequest),
    Peers(PeersQuery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HttpParseError {
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("malformed header line")]
    MalformedHeaderLine,
    #[error("unsupported http method")]
    UnsupportedMethod,
    #[error("peers query missing name or port")]
    PeersMissingArgs,
}

/// Finds the end of the header section (`\r\n\r\n`), so a connection reader
/// knows when it can stop accumulating bytes and start looking at
/// `Content-Length`.
pub fn header_section_len(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// `Content-Length`, defaulting to 0 when absent (GET/HEAD/DELETE have no
/// body).
pub fn content_length(headers: &HeaderMap) -> usize {
    headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Parses a complete request (request line, headers, and a body slice
/// already sized to `content_length`) into a `ParsedRequest`.
pub fn parse_request(raw: &[u8], body: Vec<u8>) -> Result<ParsedRequest, HttpParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| HttpParseError::MalformedRequestLine)?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(HttpParseError::MalformedRequestLine)?;
    let mut parts = request_line.split_whitespace();
    let method_str = parts.next().ok_or(HttpParseError::MalformedRequestLine)?;
    let target = parts.next().ok_or(HttpParseError::MalformedRequestLine)?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    if method_str.eq_ignore_ascii_case("GET") && path == "/peers" {
        return parse_peers_query(query.unwrap_or("")).map(ParsedRequest::Peers);
    }

    let method = HttpMethod::parse(method_str).ok_or(HttpParseError::UnsupportedMethod)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or(HttpParseError::MalformedHeaderLine)?;
        headers.insert(name.trim(), value.trim());
    }

    let (blob_path, sub_resource) = split_sub_resource(path);
    let request_id = headers
        .get("x-request-id")
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(ParsedRequest::Blob(IncomingRequest {
        request_id,
        method,
        path: blob_path,
        sub_resource,
        headers,
        body,
    }))
}

/// Splits `/<blobId>` or `/<blobId>/<SubResource>` into the blob-id segment
/// and the parsed sub-resource, ignoring the leading slash.
fn split_sub_resource(path: &str) -> (String, SubResource) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((id, rest)) => (id.to_string(), SubResource::parse(Some(rest))),
        None => (trimmed.to_string(), SubResource::None),
    }
}

fn parse_peers_query(query: &str) -> Result<PeersQuery, HttpParseError> {
    let mut name = None;
    let mut port = None;
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or(HttpParseError::PeersMissingArgs)?;
        match key {
            "name" => name = Some(value.to_string()),
            "port" => port = value.parse::<u16>().ok(),
            _ => {}
        }
    }
    match (name, port) {
        (Some(name), Some(port)) => Ok(PeersQuery { name, port }),
        _ => Err(HttpParseError::PeersMissingArgs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_get_for_blob_bytes() {
        let raw = b"GET /abc123 HTTP/1.1\r\nHost: x\r\n\r\n";
        let parsed = parse_request(raw, Vec::new()).unwrap();
        match parsed {
            ParsedRequest::Blob(req) => {
                assert_eq!(req.method, HttpMethod::Get);
                assert_eq!(req.path, "abc123");
                assert_eq!(req.sub_resource, SubResource::None);
            }
            ParsedRequest::Peers(_) => panic!("expected blob request"),
        }
    }

    #[test]
    fn parses_sub_resource_suffix() {
        let raw = b"GET /abc123/BlobInfo HTTP/1.1\r\n\r\n";
        let parsed = parse_request(raw, Vec::new()).unwrap();
        match parsed {
            ParsedRequest::Blob(req) => {
                assert_eq!(req.path, "abc123");
                assert_eq!(req.sub_resource, SubResource::BlobInfo);
            }
            ParsedRequest::Peers(_) => panic!("expected blob request"),
        }
    }

    #[test]
    fn parses_post_headers_and_body() {
        let raw = b"POST / HTTP/1.1\r\nx-ambry-service-id: svc\r\nx-ambry-content-type: application/octet-stream\r\nx-ambry-ttl: -1\r\n\r\n";
        let parsed = parse_request(raw, b"hello".to_vec()).unwrap();
        match parsed {
            ParsedRequest::Blob(req) => {
                assert_eq!(req.method, HttpMethod::Post);
                assert_eq!(req.headers.get("x-ambry-service-id"), Some("svc"));
                assert_eq!(req.body, b"hello");
            }
            ParsedRequest::Peers(_) => panic!("expected blob request"),
        }
    }

    #[test]
    fn parses_peers_query() {
        let raw = b"GET /peers?name=host1&port=6000 HTTP/1.1\r\n\r\n";
        let parsed = parse_request(raw, Vec::new()).unwrap();
        assert_eq!(
            parsed,
            ParsedRequest::Peers(PeersQuery { name: "host1".to_string(), port: 6000 })
        );
    }

    #[test]
    fn peers_without_params_is_missing_args() {
        let raw = b"GET /peers HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(raw, Vec::new()).unwrap_err(), HttpParseError::PeersMissingArgs);
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let raw = b"PUT /abc123 HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(raw, Vec::new()).unwrap_err(), HttpParseError::UnsupportedMethod);
    }

    #[test]
    fn header_section_len_finds_blank_line() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody-bytes";
        assert_eq!(header_section_len(raw), Some(raw.len() - "body-bytes".len()));
    }
}
