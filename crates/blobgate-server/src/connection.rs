//! Per-connection state for the main blob-serving listener.

use std::io::{self, Read, Write};
use std::time::Instant;

use bytes::BytesMut;
use mio::net::TcpStream;
use mio::{Interest, Token};

use blobgate_frontend::http::{content_length, header_section_len};
use blobgate_frontend::{parse_request, FinishedResponse, HttpParseError, ParsedRequest};
use blobgate_types::HeaderMap;

/// One accepted client connection: buffers, liveness bookkeeping, and the
/// cursor into `read_buf` that tracks how much of the next request has
/// arrived so far.
pub struct Connection {
    #[allow(dead_code)]
    pub token: Token,
    pub stream: TcpStream,
    pub read_buf: BytesMut,
    pub write_buf: BytesMut,
    pub closing: bool,
    pub last_activity: Instant,
}

/// What `try_decode_request` found once enough bytes have arrived to know.
pub enum DecodedRequest {
    Complete(ParsedRequest),
    Malformed(HttpParseError),
}

impl Connection {
    pub fn new(token: Token, stream: TcpStream, buffer_size: usize) -> Self {
        Self {
            token,
            stream,
            read_buf: BytesMut::with_capacity(buffer_size),
            write_buf: BytesMut::with_capacity(buffer_size),
            closing: false,
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle(&self, timeout: std::time::Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    /// Reads until the socket would block. Returns `false` if the peer
    /// closed the connection.
    pub fn read(&mut self) -> io::Result<bool> {
        let mut temp_buf = [0u8; 4096];
        loop {
            match self.stream.read(&mut temp_buf) {
                Ok(0) => return Ok(false),
                Ok(n) => self.read_buf.extend_from_slice(&temp_buf[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes as much of `write_buf` as the socket will currently accept.
    /// Returns `true` once the buffer has fully drained.
    pub fn write(&mut self) -> io::Result<bool> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write to socket")),
                Ok(n) => {
                    let _ = self.write_buf.split_to(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Attempts to decode one full request from `read_buf`. `Ok(None)` means
    /// the header section (or, once known, the body) hasn't fully arrived
    /// yet; the connection should keep reading. Decoded bytes are consumed
    /// from `read_buf` only once a full request is available.
    pub fn try_decode_request(&mut self) -> Option<DecodedRequest> {
        let header_len = header_section_len(&self.read_buf)?;

        let headers_raw = &self.read_buf[..header_len];
        let probe_headers = probe_content_length(headers_raw);
        let total_len = header_len + probe_headers;
        if self.read_buf.len() < total_len {
            return None;
        }

        let raw = self.read_buf.split_to(total_len);
        let (head, body) = raw.split_at(header_len);
        match parse_request(head, body.to_vec()) {
            Ok(parsed) => Some(DecodedRequest::Complete(parsed)),
            Err(e) => Some(DecodedRequest::Malformed(e)),
        }
    }

    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    /// Serializes a finished pipeline response as HTTP/1.1 and queues it for
    /// writing. No keep-alive: every response closes the connection, which
    /// keeps this sidecar-grade parser from ever needing to resynchronize a
    /// pipelined stream.
    pub fn queue_response(&mut self, response: &FinishedResponse) {
        self.write_buf.extend_from_slice(encode_response(response).as_slice());
    }

    pub fn interest(&self) -> Interest {
        if self.write_buf.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }
}

/// Builds the raw HTTP/1.1 response bytes for a finished pipeline response.
fn encode_response(response: &FinishedResponse) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + response.body.len());
    out.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", response.status, reason_phrase(response.status)).as_bytes(),
    );
    for (name, value) in response.headers.iter() {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    if !response.headers.contains_key("content-length") {
        out.extend_from_slice(format!("content-length: {}\r\n", response.body.len()).as_bytes());
    }
    out.extend_from_slice(b"connection: close\r\n\r\n");
    out.extend_from_slice(&response.body);
    out
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        410 => "Gone",
        412 => "Precondition Failed",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Reads `Content-Length` directly out of the raw header bytes, ahead of the
/// full `blobgate_frontend` header parse, so the connection knows how many
/// more bytes to accumulate before attempting that parse.
fn probe_content_length(header_bytes: &[u8]) -> usize {
    let Ok(text) = std::str::from_utf8(header_bytes) else {
        return 0;
    };
    let mut headers = HeaderMap::new();
    for line in text.split("\r\n").skip(1) {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim(), value.trim());
        }
    }
    content_length(&headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_content_length_reads_header() {
        let raw = b"POST / HTTP/1.1\r\ncontent-length: 11\r\n\r\n";
        assert_eq!(probe_content_length(raw), 11);
    }

    #[test]
    fn probe_content_length_defaults_to_zero() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        assert_eq!(probe_content_length(raw), 0);
    }
}
