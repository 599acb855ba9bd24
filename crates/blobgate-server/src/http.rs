//! Lightweight HTTP sidecar for metrics, health, and readiness endpoints.
//!
//! Runs on its own port alongside the main blob-serving listener. Minimal
//! HTTP/1.1 parsing for three endpoints:
//! - `GET /metrics` — Prometheus text format
//! - `GET /health` — liveness check (always 200 if the process is running)
//! - `GET /ready` — readiness check (503 if the pipeline hasn't started)

use std::io::{Read, Write};
use std::net::SocketAddr;

use mio::net::TcpListener;
use mio::{Interest, Poll, Token};
use tracing::{debug, error, warn};

use crate::health::HealthChecker;
use crate::metrics::Metrics;

/// Token for the sidecar listener in the server's mio event loop. Kept far
/// away from the main listener/connection token range so the two ranges
/// never collide.
pub const HTTP_LISTENER_TOKEN: Token = Token(1_000_000);

pub struct HttpSidecar {
    listener: TcpListener,
}

impl HttpSidecar {
    pub fn bind(addr: SocketAddr, poll: &Poll) -> std::io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, HTTP_LISTENER_TOKEN, Interest::READABLE)?;
        tracing::info!("metrics sidecar listening on {addr}");
        Ok(Self { listener })
    }

    /// Accepts and answers every pending connection, non-blocking. Connections
    /// are not kept alive; each is a single request/response round trip.
    pub fn handle_accept(&self, health_checker: &HealthChecker) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    debug!("sidecar connection from {addr}");

                    let mut buf = [0u8; 1024];
                    let n = match stream.read(&mut buf) {
                        Ok(0) => continue,
                        Ok(n) => n,
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                        Err(e) => {
                            warn!("sidecar read error from {addr}: {e}");
                            continue;
                        }
                    };

                    let request = String::from_utf8_lossy(&buf[..n]);
                    let response = match parse_request_path(&request) {
                        Some(path) => dispatch(path, health_checker),
                        None => http_response(400, "text/plain", "Bad Request"),
                    };

                    if let Err(e) = stream.write_all(response.as_bytes()) {
                        debug!("sidecar write error to {addr}: {e}");
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("sidecar accept error: {e}");
                    break;
                }
            }
        }
    }
}

fn parse_request_path(request: &str) -> Option<&str> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    if method != "GET" {
        return None;
    }
    Some(path)
}

fn dispatch(path: &str, health_checker: &HealthChecker) -> String {
    match path {
        "/metrics" => {
            let body = Metrics::global().render();
            http_response(200, "text/plain; version=0.0.4; charset=utf-8", &body)
        }
        "/health" => {
            let response = health_checker.liveness_check();
            http_response(200, "application/json", &response.to_json())
        }
        "/ready" => {
            let response = health_checker.readiness_check();
            let status = if response.status.is_healthy() { 200 } else { 503 };
            http_response(status, "application/json", &response.to_json())
        }
        _ => http_response(404, "text/plain", "Not Found"),
    }
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_path_accepts_get() {
        assert_eq!(parse_request_path("GET /metrics HTTP/1.1\r\nHost: x\r\n"), Some("/metrics"));
    }

    #[test]
    fn parse_request_path_rejects_non_get() {
        assert_eq!(parse_request_path("POST /metrics HTTP/1.1\r\n"), None);
    }

    #[test]
    fn dispatch_health_is_always_ok() {
        let checker = HealthChecker::new();
        let resp = dispatch("/health", &checker);
        assert!(resp.contains("200 OK"));
    }

    #[test]
    fn dispatch_ready_is_503_before_mark_ready() {
        let checker = HealthChecker::new();
        let resp = dispatch("/ready", &checker);
        assert!(resp.contains("503 Service Unavailable"));
        checker.mark_ready();
        let resp = dispatch("/ready", &checker);
        assert!(resp.contains("200 OK"));
    }

    #[test]
    fn dispatch_unknown_path_is_404() {
        let checker = HealthChecker::new();
        assert!(dispatch("/nonexistent", &checker).contains("404 Not Found"));
    }

    #[test]
    fn http_response_format() {
        let resp = http_response(200, "text/plain", "OK");
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(resp.contains("Content-Length: 2\r\n"));
        assert!(resp.ends_with("OK"));
    }
}
