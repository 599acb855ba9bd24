//! `ResponseSubmitter`: the terminal stage that serializes a pipeline
//! outcome into an HTTP response (§4.5).

use blobgate_types::{HeaderMap, PipelineErrorCode};

/// Header carrying the machine-readable error kind on any non-2xx response
/// (§6 "Error responses").
pub const ERROR_CODE_HEADER: &str = "x-ambry-error-code";
/// Set to `"true"` alongside a `Gone` response produced by a deleted blob,
/// distinguishing it from one produced by an expired blob (§7 mapping table).
pub const DELETED_HEADER: &str = "x-ambry-deleted";

/// A fully serialized response. `blobgate-frontend` never touches sockets;
/// `blobgate-server` writes this to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Builds the terminal response for a request. Every pipeline stage
/// sequence ends in exactly one call to `success` or `error` (§4.5
/// "Preconditions: called exactly once per request"); resource release
/// (closing the request/response body streams and the request context) is
/// the pipeline's job, not this one's, and happens regardless of which
/// branch ran.
pub struct ResponseSubmitter;

impl ResponseSubmitter {
    pub fn success(status: u16, headers: HeaderMap, body: Vec<u8>) -> FinishedResponse {
        FinishedResponse { status, headers, body }
    }

    /// The ordinary error path: status derived from `code`, empty body, and
    /// the error-kind header. `blob_deleted` additionally sets
    /// `x-ambry-deleted: true`, matching the router→pipeline mapping table's
    /// note on `BlobDeleted` (§7).
    pub fn error(code: PipelineErrorCode, blob_deleted: bool) -> FinishedResponse {
        let mut headers = HeaderMap::new();
        if blob_deleted {
            headers.insert(DELETED_HEADER, "true");
        }
        headers.insert(ERROR_CODE_HEADER, code.as_str());
        FinishedResponse {
            status: code.http_status(),
            headers,
            body: Vec::new(),
        }
    }

    /// Submission fallback (§4.1 "Submission fallback"): used when the
    /// external response channel has already failed and the pipeline must
    /// complete the request directly. Preserves `original` if one was
    /// already computed; otherwise synthesizes `ServiceUnavailable`.
    pub fn fallback(original: Option<FinishedResponse>) -> FinishedResponse {
        original.unwrap_or_else(|| Self::error(PipelineErrorCode::ServiceUnavailable, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_status_and_body_through_unchanged() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/octet-stream");
        let response = ResponseSubmitter::success(200, headers, vec![1, 2, 3]);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, vec![1, 2, 3]);
    }

    #[test]
    fn error_sets_status_from_code_and_error_header() {
        let response = ResponseSubmitter::error(PipelineErrorCode::NotFound, false);
        assert_eq!(response.status, 404);
        assert_eq!(response.headers.get(ERROR_CODE_HEADER), Some("NotFound"));
        assert_eq!(response.headers.get(DELETED_HEADER), None);
        assert!(response.body.is_empty());
    }

    #[test]
    fn blob_deleted_sets_deleted_header_alongside_gone() {
        let response = ResponseSubmitter::error(PipelineErrorCode::Gone, true);
        assert_eq!(response.status, 410);
        assert_eq!(response.headers.get(DELETED_HEADER), Some("true"));
    }

    #[test]
    fn fallback_preserves_original_outcome() {
        let original = ResponseSubmitter::success(200, HeaderMap::new(), vec![9]);
        let fallback = ResponseSubmitter::fallback(Some(original.clone()));
        assert_eq!(fallback, original);
    }

    #[test]
    fn fallback_synthesizes_service_unavailable_when_nothing_to_preserve() {
        let fallback = ResponseSubmitter::fallback(None);
        assert_eq!(fallback.status, 503);
    }
}
