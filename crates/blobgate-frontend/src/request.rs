//! Per-request scratch space (§3 "Request context").

use blobgate_types::{Account, Container, HeaderMap, HttpMethod};

/// Which alternate response view a GET/HEAD selects, from the trailing path
/// segment after the blob id (§6, GLOSSARY "Sub-resource").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubResource {
    None,
    BlobInfo,
    UserMetadata,
    Replicas,
}

impl SubResource {
    pub fn parse(segment: Option<&str>) -> Self {
        match segment {
            None | Some("") => Self::None,
            Some("BlobInfo") => Self::BlobInfo,
            Some("UserMetadata") => Self::UserMetadata,
            Some("Replicas") => Self::Replicas,
            Some(_) => Self::None,
        }
    }
}

/// A parsed, not-yet-validated inbound request. The pipeline never sees raw
/// bytes off the wire; parsing HTTP itself is `blobgate-server`'s job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    /// Correlates this request across log lines; taken from an inbound
    /// `x-request-id` header when present, otherwise minted by the parser.
    pub request_id: String,
    pub method: HttpMethod,
    /// For GET/HEAD/DELETE: the path segment naming the blob id. For POST: empty.
    pub path: String,
    pub sub_resource: SubResource,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Resolved target account/container, written by account/container
/// injection (POST) or resolution (GET/HEAD/DELETE) before router dispatch
/// (§4.1).
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub account: Account,
    pub container: Container,
}

/// Per-request context carried through every stage. Owned exclusively by
/// the stage currently executing; never shared across requests (§5
/// "Pipeline itself is lock-free").
pub struct RequestContext {
    pub request_id: String,
    pub method: HttpMethod,
    /// For GET/HEAD/DELETE: the client-supplied blob id path segment.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub sub_resource: SubResource,
    pub target: Option<ResolvedTarget>,
}

impl RequestContext {
    pub fn new(incoming: IncomingRequest) -> Self {
        Self {
            request_id: incoming.request_id,
            method: incoming.method,
            path: incoming.path,
            headers: incoming.headers,
            body: incoming.body,
            sub_resource: incoming.sub_resource,
            target: None,
        }
    }
}
