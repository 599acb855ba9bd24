//! `IdConverter`: bidirectional blob-id rewriting (§4.3).
//!
//! On POST, `input` is the id the router minted for a new blob; the
//! converter may rewrite it (e.g. register a short alias) before it reaches
//! the client. On GET/HEAD/DELETE, `input` is the client-supplied id; the
//! converter resolves it back to the form the router understands. No alias
//! registry is part of the data model here, so the default implementation
//! is a pass-through in both directions.

use blobgate_types::PipelineErrorCode;

use crate::request::RequestContext;

/// A single bidirectional conversion operation, called once per request on
/// the appropriate side of router dispatch.
pub trait IdConverter: Send + Sync {
    fn convert(&self, request: &RequestContext, input: &str) -> Result<String, PipelineErrorCode>;
}

/// Pass-through converter: no alias registry, so the wire id is always the
/// router's own id.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityIdConverter;

impl IdConverter for IdentityIdConverter {
    fn convert(&self, _request: &RequestContext, input: &str) -> Result<String, PipelineErrorCode> {
        Ok(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobgate_types::{HeaderMap, HttpMethod};

    fn context() -> RequestContext {
        RequestContext {
            method: HttpMethod::Get,
            path: String::new(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            sub_resource: crate::request::SubResource::None,
            target: None,
        }
    }

    #[test]
    fn identity_converter_returns_input_unchanged() {
        let converter = IdentityIdConverter;
        let ctx = context();
        assert_eq!(converter.convert(&ctx, "abc123").unwrap(), "abc123");
    }
}
