//! `SecurityGate`: the three request hooks the pipeline calls into (§4.4).

use blobgate_types::{Account, BlobProperties, Container, HeaderMap, HttpMethod, PipelineErrorCode};
use tracing::{info, warn};

use crate::policy::{bearer_token, ApiKeyPolicy};

/// Per-request state visible to the gate. `account`/`container` are `None`
/// until the pipeline has resolved them (§4.1) — always `None` at
/// `pre_process`, always `Some` by `post_process` and `process_response`.
pub struct SecurityRequest<'a> {
    pub method: HttpMethod,
    pub headers: &'a HeaderMap,
    pub account: Option<&'a Account>,
    pub container: Option<&'a Container>,
}

/// Three asynchronous-in-spirit hooks a pipeline stage calls synchronously
/// against (the crate has no async runtime; the pipeline's own scheduler
/// supplies the suspension point). Any `Err` terminates the request with
/// that pipeline error code.
pub trait SecurityGate: Send + Sync {
    /// Runs before id conversion / account-container injection. May inspect
    /// headers and reject with `Unauthorized`.
    fn pre_process(&self, request: &SecurityRequest<'_>) -> Result<(), PipelineErrorCode>;

    /// Runs once the target account and container are resolved. May enforce
    /// per-container policy (e.g. private containers require a caller).
    fn post_process(&self, request: &SecurityRequest<'_>) -> Result<(), PipelineErrorCode>;

    /// Runs just before the response is submitted. May mutate
    /// `response_headers` (cache-control, content-disposition) but does not
    /// fail the request in the default implementation; a custom gate may
    /// still return `Err` to do so.
    fn process_response(
        &self,
        request: &SecurityRequest<'_>,
        blob_properties: Option<&BlobProperties>,
        response_headers: &mut HeaderMap,
    ) -> Result<(), PipelineErrorCode>;
}

/// Bearer-token gate: `pre_process` enforces auth on configured methods,
/// `post_process` additionally requires auth for any private container
/// regardless of method, `process_response` shapes cache-control and
/// content-disposition from container privacy and blob content type.
pub struct DefaultSecurityGate {
    policy: ApiKeyPolicy,
    audit_enabled: bool,
}

impl DefaultSecurityGate {
    pub fn new(policy: ApiKeyPolicy) -> Self {
        Self {
            policy,
            audit_enabled: true,
        }
    }

    #[must_use]
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    fn authenticate(&self, headers: &HeaderMap) -> Option<&crate::identity::CallerIdentity> {
        let token = bearer_token(headers.get("authorization"))?;
        self.policy.resolve(token)
    }
}

impl SecurityGate for DefaultSecurityGate {
    fn pre_process(&self, request: &SecurityRequest<'_>) -> Result<(), PipelineErrorCode> {
        if !self.policy.requires_auth(request.method) {
            return Ok(());
        }
        match self.authenticate(request.headers) {
            Some(identity) => {
                if self.audit_enabled {
                    info!(method = %request.method, caller = %identity.caller_id, "preProcess authenticated");
                }
                Ok(())
            }
            None => {
                if self.audit_enabled {
                    warn!(method = %request.method, "preProcess rejected: missing or unknown bearer token");
                }
                Err(PipelineErrorCode::Unauthorized)
            }
        }
    }

    fn post_process(&self, request: &SecurityRequest<'_>) -> Result<(), PipelineErrorCode> {
        let Some(container) = request.container else {
            return Ok(());
        };
        if !container.private {
            return Ok(());
        }
        match self.authenticate(request.headers) {
            Some(identity) => {
                if self.audit_enabled {
                    info!(
                        container = %container.name,
                        caller = %identity.caller_id,
                        "postProcess granted access to private container"
                    );
                }
                Ok(())
            }
            None => {
                if self.audit_enabled {
                    warn!(container = %container.name, "postProcess rejected: private container without caller identity");
                }
                Err(PipelineErrorCode::Unauthorized)
            }
        }
    }

    fn process_response(
        &self,
        request: &SecurityRequest<'_>,
        blob_properties: Option<&BlobProperties>,
        response_headers: &mut HeaderMap,
    ) -> Result<(), PipelineErrorCode> {
        let private = request.container.map(|c| c.private).unwrap_or(false);
        response_headers.insert(
            "cache-control",
            if private {
                "private, no-cache"
            } else {
                "public, max-age=31536000"
            },
        );

        if let Some(properties) = blob_properties {
            if !properties.content_type.starts_with("text/") && !properties.content_type.starts_with("image/") {
                response_headers.insert("content-disposition", "attachment");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobgate_types::{Account, Container, Status};

    fn policy() -> ApiKeyPolicy {
        ApiKeyPolicy::new()
            .with_key("good-token", crate::identity::CallerIdentity::new("svc-a"))
            .require_auth_for(HttpMethod::Post)
    }

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", format!("Bearer {token}"));
        h
    }

    #[test]
    fn pre_process_allows_unauthenticated_get() {
        let gate = DefaultSecurityGate::new(policy()).without_audit();
        let headers = HeaderMap::new();
        let req = SecurityRequest {
            method: HttpMethod::Get,
            headers: &headers,
            account: None,
            container: None,
        };
        assert!(gate.pre_process(&req).is_ok());
    }

    #[test]
    fn pre_process_rejects_unauthenticated_post() {
        let gate = DefaultSecurityGate::new(policy()).without_audit();
        let headers = HeaderMap::new();
        let req = SecurityRequest {
            method: HttpMethod::Post,
            headers: &headers,
            account: None,
            container: None,
        };
        assert_eq!(gate.pre_process(&req), Err(PipelineErrorCode::Unauthorized));
    }

    #[test]
    fn post_process_gates_private_container() {
        let gate = DefaultSecurityGate::new(policy()).without_audit();
        let account = Account {
            id: 5,
            name: "acme".to_string(),
            status: Status::Active,
            default_public_container_id: None,
            default_private_container_id: None,
        };
        let container = Container {
            id: 1,
            name: "secrets".to_string(),
            status: Status::Active,
            private: true,
            parent_account_id: 5,
        };
        let headers = HeaderMap::new();
        let req = SecurityRequest {
            method: HttpMethod::Get,
            headers: &headers,
            account: Some(&account),
            container: Some(&container),
        };
        assert_eq!(gate.post_process(&req), Err(PipelineErrorCode::Unauthorized));

        let authed_headers = headers_with_token("good-token");
        let authed_req = SecurityRequest {
            method: HttpMethod::Get,
            headers: &authed_headers,
            account: Some(&account),
            container: Some(&container),
        };
        assert!(gate.post_process(&authed_req).is_ok());
    }

    #[test]
    fn process_response_sets_cache_control_by_privacy() {
        let gate = DefaultSecurityGate::new(policy()).without_audit();
        let container = Container {
            id: 1,
            name: "public-stuff".to_string(),
            status: Status::Active,
            private: false,
            parent_account_id: 5,
        };
        let headers = HeaderMap::new();
        let req = SecurityRequest {
            method: HttpMethod::Get,
            headers: &headers,
            account: None,
            container: Some(&container),
        };
        let mut response_headers = HeaderMap::new();
        gate.process_response(&req, None, &mut response_headers).unwrap();
        assert_eq!(response_headers.get("cache-control"), Some("public, max-age=31536000"));
    }
}
