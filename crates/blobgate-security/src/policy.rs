//! Token-to-identity mapping and which methods require authentication.

use std::collections::{HashMap, HashSet};

use blobgate_types::HttpMethod;

use crate::identity::CallerIdentity;

/// Bearer-token authentication policy: which tokens map to which callers,
/// and which methods refuse to proceed without one (§4.4 `preProcess`).
///
/// Private containers are always gated at `postProcess` regardless of this
/// set — `require_auth_for` only controls the earlier, method-level check.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyPolicy {
    tokens: HashMap<String, CallerIdentity>,
    require_auth_for: HashSet<HttpMethod>,
}

impl ApiKeyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, token: impl Into<String>, identity: CallerIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    #[must_use]
    pub fn require_auth_for(mut self, method: HttpMethod) -> Self {
        self.require_auth_for.insert(method);
        self
    }

    pub fn requires_auth(&self, method: HttpMethod) -> bool {
        self.require_auth_for.contains(&method)
    }

    pub fn resolve(&self, token: &str) -> Option<&CallerIdentity> {
        self.tokens.get(token)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Extracts the bearer token from an `Authorization: Bearer <token>` header
/// value, or `None` if the header is absent or malformed.
pub fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    header_value?.strip_prefix("Bearer ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parses_well_formed_header() {
        assert_eq!(bearer_token(Some("Bearer abc123")), Some("abc123"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        assert_eq!(bearer_token(Some("Basic abc123")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn policy_resolves_registered_tokens() {
        let policy = ApiKeyPolicy::new()
            .with_key("tok-1", CallerIdentity::new("svc-a"))
            .require_auth_for(HttpMethod::Post);

        assert!(policy.requires_auth(HttpMethod::Post));
        assert!(!policy.requires_auth(HttpMethod::Get));
        assert_eq!(policy.resolve("tok-1").unwrap().caller_id, "svc-a");
        assert!(policy.resolve("unknown").is_none());
    }
}
