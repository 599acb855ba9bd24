//! Caller identity extracted from request headers.

use serde::{Deserialize, Serialize};

/// A caller recognized by the configured [`crate::policy::ApiKeyPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub caller_id: String,
    /// Privileged callers may read private containers regardless of owner.
    pub privileged: bool,
}

impl CallerIdentity {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            privileged: false,
        }
    }

    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}
