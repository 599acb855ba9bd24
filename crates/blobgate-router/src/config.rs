//! Router tuning knobs, loaded from the server's TOML configuration.

use serde::{Deserialize, Serialize};

/// Tuning for replica fan-out, quorum, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Max replicas contacted concurrently per operation.
    pub parallelism: usize,
    /// Successful replies required before a delete is declared successful.
    pub delete_success_target: usize,
    /// Successful replies required before a get is declared successful.
    pub get_success_target: usize,
    /// Whole-operation deadline, in milliseconds.
    pub operation_timeout_ms: i64,
    /// Per-replica-request deadline, in milliseconds.
    pub per_request_timeout_ms: i64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            parallelism: 3,
            delete_success_target: 2,
            get_success_target: 1,
            operation_timeout_ms: 10_000,
            per_request_timeout_ms: 2_000,
        }
    }
}

impl RouterConfig {
    /// A quorum of `replica_count` replicas: `n / 2 + 1`.
    pub fn put_success_target(&self, replica_count: usize) -> usize {
        replica_count / 2 + 1
    }
}
