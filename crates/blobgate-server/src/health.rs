//! Liveness/readiness reporting for the HTTP sidecar (§6 ambient ops
//! surface): `/health` always reports the process is alive, `/ready`
//! reflects whether the pipeline has been started and the router has not
//! been closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(self) -> bool {
        self == Self::Healthy
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

impl HealthResponse {
    pub fn to_json(self) -> String {
        format!(r#"{{"status":"{}"}}"#, self.status.as_str())
    }
}

/// Shared between the event loop (which flips `ready` once the pipeline is
/// started) and the metrics sidecar (which only ever reads it).
#[derive(Clone)]
pub struct HealthChecker {
    ready: Arc<AtomicBool>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { ready: Arc::new(AtomicBool::new(false)) }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn mark_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// The process is up and able to answer at all; this never reports
    /// unhealthy short of the process being gone.
    pub fn liveness_check(&self) -> HealthResponse {
        HealthResponse { status: HealthStatus::Healthy }
    }

    /// The pipeline has been started and is taking traffic.
    pub fn readiness_check(&self) -> HealthResponse {
        let status = if self.ready.load(Ordering::SeqCst) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        HealthResponse { status }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_is_always_healthy() {
        let checker = HealthChecker::new();
        assert!(checker.liveness_check().status.is_healthy());
    }

    #[test]
    fn readiness_follows_mark_ready() {
        let checker = HealthChecker::new();
        assert!(!checker.readiness_check().status.is_healthy());
        checker.mark_ready();
        assert!(checker.readiness_check().status.is_healthy());
        checker.mark_not_ready();
        assert!(!checker.readiness_check().status.is_healthy());
    }

    #[test]
    fn response_serializes_to_json() {
        let response = HealthResponse { status: HealthStatus::Healthy };
        assert_eq!(response.to_json(), r#"{"status":"healthy"}"#);
    }
}
