//! Non-blocking transport to storage replicas (§2, §6).
//!
//! `ReplicaTransport` is polled once per driver tick; it never blocks the
//! calling thread. `MockReplicaTransport` is a deterministic, scriptable
//! implementation used throughout the router's test suite — it lets a test
//! specify exactly which replica returns which [`ReplicaErrorCode`] and in
//! which tick, which is what makes the permutation and short-circuit
//! properties in §8 checkable without a real network.

mod mock;
mod protocol;
mod tcp;
mod wire;

pub use mock::{MockReplicaTransport, ScriptedResponse};
pub use protocol::{
    CorrelationId, ReplicaPayload, ReplicaRequest, ReplicaRequestKind, ReplicaResponse,
};
pub use tcp::TcpReplicaTransport;

use thiserror::Error;

/// Failure submitting a request to the transport layer itself (as opposed to
/// a per-replica error code, which travels back as part of a successful
/// `poll()` batch).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("replica transport is closed")]
    Closed,
    #[error("no route to datanode")]
    NoRoute,
}

/// Sends framed requests to specific datanodes and delivers their framed
/// responses; non-blocking poll-based API (§2).
pub trait ReplicaTransport: Send + Sync {
    /// Enqueues a request for sending. Returns immediately; the response (or
    /// transport-level failure surfaced as a `ReplicaErrorCode`) arrives via
    /// a later `poll()`.
    fn send(&mut self, request: ReplicaRequest) -> Result<(), TransportError>;

    /// Drains whatever responses have arrived since the last call. Never
    /// blocks. Called once per driver tick (§4.2 "Fairness / ordering").
    fn poll(&mut self) -> Vec<ReplicaResponse>;
}
