//! `OperationTracker`: per-operation replica bookkeeping (§3, §4.2).
//!
//! Tracks which replicas of one partition still need to be asked, which are
//! in flight, and which have answered (split into successes and failures).
//! The invariant `successes + failures + inflight + pending = |replicas|`
//! holds after every mutation — each replica lives in exactly one bucket.

use std::collections::{HashMap, VecDeque};

use blobgate_types::{ReplicaErrorCode, ReplicaId};

use blobgate_transport::{CorrelationId, ReplicaPayload};

/// Per-operation replica bookkeeping.
pub struct OperationTracker {
    pending: VecDeque<ReplicaId>,
    inflight: HashMap<CorrelationId, ReplicaId>,
    successes: Vec<(ReplicaId, ReplicaPayload)>,
    failures: Vec<(ReplicaId, ReplicaErrorCode)>,
    parallelism: usize,
    success_target: usize,
    total_replicas: usize,
}

impl OperationTracker {
    /// `replicas` must be the full, cluster-map-ordered replica set for the
    /// operation's partition; `parallelism` bounds how many are contacted
    /// concurrently; `success_target` is the quorum needed to declare the
    /// operation successful.
    pub fn new(replicas: &[ReplicaId], parallelism: usize, success_target: usize) -> Self {
        Self {
            pending: replicas.iter().copied().collect(),
            inflight: HashMap::new(),
            successes: Vec::new(),
            failures: Vec::new(),
            parallelism: parallelism.max(1),
            success_target,
            total_replicas: replicas.len(),
        }
    }

    /// Replicas to dispatch now, in cluster-map order, without exceeding
    /// `parallelism` concurrently in flight. The caller is responsible for
    /// actually sending the request and then calling [`Self::mark_inflight`]
    /// with the correlation id it chose.
    pub fn next_to_dispatch(&self) -> Vec<ReplicaId> {
        let slots = self.parallelism.saturating_sub(self.inflight.len());
        self.pending.iter().take(slots).copied().collect()
    }

    /// Moves a replica from pending to inflight under the given correlation
    /// id. Panics if the replica isn't pending — a caller bug, not a runtime
    /// condition (§3 invariant: "Issue up to `parallelism` requests... in
    /// cluster-map order").
    pub fn mark_inflight(&mut self, replica: ReplicaId, correlation_id: CorrelationId) {
        let pos = self
            .pending
            .iter()
            .position(|r| *r == replica)
            .expect("replica must be pending to mark inflight");
        self.pending.remove(pos);
        self.inflight.insert(correlation_id, replica);
    }

    /// Records a successful reply. Returns the replica it was for, or `None`
    /// if the correlation id is unknown (a straggler from an aborted or
    /// already-terminal operation — the caller should just discard it).
    pub fn record_success(
        &mut self,
        correlation_id: CorrelationId,
        payload: ReplicaPayload,
    ) -> Option<ReplicaId> {
        let replica = self.inflight.remove(&correlation_id)?;
        self.successes.push((replica, payload));
        Some(replica)
    }

    /// Records a failed reply with its per-replica error code.
    pub fn record_failure(
        &mut self,
        correlation_id: CorrelationId,
        code: ReplicaErrorCode,
    ) -> Option<ReplicaId> {
        let replica = self.inflight.remove(&correlation_id)?;
        self.failures.push((replica, code));
        Some(replica)
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn successes(&self) -> &[(ReplicaId, ReplicaPayload)] {
        &self.successes
    }

    pub fn failures(&self) -> &[(ReplicaId, ReplicaErrorCode)] {
        &self.failures
    }

    pub fn success_target(&self) -> usize {
        self.success_target
    }

    pub fn total_replicas(&self) -> usize {
        self.total_replicas
    }

    /// `true` once the success target has been met.
    pub fn has_succeeded(&self) -> bool {
        self.successes.len() >= self.success_target
    }

    /// `true` once the remaining (not-yet-failed) replicas can no longer
    /// reach the success target, i.e. `remaining + successCount < successTarget`.
    pub fn cannot_reach_target(&self) -> bool {
        let remaining = self.pending.len() + self.inflight.len();
        remaining + self.successes.len() < self.success_target
    }

    /// `true` once every replica has answered (no pending, no inflight).
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.inflight.is_empty()
    }

    /// `true` if the invariant `successes + failures + inflight + pending =
    /// |replicas|` holds; exposed for property tests (§8 invariant set).
    pub fn invariant_holds(&self) -> bool {
        self.successes.len() + self.failures.len() + self.inflight.len() + self.pending.len()
            == self.total_replicas
    }
}
