//! `ReplicaOperation`: drives one logical router operation (delete, get, or
//! put) against the replicas of one partition (§4.2).
//!
//! One struct covers all three kinds, mirroring how the spec's component
//! table lists `ReplicaOperation (Put/Get/Delete)` as a single component
//! that differs only in per-kind request payload and success criteria —
//! the fan-out, quorum, precedence, and timeout machinery is identical.

use std::collections::HashMap;

use blobgate_types::{BlobId, BlobProperties, GetOption, PartitionId, ReplicaErrorCode, ReplicaId, RouterErrorCode, UserMetadata};

use blobgate_transport::{CorrelationId, ReplicaPayload, ReplicaRequest, ReplicaRequestKind, ReplicaResponse, ReplicaTransport, TransportError};

use crate::precedence::resolve_failure;
use crate::tracker::OperationTracker;

/// Opaque handle identifying one in-flight (or completed) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationHandle(pub u64);

/// The blob-fetch result of a successful get operation.
#[derive(Debug, Clone)]
pub struct GetResult {
    pub properties: BlobProperties,
    pub user_metadata: UserMetadata,
    pub bytes: Vec<u8>,
}

/// What a terminally-successful operation produced.
#[derive(Debug, Clone)]
pub enum RouterOutcome {
    Delete,
    Get(GetResult),
    Put(BlobId),
}

/// Per-kind request payload and (for put) the blob id already assigned by
/// the router before dispatch (§9 open question: the returned id is always
/// v1, carrying no account/container — see `blobgate-router::router_core`).
pub enum OperationKind {
    Delete {
        blob_key: [u8; 16],
    },
    Get {
        blob_key: [u8; 16],
        option: GetOption,
    },
    Put {
        properties: BlobProperties,
        user_metadata: UserMetadata,
        bytes: Vec<u8>,
        assigned_blob_id: BlobId,
    },
}

impl OperationKind {
    fn request_kind(&self) -> ReplicaRequestKind {
        match self {
            OperationKind::Delete { blob_key } => ReplicaRequestKind::Delete { blob_key: *blob_key },
            OperationKind::Get { blob_key, option } => ReplicaRequestKind::Get {
                blob_key: *blob_key,
                option: *option,
            },
            OperationKind::Put {
                properties,
                user_metadata,
                bytes,
                ..
            } => ReplicaRequestKind::Put {
                properties: properties.clone(),
                user_metadata: user_metadata.clone(),
                bytes: bytes.clone(),
            },
        }
    }

    /// `true` for kinds where a `Blob_Deleted` per-replica reply
    /// short-circuits the whole operation (§4.2 "Early termination").
    fn short_circuits_on_deleted(&self) -> bool {
        matches!(self, OperationKind::Delete { .. } | OperationKind::Get { .. })
    }
}

/// Poll result of one operation: either still running, or terminally
/// decided (success or a `RouterErrorCode`).
pub enum OperationPoll<'a> {
    Running,
    Terminal(&'a Result<RouterOutcome, RouterErrorCode>),
}

/// Drives one logical router operation end to end.
pub struct ReplicaOperation {
    pub handle: OperationHandle,
    pub partition: PartitionId,
    kind: OperationKind,
    tracker: OperationTracker,
    deadline_ms: i64,
    per_request_timeout_ms: i64,
    inflight_deadlines: HashMap<CorrelationId, i64>,
    terminal: Option<Result<RouterOutcome, RouterErrorCode>>,
}

impl ReplicaOperation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        handle: OperationHandle,
        partition: PartitionId,
        replicas: &[ReplicaId],
        kind: OperationKind,
        parallelism: usize,
        success_target: usize,
        now_ms: i64,
        operation_timeout_ms: i64,
        per_request_timeout_ms: i64,
    ) -> Self {
        Self {
            handle,
            partition,
            kind,
            tracker: OperationTracker::new(replicas, parallelism, success_target),
            deadline_ms: now_ms + operation_timeout_ms,
            per_request_timeout_ms,
            inflight_deadlines: HashMap::new(),
            terminal: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn poll(&self) -> OperationPoll<'_> {
        match &self.terminal {
            Some(result) => OperationPoll::Terminal(result),
            None => OperationPoll::Running,
        }
    }

    /// Dispatches as many pending replica requests as `parallelism` allows,
    /// via the given transport, allocating a fresh correlation id per
    /// request from `allocate`.
    pub fn dispatch(
        &mut self,
        transport: &mut dyn ReplicaTransport,
        allocate: &mut dyn FnMut() -> CorrelationId,
        now_ms: i64,
    ) -> Result<(), TransportError> {
        if self.terminal.is_some() {
            return Ok(());
        }
        for replica in self.tracker.next_to_dispatch() {
            let correlation_id = allocate();
            let request = ReplicaRequest {
                correlation_id,
                replica,
                kind: self.kind.request_kind(),
            };
            transport.send(request)?;
            self.tracker.mark_inflight(replica, correlation_id);
            self.inflight_deadlines
                .insert(correlation_id, now_ms + self.per_request_timeout_ms);
        }
        Ok(())
    }

    /// Routes one response that was addressed to this operation.
    pub fn handle_response(&mut self, response: ReplicaResponse, now_ms: i64) {
        if self.terminal.is_some() {
            return;
        }
        self.inflight_deadlines.remove(&response.correlation_id);

        match response.outcome {
            Ok(payload) => {
                if self
                    .tracker
                    .record_success(response.correlation_id, payload)
                    .is_some()
                {
                    self.check_transition(now_ms);
                }
            }
            Err(code) => {
                let short_circuit = code == ReplicaErrorCode::BlobDeleted && self.kind.short_circuits_on_deleted();
                if self
                    .tracker
                    .record_failure(response.correlation_id, code)
                    .is_some()
                {
                    if short_circuit {
                        self.terminal = Some(Err(RouterErrorCode::BlobDeleted));
                    } else {
                        self.check_transition(now_ms);
                    }
                }
            }
        }
    }

    fn check_transition(&mut self, now_ms: i64) {
        if self.terminal.is_some() {
            return;
        }
        if self.tracker.has_succeeded() {
            self.terminal = Some(Ok(self.build_success_outcome()));
        } else if self.tracker.cannot_reach_target() {
            self.terminal = Some(Err(resolve_failure(&self.tracker)));
        }
        let _ = now_ms;
    }

    fn build_success_outcome(&self) -> RouterOutcome {
        match &self.kind {
            OperationKind::Delete { .. } => RouterOutcome::Delete,
            OperationKind::Get { .. } => {
                let (_, payload) = self
                    .tracker
                    .successes()
                    .first()
                    .expect("has_succeeded implies at least one success recorded");
                match payload {
                    ReplicaPayload::GetBody {
                        properties,
                        user_metadata,
                        bytes,
                    } => RouterOutcome::Get(GetResult {
                        properties: properties.clone(),
                        user_metadata: user_metadata.clone(),
                        bytes: bytes.clone(),
                    }),
                    other => unreachable!("get operation succeeded with non-body payload: {other:?}"),
                }
            }
            OperationKind::Put { assigned_blob_id, .. } => RouterOutcome::Put(*assigned_blob_id),
        }
    }

    /// Checks the operation deadline and any expired per-request deadlines,
    /// converting timed-out in-flight requests to `ReplicaUnavailable`
    /// failures rather than failing the whole operation outright (§4.2:
    /// "expiry of a per-request deadline does not fail the operation if
    /// other replicas can still satisfy the success target").
    pub fn check_deadlines(&mut self, now_ms: i64) {
        if self.terminal.is_some() {
            return;
        }
        if now_ms >= self.deadline_ms {
            self.terminal = Some(Err(RouterErrorCode::OperationTimedOut));
            return;
        }

        let expired: Vec<CorrelationId> = self
            .inflight_deadlines
            .iter()
            .filter(|(_, &deadline)| now_ms >= deadline)
            .map(|(id, _)| *id)
            .collect();

        for correlation_id in expired {
            self.inflight_deadlines.remove(&correlation_id);
            if self
                .tracker
                .record_failure(correlation_id, ReplicaErrorCode::ReplicaUnavailable)
                .is_some()
            {
                self.check_transition(now_ms);
            }
        }
    }

    /// Aborts the operation immediately with the given code, used by
    /// router closure (§4.2 "Router closure").
    pub fn abort(&mut self, code: RouterErrorCode) {
        if self.terminal.is_none() {
            self.terminal = Some(Err(code));
        }
    }

    #[cfg(test)]
    pub(crate) fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }
}
