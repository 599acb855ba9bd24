//! Deterministic, scriptable `ReplicaTransport` for tests.

use std::collections::HashMap;
use std::collections::VecDeque;

use blobgate_types::{ReplicaErrorCode, ReplicaId};

use crate::protocol::{CorrelationId, ReplicaPayload, ReplicaRequest, ReplicaResponse};
use crate::TransportError;

/// What a given replica will answer the next time it's asked, and how many
/// `poll()` calls the answer takes to arrive.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub delay_ticks: u32,
    pub outcome: Result<ReplicaPayload, ReplicaErrorCode>,
}

impl ScriptedResponse {
    pub fn immediate(outcome: Result<ReplicaPayload, ReplicaErrorCode>) -> Self {
        Self {
            delay_ticks: 0,
            outcome,
        }
    }

    pub fn error(code: ReplicaErrorCode) -> Self {
        Self::immediate(Err(code))
    }

    pub fn after(delay_ticks: u32, outcome: Result<ReplicaPayload, ReplicaErrorCode>) -> Self {
        Self {
            delay_ticks,
            outcome,
        }
    }
}

struct InFlight {
    request: ReplicaRequest,
    ticks_remaining: u32,
}

/// Scripted, in-memory transport. Each replica has a (possibly default)
/// scripted response; `send` enqueues the request, `poll` advances every
/// pending request by one tick and returns any that have now "arrived".
pub struct MockReplicaTransport {
    scripts: HashMap<ReplicaId, ScriptedResponse>,
    default_response: ScriptedResponse,
    in_flight: VecDeque<InFlight>,
    closed: bool,
    sent_count: usize,
}

impl Default for MockReplicaTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReplicaTransport {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            default_response: ScriptedResponse::error(ReplicaErrorCode::UnknownError),
            in_flight: VecDeque::new(),
            closed: false,
            sent_count: 0,
        }
    }

    /// Scripts the response a given replica will give to its next (and every
    /// subsequent, unless re-scripted) request.
    pub fn script(&mut self, replica: ReplicaId, response: ScriptedResponse) {
        self.scripts.insert(replica, response);
    }

    /// Sets the response used for replicas with no explicit script.
    pub fn set_default(&mut self, response: ScriptedResponse) {
        self.default_response = response;
    }

    /// Total number of requests ever sent through this transport — used by
    /// tests asserting "issued ≤ |replicas|" (§8 invariant 3).
    pub fn sent_count(&self) -> usize {
        self.sent_count
    }

    /// Simulates the transport being torn down; subsequent `send` fails.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl crate::ReplicaTransport for MockReplicaTransport {
    fn send(&mut self, request: ReplicaRequest) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent_count += 1;
        let ticks_remaining = self
            .scripts
            .get(&request.replica)
            .map_or(self.default_response.delay_ticks, |s| s.delay_ticks);
        self.in_flight.push_back(InFlight {
            request,
            ticks_remaining,
        });
        Ok(())
    }

    fn poll(&mut self) -> Vec<ReplicaResponse> {
        let mut ready = Vec::new();
        let mut still_pending = VecDeque::new();

        while let Some(mut item) = self.in_flight.pop_front() {
            if item.ticks_remaining == 0 {
                let script = self
                    .scripts
                    .get(&item.request.replica)
                    .cloned()
                    .unwrap_or_else(|| self.default_response.clone());
                ready.push(ReplicaResponse {
                    correlation_id: item.request.correlation_id,
                    replica: item.request.replica,
                    outcome: script.outcome,
                });
            } else {
                item.ticks_remaining -= 1;
                still_pending.push_back(item);
            }
        }

        self.in_flight = still_pending;
        ready
    }
}

impl Clone for ScriptedResponse {
    fn clone(&self) -> Self {
        Self {
            delay_ticks: self.delay_ticks,
            outcome: self.outcome.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ReplicaRequestKind};
    use crate::ReplicaTransport;
    use blobgate_types::{DatanodeId, PartitionId};

    fn replica(n: u64) -> ReplicaId {
        ReplicaId {
            partition: PartitionId(0),
            datanode: DatanodeId {
                host: format!("dn-{n}"),
                port: 6000,
            },
        }
    }

    fn delete_request(id: u64, r: ReplicaId) -> ReplicaRequest {
        ReplicaRequest {
            correlation_id: CorrelationId(id),
            replica: r,
            kind: ReplicaRequestKind::Delete { blob_key: [0u8; 16] },
        }
    }

    #[test]
    fn immediate_script_answers_next_poll() {
        let mut t = MockReplicaTransport::new();
        let r = replica(1);
        t.script(r, ScriptedResponse::immediate(Ok(ReplicaPayload::Deleted)));
        t.send(delete_request(1, r)).unwrap();
        let responses = t.poll();
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0].outcome, Ok(ReplicaPayload::Deleted)));
    }

    #[test]
    fn delayed_script_waits_ticks() {
        let mut t = MockReplicaTransport::new();
        let r = replica(2);
        t.script(r, ScriptedResponse::after(2, Ok(ReplicaPayload::Deleted)));
        t.send(delete_request(1, r)).unwrap();
        assert!(t.poll().is_empty());
        assert!(t.poll().is_empty());
        assert_eq!(t.poll().len(), 1);
    }

    #[test]
    fn closed_transport_rejects_send() {
        let mut t = MockReplicaTransport::new();
        t.close();
        assert!(t.send(delete_request(1, replica(3))).is_err());
    }
}
