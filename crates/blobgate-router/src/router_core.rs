//! `RouterCore`: owns every in-flight `ReplicaOperation`, drives
//! `ReplicaTransport` on a single poll tick, and enforces router-closure
//! semantics (§2, §4.2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::RngCore;

use blobgate_cluster::ClusterView;
use blobgate_types::{
    BlobId, BlobProperties, DatacenterId, GetOption, LogicalClock, PartitionId, RouterErrorCode,
    UserMetadata,
};

use blobgate_transport::{CorrelationId, ReplicaTransport};

use crate::config::RouterConfig;
use crate::operation::{OperationHandle, OperationKind, OperationPoll, ReplicaOperation, RouterOutcome};

/// Owns every in-flight operation and the single driver loop that advances
/// them. Not `Sync` by design — one thread (or one core, in a
/// thread-per-core deployment) owns a `RouterCore` and calls `tick()`
/// repeatedly; other threads interact with it only through the handles it
/// hands back.
pub struct RouterCore {
    cluster: Arc<dyn ClusterView>,
    clock: Arc<dyn LogicalClock>,
    config: RouterConfig,
    datacenter: DatacenterId,
    operations: HashMap<OperationHandle, ReplicaOperation>,
    correlation_owner: HashMap<CorrelationId, OperationHandle>,
    next_handle: AtomicU64,
    next_correlation: AtomicU64,
    closed: bool,
}

impl RouterCore {
    pub fn new(
        cluster: Arc<dyn ClusterView>,
        clock: Arc<dyn LogicalClock>,
        config: RouterConfig,
        datacenter: DatacenterId,
    ) -> Self {
        Self {
            cluster,
            clock,
            config,
            datacenter,
            operations: HashMap::new(),
            correlation_owner: HashMap::new(),
            next_handle: AtomicU64::new(0),
            next_correlation: AtomicU64::new(0),
            closed: false,
        }
    }

    fn allocate_handle(&self) -> OperationHandle {
        OperationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Parses a blob id string and validates its partition is known to the
    /// cluster view; returns `InvalidBlobId` on any failure (§4.2).
    fn resolve_partition(&self, blob_id: &str) -> Result<(BlobId, PartitionId), RouterErrorCode> {
        let parsed = BlobId::parse(blob_id).map_err(|_| RouterErrorCode::InvalidBlobId)?;
        if !self.cluster.contains_partition(parsed.partition()) {
            return Err(RouterErrorCode::InvalidBlobId);
        }
        Ok((parsed, parsed.partition()))
    }

    fn submit(&mut self, partition: PartitionId, kind: OperationKind, success_target: usize) -> Result<OperationHandle, RouterErrorCode> {
        if self.closed {
            return Err(RouterErrorCode::RouterClosed);
        }
        let replicas = self
            .cluster
            .replicas_for(partition)
            .map_err(|_| RouterErrorCode::InvalidBlobId)?;
        let handle = self.allocate_handle();
        let now_ms = self.clock.now_ms();
        let operation = ReplicaOperation::new(
            handle,
            partition,
            replicas,
            kind,
            self.config.parallelism,
            success_target,
            now_ms,
            self.config.operation_timeout_ms,
            self.config.per_request_timeout_ms,
        );
        self.operations.insert(handle, operation);
        Ok(handle)
    }

    /// Enqueues a new delete operation. Mirrors §4.2's public contract:
    /// `InvalidBlobId` for unparseable ids or unknown partitions,
    /// `RouterClosed` if the router has been closed.
    pub fn delete(&mut self, blob_id: &str) -> Result<OperationHandle, RouterErrorCode> {
        let (parsed, partition) = self.resolve_partition(blob_id)?;
        self.submit(
            partition,
            OperationKind::Delete {
                blob_key: blob_key_of(&parsed),
            },
            self.config.delete_success_target,
        )
    }

    /// Enqueues a new get operation.
    pub fn get(&mut self, blob_id: &str, option: GetOption) -> Result<OperationHandle, RouterErrorCode> {
        let (parsed, partition) = self.resolve_partition(blob_id)?;
        self.submit(
            partition,
            OperationKind::Get {
                blob_key: blob_key_of(&parsed),
                option,
            },
            self.config.get_success_target,
        )
    }

    /// Enqueues a new put operation. Picks a writable partition and mints
    /// the `BlobId` the operation will return on success, up front — the
    /// router, not any one replica, owns id assignment.
    pub fn put(
        &mut self,
        properties: BlobProperties,
        user_metadata: UserMetadata,
        bytes: Vec<u8>,
    ) -> Result<OperationHandle, RouterErrorCode> {
        if self.closed {
            return Err(RouterErrorCode::RouterClosed);
        }
        let partition = *self
            .cluster
            .writable_partitions()
            .first()
            .ok_or(RouterErrorCode::InsufficientCapacity)?;
        let replicas = self
            .cluster
            .replicas_for(partition)
            .map_err(|_| RouterErrorCode::InsufficientCapacity)?;
        let success_target = self.config.put_success_target(replicas.len());

        let mut key = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key);
        // §9 open question: the returned id is always v1 — no embedded
        // account/container — even though the properties carry the fully
        // resolved account/container. Retained verbatim; see DESIGN.md.
        let assigned_blob_id = BlobId::new_v1(self.datacenter, partition, key);

        self.submit(
            partition,
            OperationKind::Put {
                properties,
                user_metadata,
                bytes,
                assigned_blob_id,
            },
            success_target,
        )
    }

    /// Reads the current state of an operation without consuming it.
    pub fn poll(&self, handle: OperationHandle) -> Option<OperationPoll<'_>> {
        self.operations.get(&handle).map(ReplicaOperation::poll)
    }

    /// Removes and returns a terminal operation's result. Returns `None` if
    /// the operation is unknown or still running — callers should `poll`
    /// first. Enforces "an operation transitions to terminal state exactly
    /// once" (§3) by taking the entry out of the in-flight map the first
    /// (and only) time this is called.
    pub fn take_result(&mut self, handle: OperationHandle) -> Option<Result<RouterOutcome, RouterErrorCode>> {
        if !matches!(self.operations.get(&handle)?.poll(), OperationPoll::Terminal(_)) {
            return None;
        }
        let operation = self.operations.remove(&handle)?;
        self.correlation_owner.retain(|_, h| *h != handle);
        match operation.poll() {
            OperationPoll::Terminal(result) => Some(result.clone()),
            OperationPoll::Running => unreachable!("checked terminal above"),
        }
    }

    /// One driver tick (§4.2 "Fairness / ordering"): polls the transport
    /// once, routes each response to its owning operation, dispatches the
    /// next batch of replica requests for every non-terminal operation, and
    /// checks every operation's deadlines.
    pub fn tick(&mut self, transport: &mut dyn ReplicaTransport) {
        let now_ms = self.clock.now_ms();

        for response in transport.poll() {
            if let Some(handle) = self.correlation_owner.remove(&response.correlation_id) {
                if let Some(operation) = self.operations.get_mut(&handle) {
                    operation.handle_response(response, now_ms);
                }
            }
            // Unknown correlation id: a straggler from an aborted/completed
            // operation. Discarded per §5 "in-flight replica requests
            // continue to completion and their responses are discarded".
        }

        for (&handle, operation) in &mut self.operations {
            operation.check_deadlines(now_ms);
            if operation.is_terminal() {
                continue;
            }
            let correlation_owner = &mut self.correlation_owner;
            let mut allocate = || {
                let id = CorrelationId(self.next_correlation.fetch_add(1, Ordering::Relaxed));
                correlation_owner.insert(id, handle);
                id
            };
            // Dispatch errors (transport closed mid-tick) abort the
            // operation rather than silently dropping it.
            if let Err(_err) = operation.dispatch(transport, &mut allocate, now_ms) {
                operation.abort(RouterErrorCode::AmbryUnavailable);
            }
        }
    }

    /// Closes the router: every running operation aborts with
    /// `RouterClosed`, and subsequent submissions are rejected with the
    /// same code (§4.2 "Router closure").
    pub fn close(&mut self) {
        self.closed = true;
        for operation in self.operations.values_mut() {
            operation.abort(RouterErrorCode::RouterClosed);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn in_flight_count(&self) -> usize {
        self.operations
            .values()
            .filter(|op| !op.is_terminal())
            .count()
    }
}

fn blob_key_of(id: &BlobId) -> [u8; 16] {
    // The partition + account/container fields of a BlobId are carried
    // separately; the remaining bytes of its encoding are the per-partition
    // unique key the replicas index on. Re-deriving it here keeps the
    // router from needing a second representation of the same id.
    let mut key = [0u8; 16];
    let s = id.to_string();
    let decoded = {
        use base64::Engine as _;
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s.as_bytes())
            .expect("BlobId::to_string always produces valid base64")
    };
    let tail = &decoded[decoded.len() - 16..];
    key.copy_from_slice(tail);
    key
}
