//! Cluster topology view.
//!
//! `ClusterView` is the narrow interface the core consumes instead of
//! talking to the real cluster map directly (§1, §6: "out of scope,
//! external collaborator"). `StaticClusterView` is a simple, fully-specified
//! implementation suitable for a single-process deployment and for tests;
//! a production deployment would instead implement `ClusterView` against a
//! gossip-based membership service and swap it in without touching the
//! router or pipeline.

use std::collections::HashMap;

use blobgate_types::{DatacenterId, DatanodeId, PartitionId, ReplicaId};
use serde::{Deserialize, Serialize};

/// A replication group: an ordered, non-empty set of replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    /// Stable cluster-map order; replica requests are issued in this order.
    pub replicas: Vec<ReplicaId>,
    /// Whether new blobs may be placed on this partition.
    pub writable: bool,
}

/// Errors surfaced by `ClusterView` lookups.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    #[error("unknown partition {0}")]
    UnknownPartition(PartitionId),
    #[error("no writable partitions available")]
    NoWritablePartitions,
}

/// Read-mostly view over cluster topology. Implementations must be safe for
/// concurrent reads (§5): `StaticClusterView` is immutable after
/// construction, so any `&self` method is trivially thread-safe.
pub trait ClusterView: Send + Sync {
    /// Replicas for a partition, in stable cluster-map order. Per the
    /// invariant in §3, this is never empty for a partition the view knows
    /// about.
    fn replicas_for(&self, partition: PartitionId) -> Result<&[ReplicaId], ClusterError>;

    /// Partitions currently accepting new blob placements.
    fn writable_partitions(&self) -> &[PartitionId];

    /// All known datacenter ids.
    fn datacenters(&self) -> &[DatacenterId];

    /// Whether a partition id is known to this view (used to validate
    /// decoded `BlobId`s per §4.2's `InvalidBlobId` rule).
    fn contains_partition(&self, partition: PartitionId) -> bool;

    /// Every other datanode that co-hosts a partition with `(host, port)`,
    /// deduplicated, answering `GET /peers` (§6).
    fn peers_of(&self, host: &str, port: u16) -> Vec<DatanodeId>;
}

/// A fixed-topology implementation, configured once at startup.
#[derive(Debug, Clone)]
pub struct StaticClusterView {
    partitions: HashMap<PartitionId, Partition>,
    writable: Vec<PartitionId>,
    datacenters: Vec<DatacenterId>,
}

impl StaticClusterView {
    /// Builds a view from an explicit partition list.
    ///
    /// # Panics
    ///
    /// Panics if any partition has an empty replica list — the invariant in
    /// §3 requires `replicaIds()` to be non-empty, and a topology violating
    /// that is a configuration bug, not a runtime condition to recover from.
    pub fn new(partitions: Vec<Partition>, datacenters: Vec<DatacenterId>) -> Self {
        for p in &partitions {
            assert!(
                !p.replicas.is_empty(),
                "partition {:?} has no replicas",
                p.id
            );
        }
        let writable = partitions
            .iter()
            .filter(|p| p.writable)
            .map(|p| p.id)
            .collect();
        let partitions = partitions.into_iter().map(|p| (p.id, p)).collect();
        Self {
            partitions,
            writable,
            datacenters,
        }
    }

    /// Convenience builder for tests: `n` partitions, each replicated across
    /// `replicas_per_partition` datanodes on one datacenter, all writable.
    pub fn uniform(num_partitions: u64, replicas_per_partition: u16, datacenter: DatacenterId) -> Self {
        let partitions = (0..num_partitions)
            .map(|i| {
                let id = PartitionId(i);
                let replicas = (0..replicas_per_partition)
                    .map(|r| ReplicaId {
                        partition: id,
                        datanode: DatanodeId {
                            host: format!("dn-{i}-{r}"),
                            port: 6000 + r,
                        },
                    })
                    .collect();
                Partition {
                    id,
                    replicas,
                    writable: true,
                }
            })
            .collect();
        Self::new(partitions, vec![datacenter])
    }
}

impl ClusterView for StaticClusterView {
    fn replicas_for(&self, partition: PartitionId) -> Result<&[ReplicaId], ClusterError> {
        self.partitions
            .get(&partition)
            .map(|p| p.replicas.as_slice())
            .ok_or(ClusterError::UnknownPartition(partition))
    }

    fn writable_partitions(&self) -> &[PartitionId] {
        &self.writable
    }

    fn datacenters(&self) -> &[DatacenterId] {
        &self.datacenters
    }

    fn contains_partition(&self, partition: PartitionId) -> bool {
        self.partitions.contains_key(&partition)
    }

    fn peers_of(&self, host: &str, port: u16) -> Vec<DatanodeId> {
        let mut seen = std::collections::HashSet::new();
        let mut peers = Vec::new();
        for partition in self.partitions.values() {
            let hosts_target = partition
                .replicas
                .iter()
                .any(|r| r.datanode.host == host && r.datanode.port == port);
            if !hosts_target {
                continue;
            }
            for replica in &partition.replicas {
                if replica.datanode.host == host && replica.datanode.port == port {
                    continue;
                }
                if seen.insert(replica.datanode.clone()) {
                    peers.push(replica.datanode.clone());
                }
            }
        }
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_view_has_stable_nonempty_replica_lists() {
        let view = StaticClusterView::uniform(3, 9, DatacenterId(0));
        for i in 0..3 {
            let replicas = view.replicas_for(PartitionId(i)).unwrap();
            assert_eq!(replicas.len(), 9);
            // Stable order across repeated calls.
            assert_eq!(replicas, view.replicas_for(PartitionId(i)).unwrap());
        }
    }

    #[test]
    fn unknown_partition_errors() {
        let view = StaticClusterView::uniform(1, 3, DatacenterId(0));
        assert!(matches!(
            view.replicas_for(PartitionId(999)),
            Err(ClusterError::UnknownPartition(_))
        ));
        assert!(!view.contains_partition(PartitionId(999)));
    }

    #[test]
    fn writable_partitions_reported() {
        let view = StaticClusterView::uniform(5, 3, DatacenterId(0));
        assert_eq!(view.writable_partitions().len(), 5);
    }

    #[test]
    fn peers_of_excludes_the_queried_datanode() {
        let view = StaticClusterView::uniform(1, 3, DatacenterId(0));
        let peers = view.peers_of("dn-0-0", 6000);
        assert_eq!(peers.len(), 2);
        assert!(!peers.iter().any(|d| d.host == "dn-0-0" && d.port == 6000));
    }

    #[test]
    fn peers_of_unknown_datanode_is_empty() {
        let view = StaticClusterView::uniform(1, 3, DatacenterId(0));
        assert!(view.peers_of("nowhere", 1).is_empty());
    }
}
