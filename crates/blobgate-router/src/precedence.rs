//! Per-replica error → router error resolution (§4.2).
//!
//! The same precedence rule is reused by delete and get: it is not a literal
//! max-by-`Ord` over every observed code, because `BlobDoesNotExist` is
//! special-cased to only win when *every* replica agrees and the operation
//! has no outstanding requests. Everything else follows the fixed
//! precedence order from the spec.

use blobgate_types::{ReplicaErrorCode, RouterErrorCode};

use crate::tracker::OperationTracker;

/// Resolves a terminally-failed operation's observed per-replica codes into
/// one router-level code, per the precedence table in §4.2.
pub fn resolve_failure(tracker: &OperationTracker) -> RouterErrorCode {
    let failures = tracker.failures();

    if failures
        .iter()
        .any(|(_, c)| *c == ReplicaErrorCode::BlobAuthorizationFailure)
    {
        return RouterErrorCode::BlobAuthorizationFailure;
    }
    if failures.iter().any(|(_, c)| *c == ReplicaErrorCode::BlobExpired) {
        return RouterErrorCode::BlobExpired;
    }
    if failures.iter().any(|(_, c)| *c == ReplicaErrorCode::BlobDeleted) {
        return RouterErrorCode::BlobDeleted;
    }

    let unanimous_not_found = tracker.is_complete()
        && tracker.success_count() == 0
        && !failures.is_empty()
        && failures
            .iter()
            .all(|(_, c)| *c == ReplicaErrorCode::BlobDoesNotExist);
    if unanimous_not_found {
        return RouterErrorCode::BlobDoesNotExist;
    }

    // Either a mix of health codes, or a non-unanimous BlobDoesNotExist that
    // falls through because positive proof requires agreement (§4.2
    // "BlobDoesNotExist is special").
    RouterErrorCode::AmbryUnavailable
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobgate_transport::CorrelationId;
    use blobgate_types::{DatanodeId, PartitionId, ReplicaId};

    fn replicas(n: u64) -> Vec<ReplicaId> {
        (0..n)
            .map(|i| ReplicaId {
                partition: PartitionId(0),
                datanode: DatanodeId {
                    host: format!("dn-{i}"),
                    port: 6000,
                },
            })
            .collect()
    }

    fn fail_all(tracker: &mut OperationTracker, replicas: &[ReplicaId], codes: &[ReplicaErrorCode]) {
        for (i, (r, c)) in replicas.iter().zip(codes.iter()).enumerate() {
            tracker.mark_inflight(*r, CorrelationId(i as u64));
            tracker.record_failure(CorrelationId(i as u64), *c);
        }
    }

    #[test]
    fn scenario_unanimous_not_found() {
        let rs = replicas(9);
        let mut tracker = OperationTracker::new(&rs, 9, 2);
        let codes = vec![ReplicaErrorCode::BlobDoesNotExist; 9];
        fail_all(&mut tracker, &rs, &codes);
        assert_eq!(resolve_failure(&tracker), RouterErrorCode::BlobDoesNotExist);
    }

    #[test]
    fn scenario_mixed_health_codes_with_single_not_found() {
        let rs = replicas(9);
        let mut tracker = OperationTracker::new(&rs, 9, 2);
        let codes = [
            ReplicaErrorCode::BlobDoesNotExist,
            ReplicaErrorCode::DataCorrupt,
            ReplicaErrorCode::IOError,
            ReplicaErrorCode::PartitionUnknown,
            ReplicaErrorCode::DiskUnavailable,
            ReplicaErrorCode::DataCorrupt,
            ReplicaErrorCode::UnknownError,
            ReplicaErrorCode::DiskUnavailable,
        ];
        for (i, (r, c)) in rs.iter().zip(codes.iter()).enumerate() {
            tracker.mark_inflight(*r, CorrelationId(i as u64));
            tracker.record_failure(CorrelationId(i as u64), *c);
        }
        // 9th replica succeeds (No_Error), leaving success_count = 1 < target 2.
        tracker.mark_inflight(rs[8], CorrelationId(8));
        tracker.record_success(CorrelationId(8), blobgate_transport::ReplicaPayload::Deleted);
        assert!(tracker.is_complete());
        assert!(!tracker.has_succeeded());
        assert_eq!(resolve_failure(&tracker), RouterErrorCode::AmbryUnavailable);
    }

    #[test]
    fn authorization_failure_outranks_everything() {
        let rs = replicas(3);
        let mut tracker = OperationTracker::new(&rs, 3, 2);
        fail_all(
            &mut tracker,
            &rs,
            &[
                ReplicaErrorCode::BlobDoesNotExist,
                ReplicaErrorCode::BlobAuthorizationFailure,
                ReplicaErrorCode::DataCorrupt,
            ],
        );
        assert_eq!(
            resolve_failure(&tracker),
            RouterErrorCode::BlobAuthorizationFailure
        );
    }

    fn resolve_for_codes(codes: &[ReplicaErrorCode]) -> RouterErrorCode {
        let rs = replicas(codes.len() as u64);
        let mut tracker = OperationTracker::new(&rs, codes.len(), 2);
        fail_all(&mut tracker, &rs, codes);
        resolve_failure(&tracker)
    }

    fn replica_error_code() -> impl proptest::strategy::Strategy<Value = ReplicaErrorCode> {
        use proptest::prelude::*;
        prop_oneof![
            Just(ReplicaErrorCode::BlobDoesNotExist),
            Just(ReplicaErrorCode::DataCorrupt),
            Just(ReplicaErrorCode::IOError),
            Just(ReplicaErrorCode::PartitionUnknown),
            Just(ReplicaErrorCode::DiskUnavailable),
            Just(ReplicaErrorCode::UnknownError),
            Just(ReplicaErrorCode::BlobAuthorizationFailure),
            Just(ReplicaErrorCode::BlobExpired),
        ]
    }

    proptest::proptest! {
        // §8 property test: for random permutations of a fixed multiset of
        // replica codes, the resolved router code depends only on the
        // multiset, not the order in which replicas answered.
        #[test]
        fn resolution_is_permutation_invariant(codes in proptest::collection::vec(replica_error_code(), 1..9)) {
            let baseline = resolve_for_codes(&codes);
            let mut shuffled = codes.clone();
            shuffled.reverse();
            proptest::prop_assert_eq!(resolve_for_codes(&shuffled), baseline);

            let mut sorted = codes;
            sorted.sort();
            proptest::prop_assert_eq!(resolve_for_codes(&sorted), baseline);
        }
    }
}
