//! Request/response payloads exchanged with a single replica, and the
//! correlation bookkeeping `OperationTracker` uses to match them up.

use blobgate_types::{BlobProperties, GetOption, ReplicaErrorCode, ReplicaId, UserMetadata};
use serde::{Deserialize, Serialize};

/// Identifies one outstanding request to one replica. Allocated by the
/// caller (the router); echoed back on the matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub u64);

/// What is being asked of a replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplicaRequestKind {
    Put {
        properties: BlobProperties,
        user_metadata: UserMetadata,
        bytes: Vec<u8>,
    },
    Get {
        blob_key: [u8; 16],
        option: GetOption,
    },
    Delete {
        blob_key: [u8; 16],
    },
}

/// One outbound request to one replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaRequest {
    pub correlation_id: CorrelationId,
    pub replica: ReplicaId,
    pub kind: ReplicaRequestKind,
}

/// Successful payload of a replica response. The shape depends on the
/// request kind it answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplicaPayload {
    PutAcked,
    Deleted,
    GetBody {
        properties: BlobProperties,
        user_metadata: UserMetadata,
        bytes: Vec<u8>,
    },
}

/// One inbound response from one replica, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaResponse {
    pub correlation_id: CorrelationId,
    pub replica: ReplicaId,
    pub outcome: Result<ReplicaPayload, ReplicaErrorCode>,
}
