//! Core data model shared by every other `blobgate` crate: identifiers,
//! directory records, blob metadata, error taxonomies, and the logical
//! clock abstraction used for deterministic timeout testing.

pub mod account;
pub mod clock;
pub mod errors;
pub mod headers;
pub mod http_method;
pub mod ids;
pub mod properties;

pub use account::{Account, Container, Status, UNKNOWN_ACCOUNT_ID, UNKNOWN_CONTAINER_ID};
pub use clock::{FakeClock, LogicalClock, SystemClock};
pub use errors::{PipelineErrorCode, ReplicaErrorCode, RouterErrorCode};
pub use headers::HeaderMap;
pub use http_method::HttpMethod;
pub use ids::{BlobId, BlobIdParseError, BlobIdVersion, DatacenterId, DatanodeId, PartitionId, ReplicaId};
pub use properties::{BlobProperties, GetOption, UserMetadata, INFINITE_TTL};
