//! Error taxonomies: per-replica codes, router-level codes, and
//! pipeline-level (HTTP-facing) codes, plus the mapping between them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code returned by a single storage replica for one request.
///
/// Ordered by the precedence used when an operation's replies must be
/// collapsed to one router-level outcome: the `Ord` impl here is the ranking
/// from §4.2 (`BlobAuthorizationFailure` highest, `UnknownError` lowest).
/// `Ord::cmp` is used directly by the router's precedence resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReplicaErrorCode {
    /// Lowest precedence: catch-all.
    UnknownError,
    DataCorrupt,
    IOError,
    PartitionUnknown,
    ReplicaUnavailable,
    DiskUnavailable,
    BlobDoesNotExist,
    BlobDeleted,
    BlobExpired,
    /// Highest precedence.
    BlobAuthorizationFailure,
}

impl ReplicaErrorCode {
    /// `true` for the "ambiguous server health" codes that never outrank a
    /// positive-proof code (`BlobExpired`/`BlobDeleted`/`BlobDoesNotExist`).
    pub fn is_health_code(self) -> bool {
        matches!(
            self,
            Self::UnknownError
                | Self::DataCorrupt
                | Self::IOError
                | Self::PartitionUnknown
                | Self::ReplicaUnavailable
                | Self::DiskUnavailable
        )
    }
}

/// Router-level error taxonomy (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouterErrorCode {
    #[error("invalid blob id")]
    InvalidBlobId,
    #[error("blob does not exist")]
    BlobDoesNotExist,
    #[error("blob has been deleted")]
    BlobDeleted,
    #[error("blob has expired")]
    BlobExpired,
    #[error("not authorized to access blob")]
    BlobAuthorizationFailure,
    #[error("blob exceeds maximum size")]
    BlobTooLarge,
    #[error("input channel error")]
    BadInputChannel,
    #[error("insufficient replicas available")]
    AmbryUnavailable,
    #[error("operation timed out")]
    OperationTimedOut,
    #[error("router is closed")]
    RouterClosed,
    #[error("insufficient write capacity")]
    InsufficientCapacity,
    #[error("invalid put argument")]
    InvalidPutArgument,
    #[error("unexpected internal error")]
    UnexpectedInternalError,
}

impl RouterErrorCode {
    /// Stable machine-readable tag, used for the `x-blobgate-error-code`
    /// response header and for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidBlobId => "InvalidBlobId",
            Self::BlobDoesNotExist => "BlobDoesNotExist",
            Self::BlobDeleted => "BlobDeleted",
            Self::BlobExpired => "BlobExpired",
            Self::BlobAuthorizationFailure => "BlobAuthorizationFailure",
            Self::BlobTooLarge => "BlobTooLarge",
            Self::BadInputChannel => "BadInputChannel",
            Self::AmbryUnavailable => "AmbryUnavailable",
            Self::OperationTimedOut => "OperationTimedOut",
            Self::RouterClosed => "RouterClosed",
            Self::InsufficientCapacity => "InsufficientCapacity",
            Self::InvalidPutArgument => "InvalidPutArgument",
            Self::UnexpectedInternalError => "UnexpectedInternalError",
        }
    }
}

/// Pipeline-level (HTTP-facing) error taxonomy (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineErrorCode {
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("gone")]
    Gone,
    #[error("unsupported http method")]
    UnsupportedHttpMethod,
    #[error("missing required arguments")]
    MissingArgs,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid account")]
    InvalidAccount,
    #[error("invalid container")]
    InvalidContainer,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("range not satisfiable")]
    RangeNotSatisfiable,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("internal error")]
    InternalError,
}

impl PipelineErrorCode {
    /// HTTP status this pipeline error kind maps to.
    pub fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Gone => 410,
            Self::UnsupportedHttpMethod => 405,
            Self::MissingArgs => 400,
            Self::InvalidArgument => 400,
            Self::InvalidAccount => 400,
            Self::InvalidContainer => 400,
            Self::PreconditionFailed => 412,
            Self::RangeNotSatisfiable => 416,
            Self::ServiceUnavailable => 503,
            Self::InternalError => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "NotFound",
            Self::Gone => "Gone",
            Self::UnsupportedHttpMethod => "UnsupportedHttpMethod",
            Self::MissingArgs => "MissingArgs",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidAccount => "InvalidAccount",
            Self::InvalidContainer => "InvalidContainer",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::RangeNotSatisfiable => "RangeNotSatisfiable",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
        }
    }

    /// Implements the router→pipeline mapping table from §7.
    pub fn from_router_error(router: RouterErrorCode) -> Self {
        match router {
            RouterErrorCode::BlobDoesNotExist => Self::NotFound,
            RouterErrorCode::BlobDeleted | RouterErrorCode::BlobExpired => Self::Gone,
            RouterErrorCode::BlobAuthorizationFailure => Self::Unauthorized,
            RouterErrorCode::OperationTimedOut => Self::ServiceUnavailable,
            RouterErrorCode::InvalidBlobId => Self::BadRequest,
            RouterErrorCode::AmbryUnavailable => Self::ServiceUnavailable,
            RouterErrorCode::RouterClosed => Self::ServiceUnavailable,
            RouterErrorCode::BlobTooLarge
            | RouterErrorCode::BadInputChannel
            | RouterErrorCode::InsufficientCapacity
            | RouterErrorCode::InvalidPutArgument
            | RouterErrorCode::UnexpectedInternalError => Self::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order_matches_spec_table() {
        // BlobAuthorizationFailure > BlobExpired > BlobDeleted > BlobDoesNotExist >
        // DiskUnavailable > ReplicaUnavailable > PartitionUnknown > IOError >
        // DataCorrupt > UnknownError
        let ordered = [
            ReplicaErrorCode::BlobAuthorizationFailure,
            ReplicaErrorCode::BlobExpired,
            ReplicaErrorCode::BlobDeleted,
            ReplicaErrorCode::BlobDoesNotExist,
            ReplicaErrorCode::DiskUnavailable,
            ReplicaErrorCode::ReplicaUnavailable,
            ReplicaErrorCode::PartitionUnknown,
            ReplicaErrorCode::IOError,
            ReplicaErrorCode::DataCorrupt,
            ReplicaErrorCode::UnknownError,
        ];
        for window in ordered.windows(2) {
            assert!(window[0] > window[1], "{:?} should outrank {:?}", window[0], window[1]);
        }
    }

    #[test]
    fn router_to_pipeline_mapping() {
        assert_eq!(
            PipelineErrorCode::from_router_error(RouterErrorCode::BlobDeleted),
            PipelineErrorCode::Gone
        );
        assert_eq!(
            PipelineErrorCode::from_router_error(RouterErrorCode::BlobDoesNotExist),
            PipelineErrorCode::NotFound
        );
        assert_eq!(
            PipelineErrorCode::from_router_error(RouterErrorCode::AmbryUnavailable),
            PipelineErrorCode::ServiceUnavailable
        );
    }
}
