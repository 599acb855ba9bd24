//! Replica fan-out, quorum tracking, and per-operation timeout enforcement.
//!
//! This crate is the router half of the frontend: given a cluster topology
//! and a transport to the replicas it names, it turns one delete/get/put
//! request into a fanned-out, quorum-resolved [`RouterOutcome`] or
//! [`blobgate_types::RouterErrorCode`]. It never blocks — callers drive it
//! with [`RouterCore::tick`].

pub mod config;
pub mod operation;
pub mod precedence;
pub mod router_core;
pub mod tracker;

pub use config::RouterConfig;
pub use operation::{GetResult, OperationHandle, OperationKind, OperationPoll, ReplicaOperation, RouterOutcome};
pub use router_core::RouterCore;
pub use tracker::OperationTracker;
