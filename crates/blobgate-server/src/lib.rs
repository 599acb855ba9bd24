//! # blobgate-server
//!
//! The TCP server that exposes `blobgate`'s blob-store frontend over HTTP,
//! wiring together the router, cluster view, account directory, security
//! gate, and replica transport defined by the sibling crates.
//!
//! ## Architecture
//!
//! The server uses `mio` for non-blocking I/O with a poll-based event loop,
//! following this workspace's design principle of explicit control flow
//! without an async runtime.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        blobgate-server                         │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────────────┐   │
//! │  │  Listener   │ → │ Connections │ → │  Pipeline<TR>      │   │
//! │  │  (TCP)      │   │ (mio poll)  │   │  (→ RouterCore)    │   │
//! │  └─────────────┘   └─────────────┘   └────────────────────┘   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use blobgate_server::{ConfigLoader, Server};
//!
//! let config = ConfigLoader::new().with_file("blobgate.toml").load()?;
//! let server = Server::new(config)?;
//! server.run()?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod http;
pub mod metrics;
mod server;

pub use config::{
    AccountConfig, ApiKeyConfig, ClusterConfig, ConfigLoader, ConnectionConfig, ContainerConfig,
    ListenConfig, MetricsConfig, PartitionConfig, ReplicaPlacement, SecurityConfig, ServerConfig,
};
pub use error::{ServerError, ServerResult};
pub use health::{HealthChecker, HealthResponse, HealthStatus};
pub use server::{Server, ShutdownHandle};
