//! `SecurityGate` and its default bearer-token-based implementation (§4.4).

pub mod gate;
pub mod identity;
pub mod policy;

pub use gate::{DefaultSecurityGate, SecurityGate, SecurityRequest};
pub use identity::CallerIdentity;
pub use policy::ApiKeyPolicy;
