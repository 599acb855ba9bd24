//! Blob metadata: typed properties plus opaque user metadata and bytes.

use serde::{Deserialize, Serialize};

/// -1 means "infinite"; any other value is seconds since creation.
pub const INFINITE_TTL: i64 = -1;

/// Typed blob properties, carried alongside the opaque user-metadata blob
/// and the (equally opaque, to the core) blob bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub size: u64,
    pub content_type: String,
    pub service_id: String,
    pub owner_id: Option<String>,
    /// Seconds until expiry, or [`INFINITE_TTL`].
    pub ttl_seconds: i64,
    pub creation_time_ms: i64,
    pub private: bool,
    pub account_id: u16,
    pub container_id: u16,
}

impl BlobProperties {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        if self.ttl_seconds == INFINITE_TTL {
            return false;
        }
        let expiry_ms = self.creation_time_ms + self.ttl_seconds * 1000;
        now_ms >= expiry_ms
    }
}

/// Opaque user-supplied metadata: the `x-ambry-um-<key>` headers collected
/// into an ordered map. The core never interprets values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata(pub Vec<(String, String)>);

impl UserMetadata {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `x-ambry-get-option` values (§6). Anything else is `InvalidArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GetOption {
    #[default]
    None,
    IncludeExpiredBlobs,
    IncludeDeletedBlobs,
    IncludeAll,
}

impl GetOption {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "None" => Some(Self::None),
            "Include_Expired_Blobs" => Some(Self::IncludeExpiredBlobs),
            "Include_Deleted_Blobs" => Some(Self::IncludeDeletedBlobs),
            "Include_All" => Some(Self::IncludeAll),
            _ => None,
        }
    }

    pub fn allows_expired(self) -> bool {
        matches!(self, Self::IncludeExpiredBlobs | Self::IncludeAll)
    }

    pub fn allows_deleted(self) -> bool {
        matches!(self, Self::IncludeDeletedBlobs | Self::IncludeAll)
    }
}
