//! Identifiers for partitions, replicas, and blobs.
//!
//! `BlobId` is the only type here with a wire format: a fixed binary layout,
//! base64url-encoded (no padding) for use in URLs. Two versions exist side
//! by side — version 1 predates per-blob account/container tagging and
//! always resolves to the unknown account/container; version 2 carries both.
//! Decoding always accepts either version; encoding always produces version 2.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::{UNKNOWN_ACCOUNT_ID, UNKNOWN_CONTAINER_ID};

/// A datacenter, identified by a small integer assigned at cluster bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatacenterId(pub u8);

/// Opaque identifier for a partition: a replication group that a blob's key
/// hashes into. Stable for the life of the cluster view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub u64);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binds a partition to one specific datanode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId {
    pub partition: PartitionId,
    pub datanode: DatanodeId,
}

/// A storage datanode, addressed by host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatanodeId {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for DatanodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Wire format version of a [`BlobId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobIdVersion {
    /// No embedded account/container; both resolve to the unknown sentinel.
    V1 = 1,
    /// Embeds account and container ids.
    V2 = 2,
}

const BLOB_KEY_LEN: usize = 16;

/// Canonical identifier of a stored blob.
///
/// Carries a format version, the originating datacenter, the partition the
/// blob's key hashes to, a per-partition unique key, and (version 2 only) the
/// account and container the blob was uploaded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId {
    version: BlobIdVersion,
    datacenter: DatacenterId,
    account_id: u16,
    container_id: u16,
    partition: PartitionId,
    key: [u8; BLOB_KEY_LEN],
}

/// Failure decoding a blob id string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed blob id: {0}")]
pub struct BlobIdParseError(pub String);

impl BlobId {
    /// Builds a version 2 id (the only version this crate ever mints).
    pub fn new_v2(
        datacenter: DatacenterId,
        account_id: u16,
        container_id: u16,
        partition: PartitionId,
        key: [u8; BLOB_KEY_LEN],
    ) -> Self {
        Self {
            version: BlobIdVersion::V2,
            datacenter,
            account_id,
            container_id,
            partition,
            key,
        }
    }

    /// Builds a version 1 id. Account/container are forced to the unknown
    /// sentinel, matching the legacy format's lack of those fields.
    pub fn new_v1(datacenter: DatacenterId, partition: PartitionId, key: [u8; BLOB_KEY_LEN]) -> Self {
        Self {
            version: BlobIdVersion::V1,
            datacenter,
            account_id: UNKNOWN_ACCOUNT_ID,
            container_id: UNKNOWN_CONTAINER_ID,
            partition,
            key,
        }
    }

    pub fn version(&self) -> BlobIdVersion {
        self.version
    }

    pub fn datacenter(&self) -> DatacenterId {
        self.datacenter
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Account id embedded in the id, or the unknown sentinel for v1 ids.
    pub fn account_id(&self) -> u16 {
        self.account_id
    }

    /// Container id embedded in the id, or the unknown sentinel for v1 ids.
    pub fn container_id(&self) -> u16 {
        self.container_id
    }

    /// Decodes a base64url id string produced by [`BlobId::to_string`] or by
    /// a legacy (version 1) client.
    pub fn parse(s: &str) -> Result<Self, BlobIdParseError> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s.as_bytes())
            .map_err(|e| BlobIdParseError(format!("base64 decode failed: {e}")))?;

        let mut cursor = bytes.as_slice();
        let version = take_u8(&mut cursor).ok_or_else(too_short)?;
        let datacenter = take_u8(&mut cursor).ok_or_else(too_short)?;

        let (version, account_id, container_id) = match version {
            1 => (BlobIdVersion::V1, UNKNOWN_ACCOUNT_ID, UNKNOWN_CONTAINER_ID),
            2 => {
                let account_id = take_u16(&mut cursor).ok_or_else(too_short)?;
                let container_id = take_u16(&mut cursor).ok_or_else(too_short)?;
                (BlobIdVersion::V2, account_id, container_id)
            }
            other => return Err(BlobIdParseError(format!("unsupported blob id version {other}"))),
        };

        let partition = take_u64(&mut cursor).ok_or_else(too_short)?;
        if cursor.len() != BLOB_KEY_LEN {
            return Err(too_short());
        }
        let mut key = [0u8; BLOB_KEY_LEN];
        key.copy_from_slice(cursor);

        Ok(Self {
            version,
            datacenter: DatacenterId(datacenter),
            account_id,
            container_id,
            partition: PartitionId(partition),
            key,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.push(match self.version {
            BlobIdVersion::V1 => 1,
            BlobIdVersion::V2 => 2,
        });
        out.push(self.datacenter.0);
        if matches!(self.version, BlobIdVersion::V2) {
            out.extend_from_slice(&self.account_id.to_be_bytes());
            out.extend_from_slice(&self.container_id.to_be_bytes());
        }
        out.extend_from_slice(&self.partition.0.to_be_bytes());
        out.extend_from_slice(&self.key);
        out
    }
}

fn too_short() -> BlobIdParseError {
    BlobIdParseError("truncated blob id payload".to_string())
}

fn take_u8(cursor: &mut &[u8]) -> Option<u8> {
    let (first, rest) = cursor.split_first()?;
    *cursor = rest;
    Some(*first)
}

fn take_u16(cursor: &mut &[u8]) -> Option<u16> {
    if cursor.len() < 2 {
        return None;
    }
    let (head, rest) = cursor.split_at(2);
    *cursor = rest;
    Some(u16::from_be_bytes([head[0], head[1]]))
}

fn take_u64(cursor: &mut &[u8]) -> Option<u64> {
    if cursor.len() < 8 {
        return None;
    }
    let (head, rest) = cursor.split_at(8);
    *cursor = rest;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(head);
    Some(u64::from_be_bytes(buf))
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::Engine as _;
        write!(
            f,
            "{}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.encode())
        )
    }
}

impl Serialize for BlobId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BlobId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_round_trips() {
        let id = BlobId::new_v2(DatacenterId(3), 42, 7, PartitionId(9001), [1u8; BLOB_KEY_LEN]);
        let encoded = id.to_string();
        let decoded = BlobId::parse(&encoded).unwrap();
        assert_eq!(decoded, id);
        assert_eq!(decoded.account_id(), 42);
        assert_eq!(decoded.container_id(), 7);
    }

    #[test]
    fn v1_has_unknown_account_container() {
        let id = BlobId::new_v1(DatacenterId(1), PartitionId(5), [2u8; BLOB_KEY_LEN]);
        let encoded = id.to_string();
        let decoded = BlobId::parse(&encoded).unwrap();
        assert_eq!(decoded.account_id(), UNKNOWN_ACCOUNT_ID);
        assert_eq!(decoded.container_id(), UNKNOWN_CONTAINER_ID);
    }

    #[test]
    fn garbage_input_is_bad_request() {
        assert!(BlobId::parse("not-valid-base64!!!").is_err());
        assert!(BlobId::parse("AA").is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        use base64::Engine as _;
        let mut bytes = vec![9u8, 0u8];
        bytes.extend_from_slice(&[0u8; 8 + BLOB_KEY_LEN]);
        let s = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        assert!(BlobId::parse(&s).is_err());
    }
}
