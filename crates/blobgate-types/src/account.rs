//! Account and container directory records.

use serde::{Deserialize, Serialize};

/// Reserved id for the unknown (legacy / unscoped) account.
pub const UNKNOWN_ACCOUNT_ID: u16 = 0;
/// Reserved id for the unknown account's unknown container.
pub const UNKNOWN_CONTAINER_ID: u16 = 0;
/// Display name of the unknown account, matched against the
/// `x-ambry-target-account` / `x-ambry-service-id` headers.
pub const UNKNOWN_ACCOUNT_NAME: &str = "UnknownAccount";
/// Display name of the unknown container.
pub const UNKNOWN_CONTAINER_NAME: &str = "UnknownContainer";

/// Lifecycle status shared by accounts and containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Active,
    Inactive,
    Deprecated,
}

/// A directory account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u16,
    pub name: String,
    pub status: Status,
    /// Id of the account's default-public legacy container, if provisioned.
    pub default_public_container_id: Option<u16>,
    /// Id of the account's default-private legacy container, if provisioned.
    pub default_private_container_id: Option<u16>,
}

impl Account {
    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_ACCOUNT_ID
    }
}

/// A directory container record, unique within its parent account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: u16,
    pub name: String,
    pub status: Status,
    pub private: bool,
    pub parent_account_id: u16,
}

impl Container {
    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_CONTAINER_ID
    }
}

/// Builds the distinguished unknown-account record. Callers of
/// `AccountDirectory` implementations should always expose this record at
/// `UNKNOWN_ACCOUNT_ID`, with `UNKNOWN_CONTAINER_ID` as its sole container.
pub fn unknown_account() -> Account {
    Account {
        id: UNKNOWN_ACCOUNT_ID,
        name: UNKNOWN_ACCOUNT_NAME.to_string(),
        status: Status::Active,
        default_public_container_id: Some(UNKNOWN_CONTAINER_ID),
        default_private_container_id: Some(UNKNOWN_CONTAINER_ID),
    }
}

/// Builds the distinguished unknown-container record.
pub fn unknown_container() -> Container {
    Container {
        id: UNKNOWN_CONTAINER_ID,
        name: UNKNOWN_CONTAINER_NAME.to_string(),
        status: Status::Active,
        private: false,
        parent_account_id: UNKNOWN_ACCOUNT_ID,
    }
}
