//! Account and container directory.
//!
//! Looks up account and container records by name or numeric id, and
//! exposes the distinguished unknown account/container used for legacy
//! blobs and for POSTs that name no explicit account (§3, §4.1).
//!
//! # Example
//!
//! ```
//! use blobgate_directory::{AccountDirectory, InMemoryAccountDirectory};
//! use blobgate_types::{Account, Container, Status};
//!
//! let directory = InMemoryAccountDirectory::new().with_account(
//!     Account {
//!         id: 42,
//!         name: "media".to_string(),
//!         status: Status::Active,
//!         default_public_container_id: Some(1),
//!         default_private_container_id: Some(2),
//!     },
//!     vec![
//!         Container { id: 1, name: "default-public".into(), status: Status::Active, private: false, parent_account_id: 42 },
//!         Container { id: 2, name: "default-private".into(), status: Status::Active, private: true, parent_account_id: 42 },
//!     ],
//! );
//!
//! assert!(directory.account_by_name("media").is_some());
//! assert!(directory.account_by_name(blobgate_types::account::UNKNOWN_ACCOUNT_NAME).unwrap().is_unknown());
//! ```

use std::collections::HashMap;

use blobgate_types::account::{unknown_account, unknown_container};
use blobgate_types::{Account, Container, UNKNOWN_ACCOUNT_ID};

/// Read-mostly directory lookups. Implementations must be safe for
/// concurrent reads; writes happen via an out-of-band updater (§5).
pub trait AccountDirectory: Send + Sync {
    fn account_by_name(&self, name: &str) -> Option<&Account>;
    fn account_by_id(&self, id: u16) -> Option<&Account>;
    fn container_by_name(&self, account_id: u16, name: &str) -> Option<&Container>;
    fn container_by_id(&self, account_id: u16, container_id: u16) -> Option<&Container>;
}

struct AccountEntry {
    account: Account,
    containers_by_id: HashMap<u16, Container>,
    containers_by_name: HashMap<String, u16>,
}

/// Directory backed by an in-process map, populated at startup and replaced
/// wholesale by an out-of-band updater (no fine-grained write API is
/// exposed here, matching the "reads are the only concern of the core"
/// design in §5).
pub struct InMemoryAccountDirectory {
    accounts_by_id: HashMap<u16, AccountEntry>,
    accounts_by_name: HashMap<String, u16>,
}

impl Default for InMemoryAccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountDirectory {
    /// Builds a directory pre-populated with the unknown account and its
    /// unknown container; every real directory has these regardless of
    /// configuration.
    pub fn new() -> Self {
        let mut dir = Self {
            accounts_by_id: HashMap::new(),
            accounts_by_name: HashMap::new(),
        };
        dir.insert_account(unknown_account(), vec![unknown_container()]);
        dir
    }

    /// Adds an account and its containers. Builder-style: chain calls at
    /// startup to assemble the full directory.
    #[must_use]
    pub fn with_account(mut self, account: Account, containers: Vec<Container>) -> Self {
        self.insert_account(account, containers);
        self
    }

    fn insert_account(&mut self, account: Account, containers: Vec<Container>) {
        self.accounts_by_name
            .insert(account.name.clone(), account.id);
        let mut containers_by_id = HashMap::new();
        let mut containers_by_name = HashMap::new();
        for c in containers {
            containers_by_name.insert(c.name.clone(), c.id);
            containers_by_id.insert(c.id, c);
        }
        self.accounts_by_id.insert(
            account.id,
            AccountEntry {
                account,
                containers_by_id,
                containers_by_name,
            },
        );
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn account_by_name(&self, name: &str) -> Option<&Account> {
        let id = self.accounts_by_name.get(name)?;
        self.accounts_by_id.get(id).map(|e| &e.account)
    }

    fn account_by_id(&self, id: u16) -> Option<&Account> {
        self.accounts_by_id.get(&id).map(|e| &e.account)
    }

    fn container_by_name(&self, account_id: u16, name: &str) -> Option<&Container> {
        let entry = self.accounts_by_id.get(&account_id)?;
        let id = entry.containers_by_name.get(name)?;
        entry.containers_by_id.get(id)
    }

    fn container_by_id(&self, account_id: u16, container_id: u16) -> Option<&Container> {
        self.accounts_by_id
            .get(&account_id)?
            .containers_by_id
            .get(&container_id)
    }
}

/// Convenience: the account known to always exist.
pub fn unknown_account_id() -> u16 {
    UNKNOWN_ACCOUNT_ID
}
