//! Account/container injection (POST) and resolution (GET/HEAD/DELETE),
//! implementing the rule matrix in §4.1 verbatim — including the two
//! documented open questions (§9), which are retained rather than "fixed".

use blobgate_directory::AccountDirectory;
use blobgate_types::account::{UNKNOWN_ACCOUNT_ID, UNKNOWN_ACCOUNT_NAME, UNKNOWN_CONTAINER_ID, UNKNOWN_CONTAINER_NAME};
use blobgate_types::{Account, Container, HeaderMap, PipelineErrorCode};

use crate::request::ResolvedTarget;

const HEADER_TARGET_ACCOUNT: &str = "x-ambry-target-account";
const HEADER_TARGET_CONTAINER: &str = "x-ambry-target-container";
const HEADER_SERVICE_ID: &str = "x-ambry-service-id";
const HEADER_PRIVATE: &str = "x-ambry-private";
// Internal request-argument keys a client must never be able to set directly.
const INTERNAL_TARGET_ACCOUNT_KEY: &str = "targetAccount";
const INTERNAL_TARGET_CONTAINER_KEY: &str = "targetContainer";

fn is_private(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_PRIVATE)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn legacy_container(account: &Account, directory: &dyn AccountDirectory, private: bool) -> Option<Container> {
    let container_id = if private {
        account.default_private_container_id
    } else {
        account.default_public_container_id
    }?;
    directory.container_by_id(account.id, container_id).cloned()
}

fn unknown_target(directory: &dyn AccountDirectory, private: bool) -> ResolvedTarget {
    let account = directory
        .account_by_id(UNKNOWN_ACCOUNT_ID)
        .cloned()
        .expect("unknown account always present");
    let container = legacy_container(&account, directory, private)
        .or_else(|| directory.container_by_id(UNKNOWN_ACCOUNT_ID, UNKNOWN_CONTAINER_ID).cloned())
        .expect("unknown container always present");
    ResolvedTarget { account, container }
}

/// POST-time account/container injection (§4.1 "Account/Container injection").
pub fn inject_for_post(
    headers: &HeaderMap,
    directory: &dyn AccountDirectory,
) -> Result<ResolvedTarget, PipelineErrorCode> {
    if headers.contains_key(INTERNAL_TARGET_ACCOUNT_KEY) || headers.contains_key(INTERNAL_TARGET_CONTAINER_KEY) {
        return Err(PipelineErrorCode::BadRequest);
    }

    let target_account = headers.get(HEADER_TARGET_ACCOUNT);
    let target_container = headers.get(HEADER_TARGET_CONTAINER);
    let private = is_private(headers);

    match target_account {
        None => match target_container {
            None => {
                // No explicit target at all: service-id may name a real account.
                if let Some(service_id) = headers.get(HEADER_SERVICE_ID) {
                    if service_id == UNKNOWN_ACCOUNT_NAME {
                        return Err(PipelineErrorCode::InvalidAccount);
                    }
                    if let Some(account) = directory.account_by_name(service_id) {
                        // Open question (§9): an account with no legacy default
                        // containers silently falls back to unknown, rather than
                        // failing. Retained verbatim.
                        return Ok(match legacy_container(account, directory, private) {
                            Some(container) => ResolvedTarget {
                                account: account.clone(),
                                container,
                            },
                            None => unknown_target(directory, private),
                        });
                    }
                }
                Ok(unknown_target(directory, private))
            }
            Some(container_name) => {
                if container_name == UNKNOWN_CONTAINER_NAME {
                    Err(PipelineErrorCode::InvalidContainer)
                } else {
                    Err(PipelineErrorCode::MissingArgs)
                }
            }
        },
        Some(account_name) => {
            if account_name == UNKNOWN_ACCOUNT_NAME {
                return Err(PipelineErrorCode::InvalidAccount);
            }
            let Some(account) = directory.account_by_name(account_name) else {
                return Err(PipelineErrorCode::InvalidAccount);
            };
            let Some(container_name) = target_container else {
                return Err(PipelineErrorCode::MissingArgs);
            };
            if container_name == UNKNOWN_CONTAINER_NAME {
                return Err(PipelineErrorCode::InvalidContainer);
            }
            match directory.container_by_name(account.id, container_name) {
                Some(container) => Ok(ResolvedTarget {
                    account: account.clone(),
                    container: container.clone(),
                }),
                None => Err(PipelineErrorCode::InvalidContainer),
            }
        }
    }
}

/// GET/HEAD/DELETE-time account/container resolution from a decoded
/// `BlobId` (§4.1 "Account/Container resolution").
pub fn resolve_for_read(
    account_id: u16,
    container_id: u16,
    directory: &dyn AccountDirectory,
) -> Result<ResolvedTarget, PipelineErrorCode> {
    if account_id == UNKNOWN_ACCOUNT_ID && container_id == UNKNOWN_CONTAINER_ID {
        return Ok(unknown_target(directory, false));
    }
    if account_id == UNKNOWN_ACCOUNT_ID {
        // Unknown account can't own a real container.
        return Err(PipelineErrorCode::InvalidContainer);
    }
    let Some(account) = directory.account_by_id(account_id) else {
        return Err(PipelineErrorCode::InvalidAccount);
    };
    if container_id == UNKNOWN_CONTAINER_ID {
        return Err(PipelineErrorCode::InvalidContainer);
    }
    match directory.container_by_id(account_id, container_id) {
        Some(container) => Ok(ResolvedTarget {
            account: account.clone(),
            container: container.clone(),
        }),
        None => Err(PipelineErrorCode::InvalidContainer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobgate_directory::InMemoryAccountDirectory;
    use blobgate_types::Status;

    fn directory() -> InMemoryAccountDirectory {
        InMemoryAccountDirectory::new().with_account(
            Account {
                id: 42,
                name: "media".to_string(),
                status: Status::Active,
                default_public_container_id: Some(1),
                default_private_container_id: Some(2),
            },
            vec![
                Container {
                    id: 1,
                    name: "default-public".to_string(),
                    status: Status::Active,
                    private: false,
                    parent_account_id: 42,
                },
                Container {
                    id: 2,
                    name: "default-private".to_string(),
                    status: Status::Active,
                    private: true,
                    parent_account_id: 42,
                },
                Container {
                    id: 3,
                    name: "uploads".to_string(),
                    status: Status::Active,
                    private: false,
                    parent_account_id: 42,
                },
            ],
        ).with_account(
            Account {
                id: 7,
                name: "bare".to_string(),
                status: Status::Active,
                default_public_container_id: None,
                default_private_container_id: None,
            },
            vec![],
        )
    }

    #[test]
    fn no_target_headers_falls_back_to_unknown() {
        let dir = directory();
        let headers = HeaderMap::new();
        let resolved = inject_for_post(&headers, &dir).unwrap();
        assert!(resolved.account.is_unknown());
    }

    #[test]
    fn service_id_names_real_account() {
        let dir = directory();
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-service-id", "media");
        let resolved = inject_for_post(&headers, &dir).unwrap();
        assert_eq!(resolved.account.id, 42);
        assert_eq!(resolved.container.id, 1);
    }

    #[test]
    fn service_id_names_account_without_legacy_containers_falls_back() {
        let dir = directory();
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-service-id", "bare");
        let resolved = inject_for_post(&headers, &dir).unwrap();
        assert!(resolved.account.is_unknown());
    }

    #[test]
    fn real_account_and_container_injected() {
        let dir = directory();
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-target-account", "media");
        headers.insert("x-ambry-target-container", "uploads");
        let resolved = inject_for_post(&headers, &dir).unwrap();
        assert_eq!(resolved.account.id, 42);
        assert_eq!(resolved.container.id, 3);
    }

    #[test]
    fn account_without_container_header_is_missing_args() {
        let dir = directory();
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-target-account", "media");
        assert_eq!(inject_for_post(&headers, &dir), Err(PipelineErrorCode::MissingArgs));
    }

    #[test]
    fn container_without_account_header_is_missing_args() {
        let dir = directory();
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-target-container", "uploads");
        assert_eq!(inject_for_post(&headers, &dir), Err(PipelineErrorCode::MissingArgs));
    }

    #[test]
    fn internal_keys_are_rejected() {
        let dir = directory();
        let mut headers = HeaderMap::new();
        headers.insert("targetAccount", "media");
        assert_eq!(inject_for_post(&headers, &dir), Err(PipelineErrorCode::BadRequest));
    }

    #[test]
    fn resolve_for_read_unknown_sentinel() {
        let dir = directory();
        let resolved = resolve_for_read(UNKNOWN_ACCOUNT_ID, UNKNOWN_CONTAINER_ID, &dir).unwrap();
        assert!(resolved.account.is_unknown());
    }

    #[test]
    fn resolve_for_read_unknown_account_real_container_is_invalid_container() {
        let dir = directory();
        assert_eq!(
            resolve_for_read(UNKNOWN_ACCOUNT_ID, 1, &dir),
            Err(PipelineErrorCode::InvalidContainer)
        );
    }

    #[test]
    fn resolve_for_read_unknown_account_id_is_invalid_account() {
        let dir = directory();
        assert_eq!(resolve_for_read(999, 1, &dir), Err(PipelineErrorCode::InvalidAccount));
    }

    #[test]
    fn resolve_for_read_real_account_unknown_container_is_invalid_container() {
        let dir = directory();
        assert_eq!(
            resolve_for_read(42, UNKNOWN_CONTAINER_ID, &dir),
            Err(PipelineErrorCode::InvalidContainer)
        );
    }

    #[test]
    fn resolve_for_read_real_pair_resolves() {
        let dir = directory();
        let resolved = resolve_for_read(42, 3, &dir).unwrap();
        assert_eq!(resolved.account.id, 42);
        assert_eq!(resolved.container.id, 3);
    }

    fn header_choice() -> impl proptest::strategy::Strategy<Value = Option<&'static str>> {
        use proptest::prelude::*;
        prop_oneof![
            Just(None),
            Just(Some("media")),
            Just(Some("bare")),
            Just(Some("nonexistent")),
            Just(Some(UNKNOWN_ACCOUNT_NAME)),
        ]
    }

    fn container_choice() -> impl proptest::strategy::Strategy<Value = Option<&'static str>> {
        use proptest::prelude::*;
        prop_oneof![
            Just(None),
            Just(Some("uploads")),
            Just(Some("default-public")),
            Just(Some("nonexistent")),
            Just(UNKNOWN_CONTAINER_NAME).prop_map(Some),
        ]
    }

    fn verdict_of(
        account: Option<&str>,
        container: Option<&str>,
        service_id: Option<&str>,
        dir: &InMemoryAccountDirectory,
    ) -> Result<(u16, u16), PipelineErrorCode> {
        let mut headers = HeaderMap::new();
        if let Some(a) = account {
            headers.insert(HEADER_TARGET_ACCOUNT, a);
        }
        if let Some(c) = container {
            headers.insert(HEADER_TARGET_CONTAINER, c);
        }
        if let Some(s) = service_id {
            headers.insert(HEADER_SERVICE_ID, s);
        }
        inject_for_post(&headers, dir).map(|r| (r.account.id, r.container.id))
    }

    proptest::proptest! {
        // §8 property test: for random (account-header, container-header,
        // service-id) triples, the injection verdict is a deterministic
        // function of the triple alone.
        #[test]
        fn injection_verdict_is_deterministic_in_the_header_triple(
            account in header_choice(),
            container in container_choice(),
            service_id in header_choice(),
        ) {
            let dir = directory();
            let first = verdict_of(account, container, service_id, &dir);
            let second = verdict_of(account, container, service_id, &dir);
            proptest::prop_assert_eq!(first, second);
        }
    }
}
