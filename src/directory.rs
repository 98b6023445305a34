//! Owner directory: CRM owner id to display name.
//!
//! The directory is loaded lazily on first use and then kept for the rest of
//! the process lifetime. A restart is required to pick up owner changes.

use crate::crm::{follow_cursor, CrmError, CrmSource, FailurePolicy, Fetched};
use crate::models::{OwnerRecord, UNKNOWN_OWNER};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Snapshot of owner display names.
#[derive(Debug, Clone, Default)]
pub struct OwnerNames {
    names: HashMap<String, String>,
    complete: bool,
}

impl OwnerNames {
    pub fn from_records(records: Vec<OwnerRecord>, complete: bool) -> Self {
        let names = records
            .into_iter()
            .map(|owner| {
                let name = owner.display_name();
                (owner.id, name)
            })
            .collect();
        Self { names, complete }
    }

    /// Display name for `owner_id`, or `"Unknown"`.
    pub fn name_for(&self, owner_id: &str) -> &str {
        self.names
            .get(owner_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_OWNER)
    }

    /// False when pagination stopped early and some owners may be missing.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("owner directory load failed: {0}")]
    Fetch(#[from] CrmError),

    #[error("owner directory is empty")]
    Empty,
}

/// Fetch every owner visible to the credential.
pub async fn load_all_owners(
    source: &dyn CrmSource,
    page_limit: u32,
    policy: FailurePolicy,
) -> Fetched<OwnerNames> {
    let fetched = follow_cursor("owners", policy, move |after| async move {
        source.owners_page(page_limit, after.as_deref()).await
    })
    .await;

    let complete = matches!(fetched, Fetched::Complete(_));
    fetched.map(|records| OwnerNames::from_records(records, complete))
}

/// Process-lifetime cache of the owner directory.
pub struct OwnerDirectory {
    names: OnceCell<OwnerNames>,
    page_limit: u32,
    policy: FailurePolicy,
}

impl OwnerDirectory {
    pub fn new(page_limit: u32, policy: FailurePolicy) -> Self {
        Self {
            names: OnceCell::new(),
            page_limit,
            policy,
        }
    }

    /// Return the cached directory, loading it on first use.
    ///
    /// Concurrent first callers share one load. A load that yields no owners
    /// is not cached, so a later call tries again.
    pub async fn names(&self, source: &dyn CrmSource) -> Result<&OwnerNames, DirectoryError> {
        self.names
            .get_or_try_init(|| async {
                let (names, error) = load_all_owners(source, self.page_limit, self.policy)
                    .await
                    .into_parts();

                match (names, error) {
                    (Some(names), _) if names.is_empty() => Err(DirectoryError::Empty),
                    (Some(names), None) => {
                        info!("Loaded {} owners", names.len());
                        Ok(names)
                    }
                    (Some(names), Some(error)) => {
                        warn!(
                            "Owner directory is incomplete ({} owners loaded): {}",
                            names.len(),
                            error
                        );
                        Ok(names)
                    }
                    (None, Some(error)) => Err(DirectoryError::Fetch(error)),
                    (None, None) => Err(DirectoryError::Empty),
                }
            })
            .await
    }

    /// Whether a directory has been cached yet.
    pub fn is_loaded(&self) -> bool {
        self.names.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealRecord, NextPage, Page, Paging};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn owner(id: &str, first: Option<&str>, last: Option<&str>) -> OwnerRecord {
        OwnerRecord {
            id: id.to_string(),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
        }
    }

    fn page(results: Vec<OwnerRecord>, after: Option<&str>) -> Page<OwnerRecord> {
        Page {
            results,
            paging: after.map(|a| Paging {
                next: Some(NextPage {
                    after: Some(a.to_string()),
                }),
            }),
        }
    }

    /// Owner source answering from a fixed page script, keyed by cursor.
    struct ScriptedOwners {
        pages: HashMap<Option<String>, Result<Page<OwnerRecord>, u16>>,
        requests: AtomicUsize,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedOwners {
        fn new(pages: Vec<(Option<&str>, Result<Page<OwnerRecord>, u16>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(k, v)| (k.map(String::from), v))
                    .collect(),
                requests: AtomicUsize::new(0),
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CrmSource for ScriptedOwners {
        async fn owners_page(
            &self,
            limit: u32,
            after: Option<&str>,
        ) -> Result<Page<OwnerRecord>, CrmError> {
            assert_eq!(limit, 100);
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.cursors.lock().unwrap().push(after.map(String::from));
            match self.pages.get(&after.map(String::from)) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(status)) => Err(CrmError::Status {
                    status: *status,
                    body: "upstream failure".to_string(),
                }),
                None => panic!("unexpected cursor {:?}", after),
            }
        }

        async fn deals_page(
            &self,
            _limit: u32,
            _after: Option<&str>,
        ) -> Result<Page<DealRecord>, CrmError> {
            unreachable!("directory never fetches deals")
        }
    }

    #[tokio::test]
    async fn test_two_pages_yield_three_owners() {
        let source = ScriptedOwners::new(vec![
            (
                None,
                Ok(page(
                    vec![
                        owner("1", Some("Noha"), Some("Reda")),
                        owner("2", Some("Bela"), Some("saleh")),
                    ],
                    Some("X"),
                )),
            ),
            (
                Some("X"),
                Ok(page(vec![owner("3", Some("RADWA"), Some("EL BIOMEY"))], None)),
            ),
        ]);

        let fetched = load_all_owners(&source, 100, FailurePolicy::KeepPartial).await;
        let names = match fetched {
            Fetched::Complete(names) => names,
            other => panic!("expected complete directory, got {:?}", other),
        };

        assert_eq!(names.len(), 3);
        assert!(names.is_complete());
        assert_eq!(names.name_for("3"), "RADWA EL BIOMEY");
        assert_eq!(
            *source.cursors.lock().unwrap(),
            vec![None, Some("X".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_last_name_is_first_name_alone() {
        let source = ScriptedOwners::new(vec![(
            None,
            Ok(page(vec![owner("9", Some(" Sohaila "), None)], None)),
        )]);

        let (names, _) = load_all_owners(&source, 100, FailurePolicy::KeepPartial)
            .await
            .into_parts();
        assert_eq!(names.unwrap().name_for("9"), "Sohaila");
    }

    #[tokio::test]
    async fn test_failed_page_keeps_partial_directory() {
        let source = ScriptedOwners::new(vec![
            (
                None,
                Ok(page(
                    vec![
                        owner("1", Some("Noha"), Some("Reda")),
                        owner("2", Some("Bela"), Some("saleh")),
                    ],
                    Some("X"),
                )),
            ),
            (Some("X"), Err(502)),
        ]);

        let fetched = load_all_owners(&source, 100, FailurePolicy::KeepPartial).await;
        assert_eq!(fetched.completeness(), crate::models::Completeness::Partial);
        let names = fetched.data().unwrap();
        assert_eq!(names.len(), 2);
        assert!(!names.is_complete());
        assert_eq!(names.name_for("1"), "Noha Reda");
    }

    #[test]
    fn test_unknown_owner_sentinel() {
        let names = OwnerNames::from_records(vec![owner("1", Some("Noha"), Some("Reda"))], true);
        assert_eq!(names.name_for("1"), "Noha Reda");
        assert_eq!(names.name_for("404"), "Unknown");
    }

    #[tokio::test]
    async fn test_directory_loads_once() {
        let source = ScriptedOwners::new(vec![(
            None,
            Ok(page(vec![owner("1", Some("Noha"), Some("Reda"))], None)),
        )]);
        let directory = OwnerDirectory::new(100, FailurePolicy::KeepPartial);
        assert!(!directory.is_loaded());

        let first = directory.names(&source).await.unwrap();
        assert_eq!(first.name_for("1"), "Noha Reda");
        let second = directory.names(&source).await.unwrap();
        assert_eq!(second.len(), 1);

        assert!(directory.is_loaded());
        assert_eq!(source.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_directory_is_cached() {
        let source = ScriptedOwners::new(vec![
            (
                None,
                Ok(page(vec![owner("1", Some("Noha"), Some("Reda"))], Some("X"))),
            ),
            (Some("X"), Err(500)),
        ]);
        let directory = OwnerDirectory::new(100, FailurePolicy::KeepPartial);

        let names = directory.names(&source).await.unwrap();
        assert!(!names.is_complete());
        directory.names(&source).await.unwrap();

        assert_eq!(source.requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_directory_is_retried() {
        let source = ScriptedOwners::new(vec![(None, Err(401))]);
        let directory = OwnerDirectory::new(100, FailurePolicy::KeepPartial);

        let first = tokio_test::block_on(directory.names(&source));
        assert!(matches!(first, Err(DirectoryError::Empty)));
        assert!(!directory.is_loaded());

        let second = tokio_test::block_on(directory.names(&source));
        assert!(second.is_err());
        assert_eq!(source.requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_abort_policy_reports_fetch_error() {
        let source = ScriptedOwners::new(vec![(None, Err(503))]);
        let directory = OwnerDirectory::new(100, FailurePolicy::Abort);

        match tokio_test::block_on(directory.names(&source)) {
            Err(DirectoryError::Fetch(error)) => assert_eq!(error.status(), Some(503)),
            other => panic!("expected fetch error, got {:?}", other.map(|n| n.len())),
        }
    }
}
