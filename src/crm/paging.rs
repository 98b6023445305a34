//! Cursor-following pagination over CRM collections.
//!
//! Both the owners and the deals endpoints return `paging.next.after` while
//! more results remain. [`follow_cursor`] drives a page-fetching closure until
//! the cursor runs out or a request fails, and reports the outcome as a
//! [`Fetched`] value so callers can tell complete data from partial or failed
//! fetches.

use crate::crm::CrmError;
use crate::models::{Completeness, Page};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

/// What to do with already-fetched pages when a later page request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop paginating and keep what was collected so far.
    KeepPartial,
    /// Stop paginating and discard everything.
    Abort,
}

/// Outcome of a paginated fetch.
#[derive(Debug)]
pub enum Fetched<T> {
    /// Every page was fetched.
    Complete(T),
    /// Pagination stopped early; `data` covers the first `pages` pages.
    Partial {
        data: T,
        pages: usize,
        error: CrmError,
    },
    /// Pagination failed and nothing usable was kept.
    Failed(CrmError),
}

impl<T> Fetched<T> {
    pub fn map<U, F>(self, f: F) -> Fetched<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Fetched::Complete(data) => Fetched::Complete(f(data)),
            Fetched::Partial { data, pages, error } => Fetched::Partial {
                data: f(data),
                pages,
                error,
            },
            Fetched::Failed(error) => Fetched::Failed(error),
        }
    }

    pub fn completeness(&self) -> Completeness {
        match self {
            Fetched::Complete(_) => Completeness::Complete,
            Fetched::Partial { .. } => Completeness::Partial,
            Fetched::Failed(_) => Completeness::Failed,
        }
    }

    /// The fetched data, if any was kept.
    pub fn data(&self) -> Option<&T> {
        match self {
            Fetched::Complete(data) | Fetched::Partial { data, .. } => Some(data),
            Fetched::Failed(_) => None,
        }
    }

    /// Splits into the kept data (if any) and the error (if any).
    pub fn into_parts(self) -> (Option<T>, Option<CrmError>) {
        match self {
            Fetched::Complete(data) => (Some(data), None),
            Fetched::Partial { data, error, .. } => (Some(data), Some(error)),
            Fetched::Failed(error) => (None, Some(error)),
        }
    }
}

/// Fetch pages until no cursor is returned, applying `policy` on failure.
///
/// `fetch` receives the cursor for the page to fetch (`None` for the first).
pub async fn follow_cursor<T, F, Fut>(
    resource: &str,
    policy: FailurePolicy,
    mut fetch: F,
) -> Fetched<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, CrmError>>,
{
    let mut items = Vec::new();
    let mut after: Option<String> = None;
    let mut pages = 0usize;

    loop {
        match fetch(after.take()).await {
            Ok(page) => {
                pages += 1;
                let next = page.next_cursor().map(str::to_string);
                debug!(
                    "Fetched {} page {} ({} records)",
                    resource,
                    pages,
                    page.results.len()
                );
                items.extend(page.results);

                match next {
                    Some(cursor) => after = Some(cursor),
                    None => return Fetched::Complete(items),
                }
            }
            Err(error) => {
                warn!(
                    "Failed to load {} page {}: {}",
                    resource,
                    pages + 1,
                    error
                );
                return match policy {
                    FailurePolicy::KeepPartial => Fetched::Partial {
                        data: items,
                        pages,
                        error,
                    },
                    FailurePolicy::Abort => Fetched::Failed(error),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NextPage, Paging};
    use std::collections::VecDeque;

    fn page(items: &[u32], after: Option<&str>) -> Page<u32> {
        Page {
            results: items.to_vec(),
            paging: after.map(|a| Paging {
                next: Some(NextPage {
                    after: Some(a.to_string()),
                }),
            }),
        }
    }

    fn server_error() -> CrmError {
        CrmError::Status {
            status: 500,
            body: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_follows_cursor_until_exhausted() {
        let mut responses = VecDeque::from(vec![
            Ok(page(&[1, 2], Some("X"))),
            Ok(page(&[3], Some("Y"))),
            Ok(page(&[4], None)),
        ]);
        let mut seen = Vec::new();

        let fetched = follow_cursor("numbers", FailurePolicy::Abort, |after| {
            seen.push(after);
            let next = responses.pop_front().unwrap();
            async move { next }
        })
        .await;

        assert_eq!(fetched.completeness(), Completeness::Complete);
        assert_eq!(fetched.data(), Some(&vec![1, 2, 3, 4]));
        assert_eq!(
            seen,
            vec![None, Some("X".to_string()), Some("Y".to_string())]
        );
    }

    #[tokio::test]
    async fn test_keep_partial_on_failure() {
        let mut responses = VecDeque::from(vec![Ok(page(&[1, 2], Some("X"))), Err(server_error())]);

        let fetched = follow_cursor("numbers", FailurePolicy::KeepPartial, |_| {
            let next = responses.pop_front().unwrap();
            async move { next }
        })
        .await;

        match fetched {
            Fetched::Partial { data, pages, error } => {
                assert_eq!(data, vec![1, 2]);
                assert_eq!(pages, 1);
                assert_eq!(error.status(), Some(500));
            }
            other => panic!("expected partial result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_abort_discards_collected_pages() {
        let mut responses = VecDeque::from(vec![Ok(page(&[1, 2], Some("X"))), Err(server_error())]);

        let fetched = follow_cursor("numbers", FailurePolicy::Abort, |_| {
            let next = responses.pop_front().unwrap();
            async move { next }
        })
        .await;

        assert_eq!(fetched.completeness(), Completeness::Failed);
        let (data, error) = fetched.into_parts();
        assert!(data.is_none());
        assert_eq!(error.and_then(|e| e.status()), Some(500));
    }

    #[tokio::test]
    async fn test_first_page_failure_with_keep_partial_is_empty() {
        let fetched: Fetched<Vec<u32>> =
            follow_cursor("numbers", FailurePolicy::KeepPartial, |_| async {
                Err(server_error())
            })
            .await;

        let (data, error) = fetched.into_parts();
        assert_eq!(data, Some(vec![]));
        assert!(error.is_some());
    }

    #[test]
    fn test_map_preserves_outcome() {
        let partial = Fetched::Partial {
            data: vec![1, 2, 3],
            pages: 2,
            error: server_error(),
        };
        let mapped = partial.map(|v| v.len());
        assert_eq!(mapped.completeness(), Completeness::Partial);
        assert_eq!(mapped.data(), Some(&3));
    }

    #[test]
    fn test_policy_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: FailurePolicy,
        }
        let w: Wrapper = toml::from_str(r#"policy = "keep-partial""#).unwrap();
        assert_eq!(w.policy, FailurePolicy::KeepPartial);
        let w: Wrapper = toml::from_str(r#"policy = "abort""#).unwrap();
        assert_eq!(w.policy, FailurePolicy::Abort);
    }
}
