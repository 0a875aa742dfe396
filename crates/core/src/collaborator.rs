//! Collaborator traits — the abstraction over web search and page retrieval.
//!
//! Neither trait can fail from the caller's point of view: search failures come
//! back as an empty [`SearchOutcome`] carrying the error, and scrape failures come
//! back as placeholder [`ScrapeRecord`]s. The research loop keeps going either way.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SearchError;
use crate::research::{ScrapeRecord, SearchResultItem};

/// What a search collaborator hands back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    /// Ordered results; empty when the provider failed.
    pub results: Vec<SearchResultItem>,

    /// Set when the provider failed and `results` is empty because of it.
    #[serde(skip)]
    pub error: Option<SearchError>,
}

impl SearchOutcome {
    pub fn ok(results: Vec<SearchResultItem>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    pub fn failed(error: SearchError) -> Self {
        Self {
            results: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Web search capability.
#[async_trait]
pub trait SearchCollaborator: Send + Sync {
    /// A short name for logs (e.g., "serper").
    fn name(&self) -> &str;

    /// Run `query`, asking for at most `result_count` results.
    async fn search(&self, query: &str, result_count: usize) -> SearchOutcome;
}

/// Page retrieval capability.
#[async_trait]
pub trait ScrapeCollaborator: Send + Sync {
    /// A short name for logs (e.g., "http").
    fn name(&self) -> &str;

    /// Fetch every URL. The returned records line up one-to-one with `urls`.
    async fn scrape(&self, urls: &[String]) -> Vec<ScrapeRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fixed-result collaborator for unit tests.
    struct CannedSearch;

    #[async_trait]
    impl SearchCollaborator for CannedSearch {
        fn name(&self) -> &str {
            "canned"
        }

        async fn search(&self, query: &str, result_count: usize) -> SearchOutcome {
            if query == "fail" {
                return SearchOutcome::failed(SearchError::Request("unreachable".into()));
            }
            SearchOutcome::ok(
                (0..result_count)
                    .map(|i| SearchResultItem {
                        title: format!("{query} #{i}"),
                        url: format!("https://example.com/{i}"),
                        snippet: String::new(),
                        date: None,
                    })
                    .collect(),
            )
        }
    }

    #[tokio::test]
    async fn search_honours_count() {
        let outcome = CannedSearch.search("rust", 3).await;
        assert_eq!(outcome.results.len(), 3);
        assert!(!outcome.is_failure());
    }

    #[tokio::test]
    async fn failed_search_is_empty() {
        let outcome = CannedSearch.search("fail", 3).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.is_failure());
    }
}
