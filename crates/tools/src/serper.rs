//! Serper.dev web search.
//!
//! `POST {api_url}/search` with an `X-API-KEY` header and a `{q, num}` body.
//! Only the `organic` results are used.

use async_trait::async_trait;
use deepsearch_config::SearchConfig;
use deepsearch_core::collaborator::{SearchCollaborator, SearchOutcome};
use deepsearch_core::error::SearchError;
use deepsearch_core::research::SearchResultItem;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A [`SearchCollaborator`] backed by the Serper.dev Google search API.
pub struct SerperSearch {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl SerperSearch {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn try_search(
        &self,
        query: &str,
        result_count: usize,
    ) -> Result<Vec<SearchResultItem>, SearchError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SearchError::NotConfigured("set SERPER_API_KEY or search.api_key".into())
        })?;

        let url = format!("{}/search", self.api_url);
        let body = SerperRequest {
            q: query,
            num: result_count,
        };

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status_code: status.as_u16(),
                message,
            });
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .organic
            .into_iter()
            .take(result_count)
            .map(|r| SearchResultItem {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
                date: r.date,
            })
            .collect())
    }
}

#[async_trait]
impl SearchCollaborator for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str, result_count: usize) -> SearchOutcome {
        match self.try_search(query, result_count).await {
            Ok(results) => {
                debug!(query, count = results.len(), "Serper search succeeded");
                SearchOutcome::ok(results)
            }
            Err(e) => {
                warn!(query, error = %e, "Serper search failed");
                SearchOutcome::failed(e)
            }
        }
    }
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}
