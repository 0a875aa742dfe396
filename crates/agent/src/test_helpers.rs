//! Shared test doubles for the research loop.

use async_trait::async_trait;
use deepsearch_core::collaborator::{ScrapeCollaborator, SearchCollaborator, SearchOutcome};
use deepsearch_core::error::{DecisionError, ProviderError, SearchError};
use deepsearch_core::message::Message;
use deepsearch_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use deepsearch_core::research::{Action, ScrapeRecord, SearchResultItem};
use std::sync::Mutex;
use std::time::Duration;

use crate::answer::{AnswerComposer, AnswerRequest, AnswerStream};
use crate::decision::DecisionOracle;

/// A mock provider that returns a sequence of scripted responses.
///
/// Once the script is exhausted every call fails with an `ApiError`.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            });
        }
        Ok(responses.remove(0))
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// An oracle that plays back a fixed list of decisions and records what it saw.
pub struct ScriptedOracle {
    script: Mutex<Vec<Result<Action, DecisionError>>>,
    fallback: Option<Action>,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Result<Action, DecisionError>>) -> Self {
        Self {
            script: Mutex::new(script),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Returns `action` forever.
    pub fn always(action: Action) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            fallback: Some(action),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// `(evidence, step_info)` for every call, in order.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(
        &self,
        _question: &str,
        evidence: &str,
        step_info: &str,
    ) -> Result<Action, DecisionError> {
        self.seen
            .lock()
            .unwrap()
            .push((evidence.to_string(), step_info.to_string()));

        let mut script = self.script.lock().unwrap();
        if !script.is_empty() {
            return script.remove(0);
        }
        self.fallback
            .clone()
            .ok_or_else(|| DecisionError::Malformed("script exhausted".into()))
    }
}

/// Search double: fixed results, an unreachable provider, or a hang.
pub enum CannedSearch {
    Results(Vec<SearchResultItem>),
    Unreachable,
    Hang,
}

impl CannedSearch {
    pub fn masters() -> Self {
        Self::Results(vec![SearchResultItem {
            title: "Scottie Scheffler wins 2024 Masters".into(),
            url: "https://masters.example/2024".into(),
            snippet: "Scottie Scheffler won the 2024 Masters Tournament by four strokes.".into(),
            date: Some("Apr 14, 2024".into()),
        }])
    }

    pub fn unreachable() -> Self {
        Self::Unreachable
    }
}

#[async_trait]
impl SearchCollaborator for CannedSearch {
    fn name(&self) -> &str {
        "canned"
    }

    async fn search(&self, _query: &str, result_count: usize) -> SearchOutcome {
        match self {
            Self::Results(results) => {
                SearchOutcome::ok(results.iter().take(result_count).cloned().collect())
            }
            Self::Unreachable => {
                SearchOutcome::failed(SearchError::Request("connection refused".into()))
            }
            Self::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                SearchOutcome::default()
            }
        }
    }
}

/// Scrape double: URLs containing "fail" fail, everything else succeeds.
pub struct CannedScrape;

#[async_trait]
impl ScrapeCollaborator for CannedScrape {
    fn name(&self) -> &str {
        "canned"
    }

    async fn scrape(&self, urls: &[String]) -> Vec<ScrapeRecord> {
        urls.iter()
            .map(|url| {
                if url.contains("fail") {
                    ScrapeRecord::failed(url.clone(), "HTTP status 503")
                } else {
                    ScrapeRecord::ok(url.clone(), format!("content of {url}"))
                }
            })
            .collect()
    }
}

/// A composer that records its requests and echoes a fixed answer.
pub struct RecordingComposer {
    answer: String,
    fail: bool,
    requests: Mutex<Vec<AnswerRequest>>,
}

impl RecordingComposer {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.into(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn requests(&self) -> Vec<AnswerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerComposer for RecordingComposer {
    async fn compose(&self, request: AnswerRequest) -> Result<AnswerStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(ProviderError::Network("composer down".into()));
        }
        Ok(AnswerStream::from_text(self.answer.clone()))
    }
}
