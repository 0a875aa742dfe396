//! Decision oracle — picks the next research action.
//!
//! [`DecisionOracle`] is the seam: the loop only needs *some* policy that maps
//! the current evidence to one [`Action`]. [`LlmDecisionOracle`] is the
//! model-backed policy; tests substitute scripted ones.

use async_trait::async_trait;
use deepsearch_core::error::DecisionError;
use deepsearch_core::provider::{Provider, ProviderRequest};
use deepsearch_core::research::{Action, ActionDraft};
use std::sync::Arc;
use tracing::debug;

/// Chooses exactly one next action from the current evidence.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        question: &str,
        evidence: &str,
        step_info: &str,
    ) -> Result<Action, DecisionError>;
}

const SYSTEM_PROMPT: &str = "\
You are a research assistant with access to web search and page scraping tools. \
Your job is to choose the single next action based on the current context.

You can take one of three actions:

1. search: search the web when you need more facts, recent updates, or specific details that are not in the context yet.
2. scrape: fetch the full content of specific URLs when search snippets are not enough.
3. answer: answer the user's question when the gathered information is sufficient.

## Decision guidelines

Search when:
- you need more recent information
- key facts or details are missing
- information needs to be verified
- you need specific examples or cases

Scrape when:
- search results contain relevant URLs
- you need the full content of a page
- the snippets are not sufficient for an answer

Answer when:
- you have comprehensive information to answer the question
- enough context has been gathered from searches and scrapes
- you can give a complete and accurate response

Respond with a single JSON object and nothing else:
{\"type\": \"search\" | \"scrape\" | \"answer\", \"query\": string (required for search), \"urls\": [string] (required for scrape)}";

/// An oracle backed by a language model in JSON mode.
pub struct LlmDecisionOracle {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmDecisionOracle {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn system_prompt() -> String {
        let today = chrono::Utc::now().format("%Y-%m-%d");
        format!(
            "{SYSTEM_PROMPT}\n\nToday's date is {today}. Prefer recent sources when the question is time-sensitive."
        )
    }

    fn user_prompt(question: &str, evidence: &str, step_info: &str) -> String {
        let evidence = if evidence.is_empty() {
            "No searches or scrapes yet."
        } else {
            evidence
        };
        format!(
            "## Current Context\n\n{step_info}\n\n{evidence}\n\n## User Question\n\n{question}\n\n\
             Based on the current context, choose the next action. If you search, give a specific \
             and targeted query. If you scrape, list the URLs to fetch. If you answer, you are ready \
             to write the final response."
        )
    }
}

#[async_trait]
impl DecisionOracle for LlmDecisionOracle {
    async fn decide(
        &self,
        question: &str,
        evidence: &str,
        step_info: &str,
    ) -> Result<Action, DecisionError> {
        let request = ProviderRequest::prompt(
            &self.model,
            Self::system_prompt(),
            Self::user_prompt(question, evidence, step_info),
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .with_json_mode();

        let response = self.provider.complete(request).await?;
        let action = parse_action(&response.message.content)?;
        debug!(provider = %self.provider.name(), action = %action.kind(), "Oracle decided");
        Ok(action)
    }
}

/// Parse model output into a validated [`Action`].
///
/// Tolerates code fences and prose around the JSON object.
pub fn parse_action(raw: &str) -> Result<Action, DecisionError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| DecisionError::Malformed(format!("no JSON object in: {}", preview(raw))))?;

    let draft: ActionDraft = serde_json::from_str(json)
        .map_err(|e| DecisionError::Malformed(format!("{e} in: {}", preview(json))))?;

    draft.validate()
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn preview(s: &str) -> String {
    const MAX: usize = 200;
    let trimmed = s.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
