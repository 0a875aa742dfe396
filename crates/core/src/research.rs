//! Research domain types: evidence records and the action sum type.

use serde::{Deserialize, Serialize};

use crate::error::DecisionError;

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A search query together with the results it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub results: Vec<SearchResultItem>,
}

/// The outcome of fetching one URL.
///
/// `content` holds either the page text or a human-readable error placeholder;
/// scrape failures are data, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRecord {
    pub url: String,
    pub content: String,
    /// Whether `content` is an error placeholder rather than page text.
    #[serde(default)]
    pub failed: bool,
}

impl ScrapeRecord {
    pub fn ok(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            failed: false,
        }
    }

    pub fn failed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        let url = url.into();
        let content = format!("Error scraping {url}: {reason}");
        Self {
            url,
            content,
            failed: true,
        }
    }
}

/// The single next step chosen by the decision oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Search the web for more information.
    Search { query: String },
    /// Fetch the full content of pages.
    Scrape { urls: Vec<String> },
    /// Stop researching and compose the answer.
    Answer,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Search { .. } => ActionKind::Search,
            Self::Scrape { .. } => ActionKind::Scrape,
            Self::Answer => ActionKind::Answer,
        }
    }
}

/// The discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Scrape,
    Answer,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Scrape => "scrape",
            Self::Answer => "answer",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flat wire shape models produce: a type tag plus optional fields.
///
/// Models handle a single object with optional fields more reliably than a
/// tagged union, so the oracle asks for this and [`ActionDraft::validate`]
/// narrows it into an [`Action`].
#[derive(Debug, Clone, Deserialize)]
pub struct ActionDraft {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub urls: Option<Vec<String>>,
}

impl ActionDraft {
    /// Check the variant-specific required fields. Fields belonging to other
    /// variants are ignored.
    pub fn validate(self) -> Result<Action, DecisionError> {
        match self.kind {
            ActionKind::Search => {
                let query = self
                    .query
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .ok_or(DecisionError::MissingField {
                        action: "search",
                        field: "query",
                    })?;
                Ok(Action::Search { query })
            }
            ActionKind::Scrape => {
                let urls: Vec<String> = self
                    .urls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .collect();
                if urls.is_empty() {
                    return Err(DecisionError::MissingField {
                        action: "scrape",
                        field: "urls",
                    });
                }
                Ok(Action::Scrape { urls })
            }
            ActionKind::Answer => Ok(Action::Answer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(json: &str) -> ActionDraft {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn search_requires_query() {
        let err = draft(r#"{"type":"search"}"#).validate().unwrap_err();
        assert!(matches!(
            err,
            DecisionError::MissingField {
                field: "query",
                ..
            }
        ));

        let err = draft(r#"{"type":"search","query":"   "}"#)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DecisionError::MissingField { .. }));
    }

    #[test]
    fn search_trims_query() {
        let action = draft(r#"{"type":"search","query":"  2024 Masters winner "}"#)
            .validate()
            .unwrap();
        assert_eq!(
            action,
            Action::Search {
                query: "2024 Masters winner".into()
            }
        );
    }

    #[test]
    fn scrape_drops_blank_urls() {
        let action = draft(r#"{"type":"scrape","urls":["https://a.example", " ", ""]}"#)
            .validate()
            .unwrap();
        assert_eq!(
            action,
            Action::Scrape {
                urls: vec!["https://a.example".into()]
            }
        );
    }

    #[test]
    fn scrape_requires_urls() {
        assert!(draft(r#"{"type":"scrape"}"#).validate().is_err());
        assert!(draft(r#"{"type":"scrape","urls":[]}"#).validate().is_err());
    }

    #[test]
    fn answer_ignores_other_fields() {
        let action = draft(r#"{"type":"answer","query":"ignored","urls":["x"]}"#)
            .validate()
            .unwrap();
        assert_eq!(action, Action::Answer);
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        assert!(serde_json::from_str::<ActionDraft>(r#"{"type":"browse"}"#).is_err());
    }

    #[test]
    fn failed_scrape_record_is_placeholder() {
        let record = ScrapeRecord::failed("https://x.example", "HTTP status 404");
        assert!(record.failed);
        assert!(record.content.contains("https://x.example"));
        assert!(record.content.contains("404"));
    }

    #[test]
    fn action_serializes_tagged() {
        let json = serde_json::to_string(&Action::Answer).unwrap();
        assert_eq!(json, r#"{"type":"answer"}"#);
        assert_eq!(Action::Answer.kind().to_string(), "answer");
    }
}
