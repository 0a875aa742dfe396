//! Error types for the DeepSearch domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Only some of these are fatal to a research run:
//! - [`DecisionError`] and composer failures abort the run
//! - [`SearchError`] and [`ScrapeError`] are absorbed as reduced evidence
//! - [`Error::Cancelled`] is caller-initiated

use thiserror::Error;

/// The top-level error type for all DeepSearch operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Decision oracle ---
    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    // --- Answer composer ---
    #[error("Answer composition failed: {0}")]
    Composer(ProviderError),

    // --- Caller-initiated ---
    #[error("Research cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error was caused by cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether a retry at the provider boundary could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// The decision oracle returned something that is not a valid action.
#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("Oracle call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed action: {0}")]
    Malformed(String),

    #[error("Action '{action}' is missing required field '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
}

/// A search provider failure. Never fatal: degrades to an empty result set.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Search request failed: {0}")]
    Request(String),

    #[error("Search provider returned status {status_code}: {message}")]
    Status { status_code: u16, message: String },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

/// A single-URL scrape failure. Never fatal: becomes placeholder content.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composer_error_displays_provider_detail() {
        let err = Error::Composer(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn decision_error_names_missing_field() {
        let err = Error::Decision(DecisionError::MissingField {
            action: "search",
            field: "query",
        });
        let text = err.to_string();
        assert!(text.contains("search"));
        assert!(text.contains("query"));
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(
            ProviderError::ApiError {
                status_code: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::ApiError {
                status_code: 400,
                message: "bad request".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::AuthenticationFailed("nope".into()).is_transient());
    }

    #[test]
    fn cancelled_is_distinguishable() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Composer(ProviderError::Timeout("5s".into())).is_cancelled());
    }
}
