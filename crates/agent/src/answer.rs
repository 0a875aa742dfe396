//! Answer composer — turns gathered evidence into the final answer.
//!
//! The answer is delivered as an [`AnswerStream`]: a finite sequence of text
//! chunks that can be consumed once. Sources are cited as inline markdown
//! links, `[title](url)`.

use async_trait::async_trait;
use deepsearch_core::error::{Error, ProviderError};
use deepsearch_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shown ahead of any answer produced after the step budget ran out.
pub const INCOMPLETE_NOTICE: &str = "> **Note:** research stopped after reaching its step limit. \
This answer is a best effort from the evidence gathered so far and may be incomplete.\n\n";

/// Everything the composer needs.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub question: String,
    pub evidence: String,
    /// The loop was forced to stop; the answer must disclose possible gaps.
    pub is_final: bool,
}

/// Produces the final answer for a terminated research run.
#[async_trait]
pub trait AnswerComposer: Send + Sync {
    async fn compose(&self, request: AnswerRequest) -> Result<AnswerStream, ProviderError>;
}

/// A lazily produced, non-restartable sequence of answer chunks.
pub struct AnswerStream {
    rx: mpsc::Receiver<Result<String, ProviderError>>,
    cancel: Option<CancellationToken>,
    finished: bool,
}

impl AnswerStream {
    pub fn new(rx: mpsc::Receiver<Result<String, ProviderError>>) -> Self {
        Self {
            rx,
            cancel: None,
            finished: false,
        }
    }

    /// A stream that yields `text` as its only chunk.
    pub fn from_text(text: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this cannot fail.
        let _ = tx.try_send(Ok(text.into()));
        Self::new(rx)
    }

    /// Stop yielding chunks once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The next chunk, or `None` when the answer is complete.
    ///
    /// After an error (provider failure or cancellation) the stream is
    /// finished and only returns `None`.
    pub async fn next_chunk(&mut self) -> Option<Result<String, Error>> {
        if self.finished {
            return None;
        }

        let received = match self.cancel.clone() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                next = self.rx.recv() => Some(next),
            },
            None => Some(self.rx.recv().await),
        };

        let Some(next) = received else {
            self.finish();
            return Some(Err(Error::Cancelled));
        };

        match next {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(e)) => {
                self.finish();
                Some(Err(Error::Composer(e)))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Stop for good. Closing the channel makes the producer's next send
    /// fail, which ends the upstream request.
    fn finish(&mut self) {
        self.finished = true;
        self.rx.close();
    }

    /// Drain the stream into one string. Any error discards the partial text.
    pub async fn collect_text(mut self) -> Result<String, Error> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

const SYSTEM_PROMPT: &str = "\
You are a helpful research assistant that answers questions using information gathered from web searches and page scraping.

Give accurate, well-sourced answers using only the information in the context. Cite every source with an inline markdown link.

# Link formatting
Format every link as an inline markdown link using exactly '[link text](URL)'.
- Always use inline links, never reference-style links or footnotes
- Link text should be descriptive
- URLs must be complete and copied exactly from the context
- No space between ']' and '('";

const FINAL_ADDENDUM: &str = "\n\n**IMPORTANT**: You may not have all the information needed for a complete answer. \
Make your best effort with what is available and be open about any limitations or uncertainties.";

/// A composer that streams the answer from a language model.
pub struct LlmAnswerComposer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmAnswerComposer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
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

    fn build_request(&self, request: &AnswerRequest) -> ProviderRequest {
        let mut system = SYSTEM_PROMPT.to_string();
        if request.is_final {
            system.push_str(FINAL_ADDENDUM);
        }
        system.push_str(
            "\n\nAnswer the user's question comprehensively, supporting it with the search and scrape history.",
        );

        let evidence = if request.evidence.is_empty() {
            "No information was gathered."
        } else {
            request.evidence.as_str()
        };
        let user = format!(
            "## Available Context\n\n{evidence}\n\n## User Question\n\n{}",
            request.question
        );

        ProviderRequest::prompt(&self.model, system, user)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

#[async_trait]
impl AnswerComposer for LlmAnswerComposer {
    async fn compose(&self, request: AnswerRequest) -> Result<AnswerStream, ProviderError> {
        let mut upstream = self.provider.stream(self.build_request(&request)).await?;
        let (tx, rx) = mpsc::channel(64);
        let is_final = request.is_final;

        debug!(provider = %self.provider.name(), is_final, "Streaming answer");

        tokio::spawn(async move {
            if is_final && tx.send(Ok(INCOMPLETE_NOTICE.to_string())).await.is_err() {
                return;
            }

            while let Some(chunk) = upstream.recv().await {
                match chunk {
                    Ok(chunk) => {
                        if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                            if tx.send(Ok(content)).await.is_err() {
                                return; // consumer went away
                            }
                        }
                        if chunk.done {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Answer stream failed");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(AnswerStream::new(rx))
    }
}
