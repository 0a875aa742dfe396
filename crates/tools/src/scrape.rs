//! Page scraper — fetches URLs and turns them into readable text.
//!
//! Pages are fetched with bounded concurrency and the results come back in the
//! same order as the input URLs. HTML is rendered to plain text with
//! `html2text`; text-like bodies pass through untouched; anything else is
//! reported as unsupported. Bodies are read only up to a byte cap. Every
//! failure becomes a placeholder record.

use async_trait::async_trait;
use deepsearch_config::ScrapeConfig;
use deepsearch_core::collaborator::ScrapeCollaborator;
use deepsearch_core::error::ScrapeError;
use deepsearch_core::research::ScrapeRecord;
use futures::StreamExt;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// Line width used when rendering HTML to text.
const RENDER_WIDTH: usize = 100;

/// A [`ScrapeCollaborator`] over plain HTTP GET.
pub struct PageScraper {
    client: reqwest::Client,
    timeout: Duration,
    max_content_chars: usize,
    max_body_bytes: usize,
    concurrency: usize,
}

impl PageScraper {
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        max_content_chars: usize,
        max_body_bytes: usize,
        concurrency: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            timeout,
            max_content_chars,
            max_body_bytes: max_body_bytes.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Build from the `[scrape]` section plus the loop's concurrency limit.
    pub fn from_config(config: &ScrapeConfig, concurrency: usize) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
            config.max_content_chars,
            config.max_body_bytes,
            concurrency,
        )
    }

    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ScrapeError::InvalidUrl(url.to_string()));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        let body = decode_body(&self.read_limited(url, response).await?);
        let text = extract_text(&body, content_type.as_deref())?;
        Ok(truncate_chars(text.trim(), self.max_content_chars))
    }

    /// Read at most `max_body_bytes` of the body. The rest is never downloaded.
    async fn read_limited(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, ScrapeError> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            let room = self.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(url = %url, max_bytes = self.max_body_bytes, "Body cut at size limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn map_error(&self, e: reqwest::Error) -> ScrapeError {
        if e.is_timeout() {
            ScrapeError::Timeout(self.timeout.as_secs())
        } else {
            ScrapeError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl ScrapeCollaborator for PageScraper {
    fn name(&self) -> &str {
        "http"
    }

    async fn scrape(&self, urls: &[String]) -> Vec<ScrapeRecord> {
        let pending: Vec<_> = urls.iter().map(|url| self.scrape_one(url)).collect();
        futures::stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

impl PageScraper {
    async fn scrape_one(&self, url: &String) -> ScrapeRecord {
        match self.fetch(url).await {
            Ok(content) => {
                debug!(url = %url, chars = content.len(), "Scraped page");
                ScrapeRecord::ok(url.clone(), content)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Scrape failed");
                ScrapeRecord::failed(url.clone(), e)
            }
        }
    }
}

/// Turn a response body into readable text based on its content type.
fn extract_text(body: &str, content_type: Option<&str>) -> Result<String, ScrapeError> {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or("");

    let looks_like_html = || {
        let head = body.trim_start();
        head.starts_with('<')
    };

    match mime {
        "text/html" | "application/xhtml+xml" => Ok(html_to_text(body)),
        "" if looks_like_html() => Ok(html_to_text(body)),
        "" => Ok(body.to_string()),
        m if m.starts_with("text/") => Ok(body.to_string()),
        m if m == "application/json" || m.ends_with("+json") => Ok(body.to_string()),
        m if m == "application/xml" || m.ends_with("+xml") => Ok(body.to_string()),
        other => Err(ScrapeError::UnsupportedContent(other.to_string())),
    }
}

/// Decode as UTF-8. A character cut off by the size limit is dropped
/// instead of becoming a replacement character.
fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(Cursor::new(html.as_bytes()), RENDER_WIDTH)
        .unwrap_or_else(|_| html.to_string())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
