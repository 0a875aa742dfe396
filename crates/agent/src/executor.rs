//! Action executor — runs a search or scrape and records what came back.
//!
//! The context is only touched after the collaborator call has completed, so
//! dropping an in-flight `execute` future (cancellation) leaves it unchanged.

use chrono::Utc;
use deepsearch_core::collaborator::{ScrapeCollaborator, SearchCollaborator};
use deepsearch_core::event::{DomainEvent, EventBus};
use deepsearch_core::research::{Action, ScrapeRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::context::ResearchContext;

/// What one `execute` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    Searched {
        query: String,
        result_count: usize,
        failed: bool,
    },
    Scraped {
        url_count: usize,
        failed_count: usize,
    },
    /// `Answer` has nothing to execute.
    Skipped,
}

/// Dispatches actions to the search and scrape collaborators.
pub struct ActionExecutor {
    search: Arc<dyn SearchCollaborator>,
    scrape: Arc<dyn ScrapeCollaborator>,
    result_count: usize,
    events: Arc<EventBus>,
}

impl ActionExecutor {
    pub fn new(
        search: Arc<dyn SearchCollaborator>,
        scrape: Arc<dyn ScrapeCollaborator>,
        result_count: usize,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            search,
            scrape,
            result_count,
            events,
        }
    }

    pub(crate) fn set_event_bus(&mut self, events: Arc<EventBus>) {
        self.events = events;
    }

    pub async fn execute(&self, action: &Action, ctx: &mut ResearchContext) -> ExecutionReport {
        match action {
            Action::Search { query } => self.run_search(query, ctx).await,
            Action::Scrape { urls } => self.run_scrape(urls, ctx).await,
            Action::Answer => ExecutionReport::Skipped,
        }
    }

    async fn run_search(&self, query: &str, ctx: &mut ResearchContext) -> ExecutionReport {
        let start = Instant::now();
        let outcome = self.search.search(query, self.result_count).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let failed = outcome.is_failure();
        let result_count = outcome.results.len();

        self.events.publish(DomainEvent::SearchCompleted {
            query: query.to_string(),
            result_count,
            failed,
            duration_ms,
            timestamp: Utc::now(),
        });

        match outcome.error {
            // A failed search leaves no trace in the evidence.
            Some(e) => {
                warn!(
                    collaborator = %self.search.name(),
                    query,
                    error = %e,
                    "Search failed, continuing without results"
                );
            }
            None => {
                debug!(query, result_count, duration_ms, "Search recorded");
                ctx.record_query(query, outcome.results);
            }
        }

        ExecutionReport::Searched {
            query: query.to_string(),
            result_count,
            failed,
        }
    }

    async fn run_scrape(&self, urls: &[String], ctx: &mut ResearchContext) -> ExecutionReport {
        let start = Instant::now();
        let returned = self.scrape.scrape(urls).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if returned.len() != urls.len() {
            warn!(
                collaborator = %self.scrape.name(),
                requested = urls.len(),
                returned = returned.len(),
                "Scrape collaborator returned a mismatched record count"
            );
        }
        let records = align_records(urls, returned);

        let failed_count = records.iter().filter(|r| r.failed).count();
        if failed_count > 0 {
            warn!(failed_count, url_count = urls.len(), "Some pages failed to scrape");
        }

        self.events.publish(DomainEvent::ScrapeCompleted {
            url_count: records.len(),
            failed_count,
            duration_ms,
            timestamp: Utc::now(),
        });

        let url_count = records.len();
        debug!(url_count, failed_count, duration_ms, "Scrape recorded");
        ctx.record_scrape(records);

        ExecutionReport::Scraped {
            url_count,
            failed_count,
        }
    }
}

/// One record per requested URL, in request order. URLs the collaborator
/// returned nothing for become failures; unrequested records are dropped.
fn align_records(urls: &[String], returned: Vec<ScrapeRecord>) -> Vec<ScrapeRecord> {
    let mut pool: Vec<Option<ScrapeRecord>> = returned.into_iter().map(Some).collect();
    urls.iter()
        .map(|url| {
            pool.iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|r| &r.url == url))
                .and_then(Option::take)
                .unwrap_or_else(|| ScrapeRecord::failed(url.clone(), "no result returned"))
        })
        .collect()
}
