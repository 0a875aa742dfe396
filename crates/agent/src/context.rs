//! Research context — the append-only evidence log for one question.
//!
//! The loop owns exactly one [`ResearchContext`] per question. Records are
//! only ever appended, so every rendering is a pure function of what has been
//! gathered so far.

use deepsearch_core::research::{QueryRecord, ScrapeRecord, SearchResultItem};

/// Accumulated evidence plus the step counter for a single research run.
#[derive(Debug, Clone)]
pub struct ResearchContext {
    question: String,
    step: u32,
    max_steps: u32,
    queries: Vec<QueryRecord>,
    scrapes: Vec<ScrapeRecord>,
}

impl ResearchContext {
    pub fn new(question: impl Into<String>, max_steps: u32) -> Self {
        Self {
            question: question.into(),
            step: 0,
            max_steps,
            queries: Vec::new(),
            scrapes: Vec::new(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn queries(&self) -> &[QueryRecord] {
        &self.queries
    }

    pub fn scrapes(&self) -> &[ScrapeRecord] {
        &self.scrapes
    }

    /// Append one query and its results. Repeated queries are kept as-is.
    pub fn record_query(&mut self, query: impl Into<String>, results: Vec<SearchResultItem>) {
        self.queries.push(QueryRecord {
            query: query.into(),
            results,
        });
    }

    /// Append scrape records in the order given.
    pub fn record_scrape(&mut self, records: impl IntoIterator<Item = ScrapeRecord>) {
        self.scrapes.extend(records);
    }

    /// Advance the step counter. Never moves past `max_steps`.
    pub fn increment_step(&mut self) {
        if self.step < self.max_steps {
            self.step += 1;
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step >= self.max_steps
    }

    /// Render all evidence: search history first, then scrape history.
    /// Empty sections are left out entirely.
    pub fn render_evidence(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.queries.is_empty() {
            parts.push("## Search History".into());
            parts.push(
                self.queries
                    .iter()
                    .map(render_query)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            );
        }

        if !self.scrapes.is_empty() {
            parts.push("## Scrape History".into());
            parts.push(
                self.scrapes
                    .iter()
                    .map(render_scrape)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            );
        }

        parts.join("\n\n")
    }

    pub fn render_step_info(&self) -> String {
        format!("Current step: {}/{}", self.step, self.max_steps)
    }
}

fn render_query(record: &QueryRecord) -> String {
    let mut lines = vec![format!("## Query: \"{}\"", record.query)];
    lines.extend(record.results.iter().map(render_result));
    lines.join("\n\n")
}

fn render_result(item: &SearchResultItem) -> String {
    let date = item.date.as_deref().unwrap_or("Unknown date");
    format!(
        "### {date} - {}\n\n{}\n\n{}",
        item.title, item.url, item.snippet
    )
}

fn render_scrape(record: &ScrapeRecord) -> String {
    format!(
        "## Scrape: \"{}\"\n\n<scrape_result>\n\n{}\n\n</scrape_result>",
        record.url, record.content
    )
}
