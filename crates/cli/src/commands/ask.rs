//! `deepsearch ask` — research a question and print the answer.

use deepsearch_agent::{
    ActionExecutor, LlmAnswerComposer, LlmDecisionOracle, ResearchLoop, ResearchOutcome,
};
use deepsearch_config::AppConfig;
use deepsearch_core::event::{DomainEvent, EventBus};
use deepsearch_providers::router::build_from_config;
use deepsearch_tools::{PageScraper, SerperSearch};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct AskOptions {
    pub question: String,
    pub max_steps: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub stream: bool,
    pub verbose: bool,
}

pub async fn run(opts: AskOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No LLM API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
        eprintln!("    DEEPSEARCH_API_KEY=...            (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    if !config.has_search_key() {
        warn!("No Serper API key (SERPER_API_KEY); every search will come back empty");
    }

    let events = Arc::new(EventBus::default());
    let mut research = build_research_loop(&config, events.clone())?;
    if let Some(max_steps) = opts.max_steps {
        research = research.with_max_steps(max_steps);
    }

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, opts.timeout_secs);
    if opts.verbose {
        spawn_progress_printer(&events);
    }

    let outcome = match research.run(&opts.question, cancel.clone()).await {
        Err(e) if e.is_cancelled() => return Err(cancelled_message(opts.timeout_secs)),
        other => other?,
    };

    let printed = if opts.stream {
        stream_answer(outcome).await
    } else {
        outcome.into_text().await.map(|text| println!("{text}"))
    };

    match printed {
        Err(e) if e.is_cancelled() => {
            println!();
            Err(cancelled_message(opts.timeout_secs))
        }
        other => Ok(other?),
    }
}

/// Wire the full research stack from configuration.
pub(crate) fn build_research_loop(
    config: &AppConfig,
    events: Arc<EventBus>,
) -> Result<ResearchLoop, Box<dyn std::error::Error>> {
    let router = build_from_config(config);
    let provider = router.require_default()?;

    let oracle = LlmDecisionOracle::new(provider.clone(), &config.default_model)
        .with_temperature(config.research.decision_temperature);
    let composer = LlmAnswerComposer::new(provider, &config.default_model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    let executor = ActionExecutor::new(
        Arc::new(SerperSearch::from_config(&config.search)),
        Arc::new(PageScraper::from_config(
            &config.scrape,
            config.research.scrape_concurrency,
        )),
        config.research.search_result_count,
        events.clone(),
    );

    Ok(
        ResearchLoop::new(Arc::new(oracle), executor, Arc::new(composer))
            .with_max_steps(config.research.max_steps)
            .with_event_bus(events),
    )
}

fn spawn_cancel_triggers(cancel: &CancellationToken, timeout_secs: Option<u64>) {
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => on_timeout.cancel(),
                _ = on_timeout.cancelled() => {}
            }
        });
    }
}

fn spawn_progress_printer(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let Some(line) = progress_line(&event) {
                eprintln!("  {line}");
            }
        }
    });
}

fn progress_line(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::ResearchStarted { max_steps, .. } => {
            Some(format!("Researching (up to {max_steps} steps)..."))
        }
        DomainEvent::ActionDecided {
            step,
            action,
            detail,
            ..
        } => Some(if detail.is_empty() {
            format!("[step {step}] {action}")
        } else {
            format!("[step {step}] {action}: {detail}")
        }),
        DomainEvent::SearchCompleted {
            result_count,
            failed,
            duration_ms,
            ..
        } => Some(if *failed {
            format!("  search failed ({duration_ms} ms)")
        } else {
            format!("  {result_count} results ({duration_ms} ms)")
        }),
        DomainEvent::ScrapeCompleted {
            url_count,
            failed_count,
            duration_ms,
            ..
        } => Some(format!(
            "  {} of {url_count} pages fetched ({duration_ms} ms)",
            url_count.saturating_sub(*failed_count)
        )),
        DomainEvent::ResearchTerminated { forced: true, .. } => {
            Some("Step budget exhausted, composing best-effort answer".into())
        }
        DomainEvent::ResearchTerminated { .. } => None,
    }
}

async fn stream_answer(mut outcome: ResearchOutcome) -> Result<(), deepsearch_core::Error> {
    let mut stdout = std::io::stdout();
    while let Some(chunk) = outcome.answer.next_chunk().await {
        print!("{}", chunk?);
        let _ = stdout.flush();
    }
    println!();
    Ok(())
}

fn cancelled_message(timeout_secs: Option<u64>) -> Box<dyn std::error::Error> {
    match timeout_secs {
        Some(secs) => format!("Research cancelled (interrupted or {secs}s timeout reached)").into(),
        None => "Research cancelled".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deepsearch_core::research::ActionKind;

    #[test]
    fn progress_lines_describe_each_phase() {
        let decided = DomainEvent::ActionDecided {
            step: 2,
            action: ActionKind::Search,
            detail: "2024 Masters winner".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(
            progress_line(&decided).unwrap(),
            "[step 2] search: 2024 Masters winner"
        );

        let scraped = DomainEvent::ScrapeCompleted {
            url_count: 3,
            failed_count: 1,
            duration_ms: 12,
            timestamp: Utc::now(),
        };
        assert_eq!(
            progress_line(&scraped).unwrap(),
            "  2 of 3 pages fetched (12 ms)"
        );

        let answered = DomainEvent::ResearchTerminated {
            steps: 1,
            forced: false,
            timestamp: Utc::now(),
        };
        assert!(progress_line(&answered).is_none());
    }

    #[test]
    fn builds_stack_from_default_config() {
        let config = AppConfig::default();
        let research = build_research_loop(&config, Arc::new(EventBus::default()));
        assert!(research.is_ok());
    }

    #[test]
    fn unknown_provider_fails_to_build() {
        let config = AppConfig {
            default_provider: "nowhere".into(),
            ..AppConfig::default()
        };
        assert!(build_research_loop(&config, Arc::new(EventBus::default())).is_err());
    }

    #[test]
    fn cancellation_message_mentions_timeout() {
        assert!(cancelled_message(Some(30)).to_string().contains("30s"));
        assert_eq!(cancelled_message(None).to_string(), "Research cancelled");
    }
}
