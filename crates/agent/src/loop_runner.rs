//! The research loop state machine.
//!
//! `Init → Deciding ⇄ Executing → Terminated(Answered | ForcedAnswered)`
//!
//! Every await is raced against the caller's cancellation token. A cancelled
//! run returns [`Error::Cancelled`], never a partial answer.

use chrono::Utc;
use deepsearch_core::error::Error;
use deepsearch_core::event::{DomainEvent, EventBus};
use deepsearch_core::research::Action;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::answer::{AnswerComposer, AnswerRequest, AnswerStream};
use crate::context::ResearchContext;
use crate::decision::DecisionOracle;
use crate::executor::ActionExecutor;

/// How a research run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The oracle decided it had enough evidence.
    Answered,
    /// The step budget ran out first.
    ForcedAnswered,
}

impl Termination {
    pub fn is_final(self) -> bool {
        matches!(self, Self::ForcedAnswered)
    }
}

#[derive(Debug)]
enum LoopState {
    Init,
    Deciding,
    Executing(Action),
    Terminated(Termination),
}

/// The result of a completed run. The answer itself is still streaming.
#[derive(Debug)]
pub struct ResearchOutcome {
    pub termination: Termination,
    /// Search/scrape actions executed.
    pub steps: u32,
    /// Oracle calls made.
    pub decisions: u32,
    pub answer: AnswerStream,
}

impl ResearchOutcome {
    /// Wait for the whole answer.
    pub async fn into_text(self) -> Result<String, Error> {
        self.answer.collect_text().await
    }
}

/// Drives oracle → executor cycles for one question at a time.
pub struct ResearchLoop {
    oracle: Arc<dyn DecisionOracle>,
    executor: ActionExecutor,
    composer: Arc<dyn AnswerComposer>,
    max_steps: u32,
    event_bus: Arc<EventBus>,
}

impl ResearchLoop {
    pub fn new(
        oracle: Arc<dyn DecisionOracle>,
        executor: ActionExecutor,
        composer: Arc<dyn AnswerComposer>,
    ) -> Self {
        Self {
            oracle,
            executor,
            composer,
            max_steps: 10,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Set the number of search/scrape actions allowed before a forced answer.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Publish loop and executor events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.executor.set_event_bus(bus.clone());
        self.event_bus = bus;
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Research `question` and start composing the answer.
    pub async fn run(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<ResearchOutcome, Error> {
        let run_id = Uuid::new_v4();
        let mut ctx = ResearchContext::new(question, self.max_steps);
        let mut decisions: u32 = 0;
        let mut state = LoopState::Init;

        let termination = loop {
            state = match state {
                LoopState::Init => {
                    info!(%run_id, max_steps = self.max_steps, "Research started");
                    self.event_bus.publish(DomainEvent::ResearchStarted {
                        question: question.to_string(),
                        max_steps: self.max_steps,
                        timestamp: Utc::now(),
                    });
                    if ctx.budget_exhausted() {
                        LoopState::Terminated(Termination::ForcedAnswered)
                    } else {
                        LoopState::Deciding
                    }
                }

                LoopState::Deciding => {
                    let evidence = ctx.render_evidence();
                    let step_info = ctx.render_step_info();

                    let decided = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(run_id, "deciding")),
                        decided = self.oracle.decide(question, &evidence, &step_info) => decided,
                    };
                    decisions += 1;

                    let action = decided.inspect_err(|e| {
                        warn!(%run_id, step = ctx.step(), error = %e, "Decision failed");
                    })?;

                    debug!(%run_id, step = ctx.step(), action = %action.kind(), "Action decided");
                    self.event_bus.publish(DomainEvent::ActionDecided {
                        step: ctx.step(),
                        action: action.kind(),
                        detail: describe(&action),
                        timestamp: Utc::now(),
                    });

                    match action {
                        Action::Answer => LoopState::Terminated(Termination::Answered),
                        other => LoopState::Executing(other),
                    }
                }

                LoopState::Executing(action) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(run_id, "executing")),
                        report = self.executor.execute(&action, &mut ctx) => {
                            debug!(%run_id, ?report, "Action executed");
                        }
                    }

                    ctx.increment_step();
                    if ctx.budget_exhausted() {
                        LoopState::Terminated(Termination::ForcedAnswered)
                    } else {
                        LoopState::Deciding
                    }
                }

                LoopState::Terminated(kind) => break kind,
            };
        };

        info!(
            %run_id,
            steps = ctx.step(),
            decisions,
            forced = termination.is_final(),
            "Research terminated"
        );
        self.event_bus.publish(DomainEvent::ResearchTerminated {
            steps: ctx.step(),
            forced: termination.is_final(),
            timestamp: Utc::now(),
        });

        let request = AnswerRequest {
            question: question.to_string(),
            evidence: ctx.render_evidence(),
            is_final: termination.is_final(),
        };

        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(run_id, "composing")),
            composed = self.composer.compose(request) => composed.map_err(Error::Composer)?,
        };

        Ok(ResearchOutcome {
            termination,
            steps: ctx.step(),
            decisions,
            answer: answer.with_cancellation(cancel),
        })
    }
}

fn cancelled(run_id: Uuid, phase: &'static str) -> Error {
    info!(%run_id, phase, "Research cancelled");
    Error::Cancelled
}

fn describe(action: &Action) -> String {
    match action {
        Action::Search { query } => query.clone(),
        Action::Scrape { urls } => urls.join(", "),
        Action::Answer => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CannedScrape, CannedSearch, RecordingComposer, ScriptedOracle};
    use deepsearch_core::error::DecisionError;
    use std::time::Duration;

    fn search(q: &str) -> Action {
        Action::Search { query: q.into() }
    }

    fn research_loop(
        oracle: Arc<ScriptedOracle>,
        search: CannedSearch,
        composer: Arc<RecordingComposer>,
    ) -> ResearchLoop {
        let executor = ActionExecutor::new(
            Arc::new(search),
            Arc::new(CannedScrape),
            10,
            Arc::new(EventBus::default()),
        );
        ResearchLoop::new(oracle, executor, composer)
    }

    #[tokio::test]
    async fn never_answering_forces_exactly_one_final_answer() {
        let oracle = Arc::new(ScriptedOracle::always(search("more")));
        let composer = Arc::new(RecordingComposer::new("best effort"));
        let lp = research_loop(oracle.clone(), CannedSearch::masters(), composer.clone());

        let outcome = lp.run("q", CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.termination, Termination::ForcedAnswered);
        assert_eq!(outcome.steps, 10);
        assert_eq!(outcome.decisions, 10);
        assert!(oracle.calls() <= 11);

        let requests = composer.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_final);
        assert_eq!(outcome.into_text().await.unwrap(), "best effort");
    }

    #[tokio::test]
    async fn answer_at_step_k_stops_immediately() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(search("a")),
            Ok(Action::Scrape {
                urls: vec!["https://a.example".into()],
            }),
            Ok(Action::Answer),
            Ok(search("never reached")),
        ]));
        let composer = Arc::new(RecordingComposer::new("done"));
        let lp = research_loop(oracle.clone(), CannedSearch::masters(), composer.clone());

        let outcome = lp.run("q", CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.steps, 2);
        assert_eq!(oracle.calls(), 3);
        let requests = composer.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].is_final);
        assert!(!requests[0].evidence.contains("never reached"));
    }

    #[tokio::test]
    async fn step_info_and_evidence_grow_monotonically() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(search("one")),
            Ok(Action::Scrape {
                urls: vec!["https://x.example".into()],
            }),
            Ok(search("two")),
            Ok(Action::Answer),
        ]));
        let composer = Arc::new(RecordingComposer::new(""));
        let lp = research_loop(oracle.clone(), CannedSearch::masters(), composer);

        lp.run("q", CancellationToken::new()).await.unwrap();

        let seen = oracle.seen();
        let steps: Vec<_> = seen.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(
            steps,
            vec![
                "Current step: 0/10",
                "Current step: 1/10",
                "Current step: 2/10",
                "Current step: 3/10"
            ]
        );
        for pair in seen.windows(2) {
            assert!(pair[1].0.len() >= pair[0].0.len());
        }
        assert!(seen[3].0.contains("## Query: \"one\""));
        assert!(seen[3].0.contains("## Query: \"two\""));
    }

    #[tokio::test]
    async fn scrape_with_failure_continues() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(Action::Scrape {
                urls: vec![
                    "https://a.example".into(),
                    "https://fail.example".into(),
                    "https://c.example".into(),
                ],
            }),
            Ok(Action::Answer),
        ]));
        let composer = Arc::new(RecordingComposer::new("ok"));
        let lp = research_loop(oracle.clone(), CannedSearch::masters(), composer.clone());

        let outcome = lp.run("q", CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.termination, Termination::Answered);

        let evidence = &composer.requests()[0].evidence;
        assert_eq!(evidence.matches("## Scrape: ").count(), 3);
        assert!(evidence.contains("Error scraping https://fail.example"));
    }

    #[tokio::test]
    async fn unreachable_search_reasks_with_same_evidence() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(search("anything")),
            Ok(Action::Answer),
        ]));
        let composer = Arc::new(RecordingComposer::new(""));
        let lp = research_loop(oracle.clone(), CannedSearch::unreachable(), composer);

        let outcome = lp.run("q", CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.steps, 1);

        let seen = oracle.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, seen[1].0);
        assert_eq!(seen[0].1, "Current step: 0/10");
        assert_eq!(seen[1].1, "Current step: 1/10");
    }

    #[tokio::test]
    async fn masters_example_end_to_end() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(search("2024 Masters Tournament winner")),
            Ok(Action::Answer),
        ]));
        let composer = Arc::new(RecordingComposer::new(
            "[Scottie Scheffler](https://masters.example/2024) won the 2024 Masters.",
        ));
        let lp = research_loop(oracle, CannedSearch::masters(), composer.clone());

        let outcome = lp
            .run("Who won the 2024 Masters Tournament?", CancellationToken::new())
            .await
            .unwrap();
        let answer = outcome.into_text().await.unwrap();

        assert!(answer.contains("Scottie Scheffler"));
        let evidence = &composer.requests()[0].evidence;
        assert!(evidence.contains("## Query: \"2024 Masters Tournament winner\""));
        assert!(evidence.contains("https://masters.example/2024"));
        assert!(answer.contains("https://masters.example/2024"));
    }

    #[tokio::test]
    async fn zero_budget_goes_straight_to_forced_answer() {
        let oracle = Arc::new(ScriptedOracle::always(Action::Answer));
        let composer = Arc::new(RecordingComposer::new("nothing gathered"));
        let lp = research_loop(oracle.clone(), CannedSearch::masters(), composer.clone())
            .with_max_steps(0);

        let outcome = lp.run("q", CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.termination, Termination::ForcedAnswered);
        assert_eq!(oracle.calls(), 0);
        assert!(composer.requests()[0].is_final);
    }

    #[tokio::test]
    async fn decision_error_is_fatal_and_skips_composer() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(search("a")),
            Err(DecisionError::Malformed("garbage".into())),
        ]));
        let composer = Arc::new(RecordingComposer::new(""));
        let lp = research_loop(oracle, CannedSearch::masters(), composer.clone());

        let err = lp.run("q", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Decision(DecisionError::Malformed(_))));
        assert!(composer.requests().is_empty());
    }

    #[tokio::test]
    async fn composer_failure_is_fatal() {
        let oracle = Arc::new(ScriptedOracle::always(Action::Answer));
        let composer = Arc::new(RecordingComposer::failing());
        let lp = research_loop(oracle, CannedSearch::masters(), composer);

        let err = lp.run("q", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Composer(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_in_flight_search() {
        let oracle = Arc::new(ScriptedOracle::always(search("slow")));
        let composer = Arc::new(RecordingComposer::new(""));
        let lp = research_loop(oracle, CannedSearch::Hang, composer.clone());

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = lp.run("q", token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(composer.requests().is_empty());
    }

    #[tokio::test]
    async fn pre_cancelled_run_never_decides() {
        let oracle = Arc::new(ScriptedOracle::always(Action::Answer));
        let composer = Arc::new(RecordingComposer::new(""));
        let lp = research_loop(oracle.clone(), CannedSearch::masters(), composer);

        let token = CancellationToken::new();
        token.cancel();
        let err = lp.run("q", token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn events_trace_the_run() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(search("a")),
            Ok(Action::Answer),
        ]));
        let composer = Arc::new(RecordingComposer::new(""));
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();
        let lp = research_loop(oracle, CannedSearch::masters(), composer).with_event_bus(bus);

        lp.run("q", CancellationToken::new()).await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::ResearchStarted { .. } => "started",
                DomainEvent::ActionDecided { .. } => "decided",
                DomainEvent::SearchCompleted { .. } => "searched",
                DomainEvent::ScrapeCompleted { .. } => "scraped",
                DomainEvent::ResearchTerminated { .. } => "terminated",
            });
        }
        assert_eq!(
            names,
            vec!["started", "decided", "searched", "decided", "terminated"]
        );
    }
}
