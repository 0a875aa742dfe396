//! The research loop — the heart of DeepSearch.
//!
//! The loop follows a **Decide → Act → Record** cycle:
//!
//! 1. **Decide**: the decision oracle reads the evidence gathered so far and
//!    picks exactly one action (search, scrape, or answer)
//! 2. **Act**: the executor runs a search or a scrape batch
//! 3. **Record**: results are appended to the research context and the step
//!    counter advances
//!
//! The loop stops when the oracle chooses to answer or the step budget runs
//! out. Either way the answer composer is invoked exactly once, and a forced
//! answer is flagged as possibly incomplete.

pub mod answer;
pub mod context;
pub mod decision;
pub mod executor;
pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use answer::{AnswerComposer, AnswerRequest, AnswerStream, LlmAnswerComposer};
pub use context::ResearchContext;
pub use decision::{DecisionOracle, LlmDecisionOracle};
pub use executor::{ActionExecutor, ExecutionReport};
pub use loop_runner::{ResearchLoop, ResearchOutcome, Termination};
