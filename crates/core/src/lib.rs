//! # DeepSearch Core
//!
//! Domain types, traits, and error definitions for the DeepSearch research agent.
//! This crate performs **no I/O** — it defines the domain model that the
//! provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here:
//! - [`Provider`] — the language-model backend behind the decision oracle and
//!   the answer composer
//! - [`SearchCollaborator`] — web search
//! - [`ScrapeCollaborator`] — page retrieval
//!
//! Implementations live in their respective crates, so the research loop can be
//! driven by real HTTP backends or by scripted test doubles.

pub mod collaborator;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod research;

// Re-export key types at crate root for ergonomics
pub use collaborator::{ScrapeCollaborator, SearchCollaborator, SearchOutcome};
pub use error::{DecisionError, Error, ProviderError, Result, ScrapeError, SearchError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use research::{Action, ActionDraft, ActionKind, QueryRecord, ScrapeRecord, SearchResultItem};
