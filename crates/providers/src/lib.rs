//! LLM Provider implementations for DeepSearch.
//!
//! All providers implement the `deepsearch_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! [`RetryProvider`] adds bounded exponential backoff around any of them.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
pub use router::ProviderRouter;
