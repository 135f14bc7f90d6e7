//! # nexhelm-llm
//!
//! LLM adapters for the Nexhelm workflow engine.
//!
//! The engine treats the model as an adversarial oracle behind a narrow
//! boundary: one call in, one structured decision out. Adapters:
//!
//! - [`OpenAIAdapter`] — chat completions via the `openai` feature.
//! - [`ScriptedAdapter`] — deterministic decisions derived from the
//!   prompt; no network, used by tests and demos.
//! - [`CachedAdapter`] — memoizes responses by prompt hash to control
//!   cost without changing semantics.

mod cached;
mod error;
mod scripted;
mod traits;

#[cfg(feature = "openai")]
mod openai;

pub use cached::CachedAdapter;
pub use error::LLMError;
pub use scripted::ScriptedAdapter;
pub use traits::{LLMAdapter, LLMMessage, LLMResponse, Role, TokenUsage};

#[cfg(feature = "openai")]
pub use openai::OpenAIAdapter;
