//! LLM client library for gen-narration
//!
//! Provides one interface over OpenAI-compatible chat completion APIs:
//! - Groq (default, fast Llama inference)
//! - OpenAI
//! - OpenRouter
//! - Any compatible server reachable by base URL

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;

pub use config::{Config, ModelPreset, ProviderConfig};
pub use error::{LlmError, Result};
pub use provider::{ChatMessage, LlmProvider, LlmRequest, LlmResponse, Role, TokenUsage};
pub use providers::{MockProvider, OpenAICompatibleProvider, ProviderKind, get_provider};
