//! autograde-providers: remote scorer backends.
//!
//! Implements the `LlmProvider` trait for OpenAI, Anthropic, Gemini and
//! Ollama, plus a configurable mock for tests and offline runs.

pub mod anthropic;
pub mod config;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use autograde_core::error::ProviderError;
pub use config::{
    create_provider, load_config, load_config_from, provider_config_for, AutogradeConfig,
    ProviderConfig,
};
