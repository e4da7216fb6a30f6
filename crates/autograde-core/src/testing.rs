//! In-crate test double for the remote scorer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage};

type ErrorFactory = Box<dyn Fn() -> anyhow::Error + Send + Sync>;

/// Replies with canned text, optionally after a delay or with an error.
pub struct ScriptedProvider {
    default_reply: String,
    replies: HashMap<String, String>,
    delay: Option<Duration>,
    slow_prompts: HashMap<String, Duration>,
    error: Option<ErrorFactory>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            default_reply: text.to_string(),
            replies: HashMap::new(),
            delay: None,
            slow_prompts: HashMap::new(),
            error: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(error: impl Fn() -> anyhow::Error + Send + Sync + 'static) -> Self {
        let mut provider = Self::replying("");
        provider.error = Some(Box::new(error));
        provider
    }

    /// Reply with `text` when the prompt contains `needle`.
    pub fn with_reply(mut self, needle: &str, text: &str) -> Self {
        self.replies.insert(needle.to_string(), text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep for `delay` only when the prompt contains `needle`.
    pub fn with_delay_for(mut self, needle: &str, delay: Duration) -> Self {
        self.slow_prompts.insert(needle.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .slow_prompts
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, d)| *d)
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.error {
            return Err(error());
        }

        let content = self
            .replies
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone());

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage::default(),
            latency_ms: 0,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        Vec::new()
    }
}
