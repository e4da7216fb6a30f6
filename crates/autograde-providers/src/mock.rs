//! Mock provider for testing and offline runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use autograde_core::error::ProviderError;
use autograde_core::traits::{GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage};

/// How the mock should fail, if at all.
#[derive(Debug, Clone)]
enum Failure {
    Timeout,
    Api { status: u16, message: String },
}

/// A scriptable scorer that never touches the network.
///
/// Replies are chosen by the first registered needle contained in the
/// prompt, falling back to a default reply.
pub struct MockProvider {
    replies: Vec<(String, String)>,
    default_reply: String,
    delay: Option<Duration>,
    failure: Option<Failure>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// A mock that always returns the same reply.
    pub fn with_fixed_response(reply: &str) -> Self {
        Self {
            replies: Vec::new(),
            default_reply: reply.to_string(),
            delay: None,
            failure: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A mock whose every call fails with an HTTP error.
    pub fn failing(status: u16, message: &str) -> Self {
        let mut mock = Self::with_fixed_response("");
        mock.failure = Some(Failure::Api {
            status,
            message: message.to_string(),
        });
        mock
    }

    /// A mock whose every call reports a transport timeout.
    pub fn timing_out() -> Self {
        let mut mock = Self::with_fixed_response("");
        mock.failure = Some(Failure::Timeout);
        mock
    }

    /// Reply with `reply` when the prompt contains `needle`.
    pub fn with_reply(mut self, needle: &str, reply: &str) -> Self {
        self.replies.push((needle.to_string(), reply.to_string()));
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.failure {
            Some(Failure::Timeout) => return Err(ProviderError::Timeout(1).into()),
            Some(Failure::Api { status, message }) => {
                return Err(ProviderError::ApiError {
                    status: *status,
                    message: message.clone(),
                }
                .into())
            }
            None => {}
        }

        let content = self
            .replies
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone());

        let prompt_tokens = (request.prompt.len() / 4) as u32; // Rough estimate
        let completion_tokens = (content.len() / 4) as u32;

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
                estimated_cost_usd: 0.0,
            },
            latency_ms: self.delay.map_or(1, |d| d.as_millis() as u64),
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
        }]
    }
}
