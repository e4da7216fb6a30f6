//! Time-bounded grading calls.
//!
//! The deadline is enforced here, on the client side. When it expires the
//! provider future is dropped, which abandons the in-flight request no
//! matter what the remote service does with its own timeouts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use crate::cache::ResponseCache;
use crate::error::InvocationFailure;
use crate::prompt::GradingPrompt;
use crate::traits::{GenerateRequest, LlmProvider, TokenUsage};

/// Generation settings shared by every grading call of a run.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt_override: Option<String>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.0,
            max_tokens: 1024,
            system_prompt_override: None,
        }
    }
}

/// The raw text a grader returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub content: String,
    pub token_usage: TokenUsage,
    pub latency_ms: u64,
    /// Served from the per-run cache rather than a remote call.
    pub cached: bool,
}

/// Issues grading requests against one provider.
pub struct GradingInvoker {
    provider: Arc<dyn LlmProvider>,
    config: InvokerConfig,
}

impl GradingInvoker {
    pub fn new(provider: Arc<dyn LlmProvider>, config: InvokerConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_for(&self, prompt: &GradingPrompt) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.text.clone(),
            system_prompt: self.config.system_prompt_override.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Send `prompt` and wait at most `timeout` for the reply.
    pub async fn invoke(
        &self,
        prompt: &GradingPrompt,
        timeout: Duration,
    ) -> Result<RawResponse, InvocationFailure> {
        self.invoke_cached(prompt, timeout, None).await
    }

    /// Like [`invoke`](Self::invoke), consulting `cache` first and filling it
    /// on success.
    #[instrument(skip_all, fields(student = %prompt.student_name, provider = %self.provider.name()))]
    pub async fn invoke_cached(
        &self,
        prompt: &GradingPrompt,
        timeout: Duration,
        cache: Option<&ResponseCache>,
    ) -> Result<RawResponse, InvocationFailure> {
        let request = self.request_for(prompt);
        let cache_key = cache.map(|_| ResponseCache::key_for(&request));

        if let (Some(cache), Some(key)) = (cache, cache_key.as_deref()) {
            if let Some(content) = cache.get(key) {
                tracing::debug!("grading response served from cache");
                return Ok(RawResponse {
                    content,
                    token_usage: TokenUsage::default(),
                    latency_ms: 0,
                    cached: true,
                });
            }
        }

        let start = Instant::now();
        let response = match tokio::time::timeout(timeout, self.provider.generate(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(InvocationFailure::from(err)),
            Err(_) => return Err(InvocationFailure::Timeout(timeout)),
        };

        if let (Some(cache), Some(key)) = (cache, cache_key) {
            cache.insert(key, response.content.clone());
        }

        Ok(RawResponse {
            content: response.content,
            token_usage: response.token_usage,
            latency_ms: start.elapsed().as_millis() as u64,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::model::AnswerKeyEntry;
    use crate::testing::ScriptedProvider;

    fn prompt() -> GradingPrompt {
        GradingPrompt {
            student_name: "Alice".into(),
            text: "grade this".into(),
            questions: vec![AnswerKeyEntry {
                question_no: 1,
                question_text: "q".into(),
                reference_answer: "a".into(),
                max_marks: 5.0,
            }],
        }
    }

    fn invoker(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, GradingInvoker) {
        let provider = Arc::new(provider);
        let invoker = GradingInvoker::new(
            provider.clone(),
            InvokerConfig {
                model: "test-model".into(),
                ..Default::default()
            },
        );
        (provider, invoker)
    }

    #[tokio::test]
    async fn returns_content_on_success() {
        let (_, invoker) = invoker(ScriptedProvider::replying("Q1: 4/5"));
        let raw = invoker
            .invoke(&prompt(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(raw.content, "Q1: 4/5");
        assert!(!raw.cached);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_at_deadline() {
        let (_, invoker) = invoker(
            ScriptedProvider::replying("Q1: 4/5").with_delay(Duration::from_secs(60)),
        );
        let start = tokio::time::Instant::now();
        let err = invoker
            .invoke(&prompt(), Duration::from_secs(3))
            .await
            .unwrap_err();
        assert_eq!(err, InvocationFailure::Timeout(Duration::from_secs(3)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn provider_errors_collapse_to_remote_failure() {
        let (_, invoker) = invoker(ScriptedProvider::failing(|| {
            ProviderError::RateLimited {
                retry_after_ms: 1000,
            }
            .into()
        }));
        let err = invoker
            .invoke(&prompt(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationFailure::RemoteFailure(_)));
    }

    #[tokio::test]
    async fn cache_skips_second_remote_call() {
        let (provider, invoker) = invoker(ScriptedProvider::replying("Q1: 2/5"));
        let cache = ResponseCache::new();

        let first = invoker
            .invoke_cached(&prompt(), Duration::from_secs(5), Some(&cache))
            .await
            .unwrap();
        let second = invoker
            .invoke_cached(&prompt(), Duration::from_secs(5), Some(&cache))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.content, "Q1: 2/5");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let (provider, invoker) = invoker(ScriptedProvider::failing(|| {
            anyhow::anyhow!("connection refused")
        }));
        let cache = ResponseCache::new();
        for _ in 0..2 {
            let _ = invoker
                .invoke_cached(&prompt(), Duration::from_secs(5), Some(&cache))
                .await;
        }
        assert!(cache.is_empty());
        assert_eq!(provider.call_count(), 2);
    }
}
