//! Per-run memo of grading responses.
//!
//! Keyed by a SHA-256 digest of everything that determines the reply
//! (model, system prompt, user prompt). A cache lives for one batch run and
//! only ever holds successful responses.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::traits::GenerateRequest;

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, String>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest identifying a request's reply.
    pub fn key_for(request: &GenerateRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.effective_system_prompt().as_bytes());
        hasher.update([0u8]);
        hasher.update(request.prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: String, content: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, content);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "m".into(),
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[test]
    fn identical_requests_share_a_key() {
        assert_eq!(
            ResponseCache::key_for(&request("a")),
            ResponseCache::key_for(&request("a"))
        );
        assert_ne!(
            ResponseCache::key_for(&request("a")),
            ResponseCache::key_for(&request("b"))
        );
        let key = ResponseCache::key_for(&request("a"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn system_prompt_changes_key() {
        let mut custom = request("a");
        custom.system_prompt = Some("strict examiner".into());
        assert_ne!(
            ResponseCache::key_for(&custom),
            ResponseCache::key_for(&request("a"))
        );
    }

    #[test]
    fn stores_and_returns_content() {
        let cache = ResponseCache::new();
        assert!(cache.is_empty());
        cache.insert("k".into(), "Q1: 1/1".into());
        assert_eq!(cache.get("k").as_deref(), Some("Q1: 1/1"));
        assert_eq!(cache.get("other"), None);
        assert_eq!(cache.len(), 1);
    }
}
