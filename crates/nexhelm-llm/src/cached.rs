//! Response cache wrapper.
//!
//! Memoizes completions by a hash of the full message list. Identical
//! prompts return the stored response with `cached: true`; semantics are
//! otherwise unchanged.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LLMError;
use crate::traits::{LLMAdapter, LLMMessage, LLMResponse};

/// Wraps any adapter with an in-memory response cache.
pub struct CachedAdapter<A> {
    inner: A,
    cache: Mutex<HashMap<u64, LLMResponse>>,
}

impl<A: LLMAdapter> CachedAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(messages: &[LLMMessage]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for message in messages {
            (message.role as u8).hash(&mut hasher);
            message.content.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[async_trait]
impl<A: LLMAdapter> LLMAdapter for CachedAdapter<A> {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        let key = Self::key(messages);
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            debug!(key, "LLM cache hit");
            let mut response = hit.clone();
            response.cached = true;
            return Ok(response);
        }

        let response = self.inner.generate(messages).await?;
        self.cache.lock().unwrap().insert(key, response.clone());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMAdapter for Counting {
        fn provider(&self) -> &str {
            "counting"
        }
        fn model(&self) -> &str {
            "counting-v1"
        }
        async fn generate(&self, _messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LLMResponse::text("ok", "counting-v1"))
        }
    }

    #[tokio::test]
    async fn test_identical_prompts_hit_cache() {
        let adapter = CachedAdapter::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let messages = vec![LLMMessage::system("sys"), LLMMessage::user("hello")];

        let first = adapter.generate(&messages).await.unwrap();
        let second = adapter.generate(&messages).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(adapter.inner.calls.load(Ordering::SeqCst), 1);

        // A different prompt misses.
        adapter.generate(&[LLMMessage::user("other")]).await.unwrap();
        assert_eq!(adapter.inner.calls.load(Ordering::SeqCst), 2);
    }
}
