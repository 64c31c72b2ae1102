//! Mock implementations for testing
//!
//! These mocks enable loop and handler tests without real I/O.

use super::traits::*;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Classifier
// ============================================================================

/// Mock classifier that returns queued replies
pub struct MockClassifier {
    replies: Mutex<VecDeque<Result<ClassifierReply, LlmError>>>,
    /// Record of all prompts sent
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockClassifier {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering, so concurrent requests overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, text: impl Into<String>, tokens: u64) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(ClassifierReply::new(text, tokens)));
    }

    /// Queue an error reply
    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded prompts
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassifierClient for MockClassifier {
    async fn send(&self, prompt: &str) -> Result<ClassifierReply, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock reply queued")));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

// ============================================================================
// In-Memory Context Store
// ============================================================================

/// In-memory context store
pub struct InMemoryContextStore {
    contexts: Mutex<HashMap<i64, String>>,
    fail_writes: bool,
}

#[allow(dead_code)]
impl InMemoryContextStore {
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            fail_writes: false,
        }
    }

    /// Store whose writes always fail
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn insert(&self, conversation_id: i64, context: impl Into<String>) {
        self.contexts
            .lock()
            .unwrap()
            .insert(conversation_id, context.into());
    }

    pub fn stored(&self, conversation_id: i64) -> Option<String> {
        self.contexts.lock().unwrap().get(&conversation_id).cloned()
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get_context(&self, conversation_id: i64) -> Result<Option<String>, String> {
        Ok(self.stored(conversation_id))
    }

    async fn put_context(&self, conversation_id: i64, context: &str) -> Result<(), String> {
        if self.fail_writes {
            return Err("disk I/O error".to_string());
        }
        self.insert(conversation_id, context);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_classifier() {
        let mock = MockClassifier::new();
        mock.queue_reply("Hello", 3);

        let reply = mock.send("prompt").await.unwrap();
        assert_eq!(reply, ClassifierReply::new("Hello", 3));

        // Second call should fail (no more replies)
        assert!(mock.send("prompt").await.is_err());
        assert_eq!(mock.recorded_prompts(), vec!["prompt", "prompt"]);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryContextStore::new();
        assert_eq!(store.get_context(1).await.unwrap(), None);
        store.put_context(1, "User: a").await.unwrap();
        store.put_context(1, "User: b").await.unwrap();
        assert_eq!(store.get_context(1).await.unwrap().as_deref(), Some("User: b"));

        let failing = InMemoryContextStore::failing_writes();
        assert!(failing.put_context(1, "x").await.is_err());
    }
}
