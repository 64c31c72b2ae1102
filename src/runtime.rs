//! Runtime for answering conversation messages
//!
//! Requests for the same conversation are serialized around the whole
//! read-loop-write sequence; different conversations run in parallel.

mod compaction;
mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationLoop, LoopError};
pub use traits::*;

use crate::config::LoopConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Loop over type-erased store and classifier, shared by all requests
pub type SharedLoop = ConversationLoop<Arc<dyn ContextStore>, Arc<dyn ClassifierClient>>;

pub struct AgentRuntime {
    conversation_loop: SharedLoop,
    /// One lock per conversation with a request in flight
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl AgentRuntime {
    pub fn new(
        store: Arc<dyn ContextStore>,
        classifier: Arc<dyn ClassifierClient>,
        config: LoopConfig,
    ) -> Self {
        Self {
            conversation_loop: ConversationLoop::new(store, classifier, config),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Answer a user message, persisting the updated context on success
    pub async fn handle_message(
        &self,
        conversation_id: i64,
        text: &str,
    ) -> Result<String, LoopError> {
        let lock = self.conversation_lock(conversation_id).await;
        let result = {
            let _guard = lock.lock().await;
            let start = std::time::Instant::now();
            let result = self.conversation_loop.process(conversation_id, text).await;
            let duration_ms = start.elapsed().as_millis();
            match &result {
                Ok(answer) => tracing::info!(
                    conversation_id,
                    duration_ms = %duration_ms,
                    answer_len = answer.len(),
                    "Message answered"
                ),
                Err(e) => tracing::warn!(
                    conversation_id,
                    duration_ms = %duration_ms,
                    error = %e,
                    "Message failed"
                ),
            }
            result
        };
        drop(lock);
        self.prune_locks().await;
        result
    }

    async fn conversation_lock(&self, conversation_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(conversation_id)
            .or_default()
            .clone()
    }

    /// Drop locks nobody holds or waits on
    async fn prune_locks(&self) {
        self.locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    async fn tracked_conversations(&self) -> usize {
        self.locks.lock().await.len()
    }
}
