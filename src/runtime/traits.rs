//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::Database;
use crate::llm::{LlmError, LlmRequest, LlmService};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage for accumulated conversation contexts
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Get the stored context, `None` if the conversation is new
    async fn get_context(&self, conversation_id: i64) -> Result<Option<String>, String>;

    /// Insert or replace the stored context
    async fn put_context(&self, conversation_id: i64, context: &str) -> Result<(), String>;
}

/// Reply from the classifier model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierReply {
    pub text: String,
    /// Total tokens the provider reports for the exchange
    pub tokens: u64,
}

impl ClassifierReply {
    pub fn new(text: impl Into<String>, tokens: u64) -> Self {
        Self {
            text: text.into(),
            tokens,
        }
    }
}

/// Client for single-prompt classifier requests
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<ClassifierReply, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ContextStore + ?Sized> ContextStore for Arc<T> {
    async fn get_context(&self, conversation_id: i64) -> Result<Option<String>, String> {
        (**self).get_context(conversation_id).await
    }

    async fn put_context(&self, conversation_id: i64, context: &str) -> Result<(), String> {
        (**self).put_context(conversation_id, context).await
    }
}

#[async_trait]
impl<T: ClassifierClient + ?Sized> ClassifierClient for Arc<T> {
    async fn send(&self, prompt: &str) -> Result<ClassifierReply, LlmError> {
        (**self).send(prompt).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a ContextStore
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContextStore for DatabaseStorage {
    async fn get_context(&self, conversation_id: i64) -> Result<Option<String>, String> {
        self.db
            .get_context(conversation_id)
            .map_err(|e| e.to_string())
    }

    async fn put_context(&self, conversation_id: i64, context: &str) -> Result<(), String> {
        self.db
            .put_context(conversation_id, context)
            .map_err(|e| e.to_string())
    }
}

/// Adapter to use an LlmService as the ClassifierClient
pub struct ServiceClassifier {
    service: Arc<dyn LlmService>,
}

impl ServiceClassifier {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ClassifierClient for ServiceClassifier {
    async fn send(&self, prompt: &str) -> Result<ClassifierReply, LlmError> {
        let response = self.service.complete(&LlmRequest::user(prompt)).await?;
        Ok(ClassifierReply::new(response.text, response.usage.total_tokens))
    }
}
