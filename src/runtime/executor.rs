//! Conversation loop executor
//!
//! Runs one request through the state machine, executing effects against
//! the store and the classifier.

use super::compaction::compact;
use super::traits::{ClassifierClient, ContextStore};
use crate::config::LoopConfig;
use crate::llm::LlmError;
use crate::prompts;
use crate::state_machine::{transition, Effect, Event, LoopContext, LoopState, TransitionError};
use crate::tasks::{dispatch, task_summary};
use thiserror::Error;

/// Why a request could not produce an answer
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Maximum number of loop cycles ({cycles}) exceeded")]
    MaxCyclesExceeded { cycles: u32 },
    #[error("Classifier request failed: {0}")]
    Transport(#[from] LlmError),
    #[error("Context store failed: {0}")]
    Storage(String),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("Loop stalled in state {0}")]
    Stalled(&'static str),
}

/// Classify/dispatch/compact loop over a store and a classifier
pub struct ConversationLoop<S, C>
where
    S: ContextStore,
    C: ClassifierClient,
{
    store: S,
    classifier: C,
    config: LoopConfig,
}

impl<S, C> ConversationLoop<S, C>
where
    S: ContextStore,
    C: ClassifierClient,
{
    pub fn new(store: S, classifier: C, config: LoopConfig) -> Self {
        Self {
            store,
            classifier,
            config,
        }
    }

    /// Answer `user_text` in the context of `conversation_id`.
    ///
    /// The updated context is persisted only when a plain-text answer is
    /// produced; on any error the stored context is left untouched.
    pub async fn process(&self, conversation_id: i64, user_text: &str) -> Result<String, LoopError> {
        let ctx = LoopContext::new(
            conversation_id,
            self.config.max_loop_cycles,
            self.config.max_tokens,
        );

        let mut context = self
            .store
            .get_context(conversation_id)
            .await
            .map_err(LoopError::Storage)?
            .unwrap_or_default();

        let mut state = LoopState::Idle;
        let mut event = Event::UserMessage {
            text: user_text.to_string(),
        };

        loop {
            let result = transition(&state, &ctx, event)?;
            tracing::debug!(
                conversation_id,
                from = state.name(),
                to = result.new_state.name(),
                "Loop transition"
            );
            state = result.new_state;

            let mut next = None;
            for effect in result.effects {
                if effect.apply_to_context(&mut context) {
                    continue;
                }
                if let Some(produced) = self.execute_effect(effect, &ctx, &state, &context).await? {
                    next = Some(produced);
                }
            }

            match state {
                LoopState::Returned { answer } => return Ok(answer),
                LoopState::Exceeded { cycles } => {
                    tracing::warn!(conversation_id, cycles, "Loop cycle budget exhausted");
                    return Err(LoopError::MaxCyclesExceeded { cycles });
                }
                _ => {}
            }

            event = next.ok_or(LoopError::Stalled(state.name()))?;
        }
    }

    /// Run one I/O effect, returning the event it produced, if any
    async fn execute_effect(
        &self,
        effect: Effect,
        ctx: &LoopContext,
        state: &LoopState,
        context: &str,
    ) -> Result<Option<Event>, LoopError> {
        let conversation_id = ctx.conversation_id;
        let cycle = state.cycle().unwrap_or(0);

        match effect {
            Effect::RequestClassification => {
                let reply = self
                    .classifier
                    .send(&prompts::task_classification(context))
                    .await?;
                tracing::info!(conversation_id, cycle, tokens = reply.tokens, "Classifier replied");
                Ok(Some(Event::ClassifierReplied {
                    text: reply.text,
                    tokens: reply.tokens,
                }))
            }

            Effect::DispatchTask { payload } => {
                let outcome = dispatch(&payload);
                tracing::info!(
                    conversation_id,
                    cycle,
                    task = %task_summary(outcome.task_id()),
                    success = outcome.is_success(),
                    result = outcome.result(),
                    "Task dispatched"
                );
                Ok(Some(Event::TaskCompleted { outcome }))
            }

            Effect::CompactContext => {
                tracing::info!(conversation_id, cycle, budget = ctx.token_budget, "Token budget reached, compacting context");
                let compacted = compact(context, &self.classifier).await?;
                Ok(Some(Event::Compacted { context: compacted }))
            }

            Effect::PersistContext => {
                self.store
                    .put_context(conversation_id, context)
                    .await
                    .map_err(LoopError::Storage)?;
                Ok(None)
            }

            Effect::AppendUserTurn { .. }
            | Effect::AppendToContext { .. }
            | Effect::ReplaceContext { .. } => Ok(None),
        }
    }
}
