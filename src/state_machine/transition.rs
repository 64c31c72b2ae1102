//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result and performs no I/O.

use super::{Effect, Event, LoopContext, LoopState};
use crate::tasks::is_structured;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: LoopState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LoopState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn with_effect_first(mut self, effect: Effect) -> Self {
        self.effects.insert(0, effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Loop already finished in state {0}")]
    Terminal(&'static str),
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

pub fn transition(
    state: &LoopState,
    context: &LoopContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // A zero budget never classifies at all
        (LoopState::Idle, Event::UserMessage { .. }) if context.max_cycles == 0 => {
            Ok(TransitionResult::new(LoopState::Exceeded { cycles: 0 }))
        }

        (LoopState::Idle, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(LoopState::Classifying { cycle: 1 })
                .with_effect(Effect::AppendUserTurn { text })
                .with_effect(Effect::RequestClassification))
        }

        (LoopState::Classifying { cycle }, Event::ClassifierReplied { text, tokens }) => {
            if is_structured(&text) {
                Ok(TransitionResult::new(LoopState::Dispatching {
                    cycle: *cycle,
                    tokens,
                })
                .with_effect(Effect::DispatchTask { payload: text }))
            } else {
                Ok(TransitionResult::new(LoopState::Returned { answer: text })
                    .with_effect(Effect::PersistContext))
            }
        }

        (LoopState::Dispatching { cycle, tokens }, Event::TaskCompleted { outcome }) => {
            let append = Effect::append_api_response(outcome.result());
            if *tokens >= context.token_budget {
                Ok(TransitionResult::new(LoopState::Compacting { cycle: *cycle })
                    .with_effect(append)
                    .with_effect(Effect::CompactContext))
            } else {
                Ok(next_cycle(*cycle, context).with_effect_first(append))
            }
        }

        (LoopState::Compacting { cycle }, Event::Compacted { context: text }) => {
            Ok(next_cycle(*cycle, context).with_effect_first(Effect::ReplaceContext { text }))
        }

        (state, _) if state.is_terminal() => Err(TransitionError::Terminal(state.name())),

        (state, event) => Err(TransitionError::InvalidTransition {
            state: state.name(),
            event: event.name(),
        }),
    }
}

/// Start the next classification, or stop if the cycle budget is spent
fn next_cycle(cycle: u32, context: &LoopContext) -> TransitionResult {
    if cycle < context.max_cycles {
        TransitionResult::new(LoopState::Classifying { cycle: cycle + 1 })
            .with_effect(Effect::RequestClassification)
    } else {
        TransitionResult::new(LoopState::Exceeded { cycles: cycle })
    }
}
