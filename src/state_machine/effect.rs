//! Effects produced by state transitions

use super::{api_response_line, join_user_turn};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add the user's message to the loaded context
    AppendUserTurn { text: String },

    /// Send the current context through the task-classification prompt
    RequestClassification,

    /// Hand a structured reply to the task dispatcher
    DispatchTask { payload: String },

    /// Append text to the current context
    AppendToContext { text: String },

    /// Send the current context through the context-reduction prompt
    CompactContext,

    /// Swap the current context for condensed text
    ReplaceContext { text: String },

    /// Write the current context to the store
    PersistContext,
}

impl Effect {
    pub fn append_api_response(result: &str) -> Self {
        Effect::AppendToContext {
            text: api_response_line(result),
        }
    }

    /// Apply a context-editing effect to `context`. Returns false for
    /// effects that need I/O and are left to the runtime.
    pub fn apply_to_context(&self, context: &mut String) -> bool {
        match self {
            Effect::AppendUserTurn { text } => {
                *context = join_user_turn(context, text);
                true
            }
            Effect::AppendToContext { text } => {
                context.push_str(text);
                true
            }
            Effect::ReplaceContext { text } => {
                context.clone_from(text);
                true
            }
            Effect::RequestClassification
            | Effect::DispatchTask { .. }
            | Effect::CompactContext
            | Effect::PersistContext => false,
        }
    }
}
