//! Events that drive the loop

use crate::tasks::TaskOutcome;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// New user message for the conversation
    UserMessage { text: String },

    /// Classifier answered the task-classification prompt
    ClassifierReplied { text: String, tokens: u64 },

    /// Dispatcher finished a task (successfully or not)
    TaskCompleted { outcome: TaskOutcome },

    /// Classifier returned the condensed context
    Compacted { context: String },
}

impl Event {
    /// Short name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::ClassifierReplied { .. } => "classifier_replied",
            Event::TaskCompleted { .. } => "task_completed",
            Event::Compacted { .. } => "compacted",
        }
    }
}
