//! Loop state types

/// Where a single request is in the classify/dispatch/compact cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopState {
    /// No message received yet
    #[default]
    Idle,

    /// Waiting for the classifier; `cycle` counts attempts, starting at 1
    Classifying { cycle: u32 },

    /// Running the task the classifier asked for
    Dispatching {
        cycle: u32,
        /// Tokens the classifier reported for the reply that requested the task
        tokens: u64,
    },

    /// Waiting for the classifier to condense the context
    Compacting { cycle: u32 },

    /// Plain-text answer produced (terminal)
    Returned { answer: String },

    /// Cycle budget used up without a plain-text answer (terminal)
    Exceeded { cycles: u32 },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Returned { .. } | LoopState::Exceeded { .. })
    }

    /// Current cycle, if a cycle is in progress
    pub fn cycle(&self) -> Option<u32> {
        match self {
            LoopState::Classifying { cycle }
            | LoopState::Dispatching { cycle, .. }
            | LoopState::Compacting { cycle } => Some(*cycle),
            LoopState::Idle | LoopState::Returned { .. } | LoopState::Exceeded { .. } => None,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Classifying { .. } => "classifying",
            LoopState::Dispatching { .. } => "dispatching",
            LoopState::Compacting { .. } => "compacting",
            LoopState::Returned { .. } => "returned",
            LoopState::Exceeded { .. } => "exceeded",
        }
    }
}

/// Per-request settings the transition function reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopContext {
    pub conversation_id: i64,
    pub max_cycles: u32,
    /// Reply token count at or above which the context is compacted
    pub token_budget: u64,
}

impl LoopContext {
    pub fn new(conversation_id: i64, max_cycles: u32, token_budget: u64) -> Self {
        Self {
            conversation_id,
            max_cycles,
            token_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(LoopState::Returned {
            answer: "4".to_string()
        }
        .is_terminal());
        assert!(LoopState::Exceeded { cycles: 3 }.is_terminal());
        assert!(!LoopState::Idle.is_terminal());
        assert!(!LoopState::Compacting { cycle: 1 }.is_terminal());
    }

    #[test]
    fn test_cycle() {
        assert_eq!(LoopState::Dispatching { cycle: 2, tokens: 5 }.cycle(), Some(2));
        assert_eq!(LoopState::Idle.cycle(), None);
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(LoopState::default(), LoopState::Idle);
    }
}
