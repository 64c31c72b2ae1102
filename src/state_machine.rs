//! Conversation loop state machine
//!
//! Pure state transitions; the runtime executes the returned effects and
//! feeds the results back in as events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{LoopContext, LoopState};
pub use transition::{transition, TransitionError, TransitionResult};

/// Append a user turn to the accumulated context
pub fn join_user_turn(prior: &str, text: &str) -> String {
    if prior.is_empty() {
        format!("User: {text}")
    } else {
        format!("{prior}\nUser: {text}")
    }
}

/// Line folded into the context after a task has been dispatched
pub fn api_response_line(result: &str) -> String {
    format!("\nAPI response: {result}")
}
