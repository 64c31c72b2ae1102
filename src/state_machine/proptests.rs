//! Property-based tests for the state machine
//!
//! Each test drives the pure transition function through a whole request,
//! playing the part of the runtime.

use super::*;
use crate::tasks::dispatch;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Reply {
    structured: bool,
    tokens: u64,
}

#[derive(Debug, Default)]
struct Run {
    final_state: LoopState,
    classifications: u32,
    compactions: u32,
    persisted: bool,
    context: String,
}

fn arb_reply() -> impl Strategy<Value = Reply> {
    (any::<bool>(), 0u64..200).prop_map(|(structured, tokens)| Reply { structured, tokens })
}

fn reply_text(reply: &Reply) -> String {
    if reply.structured {
        r#"{"task_id":4,"data":{"expression":"1+1"}}"#.to_string()
    } else {
        "plain answer".to_string()
    }
}

/// Run one request to completion; replies beyond the script are structured
fn drive(ctx: &LoopContext, replies: &[Reply]) -> Run {
    let mut run = Run::default();
    let mut state = LoopState::Idle;
    let mut pending = vec![Event::UserMessage {
        text: "question".to_string(),
    }];
    let mut script = replies.iter().cloned();

    while let Some(event) = pending.pop() {
        let result = transition(&state, ctx, event).expect("valid transition");
        state = result.new_state;
        for effect in result.effects {
            if effect.apply_to_context(&mut run.context) {
                continue;
            }
            match effect {
                Effect::RequestClassification => {
                    run.classifications += 1;
                    let reply = script.next().unwrap_or(Reply {
                        structured: true,
                        tokens: 0,
                    });
                    pending.push(Event::ClassifierReplied {
                        text: reply_text(&reply),
                        tokens: reply.tokens,
                    });
                }
                Effect::DispatchTask { payload } => {
                    pending.push(Event::TaskCompleted {
                        outcome: dispatch(&payload),
                    });
                }
                Effect::CompactContext => {
                    run.compactions += 1;
                    pending.push(Event::Compacted {
                        context: "compacted".to_string(),
                    });
                }
                Effect::PersistContext => run.persisted = true,
                _ => unreachable!("context effects handled above"),
            }
        }
    }

    run.final_state = state;
    run
}

proptest! {
    #[test]
    fn prop_classifications_bounded(
        max_cycles in 0u32..6,
        budget in 1u64..200,
        replies in prop::collection::vec(arb_reply(), 0..8),
    ) {
        let ctx = LoopContext::new(1, max_cycles, budget);
        let run = drive(&ctx, &replies);
        prop_assert!(run.classifications <= max_cycles);
        prop_assert!(run.final_state.is_terminal());
    }

    #[test]
    fn prop_all_structured_exceeds_after_max_cycles(
        max_cycles in 0u32..6,
        budget in 1u64..200,
        tokens in prop::collection::vec(0u64..200, 6),
    ) {
        let replies: Vec<_> = tokens
            .into_iter()
            .map(|tokens| Reply { structured: true, tokens })
            .collect();
        let ctx = LoopContext::new(1, max_cycles, budget);
        let run = drive(&ctx, &replies);
        prop_assert_eq!(run.final_state, LoopState::Exceeded { cycles: max_cycles });
        prop_assert_eq!(run.classifications, max_cycles);
        prop_assert!(!run.persisted);
    }

    #[test]
    fn prop_compaction_only_at_budget(
        max_cycles in 1u32..6,
        budget in 1u64..200,
        replies in prop::collection::vec(arb_reply(), 0..8),
    ) {
        let ctx = LoopContext::new(1, max_cycles, budget);
        let run = drive(&ctx, &replies);

        // Only structured replies that were actually classified can compact
        let expected = replies
            .iter()
            .take(run.classifications as usize)
            .filter(|r| r.structured && r.tokens >= budget)
            .count();
        prop_assert_eq!(run.compactions as usize, expected);
    }

    #[test]
    fn prop_returned_iff_persisted(
        max_cycles in 0u32..6,
        budget in 1u64..200,
        replies in prop::collection::vec(arb_reply(), 0..8),
    ) {
        let ctx = LoopContext::new(1, max_cycles, budget);
        let run = drive(&ctx, &replies);
        let returned = matches!(run.final_state, LoopState::Returned { .. });
        prop_assert_eq!(returned, run.persisted);
        if returned {
            let first_plain = replies.iter().position(|r| !r.structured);
            prop_assert_eq!(first_plain.map(|i| i as u32 + 1), Some(run.classifications));
        }
    }

    #[test]
    fn prop_plain_first_reply_keeps_exact_context(budget in 1u64..200, tokens in 0u64..400) {
        let ctx = LoopContext::new(1, 3, budget);
        let run = drive(&ctx, &[Reply { structured: false, tokens }]);
        prop_assert_eq!(run.classifications, 1);
        prop_assert_eq!(run.context, "User: question");
        prop_assert_eq!(run.final_state, LoopState::Returned { answer: "plain answer".to_string() });
    }
}
