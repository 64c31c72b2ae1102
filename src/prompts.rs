//! Prompt templates sent to the classifier model

/// Instructions for deciding between a plain answer and a task request
const TASK_CLASSIFICATION_PROMPT: &str = r#"You are an assistant that answers users and delegates exact computations to an API.

Read the conversation below and decide how to continue it.

If a task must be computed before you can answer, reply with ONLY a JSON object and nothing else:
{"task_id": <id>, "data": {<task parameters>}}

Known tasks:
- 1: travelling salesman problem
- 2: maximum clique
- 3: knapsack problem
- 4: arithmetic; data must contain "expression", a string using numbers, + - * / ^ and parentheses, e.g. {"task_id": 4, "data": {"expression": "3*7"}}

Lines starting with "API response:" are results of tasks you requested earlier. Use them instead of requesting the same task again.

Otherwise reply to the user in plain text. Never wrap a plain-text answer in JSON.

Conversation:"#;

/// Instructions for shrinking an oversized conversation
const CONTEXT_REDUCTION_PROMPT: &str = r#"The conversation below has grown too long. Rewrite it as a shorter transcript that keeps:
- every user request that is still relevant, as "User:" lines
- results of computations, as "API response:" lines
- facts needed to continue the conversation

Drop repetition and anything no longer relevant. Reply with the shortened transcript only.

Conversation:"#;

/// Prompt asking the model to answer or request a task for `context`
pub fn task_classification(context: &str) -> String {
    format!("{TASK_CLASSIFICATION_PROMPT}\n{context}")
}

/// Prompt asking the model to condense `context`
pub fn context_reduction(context: &str) -> String {
    format!("{CONTEXT_REDUCTION_PROMPT}\n{context}")
}
