//! Task classification and dispatch
//!
//! A classifier reply is either plain text meant for the user or a JSON task
//! envelope such as `{"task_id": 4, "data": {"expression": "3*7"}}`.
//! Dispatching an envelope never fails: every problem is reported back as a
//! [`TaskOutcome::Failure`] so the conversation loop can fold it into the
//! context like any other result.

pub mod arithmetic;

use arithmetic::EvalError;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Known task kinds, keyed by the id the classifier prompt advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    TravelingSalesman,
    MaxClique,
    Knapsack,
    Arithmetic,
}

impl TaskKind {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(TaskKind::TravelingSalesman),
            2 => Some(TaskKind::MaxClique),
            3 => Some(TaskKind::Knapsack),
            4 => Some(TaskKind::Arithmetic),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            TaskKind::TravelingSalesman => 1,
            TaskKind::MaxClique => 2,
            TaskKind::Knapsack => 3,
            TaskKind::Arithmetic => 4,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TaskKind::TravelingSalesman => "TSP",
            TaskKind::MaxClique => "Max Clique",
            TaskKind::Knapsack => "Knapsack",
            TaskKind::Arithmetic => "Arithmetic",
        }
    }
}

/// Short label for logs, e.g. `[Task: Arithmetic, id=4]`
pub fn task_summary(task_id: Option<i64>) -> String {
    let name = task_id
        .and_then(TaskKind::from_id)
        .map_or("Unknown", TaskKind::display_name);
    match task_id {
        Some(id) => format!("[Task: {name}, id={id}]"),
        None => format!("[Task: {name}, id=none]"),
    }
}

/// Payload shared by both outcome variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub result: String,
    pub task_id: Option<i64>,
}

/// Result of dispatching a task envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(TaskResult),
    Failure(TaskResult),
}

impl TaskOutcome {
    pub fn success(result: impl Into<String>, task_id: Option<i64>) -> Self {
        TaskOutcome::Success(TaskResult {
            result: result.into(),
            task_id,
        })
    }

    pub fn failure(error: &TaskError, task_id: Option<i64>) -> Self {
        TaskOutcome::Failure(TaskResult {
            result: error.to_string(),
            task_id,
        })
    }

    pub fn payload(&self) -> &TaskResult {
        match self {
            TaskOutcome::Success(r) | TaskOutcome::Failure(r) => r,
        }
    }

    pub fn result(&self) -> &str {
        &self.payload().result
    }

    pub fn task_id(&self) -> Option<i64> {
        self.payload().task_id
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Why a task could not be completed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("invalid structured payload")]
    MalformedPayload,
    #[error("task payload has no 'expression' field")]
    MissingExpression,
    #[error("task type {id} ({name}) is not yet supported")]
    UnsupportedTask { id: i64, name: &'static str },
    #[error("unknown task type")]
    UnknownTask,
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvalError),
}

/// Parsed task envelope
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default, deserialize_with = "lenient_task_id")]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub data: Value,
}

/// Accept any JSON value for `task_id`; non-integers become `None`
fn lenient_task_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

impl TaskEnvelope {
    pub fn parse(text: &str) -> Result<Self, TaskError> {
        match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => {
                serde_json::from_value(value).map_err(|_| TaskError::MalformedPayload)
            }
            _ => Err(TaskError::MalformedPayload),
        }
    }

    fn expression(&self) -> Option<&str> {
        self.data
            .get("expression")
            .and_then(Value::as_str)
            .filter(|e| !e.trim().is_empty())
    }
}

/// True if the reply is a JSON object or array, i.e. a task request rather
/// than an answer for the user. Scalars like `4` count as plain text.
pub fn is_structured(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Object(_) | Value::Array(_))
    )
}

/// Route a structured reply to its solver
pub fn dispatch(structured_text: &str) -> TaskOutcome {
    let envelope = match TaskEnvelope::parse(structured_text) {
        Ok(envelope) => envelope,
        Err(e) => return TaskOutcome::failure(&e, None),
    };

    let task_id = envelope.task_id;
    let Some(kind) = task_id.and_then(TaskKind::from_id) else {
        return TaskOutcome::failure(&TaskError::UnknownTask, task_id);
    };

    match kind {
        TaskKind::Arithmetic => solve_arithmetic(&envelope, task_id),
        TaskKind::TravelingSalesman | TaskKind::MaxClique | TaskKind::Knapsack => {
            TaskOutcome::failure(
                &TaskError::UnsupportedTask {
                    id: kind.id(),
                    name: kind.display_name(),
                },
                task_id,
            )
        }
    }
}

fn solve_arithmetic(envelope: &TaskEnvelope, task_id: Option<i64>) -> TaskOutcome {
    let Some(expression) = envelope.expression() else {
        return TaskOutcome::failure(&TaskError::MissingExpression, task_id);
    };

    match arithmetic::evaluate(expression) {
        Ok(value) => TaskOutcome::success(format!("{expression} = {value}"), task_id),
        Err(e) => TaskOutcome::failure(&TaskError::from(e), task_id),
    }
}
