//! API request and response types

use serde::{Deserialize, Serialize};

/// Request to answer a user message
#[derive(Debug, Deserialize)]
pub struct NewMessageRequest {
    #[serde(alias = "chat_id")]
    pub conversation_id: i64,
    pub text: String,
}

/// Successful answer
#[derive(Debug, Serialize)]
pub struct NewMessageResponse {
    pub status: &'static str,
    pub answer_text: String,
}

impl NewMessageResponse {
    pub fn success(answer_text: impl Into<String>) -> Self {
        Self {
            status: "success",
            answer_text: answer_text.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            status: "error",
            detail: detail.into(),
        }
    }
}
