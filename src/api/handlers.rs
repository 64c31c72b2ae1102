//! HTTP request handlers

use super::types::*;
use super::AppState;
use crate::runtime::LoopError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/new_message", post(new_message))
        .route("/health", get(health))
        .with_state(state)
}

async fn new_message(
    State(state): State<AppState>,
    payload: Result<Json<NewMessageRequest>, JsonRejection>,
) -> Result<Json<NewMessageResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Unprocessable(e.body_text()))?;

    tracing::info!(conversation_id = req.conversation_id, "New message");

    let answer = state
        .runtime
        .handle_message(req.conversation_id, &req.text)
        .await?;

    Ok(Json(NewMessageResponse::success(answer)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    Unprocessable(String),
    Internal(String),
}

impl From<LoopError> for AppError {
    fn from(e: LoopError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoopConfig;
    use crate::runtime::testing::{InMemoryContextStore, MockClassifier};
    use crate::runtime::AgentRuntime;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<InMemoryContextStore>, Arc<MockClassifier>) {
        let store = Arc::new(InMemoryContextStore::new());
        let classifier = Arc::new(MockClassifier::new());
        let runtime = AgentRuntime::new(store.clone(), classifier.clone(), LoopConfig::default());
        let app = create_router(AppState::new(Arc::new(runtime)));
        (app, store, classifier)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/new_message")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = test_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, serde_json::json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_new_message_success() {
        let (app, store, classifier) = test_app();
        classifier.queue_reply("4", 10);

        let response = app
            .oneshot(post_json(r#"{"conversation_id": 1, "text": "What is 2+2?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({"status": "success", "answer_text": "4"})
        );
        assert_eq!(store.stored(1).as_deref(), Some("User: What is 2+2?"));
    }

    #[tokio::test]
    async fn test_new_message_accepts_chat_id() {
        let (app, store, classifier) = test_app();
        classifier.queue_reply("hello", 1);

        let response = app
            .oneshot(post_json(r#"{"chat_id": 42, "text": "hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.stored(42).as_deref(), Some("User: hi"));
    }

    #[tokio::test]
    async fn test_loop_failure_is_500() {
        let (app, store, classifier) = test_app();
        for _ in 0..3 {
            classifier.queue_reply(r#"{"task_id":99}"#, 1);
        }

        let response = app
            .oneshot(post_json(r#"{"conversation_id": 3, "text": "Solve it"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("Maximum number of loop cycles"));
        assert_eq!(store.stored(3), None);
    }

    #[tokio::test]
    async fn test_malformed_request_is_rejected() {
        let (app, _, classifier) = test_app();
        let response = app
            .oneshot(post_json(r#"{"text": "missing id"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(read_json(response).await["status"], "error");
        assert!(classifier.recorded_prompts().is_empty());
    }
}
