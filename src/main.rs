//! Task agent - LLM-driven conversation loop with task dispatch
//!
//! Each user message is classified by an LLM that either answers directly
//! or requests a computational task; task results are folded back into the
//! conversation until a plain-text answer comes out.

mod api;
mod config;
mod db;
mod llm;
mod prompts;
mod runtime;
mod state_machine;
mod tasks;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::{GigaChatService, LlmService, LoggingService};
use runtime::{AgentRuntime, DatabaseStorage, ServiceClassifier};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_agent=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.server.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::info!(path = %config.server.db_path.display(), "Opening database");
    let db = Database::open(&config.server.db_path)?;

    let gigachat = GigaChatService::new(&config.gigachat)?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gigachat)));
    tracing::info!(
        model = %llm.model_id(),
        max_tokens = config.agent.max_tokens,
        max_loop_cycles = config.agent.max_loop_cycles,
        "Classifier client initialized"
    );

    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(DatabaseStorage::new(db)),
        Arc::new(ServiceClassifier::new(llm)),
        config.agent,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(runtime))
        .layer(cors)
        .layer(CompressionLayer::new().gzip(true))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Task agent listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the last handle on the classifier client) is
    // dropped once serve returns
    tracing::info!("Server stopped, classifier client released");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
