//! Chat server wiring

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::chat_handler;
use crate::backend::{GenerationBackend, LlamaCppBackend};
use crate::config::AppConfig;
use crate::prompt::{HeuristicTokenCounter, PromptFormat, TokenCounter};

/// Shared per-request state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn GenerationBackend>,
    pub prompt_format: Arc<dyn PromptFormat>,
    pub token_counter: Arc<dyn TokenCounter>,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        let prompt_format: Arc<dyn PromptFormat> = config.model.format.build().into();
        let token_counter: Arc<dyn TokenCounter> =
            Arc::new(HeuristicTokenCounter::new(config.model.chars_per_token));
        Self {
            config: Arc::new(config),
            backend,
            prompt_format,
            token_counter,
        }
    }
}

/// Build the router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the chat server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let backend = Arc::new(LlamaCppBackend::from_config(&config.backend)?);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config, backend);
    tracing::info!("Inference backend: {}", state.config.backend.base_url());
    tracing::info!(
        context_window = state.config.model.context_window_tokens,
        reserved_completion = state.config.model.reserved_completion_tokens,
        "Prompt budget configured"
    );

    let app = app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("llama-chat listening on {}", addr);

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
