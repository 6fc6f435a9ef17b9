//! Chat request handler
//!
//! Pipeline per request: parse body → role-filter history → assemble a
//! budget-bounded prompt → start the backend generation → bridge the
//! fragment stream into the response body.
//!
//! Assembly-time failures are reported synchronously with a clean error
//! status. Once streaming has begun, failures can only abort the body:
//! the headers are already sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::server::AppState;
use super::streaming::{bridge_generation, StreamCallbacks};
use crate::api::ChatRequest;
use crate::backend::{BackendError, GenerationParams};
use crate::prompt::{assemble, AssembleError, AssembledPrompt};
use crate::stats::{format_request_log, format_stats, RequestStats};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("malformed request body: {0}")]
    MalformedInput(#[from] serde_json::Error),

    #[error(transparent)]
    Budget(#[from] AssembleError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ChatError::Budget(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ChatError::Backend(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::error!(error = %self, status = %status, "Chat request failed");
        (status, self.to_string()).into_response()
    }
}

/// Handle POST /chat
pub async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ChatError> {
    let start = Instant::now();

    let request: ChatRequest = serde_json::from_slice(&body)?;
    tracing::info!("{}", format_request_log(&request));

    let turns = request.history();
    let dropped_roles = request.messages.len() - turns.len();
    if dropped_roles > 0 {
        tracing::debug!(dropped = dropped_roles, "Dropped non-chat roles from history");
    }

    let prompt = assemble(
        &state.config.prompt.system,
        &turns,
        &state.config.model.budget(),
        state.token_counter.as_ref(),
        state.prompt_format.as_ref(),
    )?;
    tracing::debug!(
        prompt_tokens = prompt.token_count(),
        turns_retained = prompt.turns_retained(),
        turns_trimmed = turns.len() - prompt.turns_retained(),
        "Prompt assembled"
    );

    let params = GenerationParams::from(&state.config.model);
    let upstream = state.backend.stream_generation(&prompt, &params).await?;

    let callbacks = lifecycle_callbacks(&state, &prompt, start);
    let stream = bridge_generation(upstream, callbacks);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .unwrap()
        .into_response())
}

/// Wire the bridge's lifecycle hooks to logging and stats collection
fn lifecycle_callbacks(
    state: &AppState,
    prompt: &AssembledPrompt,
    start: Instant,
) -> StreamCallbacks {
    if !state.config.stats.enabled {
        return StreamCallbacks::new();
    }

    let fragments = Arc::new(AtomicUsize::new(0));
    let fragments_counter = fragments.clone();
    let prompt_tokens = prompt.token_count();
    let turns_retained = prompt.turns_retained();
    let stats_format = state.config.stats.format;

    StreamCallbacks::new()
        .on_start(|| tracing::debug!("Generation stream opened"))
        .on_token(move |_| {
            fragments_counter.fetch_add(1, Ordering::Relaxed);
        })
        .on_completion(|| tracing::debug!("Generation complete"))
        .on_final(move |full_text| {
            let stats = RequestStats::record(
                prompt_tokens,
                turns_retained,
                fragments.load(Ordering::Relaxed),
                full_text,
                start.elapsed(),
            );
            tracing::info!("{}", format_stats(&stats, stats_format));
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let malformed =
            ChatError::MalformedInput(serde_json::from_str::<ChatRequest>("{").unwrap_err());
        assert_eq!(malformed.into_response().status(), StatusCode::BAD_REQUEST);

        let budget = ChatError::Budget(AssembleError::BudgetExceeded {
            used: 100,
            budget: 10,
        });
        assert_eq!(
            budget.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let backend = ChatError::Backend(BackendError::Status(500));
        assert_eq!(backend.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
