//! Axum `Router` assembly (spec §6.1): binds each wire-protocol handler
//! module to its path.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;
use crate::handlers::{anthropic, codex, models, openai};

pub fn build_router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/messages", post(anthropic::messages))
        .route("/v1/messages/count_tokens", post(anthropic::count_tokens))
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/responses", post(codex::responses))
        .route("/v1/models", get(models::list_models))
        .with_state(app)
}
