mod handlers;
mod models;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub use handlers::{chat, index, not_found, status, EMPTY_MESSAGE_ERROR, READY_STATUS};
pub use models::{ChatRequest, ChatResponse, StatusResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/chat", post(chat))
        .route("/api/status", get(status))
        .fallback(not_found)
        .with_state(state)
}
