use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::backend::BackendReply;
use crate::AppState;

use super::models::{ChatRequest, ChatResponse, StatusResponse};

pub const EMPTY_MESSAGE_ERROR: &str = "메시지를 입력해주세요.";
pub const READY_STATUS: &str = "준비됨";

const INDEX_HTML: &str = include_str!("../../static/index.html");

type ChatError = (StatusCode, Json<ChatResponse>);

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!(status = %rejection.status(), "rejected chat request body");
        (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::failed(rejection.body_text())),
        )
    })?;

    let message = payload.message.unwrap_or_default();
    let message = message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::failed(EMPTY_MESSAGE_ERROR)),
        ));
    }

    match state.backend.ask(message).await {
        Ok(raw) => {
            let answer = BackendReply::decode(raw).into_text();
            Ok(Json(ChatResponse::answered(answer, message)))
        }
        Err(err) => {
            tracing::error!(error = %err, question = message, "backend failed to answer");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ChatResponse::failed(err.to_string()).with_user_message(message)),
            ))
        }
    }
}

/// Liveness only: the backend is set up before the server accepts requests.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        initialized: true,
        status: READY_STATUS,
    })
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ChatResponse::failed("route not found")),
    )
        .into_response()
}
