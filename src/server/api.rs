use crate::error::{ BoxError, RelayError };
use crate::llm::{ ChunkStream, ModelBackend };
use crate::models::chat::{ ChatRequest, ErrorBody, ModelList };
use crate::stream::encode_line;
use std::sync::Arc;
use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::{ header, StatusCode },
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use futures::StreamExt;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    backend: Arc<dyn ModelBackend>,
}

pub fn router(backend: Arc<dyn ModelBackend>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler).fallback(method_not_allowed))
        .route("/api/models", get(models_handler))
        .layer(cors)
        .with_state(AppState { backend })
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message.to_string() })).into_response()
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    match open_relay(&state, &body, request_id).await {
        Ok(chunks) => stream_response(chunks, request_id),
        Err(e) => {
            error!("[{}] Error: {}", request_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn open_relay(
    state: &AppState,
    body: &[u8],
    request_id: Uuid
) -> Result<ChunkStream, BoxError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(RelayError::from)?;
    let model = request.model
        .filter(|m| !m.trim().is_empty())
        .or_else(|| state.backend.default_model())
        .ok_or(RelayError::MissingModel)?;

    info!(
        "[{}] Relaying {} messages to model '{}'",
        request_id,
        request.messages.len(),
        model
    );
    state.backend.chat_stream(&model, &request.messages).await
}

/// Each chunk goes out as `JSON + "\n"`. A backend error ends the body with
/// an error, which aborts the HTTP response.
fn stream_response(chunks: ChunkStream, request_id: Uuid) -> Response {
    let body = chunks.map(move |chunk| {
        let line = chunk.and_then(|value| encode_line(&value).map_err(|e| Box::new(e) as BoxError));
        if let Err(e) = &line {
            error!("[{}] Aborting stream: {}", request_id, e);
        }
        line
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    ).into_response()
}

async fn models_handler(State(state): State<AppState>) -> Json<ModelList> {
    Json(fetch_model_list(state.backend.as_ref()).await)
}

pub async fn fetch_model_list(backend: &dyn ModelBackend) -> ModelList {
    match backend.list_models().await {
        Ok(models) => ModelList { models, error: None },
        Err(e) => {
            error!("Error fetching models: {}", e);
            ModelList {
                models: Vec::new(),
                error: Some("Failed to fetch models".into()),
            }
        }
    }
}
