use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::QueueError;
use crate::task::{Credential, Task, TaskRequest, TaskStore};

use super::middleware::{RequestId, API_KEY_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub server_key: Option<Arc<str>>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(store: Arc<TaskStore>, server_key: Option<String>) -> Self {
        Self {
            store,
            server_key: server_key.map(Arc::from),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Body of `POST /run`. `api_key` is only a fallback for clients that cannot
/// send the `X-API-Key` header; it is moved out before anything is stored.
#[derive(Deserialize)]
pub struct RunRequest {
    #[serde(flatten)]
    pub task: TaskRequest,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: String,
    pub position: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResponse {
    pub queue_size: usize,
    pub current_task: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

pub fn status_for(err: &QueueError) -> StatusCode {
    match err {
        QueueError::Validation(_) => StatusCode::BAD_REQUEST,
        QueueError::NotFound(_) => StatusCode::NOT_FOUND,
        QueueError::QueueFull { .. } | QueueError::ShuttingDown => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        QueueError::Process(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(status: StatusCode, message: &str, request_id: &RequestId) -> Response {
    let body = ErrorResponse {
        error: message.to_string(),
        request_id: Some(request_id.as_str().to_string()),
    };
    (status, Json(body)).into_response()
}

fn queue_error(err: &QueueError, request_id: &RequestId) -> Response {
    error_response(status_for(err), &err.to_string(), request_id)
}

pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": state.version,
        "queue_size": state.store.size(),
        "current_task": state.store.current().unwrap_or_default(),
    }))
}

pub async fn handle_run(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid JSON: {}", rejection.body_text()),
                &request_id,
            )
        }
    };

    let header_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let credential = Credential::from(header_key.or(payload.api_key));

    match state.store.submit(payload.task, credential) {
        Ok(task) => {
            let response = SubmitResponse {
                position: state.store.position(&task.id),
                task_id: task.id,
                status: task.status.to_string(),
            };
            Json(response).into_response()
        }
        Err(err) => {
            warn!(request_id = %request_id.as_str(), error = %err, "task rejected");
            queue_error(&err, &request_id)
        }
    }
}

pub async fn handle_get_task(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get(&id) {
        Ok(task) => Json(task).into_response(),
        Err(err) => queue_error(&err, &request_id),
    }
}

pub async fn handle_cancel_task(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Response {
    if let Err(err) = state.store.get(&id) {
        return queue_error(&err, &request_id);
    }
    if state.store.cancel(&id) {
        Json(json!({"status": "cancelled"})).into_response()
    } else {
        error_response(
            StatusCode::BAD_REQUEST,
            "cannot cancel (task already finished)",
            &request_id,
        )
    }
}

pub async fn handle_queue(State(state): State<AppState>) -> Json<QueueResponse> {
    Json(QueueResponse {
        queue_size: state.store.size(),
        current_task: state.store.current().unwrap_or_default(),
        tasks: state.store.all(),
    })
}

pub async fn handle_clear(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Json<Value> {
    let cleared = state.store.clear();
    info!(request_id = %request_id.as_str(), cleared, "queue cleared over http");
    Json(json!({"cleared": cleared}))
}
