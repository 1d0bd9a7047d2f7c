use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::helpers::random_id;

use super::handlers::{error_response, AppState};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SERVER_KEY_HEADER: &str = "x-server-key";
pub const API_KEY_HEADER: &str = "x-api-key";

const HEALTH_PATH: &str = "/health";

/// Correlation id for one HTTP request, echoed back in `X-Request-ID`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tags every request with an id and enforces the optional server key.
/// `/health` stays open so probes work without credentials.
pub async fn request_context<B>(
    State(state): State<AppState>,
    mut request: Request<B>,
    next: Next<B>,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| random_id(8));
    let request_id = RequestId(request_id);

    let authorized = match state.server_key.as_deref() {
        None => true,
        Some(_) if request.uri().path() == HEALTH_PATH => true,
        Some(expected) => request
            .headers()
            .get(SERVER_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|provided| provided == expected)
            .unwrap_or(false),
    };

    let mut response = if authorized {
        request.extensions_mut().insert(request_id.clone());
        next.run(request).await
    } else {
        warn!(
            request_id = %request_id.as_str(),
            path = %request.uri().path(),
            "rejected request with missing or wrong server key"
        );
        error_response(StatusCode::UNAUTHORIZED, "unauthorized", &request_id)
    };

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
