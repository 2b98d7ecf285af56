//! HTTP boundary: router, wire types, error envelope.

mod lists;

pub use lists::{AppState, MovieItemDto, build_router};

use std::time::Instant;

use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use crate::application::lists::ListError;

pub mod codes {
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
    pub const UNKNOWN_LIST: &str = "unknown_list";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn invalid_parameter(hint: String) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_PARAMETER,
            "Invalid query parameter",
            Some(hint),
        )
    }

    pub fn unknown_list(hint: String) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::UNKNOWN_LIST,
            "Unknown list",
            Some(hint),
        )
    }

    pub fn upstream(hint: String) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM_ERROR,
            "Upstream list fetch failed",
            Some(hint),
        )
    }
}

impl From<ListError> for ApiError {
    fn from(error: ListError) -> Self {
        match error {
            ListError::Key(err) => ApiError::unknown_list(err.to_string()),
            ListError::Filter(err) => ApiError::invalid_parameter(err.to_string()),
            ListError::Load(err) => ApiError::upstream(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Log every response with its method, path, status and latency.
pub(crate) async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = started_at.elapsed().as_secs_f64() * 1000.0;
    if status.is_server_error() {
        error!(%method, path, status = status.as_u16(), latency_ms, "request failed");
    } else {
        debug!(%method, path, status = status.as_u16(), latency_ms, "request completed");
    }
    response
}
