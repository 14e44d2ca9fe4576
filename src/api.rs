use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub order: Option<String>,
}

pub fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse { data })).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse { data })).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn error_with(status: StatusCode, msg: &str, details: Option<Value>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
            details,
        }),
    )
        .into_response()
}

pub fn not_found(msg: &str) -> Response {
    error_with(StatusCode::NOT_FOUND, msg, None)
}

pub fn bad_request(msg: &str) -> Response {
    error_with(StatusCode::BAD_REQUEST, msg, None)
}

pub fn conflict(msg: &str) -> Response {
    error_with(StatusCode::CONFLICT, msg, None)
}

pub fn internal_error(msg: &str) -> Response {
    error_with(StatusCode::INTERNAL_SERVER_ERROR, msg, None)
}
