use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Client-visible request errors. None of these touch world state.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload too large")]
    PayloadTooLarge,

    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
