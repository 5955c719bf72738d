//! HTTP-facing error type
//!
//! Maps `ArgoError` onto status codes and a stable JSON error body, kept
//! separate from the library-internal `ArgoError` so the wire contract can
//! evolve independently of the error taxonomy it's built from.

use crate::error::ArgoError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Argo(#[from] ArgoError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    code: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Argo(e) => match e {
                ArgoError::NotFound(_) => StatusCode::NOT_FOUND,
                ArgoError::Duplicate(_) => StatusCode::CONFLICT,
                ArgoError::InvalidState(_) => StatusCode::CONFLICT,
                ArgoError::InputInvalid(_)
                | ArgoError::InputTooLarge(_)
                | ArgoError::ProtocolFormat(_)
                | ArgoError::Serde(_) => StatusCode::BAD_REQUEST,
                ArgoError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                ArgoError::Provider(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> String {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST".to_string(),
            ApiError::Argo(e) => e.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: "argo_api_error",
            message: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
