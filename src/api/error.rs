//! Mapping of coordinator errors onto HTTP responses

use crate::error::CoordinatorError;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Handler error; renders as `{ "success": false, "error": <message> }`
#[derive(Debug)]
pub struct ApiError(pub CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoordinatorError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::DuplicateAuction { .. } => StatusCode::CONFLICT,
            CoordinatorError::AuctionNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "success": false,
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
