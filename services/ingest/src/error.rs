use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use evsync_common::error::EvsyncError;

pub struct ApiError(pub EvsyncError);

impl From<EvsyncError> for ApiError {
    fn from(err: EvsyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EvsyncError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            EvsyncError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EvsyncError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
