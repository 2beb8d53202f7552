//! Mapping of [`AppError`] onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::errors::ErrorFamily;
use crate::AppError;

use super::response::ApiResponse;

const INTERNAL_ERROR: &str = "internal server error";

impl AppError {
    /// Transport status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Active { kind, .. } => match kind.family() {
                ErrorFamily::NotFound => StatusCode::NOT_FOUND,
                ErrorFamily::AlreadyEnded | ErrorFamily::StateConflict => StatusCode::BAD_REQUEST,
                ErrorFamily::RoomConflict => StatusCode::CONFLICT,
            },
            Self::InvalidData(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Config(_) | Self::Db(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Active { kind, .. } => kind.message().to_owned(),
            Self::InvalidData(msg) | Self::Unauthorized(msg) | Self::Forbidden(msg) => msg.clone(),
            Self::Config(_) | Self::Db(_) | Self::Io(_) => {
                error!(err = %self, "request failed");
                INTERNAL_ERROR.to_owned()
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
