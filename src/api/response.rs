//! JSON envelope shared by every endpoint.
//!
//! ```json
//! { "success": true, "data": { "id": 1 }, "message": "Visit created" }
//! ```

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::{AppError, Result};

/// Standard response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result payload; `null` on errors.
    pub data: T,
    /// Human-readable context.
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// Success envelope.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    /// Error envelope with default data.
    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }
}

/// Handler return type: status plus envelope, or an error mapped by
/// [`AppError`]'s `IntoResponse` impl.
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>)>;

/// `200 OK` with `data`.
#[allow(clippy::unnecessary_wraps)] // Handlers return it directly as their result.
pub fn ok<T: Serialize>(data: T, message: &str) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data, message))))
}

/// `201 Created` with `data`.
#[allow(clippy::unnecessary_wraps)]
pub fn created<T: Serialize>(data: T, message: &str) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data, message))))
}

/// Unwrap a JSON body, reporting malformed input as `InvalidData`.
///
/// # Errors
///
/// Returns `AppError::InvalidData` describing the rejection.
pub fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidData(rejection.body_text()))
}
