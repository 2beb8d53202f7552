//! Caller identity forwarded by the upstream auth gate.
//!
//! Token validation happens before requests reach this service; it only
//! trusts the `x-account-id` and `x-staff-id` headers.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::{AppError, Result};

/// Header carrying the authenticated account.
pub const ACCOUNT_HEADER: &str = "x-account-id";
/// Header carrying the staff record of the account, if any.
pub const STAFF_HEADER: &str = "x-staff-id";

/// Authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Account identifier.
    pub account_id: i64,
    /// Staff identifier when the account belongs to staff.
    pub staff_id: Option<i64>,
}

impl Caller {
    /// Parse the identity headers.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if the account header is missing or either header
    /// is not an integer.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let account_id = header_id(headers, ACCOUNT_HEADER)?
            .ok_or_else(|| AppError::Unauthorized("missing caller identity".into()))?;
        let staff_id = header_id(headers, STAFF_HEADER)?;
        Ok(Self { account_id, staff_id })
    }

    /// Staff identifier, required for staff-only actions.
    ///
    /// # Errors
    ///
    /// `Forbidden` when the caller has no staff record.
    pub fn require_staff(&self) -> Result<i64> {
        self.staff_id
            .ok_or_else(|| AppError::Forbidden("staff record required".into()))
    }
}

fn header_id(headers: &HeaderMap, name: &str) -> Result<Option<i64>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .ok_or_else(|| AppError::Unauthorized(format!("invalid {name} header")))
        })
        .transpose()
}

/// Reject requests without identity and expose [`Caller`] to handlers.
///
/// # Errors
///
/// `Unauthorized` as described on [`Caller::from_headers`].
pub async fn require_caller(mut request: Request, next: Next) -> Result<Response> {
    let caller = Caller::from_headers(request.headers())?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
