//! Caller identity extraction.
//!
//! Authentication happens upstream (gateway validates the session and
//! injects identity headers); this extractor only reads the result.
//! Requests missing the headers are rejected with 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;

use crate::models::mint_order::ErrorResponse;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_WALLET_HEADER: &str = "x-user-wallet";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub wallet_address: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = || {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("authentication required")),
            )
        };

        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(unauthorized)?;

        let wallet_address = parts
            .headers
            .get(USER_WALLET_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_lowercase())
            .ok_or_else(unauthorized)?;

        Ok(AuthUser { id, wallet_address })
    }
}
