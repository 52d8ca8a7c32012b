//! Request extractors.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the caller's owner ID.
pub const OWNER_HEADER: &str = "x-user-id";

/// Identity of the caller, taken from [`OWNER_HEADER`] or the configured
/// default owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl FromRequestParts<Arc<AppState>> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match parts.headers.get(OWNER_HEADER) {
            Some(value) => {
                let owner = value
                    .to_str()
                    .map(str::trim)
                    .map_err(|_| ApiError::Unauthorized("invalid owner header".to_string()))?;
                if owner.is_empty() {
                    return Err(ApiError::Unauthorized("empty owner header".to_string()));
                }
                Ok(Owner(owner.to_string()))
            }
            None => state
                .default_owner
                .clone()
                .map(Owner)
                .ok_or_else(|| ApiError::Unauthorized("missing owner identity".to_string())),
        }
    }
}
