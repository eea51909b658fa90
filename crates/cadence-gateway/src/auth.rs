use axum::http::HeaderMap;

use crate::app::AppState;
use crate::http::error::ApiError;

/// Reject the request unless it carries the configured bearer token.
///
/// With no `gateway.auth_token` configured every request is allowed.
pub fn require_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if check_auth(state, headers) {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}

/// Returns true if the request is authorised.
fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match &state.config.gateway.auth_token {
        None => true,
        Some(expected) => extract_bearer(headers)
            .map(|t| t == expected)
            .unwrap_or(false),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
