use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use cadence_core::types::UserProfile;
use cadence_store::repo::save_profile;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::auth::require_token;
use crate::http::error::ApiError;

/// PUT /v1/users/{user_id}/profile: set the contact details reminders go to.
///
/// Reminders already pending keep the address they were scheduled with.
pub async fn put_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, ApiError> {
    require_token(&state, &headers)?;
    if !profile.email.contains('@') {
        return Err(ApiError::bad_request("email must be a valid address"));
    }
    save_profile(state.store.as_ref(), &user_id, &profile).await?;
    info!(user_id = %user_id, "profile updated");
    Ok(Json(profile))
}
