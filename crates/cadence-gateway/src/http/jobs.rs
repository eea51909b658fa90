//! Scheduler introspection: GET /v1/scheduler/jobs
//!
//! Lists the reminder jobs currently held in memory, earliest first.

use axum::{extract::State, http::HeaderMap, Json};
use cadence_scheduler::Job;
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_token;
use crate::http::error::ApiError;

#[derive(Serialize)]
pub struct JobList {
    pub jobs: Vec<Job>,
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<JobList>, ApiError> {
    require_token(&state, &headers)?;
    Ok(Json(JobList {
        jobs: state.reminders.scheduler().pending(),
    }))
}
