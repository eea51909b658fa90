//! Habit CRUD: `/v1/users/{user_id}/habits`

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use cadence_core::types::{Habit, HabitPatch, NewHabit};
use cadence_store::repo::{delete_habit as remove_habit, habits_for_user, load_habit, save_habit};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::require_token;
use crate::http::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitResponse {
    pub id: String,
    pub habit: Habit,
    pub reminder_job_id: Option<String>,
}

#[derive(Serialize)]
pub struct HabitView {
    pub id: String,
    #[serde(flatten)]
    pub habit: Habit,
}

#[derive(Serialize)]
pub struct HabitList {
    pub habits: Vec<HabitView>,
}

/// POST /v1/users/{user_id}/habits
pub async fn create_habit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(input): Json<NewHabit>,
) -> Result<(StatusCode, Json<HabitResponse>), ApiError> {
    require_token(&state, &headers)?;
    let habit = Habit::new(&user_id, input, state.now())?;
    let id = Uuid::now_v7().to_string();
    save_habit(state.store.as_ref(), &id, &habit).await?;
    info!(habit_id = %id, user_id = %user_id, frequency = %habit.frequency, "habit created");

    let reminder_job_id = match state.reminders.on_habit_created(&id, &habit).await {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(habit_id = %id, error = %e, "habit saved without a reminder");
            None
        }
    };
    Ok((
        StatusCode::CREATED,
        Json(HabitResponse {
            id,
            habit,
            reminder_job_id,
        }),
    ))
}

/// GET /v1/users/{user_id}/habits
pub async fn list_habits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<HabitList>, ApiError> {
    require_token(&state, &headers)?;
    let mut habits: Vec<HabitView> = habits_for_user(state.store.as_ref(), &user_id)
        .await?
        .into_iter()
        .map(|(id, habit)| HabitView { id, habit })
        .collect();
    habits.sort_by(|a, b| a.habit.created_at.cmp(&b.habit.created_at));
    Ok(Json(HabitList { habits }))
}

/// PATCH /v1/users/{user_id}/habits/{habit_id}
///
/// A frequency change applies from the reminder after the one already pending.
pub async fn update_habit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, habit_id)): Path<(String, String)>,
    Json(patch): Json<HabitPatch>,
) -> Result<Json<HabitResponse>, ApiError> {
    require_token(&state, &headers)?;
    let mut habit = owned_habit(&state, &user_id, &habit_id).await?;
    patch.apply(&mut habit, state.now())?;
    save_habit(state.store.as_ref(), &habit_id, &habit).await?;
    state.reminders.on_habit_updated(&habit_id, &habit).await;
    Ok(Json(HabitResponse {
        id: habit_id,
        habit,
        reminder_job_id: None,
    }))
}

/// DELETE /v1/users/{user_id}/habits/{habit_id}
pub async fn delete_habit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, habit_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_token(&state, &headers)?;
    owned_habit(&state, &user_id, &habit_id).await?;
    remove_habit(state.store.as_ref(), &habit_id).await?;
    let cancelled = state.reminders.on_habit_deleted(&habit_id).await;
    info!(habit_id = %habit_id, cancelled, "habit deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/users/{user_id}/habits/{habit_id}/check-in: record a completion.
pub async fn check_in_habit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, habit_id)): Path<(String, String)>,
) -> Result<Json<HabitResponse>, ApiError> {
    require_token(&state, &headers)?;
    let mut habit = owned_habit(&state, &user_id, &habit_id).await?;
    habit.check_in(state.now());
    save_habit(state.store.as_ref(), &habit_id, &habit).await?;
    state.reminders.on_habit_updated(&habit_id, &habit).await;
    info!(habit_id = %habit_id, streak = habit.streak, "habit checked in");
    Ok(Json(HabitResponse {
        id: habit_id,
        habit,
        reminder_job_id: None,
    }))
}

async fn owned_habit(state: &AppState, user_id: &str, habit_id: &str) -> Result<Habit, ApiError> {
    match load_habit(state.store.as_ref(), habit_id).await? {
        Some(habit) if habit.user_id == user_id => Ok(habit),
        _ => Err(ApiError::not_found("habit", habit_id)),
    }
}
