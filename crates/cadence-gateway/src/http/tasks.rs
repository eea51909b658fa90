//! Task CRUD: `/v1/users/{user_id}/tasks`
//!
//! Every write is persisted first and then handed to the matching reminder
//! hook. A hook failure (e.g. the user has no profile yet) is logged and the
//! request still succeeds; the task simply has no reminder.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use cadence_core::types::{NewTask, Task, TaskPatch};
use cadence_store::repo::{delete_task as remove_task, load_task, save_task, tasks_for_user};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::require_token;
use crate::http::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub task: Task,
    pub reminder_job_id: Option<String>,
}

#[derive(Serialize)]
pub struct TaskView {
    pub id: String,
    #[serde(flatten)]
    pub task: Task,
}

#[derive(Serialize)]
pub struct TaskList {
    pub tasks: Vec<TaskView>,
}

/// POST /v1/users/{user_id}/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    require_token(&state, &headers)?;
    let task = Task::new(&user_id, input, state.now())?;
    let id = Uuid::now_v7().to_string();
    save_task(state.store.as_ref(), &id, &task).await?;
    info!(task_id = %id, user_id = %user_id, "task created");

    let reminder_job_id = match state.reminders.on_task_created(&id, &task).await {
        Ok(job) => job,
        Err(e) => {
            warn!(task_id = %id, error = %e, "task saved without a reminder");
            None
        }
    };
    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            id,
            task,
            reminder_job_id,
        }),
    ))
}

/// GET /v1/users/{user_id}/tasks
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<TaskList>, ApiError> {
    require_token(&state, &headers)?;
    let mut tasks: Vec<TaskView> = tasks_for_user(state.store.as_ref(), &user_id)
        .await?
        .into_iter()
        .map(|(id, task)| TaskView { id, task })
        .collect();
    tasks.sort_by(|a, b| a.task.created_at.cmp(&b.task.created_at));
    Ok(Json(TaskList { tasks }))
}

/// PATCH /v1/users/{user_id}/tasks/{task_id}
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, task_id)): Path<(String, String)>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<TaskResponse>, ApiError> {
    require_token(&state, &headers)?;
    let mut task = owned_task(&state, &user_id, &task_id).await?;
    let changes = patch.apply(&mut task, state.now())?;
    save_task(state.store.as_ref(), &task_id, &task).await?;

    let reminder_job_id = match state
        .reminders
        .on_task_updated(&task_id, &task, changes)
        .await
    {
        Ok(job) => job,
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "task reminder not rescheduled");
            None
        }
    };
    Ok(Json(TaskResponse {
        id: task_id,
        task,
        reminder_job_id,
    }))
}

/// DELETE /v1/users/{user_id}/tasks/{task_id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, task_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_token(&state, &headers)?;
    owned_task(&state, &user_id, &task_id).await?;
    remove_task(state.store.as_ref(), &task_id).await?;
    let cancelled = state.reminders.on_task_deleted(&task_id).await;
    info!(task_id = %task_id, cancelled, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/users/{user_id}/tasks/{task_id}/toggle: flip completion.
pub async fn toggle_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, task_id)): Path<(String, String)>,
) -> Result<Json<TaskResponse>, ApiError> {
    require_token(&state, &headers)?;
    let mut task = owned_task(&state, &user_id, &task_id).await?;
    task.completed = !task.completed;
    task.updated_at = state.now();
    save_task(state.store.as_ref(), &task_id, &task).await?;

    let reminder_job_id = match state
        .reminders
        .on_task_completion_toggled(&task_id, &task)
        .await
    {
        Ok(job) => job,
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "task reminder not rescheduled");
            None
        }
    };
    Ok(Json(TaskResponse {
        id: task_id,
        task,
        reminder_job_id,
    }))
}

/// Load a task, treating one owned by another user as missing.
async fn owned_task(state: &AppState, user_id: &str, task_id: &str) -> Result<Task, ApiError> {
    match load_task(state.store.as_ref(), task_id).await? {
        Some(task) if task.user_id == user_id => Ok(task),
        _ => Err(ApiError::not_found("task", task_id)),
    }
}
