use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use cadence_core::config::CadenceConfig;
use cadence_scheduler::ReminderService;
use cadence_store::DocumentStore;
use chrono::{DateTime, Utc};

use crate::http::{habits, health, jobs, profile, tasks};

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CadenceConfig,
    pub store: Arc<dyn DocumentStore>,
    /// Reminder scheduling; handlers call its `on_*` hooks after each write.
    pub reminders: ReminderService,
}

impl AppState {
    pub fn new(
        config: CadenceConfig,
        store: Arc<dyn DocumentStore>,
        reminders: ReminderService,
    ) -> Self {
        Self {
            config,
            store,
            reminders,
        }
    }

    /// Timestamp for writes, from the scheduler's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.reminders.scheduler().now()
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/v1/scheduler/jobs", get(jobs::list_jobs))
        .route(
            "/v1/users/{user_id}/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route(
            "/v1/users/{user_id}/tasks/{task_id}",
            patch(tasks::update_task).delete(tasks::delete_task),
        )
        .route(
            "/v1/users/{user_id}/tasks/{task_id}/toggle",
            post(tasks::toggle_task),
        )
        .route(
            "/v1/users/{user_id}/habits",
            post(habits::create_habit).get(habits::list_habits),
        )
        .route(
            "/v1/users/{user_id}/habits/{habit_id}",
            patch(habits::update_habit).delete(habits::delete_habit),
        )
        .route(
            "/v1/users/{user_id}/habits/{habit_id}/check-in",
            post(habits::check_in_habit),
        )
        .route("/v1/users/{user_id}/profile", put(profile::put_profile))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
