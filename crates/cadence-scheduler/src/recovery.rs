use cadence_core::types::{EntityKind, Habit, Task};
use cadence_store::repo::{list_raw, HABITS, TASKS};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::reminders::ReminderService;

/// Counts from one startup recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub tasks_scheduled: usize,
    pub habits_scheduled: usize,
    /// Tasks with no reminder left to send.
    pub skipped: usize,
    /// Entities that could not be decoded or whose owner could not be resolved.
    pub failed: usize,
}

impl ReminderService {
    /// Rebuild pending jobs from persisted tasks and habits.
    ///
    /// Called once at startup. Failures are isolated per entity: a bad
    /// document or an unknown owner is logged and counted, and the pass
    /// carries on.
    pub async fn initialize_scheduler(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        match list_raw(self.store.as_ref(), TASKS).await {
            Ok(tasks) => {
                for (id, raw) in tasks {
                    match self.recover_task(&id, raw).await {
                        Ok(Some(_)) => report.tasks_scheduled += 1,
                        Ok(None) => report.skipped += 1,
                        Err(e) => {
                            warn!(task_id = %id, error = %e, "task reminder not recovered");
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => error!(error = %e, "could not list tasks for recovery"),
        }

        match list_raw(self.store.as_ref(), HABITS).await {
            Ok(habits) => {
                for (id, raw) in habits {
                    match self.recover_habit(&id, raw).await {
                        Ok(_) => report.habits_scheduled += 1,
                        Err(e) => {
                            warn!(habit_id = %id, error = %e, "habit reminder not recovered");
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => error!(error = %e, "could not list habits for recovery"),
        }

        info!(
            tasks = report.tasks_scheduled,
            habits = report.habits_scheduled,
            skipped = report.skipped,
            failed = report.failed,
            "scheduler recovery complete"
        );
        report
    }

    async fn recover_task(&self, task_id: &str, raw: Value) -> Result<Option<String>> {
        let task: Task = decode(EntityKind::Task, task_id, raw)?;
        let lead = self.scheduler.settings().due_reminder_lead;
        match task.due_reminder_at(lead) {
            Some(trigger) if trigger > self.scheduler.now() => {}
            _ => return Ok(None),
        }
        let contact = self.users.get_user_by_id(&task.user_id).await?;
        Ok(self.schedule_task_due_reminder(
            task_id,
            &task,
            &task.user_id,
            &contact.email,
            contact.greeting_name(),
        ))
    }

    async fn recover_habit(&self, habit_id: &str, raw: Value) -> Result<String> {
        let habit: Habit = decode(EntityKind::Habit, habit_id, raw)?;
        let contact = self.users.get_user_by_id(&habit.user_id).await?;
        Ok(self.schedule_habit_reminder(
            habit_id,
            &habit,
            &habit.user_id,
            &contact.email,
            contact.greeting_name(),
        ))
    }
}

fn decode<T: DeserializeOwned>(kind: EntityKind, id: &str, raw: Value) -> Result<T> {
    serde_json::from_value(raw).map_err(|e| SchedulerError::InvalidEntity {
        kind,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, t0, Harness};
    use crate::types::JobKind;
    use cadence_core::types::{Frequency, NewHabit, NewTask, Priority};
    use cadence_store::repo::{save_habit, save_task};
    use cadence_store::DocumentStore;
    use chrono::Duration;
    use serde_json::json;

    fn task(user: &str, due_in: Duration) -> Task {
        Task::new(
            user,
            NewTask {
                title: "File taxes".to_string(),
                description: None,
                priority: Priority::Low,
                due_date: Some(t0() + due_in),
                completed: false,
            },
            t0(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn only_future_reminder_windows_are_recovered() {
        let h = Harness::new(t0()).await;
        let store = h.store.as_ref();
        // Reminder window already passed (due in 5 minutes).
        save_task(store, "past", &task("u1", Duration::minutes(5))).await.unwrap();
        save_task(store, "future", &task("u1", Duration::hours(3))).await.unwrap();

        let report = h.service.initialize_scheduler().await;
        assert_eq!(report.tasks_scheduled, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);

        let pending = h.scheduler().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.entity_id, "future");
        assert_eq!(pending[0].scheduled_for, t0() + Duration::minutes(165));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_entities_do_not_abort_the_pass() {
        let h = Harness::new(t0()).await;
        let store = h.store.as_ref();
        save_task(store, "orphan", &task("nobody", Duration::hours(2))).await.unwrap();
        store
            .set("tasks/garbled", json!({"userId": "u1", "dueDate": "tomorrow-ish"}))
            .await
            .unwrap();
        save_task(store, "ok", &task("u1", Duration::hours(2))).await.unwrap();

        let habit = Habit::new(
            "u1",
            NewHabit {
                name: "Meditate".to_string(),
                description: None,
                frequency: Frequency::Weekly,
            },
            t0(),
        )
        .unwrap();
        save_habit(store, "h1", &habit).await.unwrap();
        store.set("habits/h2", json!({"userId": 42})).await.unwrap();

        let report = h.service.initialize_scheduler().await;
        assert_eq!(
            report,
            RecoveryReport {
                tasks_scheduled: 1,
                habits_scheduled: 1,
                skipped: 0,
                failed: 3,
            }
        );

        let pending = h.scheduler().pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].payload.kind, JobKind::TaskDue);
        assert_eq!(pending[1].payload.kind, JobKind::HabitReminder);
        assert_eq!(pending[1].scheduled_for, at(2025, 3, 11, 9, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_recovers_nothing() {
        let h = Harness::new(t0()).await;
        let report = h.service.initialize_scheduler().await;
        assert_eq!(report, RecoveryReport::default());
        assert!(h.scheduler().is_empty());
    }
}
