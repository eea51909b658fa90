//! Entry points the CRUD layer calls after it has persisted a mutation.
//!
//! Each hook holds the service's hook guard for its whole
//! cancel-then-reschedule sequence, so two hooks for the same entity never
//! interleave. A timer that fires concurrently is unaffected: it has already
//! left the job store by the time its callback runs.

use cadence_core::types::{Habit, Task, TaskChanges, UserProfile};
use tracing::{debug, info};

use crate::error::Result;
use crate::reminders::ReminderService;

impl ReminderService {
    pub async fn on_task_created(&self, task_id: &str, task: &Task) -> Result<Option<String>> {
        let _guard = self.hook_guard.lock().await;
        if task.due_date.is_none() || task.completed {
            return Ok(None);
        }
        let contact = self.contact(&task.user_id).await?;
        Ok(self.schedule_task_due_reminder(
            task_id,
            task,
            &task.user_id,
            &contact.email,
            contact.greeting_name(),
        ))
    }

    /// `task` is the state after the update; `changes` says which
    /// schedule-relevant fields the update touched.
    pub async fn on_task_updated(
        &self,
        task_id: &str,
        task: &Task,
        changes: TaskChanges,
    ) -> Result<Option<String>> {
        if !changes.touches_schedule() {
            debug!(task_id, "task update does not affect reminders");
            return Ok(None);
        }
        let _guard = self.hook_guard.lock().await;
        let cancelled = self.cancel_all_jobs_for_task(task_id);
        debug!(task_id, cancelled, "task reminders reset after update");
        if task.completed || task.due_date.is_none() {
            return Ok(None);
        }
        let contact = self.contact(&task.user_id).await?;
        Ok(self.schedule_task_due_reminder(
            task_id,
            task,
            &task.user_id,
            &contact.email,
            contact.greeting_name(),
        ))
    }

    pub async fn on_task_deleted(&self, task_id: &str) -> usize {
        let _guard = self.hook_guard.lock().await;
        self.cancel_all_jobs_for_task(task_id)
    }

    /// `task` carries the new completion state.
    pub async fn on_task_completion_toggled(
        &self,
        task_id: &str,
        task: &Task,
    ) -> Result<Option<String>> {
        let _guard = self.hook_guard.lock().await;
        if task.completed {
            let cancelled = self.cancel_all_jobs_for_task(task_id);
            info!(task_id, cancelled, "task completed; reminders cancelled");
            return Ok(None);
        }
        let now = self.scheduler.now();
        if !task.due_date.is_some_and(|due| due > now) {
            return Ok(None);
        }
        self.cancel_all_jobs_for_task(task_id);
        let contact = self.contact(&task.user_id).await?;
        Ok(self.schedule_task_due_reminder(
            task_id,
            task,
            &task.user_id,
            &contact.email,
            contact.greeting_name(),
        ))
    }

    pub async fn on_habit_created(&self, habit_id: &str, habit: &Habit) -> Result<String> {
        let _guard = self.hook_guard.lock().await;
        let contact = self.contact(&habit.user_id).await?;
        Ok(self.schedule_habit_reminder(
            habit_id,
            habit,
            &habit.user_id,
            &contact.email,
            contact.greeting_name(),
        ))
    }

    /// Updates never reschedule. The pending reminder keeps its time and a
    /// new frequency takes effect from the occurrence after it.
    pub async fn on_habit_updated(&self, habit_id: &str, habit: &Habit) {
        debug!(habit_id, frequency = %habit.frequency, "habit updated; reminder cadence unchanged");
    }

    pub async fn on_habit_deleted(&self, habit_id: &str) -> usize {
        let _guard = self.hook_guard.lock().await;
        self.cancel_all_jobs_for_habit(habit_id)
    }

    async fn contact(&self, user_id: &str) -> Result<UserProfile> {
        Ok(self.users.get_user_by_id(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SchedulerError;
    use crate::testing::{at, t0, Harness};
    use crate::types::JobKind;
    use cadence_core::types::{Frequency, Habit, NewHabit, NewTask, Priority, Task, TaskPatch};
    use chrono::Duration;

    fn new_task(user: &str, due_in: Option<Duration>) -> Task {
        Task::new(
            user,
            NewTask {
                title: "Pay rent".to_string(),
                description: None,
                priority: Priority::Medium,
                due_date: due_in.map(|d| t0() + d),
                completed: false,
            },
            t0(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn task_lifecycle_keeps_jobs_in_step() {
        let h = Harness::new(t0()).await;
        let svc = &h.service;
        let mut task = new_task("u1", Some(Duration::hours(2)));

        let first = svc.on_task_created("t1", &task).await.unwrap().unwrap();
        assert_eq!(
            h.scheduler().get(&first).unwrap().scheduled_for,
            t0() + Duration::minutes(105)
        );

        // Title-only edits leave the job alone.
        let changes = TaskPatch {
            title: Some("Pay rent today".to_string()),
            ..TaskPatch::default()
        }
        .apply(&mut task, t0())
        .unwrap();
        assert_eq!(svc.on_task_updated("t1", &task, changes).await.unwrap(), None);
        assert!(h.scheduler().get(&first).is_some());

        let changes = TaskPatch {
            due_date: Some(Some(t0() + Duration::hours(5))),
            ..TaskPatch::default()
        }
        .apply(&mut task, t0())
        .unwrap();
        let moved = svc.on_task_updated("t1", &task, changes).await.unwrap().unwrap();
        assert_ne!(moved, first);
        let pending = h.scheduler().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_for, t0() + Duration::minutes(285));

        let changes = TaskPatch {
            due_date: Some(None),
            ..TaskPatch::default()
        }
        .apply(&mut task, t0())
        .unwrap();
        assert_eq!(svc.on_task_updated("t1", &task, changes).await.unwrap(), None);
        assert!(h.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_toggle_cancels_and_restores() {
        let h = Harness::new(t0()).await;
        let svc = &h.service;
        let mut task = new_task("u1", Some(Duration::hours(1)));
        svc.on_task_created("t1", &task).await.unwrap().unwrap();

        task.completed = true;
        assert_eq!(svc.on_task_completion_toggled("t1", &task).await.unwrap(), None);
        assert!(h.scheduler().is_empty());

        task.completed = false;
        let id = svc.on_task_completion_toggled("t1", &task).await.unwrap().unwrap();
        assert_eq!(h.scheduler().len(), 1);
        assert_eq!(
            h.scheduler().get(&id).unwrap().scheduled_for,
            t0() + Duration::minutes(45)
        );

        // Toggling again while pending does not duplicate.
        svc.on_task_completion_toggled("t1", &task).await.unwrap();
        assert_eq!(h.scheduler().len(), 1);

        assert_eq!(svc.on_task_deleted("t1").await, 1);
        assert!(h.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn undated_tasks_never_look_up_the_user() {
        let h = Harness::new(t0()).await;
        // "ghost" has no profile; no lookup means no error.
        let task = new_task("ghost", None);
        assert_eq!(h.service.on_task_created("t1", &task).await.unwrap(), None);

        let dated = new_task("ghost", Some(Duration::hours(1)));
        let err = h.service.on_task_created("t2", &dated).await.unwrap_err();
        assert!(matches!(err, SchedulerError::UserNotFound { ref id } if id == "ghost"));
        assert!(h.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn habit_hooks_schedule_and_cancel() {
        let h = Harness::new(t0()).await;
        let svc = &h.service;
        let mut habit = Habit::new(
            "u1",
            NewHabit {
                name: "Read".to_string(),
                description: None,
                frequency: Frequency::Daily,
            },
            t0(),
        )
        .unwrap();

        let id = svc.on_habit_created("h1", &habit).await.unwrap();
        let job = h.scheduler().get(&id).unwrap();
        assert_eq!(job.scheduled_for, at(2025, 3, 11, 9, 0));
        assert_eq!(job.payload.kind, JobKind::HabitReminder);
        assert_eq!(job.payload.email, "ada@example.com");
        assert_eq!(job.payload.name, "Ada");

        habit.frequency = Frequency::Weekly;
        svc.on_habit_updated("h1", &habit).await;
        assert_eq!(h.scheduler().get(&id).unwrap().scheduled_for, at(2025, 3, 11, 9, 0));

        assert_eq!(svc.on_habit_deleted("h1").await, 1);
        assert!(h.scheduler().is_empty());
        assert_eq!(svc.on_habit_deleted("h1").await, 0);
    }
}
