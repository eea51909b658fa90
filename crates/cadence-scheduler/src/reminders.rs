use std::sync::Arc;

use cadence_core::reminder::{habit_reminder, task_due_reminder};
use cadence_core::types::{EntityKind, Habit, Task};
use cadence_mail::Mailer;
use cadence_store::repo::{load_habit, load_task};
use cadence_store::{DocumentStore, UserDirectory};
use tracing::{debug, info};

use crate::engine::Scheduler;
use crate::error::Result;
use crate::recurrence::first_occurrence;
use crate::types::{job_id, JobCallback, JobFuture, JobKind, JobOutcome, JobPayload, SkipReason};

/// Habit and task reminder flows on top of the [`Scheduler`].
///
/// Holds the collaborators callbacks need at fire time: the document store
/// for fresh entity state, the user directory for contact details and the
/// mail transport.
pub struct ReminderService {
    pub(crate) scheduler: Scheduler,
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) mailer: Arc<dyn Mailer>,
    /// Serializes cancel-then-reschedule sequences in the mutation hooks.
    pub(crate) hook_guard: tokio::sync::Mutex<()>,
}

impl ReminderService {
    pub fn new(
        scheduler: Scheduler,
        store: Arc<dyn DocumentStore>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            scheduler,
            store,
            users,
            mailer,
            hook_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Schedule the recurring reminder for a habit, first firing at the
    /// reminder hour on the next calendar day.
    pub fn schedule_habit_reminder(
        &self,
        habit_id: &str,
        habit: &Habit,
        user_id: &str,
        email: &str,
        name: &str,
    ) -> String {
        let settings = self.scheduler.settings();
        let first = first_occurrence(
            self.scheduler.now(),
            settings.utc_offset,
            settings.habit_reminder_hour,
        );
        let payload = JobPayload {
            kind: JobKind::HabitReminder,
            entity_id: habit_id.to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            recurring: true,
            frequency: Some(habit.frequency.clone()),
        };
        let id = job_id(JobKind::HabitReminder, habit_id, first);
        self.scheduler.schedule(id, first, self.habit_callback(), payload)
    }

    /// Schedule the one-shot "due soon" reminder for a task.
    ///
    /// Returns `None` without registering anything when the task has no due
    /// date, is completed, or its reminder time is not strictly in the future.
    pub fn schedule_task_due_reminder(
        &self,
        task_id: &str,
        task: &Task,
        user_id: &str,
        email: &str,
        name: &str,
    ) -> Option<String> {
        let lead = self.scheduler.settings().due_reminder_lead;
        let Some(trigger) = task.due_reminder_at(lead) else {
            debug!(task_id, "no due reminder: task completed or has no due date");
            return None;
        };
        let now = self.scheduler.now();
        if trigger <= now {
            debug!(task_id, trigger = %trigger, "no due reminder: reminder window already passed");
            return None;
        }
        let payload = JobPayload {
            kind: JobKind::TaskDue,
            entity_id: task_id.to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            recurring: false,
            frequency: None,
        };
        let id = job_id(JobKind::TaskDue, task_id, trigger);
        Some(self.scheduler.schedule(id, trigger, self.task_callback(), payload))
    }

    pub fn cancel_all_jobs_for_habit(&self, habit_id: &str) -> usize {
        self.scheduler.cancel_all_for_entity(habit_id, EntityKind::Habit)
    }

    pub fn cancel_all_jobs_for_task(&self, task_id: &str) -> usize {
        self.scheduler.cancel_all_for_entity(task_id, EntityKind::Task)
    }

    fn habit_callback(&self) -> JobCallback {
        let store = Arc::clone(&self.store);
        let mailer = Arc::clone(&self.mailer);
        Arc::new(move |payload: JobPayload| -> JobFuture {
            let store = Arc::clone(&store);
            let mailer = Arc::clone(&mailer);
            Box::pin(async move {
                deliver_habit_reminder(store.as_ref(), mailer.as_ref(), &payload).await
            })
        })
    }

    fn task_callback(&self) -> JobCallback {
        let store = Arc::clone(&self.store);
        let mailer = Arc::clone(&self.mailer);
        Arc::new(move |payload: JobPayload| -> JobFuture {
            let store = Arc::clone(&store);
            let mailer = Arc::clone(&mailer);
            Box::pin(async move {
                deliver_task_reminder(store.as_ref(), mailer.as_ref(), &payload).await
            })
        })
    }
}

async fn deliver_habit_reminder(
    store: &dyn DocumentStore,
    mailer: &dyn Mailer,
    payload: &JobPayload,
) -> Result<JobOutcome> {
    let Some(habit) = load_habit(store, &payload.entity_id).await? else {
        info!(habit_id = %payload.entity_id, "habit no longer exists; nothing to send");
        return Ok(JobOutcome::Skipped(SkipReason::HabitNotFound));
    };
    let email = habit_reminder(&payload.email, &payload.name, &habit);
    let sent = mailer.send(&email).await?;
    info!(
        habit_id = %payload.entity_id,
        streak = habit.streak,
        message_id = %sent.message_id,
        "habit reminder sent"
    );
    Ok(JobOutcome::Delivered {
        message_id: sent.message_id,
        frequency: Some(habit.frequency),
    })
}

async fn deliver_task_reminder(
    store: &dyn DocumentStore,
    mailer: &dyn Mailer,
    payload: &JobPayload,
) -> Result<JobOutcome> {
    let Some(task) = load_task(store, &payload.entity_id).await? else {
        info!(task_id = %payload.entity_id, "task no longer exists; nothing to send");
        return Ok(JobOutcome::Skipped(SkipReason::TaskNotFound));
    };
    if task.completed {
        info!(task_id = %payload.entity_id, "task already completed; nothing to send");
        return Ok(JobOutcome::Skipped(SkipReason::TaskCompleted));
    }
    let email = task_due_reminder(&payload.email, &payload.name, &task);
    let sent = mailer.send(&email).await?;
    info!(
        task_id = %payload.entity_id,
        message_id = %sent.message_id,
        "task due reminder sent"
    );
    Ok(JobOutcome::Delivered {
        message_id: sent.message_id,
        frequency: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, payload, t0, Harness};
    use cadence_core::types::{Frequency, NewHabit, NewTask, Priority};
    use cadence_store::repo::{delete_habit, save_habit, save_task};
    use chrono::Duration;

    fn task(due_in: Option<Duration>) -> Task {
        Task::new(
            "u1",
            NewTask {
                title: "Write report".to_string(),
                description: None,
                priority: Priority::High,
                due_date: due_in.map(|d| t0() + d),
                completed: false,
            },
            t0(),
        )
        .unwrap()
    }

    fn habit(frequency: Frequency) -> Habit {
        let mut habit = Habit::new(
            "u1",
            NewHabit {
                name: "Stretch".to_string(),
                description: None,
                frequency,
            },
            t0(),
        )
        .unwrap();
        habit.streak = 4;
        habit
    }

    #[tokio::test(start_paused = true)]
    async fn task_due_in_an_hour_fires_once_at_minus_fifteen() {
        let h = Harness::new(t0()).await;
        let task = task(Some(Duration::hours(1)));
        save_task(h.store.as_ref(), "t1", &task).await.unwrap();

        let id = h
            .service
            .schedule_task_due_reminder("t1", &task, "u1", "ada@example.com", "Ada")
            .unwrap();
        let job = h.scheduler().get(&id).unwrap();
        assert_eq!(job.scheduled_for, t0() + Duration::minutes(45));
        assert!(!job.payload.recurring);

        h.advance_to(t0() + Duration::minutes(45)).await;

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Write report"));
        assert_eq!(sent[0].to, "ada@example.com");
        assert!(h.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn task_reminders_are_skipped_when_not_applicable() {
        let h = Harness::new(t0()).await;
        let svc = &h.service;

        let near = task(Some(Duration::minutes(10)));
        assert_eq!(svc.schedule_task_due_reminder("t1", &near, "u1", "a@b.c", "A"), None);

        // Exactly at the lead boundary: reminder time == now.
        let edge = task(Some(Duration::minutes(15)));
        assert_eq!(svc.schedule_task_due_reminder("t2", &edge, "u1", "a@b.c", "A"), None);

        let undated = task(None);
        assert_eq!(svc.schedule_task_due_reminder("t3", &undated, "u1", "a@b.c", "A"), None);

        let mut done = task(Some(Duration::hours(2)));
        done.completed = true;
        assert_eq!(svc.schedule_task_due_reminder("t4", &done, "u1", "a@b.c", "A"), None);

        assert!(h.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn task_completed_before_firing_sends_nothing() {
        let h = Harness::new(t0()).await;
        let mut task = task(Some(Duration::hours(1)));
        save_task(h.store.as_ref(), "t1", &task).await.unwrap();
        h.service
            .schedule_task_due_reminder("t1", &task, "u1", "ada@example.com", "Ada")
            .unwrap();

        task.completed = true;
        save_task(h.store.as_ref(), "t1", &task).await.unwrap();
        h.advance_to(t0() + Duration::minutes(45)).await;

        assert!(h.mailer.sent().is_empty());
        assert!(h.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn weekly_habit_fires_next_morning_then_weekly() {
        let h = Harness::new(t0()).await;
        let habit = habit(Frequency::Weekly);
        save_habit(h.store.as_ref(), "h1", &habit).await.unwrap();

        let id = h
            .service
            .schedule_habit_reminder("h1", &habit, "u1", "ada@example.com", "Ada");
        let first = at(2025, 3, 11, 9, 0);
        assert_eq!(h.scheduler().get(&id).unwrap().scheduled_for, first);

        h.advance_to(first).await;

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body_text.contains("4 days"));
        let pending = h.scheduler().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_for, at(2025, 3, 18, 9, 0));
        assert_eq!(
            pending[0].id,
            job_id(JobKind::HabitReminder, "h1", at(2025, 3, 18, 9, 0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_habit_keeps_rescheduling() {
        let h = Harness::new(t0()).await;
        let habit = habit(Frequency::Daily);
        save_habit(h.store.as_ref(), "h1", &habit).await.unwrap();
        h.service
            .schedule_habit_reminder("h1", &habit, "u1", "ada@example.com", "Ada");

        // Removed from the store without going through the delete hook.
        delete_habit(h.store.as_ref(), "h1").await.unwrap();
        h.advance_to(at(2025, 3, 11, 9, 0)).await;

        assert!(h.mailer.sent().is_empty());
        let pending = h.scheduler().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_for, at(2025, 3, 12, 9, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn habit_deleted_while_its_reminder_sends_stops_recurring() {
        let h = Harness::new(t0()).await;
        let habit = habit(Frequency::Daily);
        save_habit(h.store.as_ref(), "h1", &habit).await.unwrap();
        h.service
            .schedule_habit_reminder("h1", &habit, "u1", "ada@example.com", "Ada");
        h.mailer.set_latency(std::time::Duration::from_secs(10));

        h.advance_to(at(2025, 3, 11, 9, 0)).await;
        // The send is in flight: the job has left the store, nothing is sent yet.
        assert!(h.scheduler().is_empty());
        assert!(h.mailer.sent().is_empty());

        delete_habit(h.store.as_ref(), "h1").await.unwrap();
        assert_eq!(h.service.on_habit_deleted("h1").await, 1);

        tokio::time::sleep(std::time::Duration::from_secs(20)).await;
        assert_eq!(h.mailer.sent().len(), 1);
        assert!(h.scheduler().pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn frequency_change_applies_to_the_next_occurrence() {
        let h = Harness::new(t0()).await;
        let mut habit = habit(Frequency::Daily);
        save_habit(h.store.as_ref(), "h1", &habit).await.unwrap();
        h.service
            .schedule_habit_reminder("h1", &habit, "u1", "ada@example.com", "Ada");

        habit.frequency = Frequency::Monthly;
        save_habit(h.store.as_ref(), "h1", &habit).await.unwrap();
        // Pending job keeps its original time.
        assert_eq!(h.scheduler().pending()[0].scheduled_for, at(2025, 3, 11, 9, 0));

        h.advance_to(at(2025, 3, 11, 9, 0)).await;
        let pending = h.scheduler().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_for, at(2025, 4, 11, 9, 0));
        assert_eq!(pending[0].payload.frequency, Some(Frequency::Monthly));
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_is_not_retried() {
        let h = Harness::new(t0()).await;
        let task = task(Some(Duration::hours(1)));
        save_task(h.store.as_ref(), "t1", &task).await.unwrap();
        h.mailer.set_failing(true);
        h.service
            .schedule_task_due_reminder("t1", &task, "u1", "ada@example.com", "Ada")
            .unwrap();

        h.advance_to(t0() + Duration::minutes(45)).await;
        assert!(h.scheduler().is_empty());

        h.mailer.set_failing(false);
        h.advance_to(t0() + Duration::hours(2)).await;
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_task_leaves_a_habit_with_the_same_id() {
        let h = Harness::new(t0()).await;
        let task = task(Some(Duration::hours(3)));
        let habit = habit(Frequency::Daily);
        h.service
            .schedule_task_due_reminder("x", &task, "u1", "ada@example.com", "Ada")
            .unwrap();
        h.service
            .schedule_habit_reminder("x", &habit, "u1", "ada@example.com", "Ada");
        h.scheduler().schedule(
            "other",
            t0() + Duration::hours(1),
            h.service.task_callback(),
            payload(JobKind::TaskDue, "y"),
        );

        assert_eq!(h.service.cancel_all_jobs_for_task("x"), 1);
        let kinds: Vec<JobKind> = h.scheduler().pending().iter().map(|j| j.payload.kind).collect();
        assert_eq!(kinds, vec![JobKind::TaskDue, JobKind::HabitReminder]);
        assert_eq!(h.service.cancel_all_jobs_for_habit("x"), 1);
        assert_eq!(h.service.cancel_all_jobs_for_task("x"), 0);
        assert_eq!(h.scheduler().len(), 1);
    }
}
