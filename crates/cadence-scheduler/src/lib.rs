//! `cadence-scheduler`: in-process reminder scheduler.
//!
//! # Overview
//!
//! Every pending reminder is a tokio task sleeping until its fire time,
//! registered in the [`engine::Scheduler`] job store so it can be cancelled.
//! Nothing is persisted: on startup [`ReminderService::initialize_scheduler`]
//! rebuilds the pending set from the tasks and habits in the document store.
//!
//! # Job kinds
//!
//! | Kind            | Fires                                  | Recurs |
//! |-----------------|----------------------------------------|--------|
//! | `HabitReminder` | 09:00 local, then once per frequency   | yes    |
//! | `TaskDue`       | 15 minutes before the task's due date  | no     |
//!
//! CRUD handlers keep jobs in step with entity state through the
//! `on_*` mutation hooks on [`ReminderService`].

pub mod clock;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod recovery;
pub mod recurrence;
pub mod reminders;
pub mod types;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use engine::{Scheduler, SchedulerSettings};
pub use error::{Result, SchedulerError};
pub use recovery::RecoveryReport;
pub use reminders::ReminderService;
pub use types::{Job, JobCallback, JobKind, JobOutcome, JobPayload, SkipReason};
