use std::fmt;
use std::sync::Arc;

use cadence_core::types::{EntityKind, Frequency};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    HabitReminder,
    TaskDue,
}

impl JobKind {
    fn prefix(&self) -> &'static str {
        match self {
            JobKind::HabitReminder => "habit",
            JobKind::TaskDue => "task_due",
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            JobKind::HabitReminder => EntityKind::Habit,
            JobKind::TaskDue => EntityKind::Task,
        }
    }
}

/// Deterministic job id: the same kind, entity and fire time always yield
/// the same id, so re-deriving a job replaces rather than duplicates it.
pub fn job_id(kind: JobKind, entity_id: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}", kind.prefix(), entity_id, at.timestamp_millis())
}

/// Everything a callback needs at fire time. Copied at schedule time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub kind: JobKind,
    pub entity_id: String,
    pub user_id: String,
    /// Recipient address.
    pub email: String,
    /// Display name used in the greeting.
    pub name: String,
    pub recurring: bool,
    /// Cadence for recurring jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
}

impl JobPayload {
    pub fn references(&self, entity_id: &str, kind: EntityKind) -> bool {
        self.entity_id == entity_id && self.kind.entity_kind() == kind
    }
}

/// A pending job as seen from outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub payload: JobPayload,
}

/// Why a fired job did not send anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    HabitNotFound,
    TaskNotFound,
    TaskCompleted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::HabitNotFound => "habit_not_found",
            SkipReason::TaskNotFound => "task_not_found",
            SkipReason::TaskCompleted => "task_completed",
        }
    }
}

/// Result of a callback that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// A message was handed to the mail transport.
    ///
    /// `frequency` carries the entity's cadence as read at fire time; when
    /// set, the successor of a recurring job uses it.
    Delivered {
        message_id: String,
        frequency: Option<Frequency>,
    },
    Skipped(SkipReason),
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Delivered { message_id, .. } => write!(f, "delivered ({message_id})"),
            JobOutcome::Skipped(reason) => f.write_str(reason.as_str()),
        }
    }
}

pub type JobFuture = BoxFuture<'static, Result<JobOutcome>>;

/// Work run when a job fires. Shared so a recurring job can hand it to its successor.
pub type JobCallback = Arc<dyn Fn(JobPayload) -> JobFuture + Send + Sync>;
