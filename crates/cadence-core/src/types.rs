use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{CadenceError, Result};

/// Which persisted collection an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Habit,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Habit => "habit",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// How often a habit repeats.
///
/// Stored as a bare string. Unknown values are kept verbatim so a round trip
/// through the store never rewrites user data; recurrence treats them as daily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Other(String),
}

impl Frequency {
    pub fn as_str(&self) -> &str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Other(s) => s,
        }
    }
}

impl From<String> for Frequency {
    fn from(s: String) -> Self {
        match s.as_str() {
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            _ => Frequency::Other(s),
        }
    }
}

impl From<&str> for Frequency {
    fn from(s: &str) -> Self {
        Frequency::from(s.to_string())
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.as_str().to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details resolved from the identity store for notification delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

impl UserProfile {
    /// Name used in greetings; falls back to the mailbox part of the address.
    pub fn greeting_name(&self) -> &str {
        if !self.display_name.trim().is_empty() {
            return &self.display_name;
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// A persisted to-do item. Stored at `tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: &str, input: NewTask, now: DateTime<Utc>) -> Result<Self> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(CadenceError::Validation("task title is required".to_string()));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            title,
            description: input.description,
            priority: input.priority,
            due_date: input.due_date,
            completed: input.completed,
            created_at: now,
            updated_at: now,
        })
    }

    /// Instant the due reminder should fire, `lead` before the due date.
    ///
    /// `None` for completed tasks and tasks without a due date.
    pub fn due_reminder_at(&self, lead: Duration) -> Option<DateTime<Utc>> {
        if self.completed {
            return None;
        }
        self.due_date.map(|due| due - lead)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

/// Partial update for a task. `dueDate: null` clears the due date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
}

/// Which schedule-relevant fields a patch touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub due_date: bool,
    pub completed: bool,
}

impl TaskChanges {
    pub fn touches_schedule(&self) -> bool {
        self.due_date || self.completed
    }
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task, now: DateTime<Utc>) -> Result<TaskChanges> {
        let mut changes = TaskChanges::default();
        if let Some(title) = self.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(CadenceError::Validation("task title is required".to_string()));
            }
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            changes.due_date = true;
            task.due_date = due_date;
        }
        if let Some(completed) = self.completed {
            changes.completed = true;
            task.completed = completed;
        }
        task.updated_at = now;
        Ok(changes)
    }
}

/// A recurring habit. Stored at `habits/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(user_id: &str, input: NewHabit, now: DateTime<Utc>) -> Result<Self> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CadenceError::Validation("habit name is required".to_string()));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            name,
            description: input.description,
            frequency: input.frequency,
            streak: 0,
            last_completed: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record a completion: bump the streak and stamp the time.
    pub fn check_in(&mut self, now: DateTime<Utc>) {
        self.streak = self.streak.saturating_add(1);
        self.last_completed = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHabit {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub frequency: Option<Frequency>,
    pub streak: Option<u32>,
}

impl HabitPatch {
    pub fn apply(self, habit: &mut Habit, now: DateTime<Utc>) -> Result<()> {
        if let Some(name) = self.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CadenceError::Validation("habit name is required".to_string()));
            }
            habit.name = name;
        }
        if let Some(description) = self.description {
            habit.description = description;
        }
        if let Some(frequency) = self.frequency {
            habit.frequency = frequency;
        }
        if let Some(streak) = self.streak {
            habit.streak = streak;
        }
        habit.updated_at = now;
        Ok(())
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
