use chrono::{FixedOffset, Local, Offset};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Habit reminders fire at this local hour unless configured otherwise.
pub const DEFAULT_HABIT_REMINDER_HOUR: u32 = 9;
/// Task reminders fire this many minutes before the due date.
pub const DEFAULT_DUE_REMINDER_LEAD_MINUTES: i64 = 15;
/// Upper bound for the due reminder lead: one week.
pub const MAX_DUE_REMINDER_LEAD_MINUTES: i64 = 7 * 24 * 60;
/// Floor applied to every timer so past-due jobs still fire asynchronously.
pub const DEFAULT_MIN_DELAY_MS: u64 = 1_000;

/// Top-level config (cadence.toml + CADENCE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on every `/v1` request. `None` disables auth.
    pub auth_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_habit_reminder_hour")]
    pub habit_reminder_hour: u32,
    #[serde(default = "default_due_reminder_lead_minutes")]
    pub due_reminder_lead_minutes: i64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Offset used for "09:00 local". Falls back to the host's current offset.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            habit_reminder_hour: DEFAULT_HABIT_REMINDER_HOUR,
            due_reminder_lead_minutes: DEFAULT_DUE_REMINDER_LEAD_MINUTES,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            utc_offset_minutes: None,
        }
    }
}

impl SchedulerConfig {
    /// Resolve the configured offset, or the host's local offset right now.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| m.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    fn validate(&self) -> Result<()> {
        if self.habit_reminder_hour > 23 {
            return Err(CadenceError::Config(format!(
                "scheduler.habit_reminder_hour must be 0-23, got {}",
                self.habit_reminder_hour
            )));
        }
        if !(0..=MAX_DUE_REMINDER_LEAD_MINUTES).contains(&self.due_reminder_lead_minutes) {
            return Err(CadenceError::Config(format!(
                "scheduler.due_reminder_lead_minutes must be 0-{MAX_DUE_REMINDER_LEAD_MINUTES}, got {}",
                self.due_reminder_lead_minutes
            )));
        }
        if self.min_delay_ms == 0 {
            return Err(CadenceError::Config(
                "scheduler.min_delay_ms must be positive".to_string(),
            ));
        }
        if let Some(m) = self.utc_offset_minutes {
            if m.checked_mul(60).and_then(FixedOffset::east_opt).is_none() {
                return Err(CadenceError::Config(format!(
                    "scheduler.utc_offset_minutes out of range: {m}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Write outgoing mail to the log only.
    #[default]
    Log,
    /// POST JSON to an HTTP email API.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub backend: MailBackend,
    /// Send endpoint for the `http` backend, e.g. `https://api.mailer.example/v1/send`.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::default(),
            endpoint: None,
            api_key: None,
            from: default_from(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_habit_reminder_hour() -> u32 {
    DEFAULT_HABIT_REMINDER_HOUR
}
fn default_due_reminder_lead_minutes() -> i64 {
    DEFAULT_DUE_REMINDER_LEAD_MINUTES
}
fn default_min_delay_ms() -> u64 {
    DEFAULT_MIN_DELAY_MS
}
fn default_from() -> String {
    "Cadence <reminders@cadence.local>".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.db", home)
}

impl CadenceConfig {
    /// Load config from a TOML file with CADENCE_* env var overrides.
    ///
    /// Nested keys use a double underscore: `CADENCE_GATEWAY__AUTH_TOKEN`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CadenceConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
            .map_err(|e| CadenceError::Config(e.to_string()))?;

        config.scheduler.validate()?;
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.toml", home)
}
