//! Fakes shared by the scheduler's unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::reminder::OutgoingEmail;
use cadence_core::types::UserProfile;
use cadence_mail::{MailError, Mailer, SentMessage};
use cadence_store::repo::save_profile;
use cadence_store::{DocumentStore, MemoryStore, StoreUserDirectory};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::clock::Clock;
use crate::engine::{Scheduler, SchedulerSettings};
use crate::reminders::ReminderService;
use crate::types::{JobKind, JobPayload};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Monday 2025-03-10 14:00 UTC.
pub fn t0() -> DateTime<Utc> {
    at(2025, 3, 10, 14, 0)
}

pub fn payload(kind: JobKind, entity_id: &str) -> JobPayload {
    JobPayload {
        kind,
        entity_id: entity_id.to_string(),
        user_id: "u1".to_string(),
        email: "ada@example.com".to_string(),
        name: "Ada".to_string(),
        recurring: false,
        frequency: None,
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Mailer that records every message and can be switched to failing or slow.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail: Mutex<bool>,
    pub latency: Mutex<Option<Duration>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Make every send take `latency` before it is recorded.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> cadence_mail::Result<SentMessage> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if *self.fail.lock().unwrap() {
            return Err(MailError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(SentMessage {
            message_id: format!("msg-{}", sent.len()),
        })
    }
}

/// A service over an in-memory store, UTC, 09:00 reminders, 15 minute lead.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub service: ReminderService,
}

impl Harness {
    pub async fn new(now: DateTime<Utc>) -> Self {
        let clock = ManualClock::new(now);
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let settings = SchedulerSettings {
            min_delay: Duration::from_secs(1),
            habit_reminder_hour: 9,
            due_reminder_lead: chrono::Duration::minutes(15),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
        };
        let scheduler = Scheduler::new(clock.clone(), settings);
        let docs: Arc<dyn DocumentStore> = store.clone();
        let service = ReminderService::new(
            scheduler,
            Arc::clone(&docs),
            Arc::new(StoreUserDirectory::new(docs)),
            mailer.clone(),
        );
        save_profile(
            store.as_ref(),
            "u1",
            &UserProfile {
                email: "ada@example.com".to_string(),
                display_name: "Ada".to_string(),
            },
        )
        .await
        .unwrap();
        Self {
            clock,
            store,
            mailer,
            service,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.service.scheduler()
    }

    /// Move the clock to `to` and let the runtime's timers catch up.
    pub async fn advance_to(&self, to: DateTime<Utc>) {
        let delta = (to - self.clock.now()).to_std().unwrap_or_default();
        self.clock.set(to);
        tokio::time::sleep(delta).await;
        // Let callbacks that were woken at the deadline run to completion.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
