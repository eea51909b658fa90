use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use cadence_core::config::{SchedulerConfig, MAX_DUE_REMINDER_LEAD_MINUTES};
use cadence_core::types::EntityKind;
use chrono::{DateTime, FixedOffset, Utc};
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::recurrence::next_occurrence;
use crate::types::{job_id, Job, JobCallback, JobOutcome, JobPayload};

/// Timing knobs shared by the engine and the reminder flows.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Floor for every timer; past-due jobs are clamped up to it.
    pub min_delay: Duration,
    /// Local hour recurring habit reminders fire at.
    pub habit_reminder_hour: u32,
    /// How long before a task's due date its reminder fires.
    pub due_reminder_lead: chrono::Duration,
    /// Offset that defines "local" for the reminder hour.
    pub utc_offset: FixedOffset,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &SchedulerConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(cfg.min_delay_ms),
            habit_reminder_hour: cfg.habit_reminder_hour,
            due_reminder_lead: chrono::Duration::minutes(
                cfg.due_reminder_lead_minutes
                    .clamp(0, MAX_DUE_REMINDER_LEAD_MINUTES),
            ),
            utc_offset: cfg.utc_offset(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// One registered timer. `seq` distinguishes a job from a later job that
/// reused its id, so a stale timer never removes its replacement.
struct JobEntry {
    job: Job,
    cancel: CancellationToken,
    seq: u64,
}

/// A job whose callback is running. `cancelled` is set when the job's entity
/// is cancelled mid-run; the next occurrence is then not scheduled.
struct Running {
    payload: JobPayload,
    cancelled: bool,
}

/// Pending and running jobs under one lock, so a job moves from one map to
/// the other without a cancel slipping in between.
#[derive(Default)]
struct JobTable {
    pending: HashMap<String, JobEntry>,
    running: HashMap<u64, Running>,
}

struct Inner {
    jobs: Mutex<JobTable>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    next_seq: AtomicU64,
}

/// In-memory job store plus the timers that drive it.
///
/// Cheap to clone; all clones share one store. A job is in the store exactly
/// while its timer is armed: the timer task removes the entry when it fires,
/// `cancel` removes it and disarms the timer. Callbacks run after removal and
/// are never interrupted, but cancelling a recurring job's entity while its
/// callback runs stops the next occurrence from being scheduled.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, settings: SchedulerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(JobTable::default()),
                clock,
                settings,
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.inner.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Arm a timer that runs `callback` with `payload` at `execute_at`.
    ///
    /// Times in the past or closer than `min_delay` are clamped to
    /// `min_delay`. A pending job with the same id is replaced.
    pub fn schedule(
        &self,
        job_id: impl Into<String>,
        execute_at: DateTime<Utc>,
        callback: JobCallback,
        payload: JobPayload,
    ) -> String {
        let job_id = job_id.into();
        let now = self.now();
        let min_delay = self.inner.settings.min_delay;
        let delay = match (execute_at - now).to_std() {
            Ok(d) if d >= min_delay => d,
            _ => {
                warn!(
                    job_id = %job_id,
                    scheduled_for = %execute_at,
                    min_delay_ms = min_delay.as_millis() as u64,
                    "job is past due or too close; clamping delay"
                );
                min_delay
            }
        };

        let cancel = CancellationToken::new();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = JobEntry {
            job: Job {
                id: job_id.clone(),
                scheduled_for: execute_at,
                created_at: now,
                payload,
            },
            cancel: cancel.clone(),
            seq,
        };

        // Insert before spawning so the timer can never fire ahead of its entry.
        if let Some(previous) = self.lock_jobs().pending.insert(job_id.clone(), entry) {
            previous.cancel.cancel();
            debug!(job_id = %job_id, "replaced pending job with the same id");
        }

        let scheduler = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => scheduler.fire(&id, seq, callback).await,
            }
        });

        info!(
            job_id = %job_id,
            scheduled_for = %execute_at,
            delay_secs = delay.as_secs(),
            "job scheduled"
        );
        job_id
    }

    /// Disarm and remove a pending job. `false` if no such job is pending.
    pub fn cancel(&self, job_id: &str) -> bool {
        let removed = self.lock_jobs().pending.remove(job_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                info!(job_id, "job cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every job whose payload references the entity.
    ///
    /// Pending jobs are removed and disarmed. Jobs whose callback is running
    /// finish, but no next occurrence is scheduled for them. Both count.
    pub fn cancel_all_for_entity(&self, entity_id: &str, kind: EntityKind) -> usize {
        let (removed, stopped) = {
            let mut guard = self.lock_jobs();
            let table = &mut *guard;
            let ids: Vec<String> = table
                .pending
                .iter()
                .filter(|(_, e)| e.job.payload.references(entity_id, kind))
                .map(|(id, _)| id.clone())
                .collect();
            let removed: Vec<JobEntry> =
                ids.iter().filter_map(|id| table.pending.remove(id)).collect();
            let mut stopped = 0;
            for run in table.running.values_mut() {
                if !run.cancelled && run.payload.references(entity_id, kind) {
                    run.cancelled = true;
                    stopped += 1;
                }
            }
            (removed, stopped)
        };
        for entry in &removed {
            entry.cancel.cancel();
        }
        let count = removed.len() + stopped;
        if count > 0 {
            info!(
                entity_id,
                %kind,
                pending = removed.len(),
                running = stopped,
                "jobs cancelled for entity"
            );
        }
        count
    }

    /// Snapshot of pending jobs, earliest first.
    pub fn pending(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .lock_jobs()
            .pending
            .values()
            .map(|e| e.job.clone())
            .collect();
        jobs.sort_by(|a, b| {
            a.scheduled_for
                .cmp(&b.scheduled_for)
                .then_with(|| a.id.cmp(&b.id))
        });
        jobs
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.lock_jobs().pending.get(job_id).map(|e| e.job.clone())
    }

    pub fn len(&self) -> usize {
        self.lock_jobs().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel everything. Used on graceful shutdown.
    ///
    /// Running callbacks finish without scheduling a next occurrence.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<JobEntry> = {
            let mut table = self.lock_jobs();
            for run in table.running.values_mut() {
                run.cancelled = true;
            }
            table.pending.drain().map(|(_, e)| e).collect()
        };
        for entry in &drained {
            entry.cancel.cancel();
        }
        info!(count = drained.len(), "scheduler shut down; pending jobs dropped");
        drained.len()
    }

    // --- private helpers ---------------------------------------------------

    /// Table operations never panic mid-update, so a poisoned lock still
    /// holds a consistent table.
    fn lock_jobs(&self) -> MutexGuard<'_, JobTable> {
        self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(&self, job_id: &str, seq: u64, callback: JobCallback) {
        let job = {
            let mut table = self.lock_jobs();
            let current = table.pending.get(job_id).is_some_and(|e| e.seq == seq);
            let job = if current {
                table.pending.remove(job_id).map(|e| e.job)
            } else {
                None
            };
            if let Some(job) = &job {
                table.running.insert(
                    seq,
                    Running {
                        payload: job.payload.clone(),
                        cancelled: false,
                    },
                );
            }
            job
        };
        let Some(job) = job else {
            debug!(job_id, "timer fired for a job that is no longer pending");
            return;
        };

        let mut payload = job.payload;
        info!(
            job_id,
            kind = ?payload.kind,
            entity_id = %payload.entity_id,
            "firing job"
        );

        let result = AssertUnwindSafe(callback(payload.clone()))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(outcome)) => {
                info!(job_id, %outcome, "job finished");
                if let JobOutcome::Delivered {
                    frequency: Some(frequency),
                    ..
                } = outcome
                {
                    payload.frequency = Some(frequency);
                }
            }
            Ok(Err(e)) => error!(job_id, error = %e, "job callback failed"),
            Err(_) => error!(job_id, "job callback panicked"),
        }

        let cancelled = self
            .lock_jobs()
            .running
            .remove(&seq)
            .is_some_and(|run| run.cancelled);
        if cancelled {
            info!(job_id, "job cancelled while running; next occurrence dropped");
            return;
        }
        if payload.recurring {
            self.schedule_successor(payload, callback);
        }
    }

    fn schedule_successor(&self, payload: JobPayload, callback: JobCallback) -> String {
        let settings = &self.inner.settings;
        let frequency = payload.frequency.clone().unwrap_or_default();
        let next = next_occurrence(
            &frequency,
            self.now(),
            settings.utc_offset,
            settings.habit_reminder_hour,
        );
        let id = job_id(payload.kind, &payload.entity_id, next);
        debug!(job_id = %id, %frequency, "scheduling next occurrence");
        self.schedule(id, next, callback, payload)
    }
}
