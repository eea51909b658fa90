use cadence_core::types::EntityKind;
use cadence_mail::MailError;
use cadence_store::StoreError;
use thiserror::Error;

/// Failures inside reminder callbacks, hooks and recovery.
///
/// A vanished entity is not an error: callbacks report it as
/// [`SkipReason`](crate::types::SkipReason) instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The owning user has no contact profile.
    #[error("User not found: {id}")]
    UserNotFound { id: String },

    /// The mail transport refused or failed to deliver.
    #[error("Send failed: {0}")]
    Send(#[from] MailError),

    /// A persisted entity could not be decoded.
    #[error("Invalid {kind} {id}: {reason}")]
    InvalidEntity {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UserNotFound { id } => SchedulerError::UserNotFound { id },
            other => SchedulerError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
