//! `cadence-mail`: outbound email transports.
//!
//! [`Mailer`] is the send capability the scheduler depends on. Two
//! transports ship with the crate:
//!
//! | Backend | Type          | Behaviour                                  |
//! |---------|---------------|--------------------------------------------|
//! | `log`   | [`LogMailer`] | Logs the message, returns a local id       |
//! | `http`  | [`HttpMailer`]| POSTs JSON to a transactional-mail API     |

pub mod error;
pub mod http;
pub mod log;

use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::config::{MailBackend, MailConfig};
use cadence_core::reminder::OutgoingEmail;
use serde::{Deserialize, Serialize};

pub use error::{MailError, Result};
pub use crate::http::HttpMailer;
pub use crate::log::LogMailer;

/// Receipt for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub message_id: String,
}

/// Send capability. Failures surface as [`MailError`].
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage>;
}

/// Build the transport selected by `[mail] backend`.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.backend {
        MailBackend::Log => Ok(Arc::new(LogMailer::new(&config.from))),
        MailBackend::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                MailError::InvalidConfig("mail.endpoint is required for the http backend".to_string())
            })?;
            Ok(Arc::new(HttpMailer::new(
                endpoint,
                config.api_key.clone(),
                config.from.clone(),
            )))
        }
    }
}
