use async_trait::async_trait;
use cadence_core::reminder::OutgoingEmail;
use tracing::info;
use uuid::Uuid;

use crate::{Mailer, Result, SentMessage};

/// Development transport: writes the message to the log and never fails.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage> {
        let message_id = format!("log-{}", Uuid::new_v4());
        info!(
            %message_id,
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "email (log transport)"
        );
        Ok(SentMessage { message_id })
    }
}
