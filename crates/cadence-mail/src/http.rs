use std::time::Duration;

use async_trait::async_trait;
use cadence_core::reminder::OutgoingEmail;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{MailError, Mailer, Result, SentMessage};

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Transactional-mail API client.
///
/// Sends `{from, to, subject, text, html}` as JSON with an optional bearer
/// key. The message id is read from `id`, `messageId` or `message_id` in the
/// response body.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("mail client builder failed ({e}); using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage> {
        let body = json!({
            "from": self.from,
            "to": email.to,
            "subject": email.subject,
            "text": email.body_text,
            "html": email.body_html,
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = resp.json().await.unwrap_or(Value::Null);
        let message_id = ["id", "messageId", "message_id"]
            .iter()
            .find_map(|k| payload.get(*k).and_then(|v| v.as_str()))
            .map(String::from)
            .unwrap_or_else(|| {
                debug!("mail API returned no message id; generating one");
                Uuid::new_v4().to_string()
            });

        debug!(%message_id, to = %email.to, "email accepted");
        Ok(SentMessage { message_id })
    }
}
