/// Transport that POSTs mail to an HTTP mail service
///
/// # Request
///
/// ```text
/// POST {MAIL_API_URL}
/// Authorization: Bearer {MAIL_API_KEY}
/// Content-Type: application/json
///
/// {
///   "from": "noreply@taskboard.local",
///   "to": ["dev@example.com"],
///   "subject": "Task Deleted",
///   "text": "Task \"Ship\" with description \"Release build\" has been deleted."
/// }
/// ```
///
/// Any 2xx answer counts as delivered.

use super::{Mailer, MailerError, MailerResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use taskboard_shared::notify::OutgoingMail;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest slice of an error body kept in `last_error`
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(url: &str, api_key: &str) -> MailerResult<Self> {
        if url.trim().is_empty() {
            return Err(MailerError::InvalidConfig("MAIL_API_URL is empty".to_string()));
        }
        if api_key.is_empty() {
            return Err(MailerError::InvalidConfig("MAIL_API_KEY is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailerError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.trim().to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn map_request_error(error: reqwest::Error) -> MailerError {
        if error.is_timeout() {
            MailerError::Transport(format!(
                "Mail service timed out after {} seconds",
                REQUEST_TIMEOUT.as_secs()
            ))
        } else if error.is_connect() {
            MailerError::Transport(format!("Unable to connect to mail service: {}", error))
        } else {
            MailerError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, mail: &OutgoingMail, from: &str) -> MailerResult<()> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from,
                to: &mail.recipients,
                subject: &mail.subject,
                text: &mail.body,
            })
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), subject = %mail.subject, "Mail accepted");
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(MailerError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
