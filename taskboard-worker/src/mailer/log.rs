/// Transport that only logs
///
/// Every mail becomes one `info` event with the subject and recipients; the
/// body goes to `debug`.

use super::{Mailer, MailerResult};
use async_trait::async_trait;
use taskboard_shared::notify::OutgoingMail;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        LogMailer
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, mail: &OutgoingMail, from: &str) -> MailerResult<()> {
        tracing::info!(
            kind = mail.kind.as_str(),
            from = %from,
            to = ?mail.recipients,
            subject = %mail.subject,
            "Mail sent (log transport)"
        );
        tracing::debug!(body = %mail.body, "Mail body");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mail = OutgoingMail::task_deleted("Ship", "Release build", "dev@example.com");

        LogMailer::new()
            .send(&mail, "noreply@taskboard.local")
            .await
            .unwrap();
    }
}
