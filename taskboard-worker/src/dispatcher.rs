/// Notification dispatcher
///
/// The worker's main loop: claims due notifications, hands them to the mail
/// transport and records the outcome.
///
/// # Architecture
///
/// ```text
/// Dispatcher
///   ├─> NotificationQueue: claim due rows (lease taken)
///   ├─> Mailer: send each mail, up to max_concurrent at once
///   └─> NotificationQueue: mark sent / retry later / failed
/// ```
///
/// # Retries
///
/// A failed send goes back to `pending` with an exponential delay of 30s,
/// 60s, 120s and so on, capped at one hour. Once a row has used
/// `max_attempts` attempts it is marked `failed` and never picked up again.
///
/// # Shutdown
///
/// Cancelling the token stops the loop after the current batch. Deliveries
/// already in flight finish and are recorded.

use crate::mailer::Mailer;
use crate::queue::{NotificationQueue, QueueError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use taskboard_shared::models::notification::Notification;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const BASE_RETRY_DELAY_SECS: i64 = 30;
const MAX_RETRY_DELAY_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Wait between polls when the queue is empty
    pub poll_interval: Duration,

    /// Rows claimed per poll
    pub batch_size: usize,

    /// Mails sent at the same time
    pub max_concurrent: usize,

    /// Attempts before a row is marked failed
    pub max_attempts: i32,

    /// How long a claimed row stays invisible to other workers
    pub lease: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            poll_interval: Duration::from_secs(2),
            batch_size: 20,
            max_concurrent: 4,
            max_attempts: 5,
            lease: Duration::from_secs(60),
        }
    }
}

/// What to do with a row whose send just failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Retry { at: DateTime<Utc> },
    GiveUp,
}

/// Delay before the next attempt, given the attempts made so far
pub fn retry_delay(attempts: i32) -> chrono::Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    let secs = BASE_RETRY_DELAY_SECS
        .saturating_mul(1i64 << exponent)
        .min(MAX_RETRY_DELAY_SECS);
    chrono::Duration::seconds(secs)
}

pub fn failure_action(attempts: i32, max_attempts: i32, now: DateTime<Utc>) -> FailureAction {
    if attempts >= max_attempts {
        FailureAction::GiveUp
    } else {
        FailureAction::Retry {
            at: now + retry_delay(attempts),
        }
    }
}

pub struct Dispatcher {
    queue: NotificationQueue,
    mailer: Arc<dyn Mailer>,
    from: String,
    config: DispatcherConfig,
    shutdown_token: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        db: PgPool,
        mailer: Arc<dyn Mailer>,
        from: impl Into<String>,
        config: DispatcherConfig,
    ) -> Self {
        Dispatcher {
            queue: NotificationQueue::new(db, config.lease),
            mailer,
            from: from.into(),
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops [`Dispatcher::run`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// Polls and delivers until the shutdown token is cancelled
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            transport = self.mailer.name(),
            batch_size = self.config.batch_size,
            max_concurrent = self.config.max_concurrent,
            max_attempts = self.config.max_attempts,
            "Notification dispatcher starting"
        );

        match self.queue.pending_count().await {
            Ok(count) => tracing::info!(pending = count, "Notifications waiting"),
            Err(e) => tracing::warn!(error = %e, "Failed to count pending notifications"),
        }

        while !self.shutdown_token.is_cancelled() {
            match self.run_once().await {
                // A full batch likely means more rows are due
                Ok(claimed) if claimed >= self.config.batch_size => continue,
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Failed to claim notifications"),
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {}
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("Notification dispatcher shut down");
        Ok(())
    }

    /// Claims one batch and delivers it, returning the number claimed
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let batch = self.queue.claim_due(self.config.batch_size).await?;
        let claimed = batch.len();

        stream::iter(batch)
            .for_each_concurrent(self.config.max_concurrent, |notification| {
                self.deliver(notification)
            })
            .await;

        Ok(claimed)
    }

    async fn deliver(&self, notification: Notification) {
        let id = notification.id;
        let mail = notification.to_mail();

        let outcome = match self.mailer.send(&mail, &self.from).await {
            Ok(()) => {
                tracing::info!(
                    notification_id = %id,
                    kind = mail.kind.as_str(),
                    recipients = mail.recipients.len(),
                    "Notification sent"
                );
                self.queue.mark_sent(id).await
            }
            Err(e) => {
                let error = e.to_string();
                match failure_action(notification.attempts, self.config.max_attempts, Utc::now()) {
                    FailureAction::Retry { at } => {
                        tracing::warn!(
                            notification_id = %id,
                            attempt = notification.attempts,
                            retry_at = %at,
                            error = %error,
                            "Notification send failed, will retry"
                        );
                        self.queue.mark_retry(id, &error, at).await
                    }
                    FailureAction::GiveUp => {
                        tracing::error!(
                            notification_id = %id,
                            attempts = notification.attempts,
                            error = %error,
                            "Notification send failed, giving up"
                        );
                        self.queue.mark_failed(id, &error).await
                    }
                }
            }
        };

        if let Err(e) = outcome {
            tracing::error!(notification_id = %id, error = %e, "Failed to record delivery outcome");
        }
    }
}
