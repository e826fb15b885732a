/// Notification outbox reader
///
/// Claims due rows from the `notifications` table and records delivery
/// outcomes on them.
///
/// # Claiming
///
/// A row is due when it is `pending` and its `next_attempt_at` has passed, or
/// when it is `sending` and its lease (`locked_until`) has expired. Claiming
/// uses `FOR UPDATE SKIP LOCKED`, so several workers can poll the same table
/// without handing out a row twice. A claim sets the row to `sending`, counts
/// the attempt and takes a lease.
///
/// # Example
///
/// ```no_run
/// use taskboard_worker::queue::NotificationQueue;
/// use sqlx::PgPool;
/// use std::time::Duration;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = NotificationQueue::new(pool, Duration::from_secs(60));
///
/// for notification in queue.claim_due(10).await? {
///     println!("Claimed {} ({})", notification.id, notification.subject);
///     queue.mark_sent(notification.id).await?;
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use taskboard_shared::models::notification::{Notification, NotificationStatus};
use thiserror::Error;
use uuid::Uuid;

const RETURNING: &str = "n.id, n.kind, n.subject, n.body, n.recipients, n.status, n.attempts, \
     n.last_error, n.next_attempt_at, n.locked_until, n.created_at, n.updated_at, n.sent_at";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row is no longer `sending`, e.g. another worker took it over
    /// after the lease expired
    #[error("Notification {0} is not claimed")]
    NotClaimed(Uuid),
}

#[derive(Debug, Clone)]
pub struct NotificationQueue {
    db: PgPool,
    lease: Duration,
}

impl NotificationQueue {
    pub fn new(db: PgPool, lease: Duration) -> Self {
        NotificationQueue { db, lease }
    }

    /// Claims up to `limit` due notifications, oldest first
    pub async fn claim_due(&self, limit: usize) -> Result<Vec<Notification>, QueueError> {
        let lease = chrono::Duration::from_std(self.lease)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let locked_until = Utc::now() + lease;

        let sql = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM notifications
                WHERE (status = $1 AND next_attempt_at <= NOW())
                   OR (status = $2 AND locked_until < NOW())
                ORDER BY next_attempt_at ASC, created_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE notifications n
            SET
                status = $2,
                attempts = n.attempts + 1,
                locked_until = $4,
                updated_at = NOW()
            FROM due
            WHERE n.id = due.id
            RETURNING {}
            "#,
            RETURNING
        );

        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(NotificationStatus::Pending)
            .bind(NotificationStatus::Sending)
            .bind(limit as i64)
            .bind(locked_until)
            .fetch_all(&self.db)
            .await?;

        if !notifications.is_empty() {
            tracing::debug!(count = notifications.len(), "Claimed notifications");
        }

        Ok(notifications)
    }

    pub async fn mark_sent(&self, id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, sent_at = NOW(), locked_until = NULL, last_error = NULL, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(NotificationStatus::Sent)
        .bind(NotificationStatus::Sending)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotClaimed(id));
        }

        Ok(())
    }

    /// Puts the row back to `pending` until `next_attempt_at`
    pub async fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, last_error = $3, next_attempt_at = $4, locked_until = NULL, updated_at = NOW()
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(id)
        .bind(NotificationStatus::Pending)
        .bind(error)
        .bind(next_attempt_at)
        .bind(NotificationStatus::Sending)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotClaimed(id));
        }

        Ok(())
    }

    /// Gives up on the row for good
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, last_error = $3, locked_until = NULL, updated_at = NOW()
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(NotificationStatus::Failed)
        .bind(error)
        .bind(NotificationStatus::Sending)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotClaimed(id));
        }

        Ok(())
    }

    /// Rows still waiting for delivery, for the startup log
    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE status = $1")
            .bind(NotificationStatus::Pending)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}
