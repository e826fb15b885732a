/// Notification outbox model
///
/// The API writes one row per board event after the originating mutation has
/// committed. `taskboard-worker` claims due rows, delivers them through a mail
/// transport and records the outcome on the row.
///
/// # Lifecycle
///
/// ```text
/// pending → sending → sent
///              ↓
///           pending (retry, next_attempt_at pushed back)
///              ↓
///           failed (max attempts reached)
/// ```
///
/// A `sending` row whose `locked_until` has passed is claimable again, so a
/// worker crash mid-send leads to redelivery rather than loss.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     kind notification_kind NOT NULL,
///     subject VARCHAR(255) NOT NULL,
///     body TEXT NOT NULL,
///     recipients TEXT[] NOT NULL,
///     status notification_status NOT NULL DEFAULT 'pending',
///     attempts INTEGER NOT NULL DEFAULT 0,
///     last_error TEXT,
///     next_attempt_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     locked_until TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     sent_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::notify::OutgoingMail;

/// Board event that produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    CommentCreated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ProjectCreated => "project_created",
            NotificationKind::ProjectUpdated => "project_updated",
            NotificationKind::ProjectDeleted => "project_deleted",
            NotificationKind::TaskCreated => "task_created",
            NotificationKind::TaskUpdated => "task_updated",
            NotificationKind::TaskDeleted => "task_deleted",
            NotificationKind::CommentCreated => "comment_created",
        }
    }
}

/// Delivery status of an outbox row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Waiting for `next_attempt_at`
    Pending,

    /// Claimed by a worker until `locked_until`
    Sending,

    /// Delivered
    Sent,

    /// Gave up after the maximum number of attempts
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sending => "sending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    /// Sent and Failed rows are never picked up again
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }
}

/// One queued email
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub status: NotificationStatus,

    /// Delivery attempts made so far
    pub attempts: i32,

    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,

    /// Lease held by the worker currently sending this row
    pub locked_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// The mail to deliver for this row
    pub fn to_mail(&self) -> OutgoingMail {
        OutgoingMail {
            kind: self.kind,
            subject: self.subject.clone(),
            body: self.body.clone(),
            recipients: self.recipients.clone(),
        }
    }

    /// Queues a mail for delivery
    ///
    /// Returns None without touching the database when the mail has no
    /// recipients.
    pub async fn enqueue<'e, E>(executor: E, mail: &OutgoingMail) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if mail.recipients.is_empty() {
            return Ok(None);
        }

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (kind, subject, body, recipients)
            VALUES ($1, $2, $3, $4)
            RETURNING id, kind, subject, body, recipients, status, attempts, last_error,
                      next_attempt_at, locked_until, created_at, updated_at, sent_at
            "#,
        )
        .bind(mail.kind)
        .bind(&mail.subject)
        .bind(&mail.body)
        .bind(&mail.recipients)
        .fetch_one(executor)
        .await?;

        Ok(Some(notification))
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, kind, subject, body, recipients, status, attempts, last_error,
                   next_attempt_at, locked_until, created_at, updated_at, sent_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}
