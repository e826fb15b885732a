//! Dispatcher tests against a real outbox
//!
//! Need PostgreSQL at `DATABASE_URL`; run with `cargo test -- --ignored`.
//! The tests drain every due row in the table, so they hold `DB_LOCK` to stay
//! out of each other's way.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskboard_shared::db::migrations::{ensure_database_exists, run_migrations};
use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
use taskboard_shared::models::notification::{Notification, NotificationStatus};
use taskboard_shared::notify::OutgoingMail;
use taskboard_worker::dispatcher::{Dispatcher, DispatcherConfig};
use taskboard_worker::mailer::{Mailer, MailerError, MailerResult};
use taskboard_worker::queue::{NotificationQueue, QueueError};

static DB_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

const FROM: &str = "noreply@taskboard.local";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, mail: &OutgoingMail, from: &str) -> MailerResult<()> {
        assert_eq!(from, FROM);
        self.sent
            .lock()
            .unwrap()
            .push((mail.subject.clone(), mail.recipients.clone()));
        Ok(())
    }
}

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send(&self, _mail: &OutgoingMail, _from: &str) -> MailerResult<()> {
        Err(MailerError::Rejected {
            status: 503,
            body: "try later".to_string(),
        })
    }
}

async fn setup() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    ensure_database_exists(&url).await.unwrap();
    let pool = create_pool(DatabaseConfig::with_url(url)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

fn config(max_attempts: i32) -> DispatcherConfig {
    DispatcherConfig {
        poll_interval: Duration::from_millis(50),
        max_attempts,
        ..DispatcherConfig::default()
    }
}

async fn enqueue(pool: &PgPool, recipient: &str) -> Notification {
    let mail = OutgoingMail::task_deleted("Ship", "Release build", recipient);
    Notification::enqueue(pool, &mail).await.unwrap().unwrap()
}

async fn drain(dispatcher: &Dispatcher) {
    while dispatcher.run_once().await.unwrap() > 0 {}
}

#[tokio::test]
#[ignore]
async fn test_successful_delivery_marks_sent() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup().await;
    let recipient = format!("{}@example.com", uuid::Uuid::new_v4());
    let queued = enqueue(&pool, &recipient).await;

    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Dispatcher::new(pool.clone(), mailer.clone(), FROM, config(5));
    drain(&dispatcher).await;

    let row = Notification::find_by_id(&pool, queued.id).await.unwrap().unwrap();
    assert_eq!(row.status, NotificationStatus::Sent);
    assert_eq!(row.attempts, 1);
    assert!(row.sent_at.is_some());
    assert!(row.locked_until.is_none());

    let sent = mailer.sent.lock().unwrap();
    assert!(sent
        .iter()
        .any(|(subject, to)| subject == "Task Deleted" && to == &vec![recipient.clone()]));
}

#[tokio::test]
#[ignore]
async fn test_failed_delivery_retries_then_gives_up() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup().await;
    let queued = enqueue(&pool, "retry@example.com").await;

    let dispatcher = Dispatcher::new(pool.clone(), Arc::new(FailingMailer), FROM, config(2));
    drain(&dispatcher).await;

    let row = Notification::find_by_id(&pool, queued.id).await.unwrap().unwrap();
    assert_eq!(row.status, NotificationStatus::Pending);
    assert_eq!(row.attempts, 1);
    assert!(row.next_attempt_at > chrono::Utc::now());
    assert!(row.last_error.as_deref().unwrap().contains("503"));

    // Make it due again; the second failure uses up the attempts
    sqlx::query("UPDATE notifications SET next_attempt_at = NOW() WHERE id = $1")
        .bind(queued.id)
        .execute(&pool)
        .await
        .unwrap();
    drain(&dispatcher).await;

    let row = Notification::find_by_id(&pool, queued.id).await.unwrap().unwrap();
    assert_eq!(row.status, NotificationStatus::Failed);
    assert_eq!(row.attempts, 2);
    assert!(row.status.is_terminal());
}

#[tokio::test]
#[ignore]
async fn test_expired_lease_is_claimed_again() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup().await;
    let queued = enqueue(&pool, "lease@example.com").await;

    let queue = NotificationQueue::new(pool.clone(), Duration::ZERO);
    let first = queue.claim_due(1000).await.unwrap();
    let claimed = first.iter().find(|n| n.id == queued.id).unwrap();
    assert_eq!(claimed.status, NotificationStatus::Sending);
    assert_eq!(claimed.attempts, 1);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = queue.claim_due(1000).await.unwrap();
    let reclaimed = second.iter().find(|n| n.id == queued.id).unwrap();
    assert_eq!(reclaimed.attempts, 2);

    queue.mark_sent(queued.id).await.unwrap();

    // Already sent; a late outcome from the first claimant is rejected
    let err = queue.mark_sent(queued.id).await.unwrap_err();
    assert!(matches!(err, QueueError::NotClaimed(id) if id == queued.id));
}

#[tokio::test]
#[ignore]
async fn test_run_stops_on_cancel() {
    let _guard = DB_LOCK.lock().await;
    let pool = setup().await;

    let dispatcher = Dispatcher::new(
        pool,
        Arc::new(RecordingMailer::default()),
        FROM,
        config(5),
    );
    let token = dispatcher.shutdown_token();

    let handle = tokio::spawn(async move { dispatcher.run().await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap()
        .unwrap();
}
