/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and token refresh
/// - `users`: The caller's own profile
/// - `projects`, `tasks`, `comments`: The nested board resources
/// - `categories`: Task categories

pub mod auth;
pub mod categories;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;

use crate::error::{ApiError, ApiResult};
use sqlx::{PgConnection, PgPool};
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::{
        category::Category,
        notification::Notification,
        user::{User, UserRole},
    },
    notify::OutgoingMail,
};
use uuid::Uuid;

/// Queues a notification after the mutation has committed
///
/// Failures are logged and swallowed so the request still succeeds.
pub(crate) async fn enqueue_notification(db: &PgPool, mail: OutgoingMail) {
    match Notification::enqueue(db, &mail).await {
        Ok(Some(notification)) => {
            tracing::debug!(
                notification_id = %notification.id,
                kind = mail.kind.as_str(),
                recipients = mail.recipients.len(),
                "Notification queued"
            );
        }
        Ok(None) => {
            tracing::debug!(kind = mail.kind.as_str(), "Notification has no recipients, skipped");
        }
        Err(e) => {
            tracing::warn!(
                kind = mail.kind.as_str(),
                error = %e,
                "Failed to queue notification"
            );
        }
    }
}

/// Loads the calling user's row
///
/// A token whose user no longer exists or was deactivated is treated as
/// unauthenticated.
pub(crate) async fn load_actor(conn: &mut PgConnection, auth: &AuthContext) -> ApiResult<User> {
    match User::find_by_id(&mut *conn, auth.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::Unauthorized("User account is not available".to_string())),
    }
}

/// Resolves developer ids named in a request body
///
/// Duplicates are collapsed, keeping first-seen order. Unknown ids and users
/// without the Developer role fail validation on `field`.
pub(crate) async fn load_developers(
    conn: &mut PgConnection,
    field: &str,
    ids: &[Uuid],
) -> ApiResult<Vec<User>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut found = User::find_many_by_ids(&mut *conn, &ids).await?;

    for id in &ids {
        match found.iter().find(|u| u.id == *id) {
            None => {
                return Err(ApiError::validation(
                    field,
                    format!("User {} does not exist", id),
                ))
            }
            Some(user) if user.role != UserRole::Developer => {
                return Err(ApiError::validation(
                    field,
                    format!("User {} is not a developer", id),
                ))
            }
            Some(_) => {}
        }
    }

    found.sort_by_key(|u| ids.iter().position(|id| *id == u.id));
    Ok(found)
}

/// Collapses duplicate ids, keeping first-seen order
pub(crate) fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

/// Fails validation when any category id is unknown
pub(crate) async fn check_categories(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let missing = Category::missing_ids(&mut *conn, ids).await?;
    if let Some(id) = missing.first() {
        return Err(ApiError::validation(
            "categories",
            format!("Category {} does not exist", id),
        ));
    }

    Ok(())
}

/// Emails of the given users, in order
pub(crate) fn emails(users: &[User]) -> Vec<String> {
    users.iter().map(|u| u.email.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup(&[b, a, b, a]), vec![b, a]);
        assert!(dedup(&[]).is_empty());
    }
}
