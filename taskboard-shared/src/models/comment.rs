/// Comment model and database operations
///
/// Comments hang off a task. The author (`user_id`) is fixed at creation and
/// is the only user who may edit or delete the comment afterwards.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     text TEXT NOT NULL,
///     file VARCHAR(512),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,

    pub task_id: Uuid,

    /// Author
    pub user_id: Uuid,

    pub text: String,

    /// Reference to an attached file (path or URL), if any
    pub file: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub file: Option<String>,
}

/// Changes to a comment's content; the author and task never change
#[derive(Debug, Clone, Default)]
pub struct UpdateComment {
    pub text: Option<String>,

    /// Use Some(None) to remove the attachment
    pub file: Option<Option<String>>,
}

impl Comment {
    pub async fn create<'e, E>(executor: E, data: CreateComment) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (task_id, user_id, text, file)
            VALUES ($1, $2, $3, $4)
            RETURNING id, task_id, user_id, text, file, created_at, updated_at
            "#,
        )
        .bind(data.task_id)
        .bind(data.user_id)
        .bind(data.text)
        .bind(data.file)
        .fetch_one(executor)
        .await
    }

    /// Finds a comment by id, scoped to its task
    pub async fn find_in_task<'e, E>(
        executor: E,
        task_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, user_id, text, file, created_at, updated_at
            FROM comments
            WHERE id = $2 AND task_id = $1
            "#,
        )
        .bind(task_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Same as [`Comment::find_in_task`] but locks the comment row
    pub async fn find_in_task_for_update<'e, E>(
        executor: E,
        task_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, user_id, text, file, created_at, updated_at
            FROM comments
            WHERE id = $2 AND task_id = $1
            FOR UPDATE
            "#,
        )
        .bind(task_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Comments on a task, oldest first
    pub async fn list_by_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, user_id, text, file, created_at, updated_at
            FROM comments
            WHERE task_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }

    /// Applies content changes; returns None if the comment doesn't exist
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateComment,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE comments SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.text.is_some() {
            bind_count += 1;
            query.push_str(&format!(", text = ${}", bind_count));
        }
        if data.file.is_some() {
            bind_count += 1;
            query.push_str(&format!(", file = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, task_id, user_id, text, file, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Comment>(&query).bind(id);

        if let Some(text) = data.text {
            q = q.bind(text);
        }
        if let Some(file) = data.file {
            q = q.bind(file);
        }

        q.fetch_optional(executor).await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_comment_default() {
        let update = UpdateComment::default();
        assert!(update.text.is_none());
        assert!(update.file.is_none());
    }

    #[test]
    fn test_comment_serializes_author() {
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            text: "Looks good".to_string(),
            file: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["user_id"], comment.user_id.to_string());
        assert!(json["file"].is_null());
    }
}
