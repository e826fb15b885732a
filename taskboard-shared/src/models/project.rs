/// Project model and database operations
///
/// A project is owned by the board manager who created it and has a set of
/// assigned developers kept in `project_developers`. Deleting a project
/// cascades to its tasks and, through them, to their comments.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL,
///     board_member_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE project_developers (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::project::{CreateProject, Project};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid, dev: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// let project = Project::create(
///     &mut tx,
///     CreateProject {
///         title: "Launch".to_string(),
///         description: "Q1".to_string(),
///         board_member_id: owner,
///         developer_ids: vec![dev],
///     },
/// )
/// .await?;
/// tx.commit().await?;
///
/// assert_eq!(project.developer_ids, vec![dev]);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::user::User;

/// A project and the ids of its assigned developers
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,

    pub title: String,

    pub description: String,

    /// Owning board manager, fixed at creation
    pub board_member_id: Uuid,

    /// Assigned developers, in the order they were added
    pub developer_ids: Vec<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Whether `user_id` is one of the assigned developers
    pub fn has_developer(&self, user_id: Uuid) -> bool {
        self.developer_ids.contains(&user_id)
    }
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub title: String,
    pub description: String,
    pub board_member_id: Uuid,
    pub developer_ids: Vec<Uuid>,
}

/// Fields the owner may change; the owner itself is immutable
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateProject {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

impl Project {
    /// Inserts a project together with its initial developer set
    pub async fn create(conn: &mut PgConnection, data: CreateProject) -> Result<Self, sqlx::Error> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO projects (title, description, board_member_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.board_member_id)
        .fetch_one(&mut *conn)
        .await?;

        Self::set_developers(&mut *conn, id, &data.developer_ids).await?;

        Self::find_by_id(&mut *conn, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.title, p.description, p.board_member_id,
                   ARRAY(
                       SELECT pd.user_id FROM project_developers pd
                       WHERE pd.project_id = p.id
                       ORDER BY pd.added_at, pd.user_id
                   ) AS developer_ids,
                   p.created_at, p.updated_at
            FROM projects p
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(project)
    }

    /// Same as [`Project::find_by_id`] but locks the project row until the
    /// surrounding transaction ends
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.title, p.description, p.board_member_id,
                   ARRAY(
                       SELECT pd.user_id FROM project_developers pd
                       WHERE pd.project_id = p.id
                       ORDER BY pd.added_at, pd.user_id
                   ) AS developer_ids,
                   p.created_at, p.updated_at
            FROM projects p
            WHERE p.id = $1
            FOR UPDATE OF p
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(project)
    }

    /// Projects visible to a user: the ones they own and the ones they are
    /// assigned to, newest first
    pub async fn list_visible_to<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.title, p.description, p.board_member_id,
                   ARRAY(
                       SELECT pd.user_id FROM project_developers pd
                       WHERE pd.project_id = p.id
                       ORDER BY pd.added_at, pd.user_id
                   ) AS developer_ids,
                   p.created_at, p.updated_at
            FROM projects p
            WHERE p.board_member_id = $1
               OR EXISTS (
                   SELECT 1 FROM project_developers pd
                   WHERE pd.project_id = p.id AND pd.user_id = $1
               )
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(projects)
    }

    /// Updates title and/or description
    ///
    /// Returns false if the project doesn't exist. Callers reload the project
    /// afterwards when they need the new state.
    pub async fn update<'e, E>(executor: E, id: Uuid, data: UpdateProject) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }

        query.push_str(" WHERE id = $1");

        let mut q = sqlx::query(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }

        let result = q.execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replaces the developer set with exactly `developer_ids`
    ///
    /// Developers already present keep their original `added_at`.
    pub async fn set_developers(
        conn: &mut PgConnection,
        id: Uuid,
        developer_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM project_developers
            WHERE project_id = $1 AND NOT (user_id = ANY($2))
            "#,
        )
        .bind(id)
        .bind(developer_ids)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO project_developers (project_id, user_id)
            SELECT $1, dev_id FROM UNNEST($2::uuid[]) AS dev_id
            ON CONFLICT (project_id, user_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(developer_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Adds one developer; a no-op if they are already assigned
    pub async fn add_developer<'e, E>(executor: E, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO project_developers (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (project_id, user_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Full user rows of the assigned developers
    pub async fn developers<'e, E>(executor: E, id: Uuid) -> Result<Vec<User>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.name, u.phone, u.role, u.is_active,
                   u.created_at, u.updated_at, u.last_login_at
            FROM users u
            JOIN project_developers pd ON pd.user_id = u.id
            WHERE pd.project_id = $1
            ORDER BY pd.added_at, u.id
            "#,
        )
        .bind(id)
        .fetch_all(executor)
        .await?;

        Ok(users)
    }

    /// Deletes a project and, by cascade, its tasks and their comments
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
