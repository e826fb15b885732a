/// Task model and database operations
///
/// A task belongs to exactly one project and is assigned to exactly one
/// developer. Categories are attached through `task_categories`.
///
/// # Status
///
/// ```text
/// not_started → in_progress → completed
/// ```
///
/// Any status may be set directly; only the assigned developer may change it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_priority AS ENUM ('high', 'medium', 'low');
/// CREATE TYPE task_status AS ENUM ('not_started', 'in_progress', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     developer_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL,
///     priority task_priority NOT NULL,
///     status task_status NOT NULL DEFAULT 'not_started',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE task_categories (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
///     PRIMARY KEY (task_id, category_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
pub enum TaskPriority {
    #[serde(rename = "High", alias = "high")]
    High,
    #[serde(rename = "Medium", alias = "medium")]
    Medium,
    #[serde(rename = "Low", alias = "low")]
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Not Started", alias = "not_started")]
    NotStarted,
    #[serde(rename = "In Progress", alias = "in_progress")]
    InProgress,
    #[serde(rename = "Completed", alias = "completed")]
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

/// A task and the ids of its categories
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Owning project, fixed at creation
    pub project_id: Uuid,

    /// Assigned developer
    pub developer_id: Uuid,

    pub title: String,

    pub description: String,

    pub priority: TaskPriority,

    pub status: TaskStatus,

    /// Attached categories, sorted by id
    pub category_ids: Vec<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub developer_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub category_ids: Vec<Uuid>,
}

/// Column changes for an existing task
///
/// Only non-None fields are written. Categories are replaced separately with
/// [`Task::set_categories`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub developer_id: Option<Uuid>,
}

impl UpdateTask {
    /// Drops every field whose requested value equals the stored one
    pub fn without_unchanged(self, current: &Task) -> Self {
        Self {
            title: self.title.filter(|t| *t != current.title),
            description: self.description.filter(|d| *d != current.description),
            priority: self.priority.filter(|p| *p != current.priority),
            status: self.status.filter(|s| *s != current.status),
            developer_id: self.developer_id.filter(|d| *d != current.developer_id),
        }
    }

    /// Whether any field other than `status` is set
    pub fn touches_definition(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.priority.is_some()
            || self.developer_id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_definition() && self.status.is_none()
    }
}

impl Task {
    /// Inserts a task together with its categories
    pub async fn create(conn: &mut PgConnection, data: CreateTask) -> Result<Self, sqlx::Error> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (project_id, developer_id, title, description, priority, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(data.project_id)
        .bind(data.developer_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.priority)
        .bind(data.status)
        .fetch_one(&mut *conn)
        .await?;

        Self::set_categories(&mut *conn, id, &data.category_ids).await?;

        Self::find_in_project(&mut *conn, data.project_id, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Finds a task by id, scoped to its project
    ///
    /// A task id paired with the wrong project yields None.
    pub async fn find_in_project<'e, E>(
        executor: E,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.project_id, t.developer_id, t.title, t.description,
                   t.priority, t.status,
                   ARRAY(
                       SELECT tc.category_id FROM task_categories tc
                       WHERE tc.task_id = t.id
                       ORDER BY tc.category_id
                   ) AS category_ids,
                   t.created_at, t.updated_at
            FROM tasks t
            WHERE t.id = $2 AND t.project_id = $1
            "#,
        )
        .bind(project_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Same as [`Task::find_in_project`] but locks the task row
    pub async fn find_in_project_for_update<'e, E>(
        executor: E,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.project_id, t.developer_id, t.title, t.description,
                   t.priority, t.status,
                   ARRAY(
                       SELECT tc.category_id FROM task_categories tc
                       WHERE tc.task_id = t.id
                       ORDER BY tc.category_id
                   ) AS category_ids,
                   t.created_at, t.updated_at
            FROM tasks t
            WHERE t.id = $2 AND t.project_id = $1
            FOR UPDATE OF t
            "#,
        )
        .bind(project_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// All tasks of a project, oldest first
    pub async fn list_by_project<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.project_id, t.developer_id, t.title, t.description,
                   t.priority, t.status,
                   ARRAY(
                       SELECT tc.category_id FROM task_categories tc
                       WHERE tc.task_id = t.id
                       ORDER BY tc.category_id
                   ) AS category_ids,
                   t.created_at, t.updated_at
            FROM tasks t
            WHERE t.project_id = $1
            ORDER BY t.created_at, t.id
            "#,
        )
        .bind(project_id)
        .fetch_all(executor)
        .await?;

        Ok(tasks)
    }

    /// Applies column changes; returns false if the task doesn't exist
    pub async fn update<'e, E>(executor: E, id: Uuid, data: UpdateTask) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.developer_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", developer_id = ${}", bind_count));
        }

        query.push_str(" WHERE id = $1");

        let mut q = sqlx::query(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(developer_id) = data.developer_id {
            q = q.bind(developer_id);
        }

        let result = q.execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replaces the category set with exactly `category_ids`
    pub async fn set_categories(
        conn: &mut PgConnection,
        id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_categories WHERE task_id = $1 AND NOT (category_id = ANY($2))")
            .bind(id)
            .bind(category_ids)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO task_categories (task_id, category_id)
            SELECT $1, cat_id FROM UNNEST($2::uuid[]) AS cat_id
            ON CONFLICT (task_id, category_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(category_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Deletes a task and, by cascade, its comments
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
