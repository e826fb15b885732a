/// Task endpoints, nested under their project
///
/// - `GET    /v1/projects/:project_id/tasks`
/// - `POST   /v1/projects/:project_id/tasks`
/// - `GET    /v1/projects/:project_id/tasks/:task_id`
/// - `PUT    /v1/projects/:project_id/tasks/:task_id`
/// - `DELETE /v1/projects/:project_id/tasks/:task_id`
///
/// The project's board member defines tasks (title, description, priority,
/// categories, assignee) and deletes them. Only the assigned developer moves
/// a task's status. A field repeated with its current value is not a change,
/// so a full-object PUT from the board member that echoes the status passes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::{check_categories, dedup, emails, enqueue_notification, load_actor, load_developers},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use taskboard_shared::{
    auth::{
        authorization::{
            can_comment_on_task, can_view_project, can_view_task, require_project_manager,
            require_task_assignee, require_task_viewer, AuthzError,
        },
        middleware::AuthContext,
    },
    models::{
        project::Project,
        task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
        user::User,
    },
    notify::OutgoingMail,
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[serde(deserialize_with = "crate::extract::trimmed")]
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: String,

    #[serde(deserialize_with = "crate::extract::trimmed")]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub priority: TaskPriority,

    /// Defaults to `"Not Started"`
    #[serde(default)]
    pub status: TaskStatus,

    /// Id of the assigned developer
    pub developer: Uuid,

    #[serde(default)]
    pub categories: Vec<Uuid>,
}

/// Omitted fields are left unchanged; `categories` replaces the whole set
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[serde(default, deserialize_with = "crate::extract::trimmed_opt")]
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "crate::extract::trimmed_opt")]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,

    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub developer: Option<Uuid>,
    pub categories: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub categories: Vec<Uuid>,
    pub developer: Uuid,
    pub priority: TaskPriority,
    pub project: Uuid,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            categories: task.category_ids,
            developer: task.developer_id,
            priority: task.priority,
            project: task.project_id,
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

async fn find_project(conn: &mut PgConnection, project_id: Uuid) -> ApiResult<Project> {
    Project::find_by_id(&mut *conn, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))
}

/// Email of a user who may have been removed meanwhile
async fn email_of(conn: &mut PgConnection, user_id: Uuid) -> ApiResult<String> {
    Ok(User::find_by_id(&mut *conn, user_id)
        .await?
        .map(|u| u.email)
        .unwrap_or_default())
}

/// Lists the project's tasks
///
/// Project members see every task. A developer who was taken off the project
/// but still holds tasks in it sees only those.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let mut conn = state.db.acquire().await?;

    let project = find_project(&mut conn, project_id).await?;
    let tasks = Task::list_by_project(&mut *conn, project.id).await?;

    if can_view_project(&auth, &project) {
        return Ok(Json(tasks.into_iter().map(Into::into).collect()));
    }

    let visible: Vec<TaskResponse> = tasks
        .into_iter()
        .filter(|t| can_view_task(&auth, &project, t))
        .map(Into::into)
        .collect();

    if visible.is_empty() {
        return Err(AuthzError::Forbidden("You are not a member of this project").into());
    }

    Ok(Json(visible))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let mut tx = state.db.begin().await?;

    let project = Project::find_by_id_for_update(&mut *tx, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    require_project_manager(&auth, &project)?;

    let actor = load_actor(&mut tx, &auth).await?;
    let developer = load_developers(&mut tx, "developer", &[req.developer])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::validation("developer", "Developer is required"))?;

    let category_ids = dedup(&req.categories);
    check_categories(&mut tx, &category_ids).await?;

    let task = Task::create(
        &mut tx,
        CreateTask {
            project_id: project.id,
            developer_id: developer.id,
            title: req.title,
            description: req.description,
            priority: req.priority,
            status: req.status,
            category_ids,
        },
    )
    .await?;

    // Assignees always belong to the project
    if Project::add_developer(&mut *tx, project.id, developer.id).await? {
        tracing::info!(
            project_id = %project.id,
            developer_id = %developer.id,
            "Assignee added to project developers"
        );
    }

    let developers = Project::developers(&mut *tx, project.id).await?;

    tx.commit().await?;

    tracing::info!(
        task_id = %task.id,
        project_id = %project.id,
        developer_id = %task.developer_id,
        priority = task.priority.as_str(),
        status = task.status.as_str(),
        "Task created"
    );

    enqueue_notification(
        &state.db,
        OutgoingMail::task_created(&task.title, &project.title, &actor.email, emails(&developers)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(task.into())))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<TaskResponse>> {
    let mut conn = state.db.acquire().await?;

    let project = find_project(&mut conn, project_id).await?;
    let task = Task::find_in_project(&mut *conn, project.id, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    require_task_viewer(&auth, &project, &task)?;

    Ok(Json(task.into()))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let mut tx = state.db.begin().await?;

    let project = find_project(&mut tx, project_id).await?;
    let task = Task::find_in_project_for_update(&mut *tx, project.id, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    if !can_comment_on_task(&auth, &project, &task) {
        return Err(AuthzError::Forbidden(
            "Only the assigned developer or the project's board member can change this task",
        )
        .into());
    }

    let changes = UpdateTask {
        title: req.title,
        description: req.description,
        priority: req.priority,
        status: req.status,
        developer_id: req.developer,
    }
    .without_unchanged(&task);

    let new_categories = req
        .categories
        .map(|ids| dedup(&ids))
        .filter(|ids| !same_set(ids, &task.category_ids));

    if changes.touches_definition() || new_categories.is_some() {
        require_project_manager(&auth, &project)?;
    }
    if changes.status.is_some() {
        require_task_assignee(&auth, &task)?;
    }

    if changes.is_empty() && new_categories.is_none() {
        tx.commit().await?;
        return Ok(Json(task.into()));
    }

    let changed_fields = changed_field_names(&changes, new_categories.is_some());

    if let Some(developer_id) = changes.developer_id {
        load_developers(&mut tx, "developer", &[developer_id]).await?;
        Project::add_developer(&mut *tx, project.id, developer_id).await?;
    }

    if let Some(ids) = &new_categories {
        check_categories(&mut tx, ids).await?;
        Task::set_categories(&mut tx, task.id, ids).await?;
    }

    // Touches updated_at even when only the categories changed
    Task::update(&mut *tx, task.id, changes).await?;

    let task = Task::find_in_project(&mut *tx, project.id, task.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    let actor = load_actor(&mut tx, &auth).await?;
    let assignee_email = email_of(&mut tx, task.developer_id).await?;
    let board_member_email = email_of(&mut tx, project.board_member_id).await?;

    tx.commit().await?;

    tracing::info!(
        task_id = %task.id,
        project_id = %project.id,
        status = task.status.as_str(),
        changed = ?changed_fields,
        "Task updated"
    );

    enqueue_notification(
        &state.db,
        OutgoingMail::task_updated(
            &task.title,
            &project.title,
            &actor.email,
            &changed_fields,
            &assignee_email,
            &board_member_email,
        ),
    )
    .await;

    Ok(Json(task.into()))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let project = find_project(&mut tx, project_id).await?;
    let task = Task::find_in_project_for_update(&mut *tx, project.id, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    require_project_manager(&auth, &project)?;

    let assignee_email = email_of(&mut tx, task.developer_id).await?;

    Task::delete(&mut *tx, task.id).await?;

    tx.commit().await?;

    tracing::info!(task_id = %task.id, project_id = %project.id, "Task deleted");

    enqueue_notification(
        &state.db,
        OutgoingMail::task_deleted(&task.title, &task.description, &assignee_email),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

fn same_set(a: &[Uuid], b: &[Uuid]) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}

/// Wire names of the fields a task update touches
fn changed_field_names(changes: &UpdateTask, categories: bool) -> Vec<&'static str> {
    let mut names = Vec::new();
    if changes.title.is_some() {
        names.push("title");
    }
    if changes.description.is_some() {
        names.push("description");
    }
    if changes.priority.is_some() {
        names.push("priority");
    }
    if changes.status.is_some() {
        names.push("status");
    }
    if changes.developer_id.is_some() {
        names.push("developer");
    }
    if categories {
        names.push("categories");
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_set_ignores_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(same_set(&[a, b], &[b, a]));
        assert!(!same_set(&[a], &[a, b]));
        assert!(same_set(&[], &[]));
    }

    #[test]
    fn test_changed_field_names() {
        let changes = UpdateTask {
            status: Some(TaskStatus::Completed),
            developer_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert_eq!(
            changed_field_names(&changes, true),
            vec!["status", "developer", "categories"]
        );
        assert!(changed_field_names(&UpdateTask::default(), false).is_empty());
    }

    #[test]
    fn test_update_request_accepts_wire_names() {
        let req: UpdateTaskRequest = serde_json::from_str(
            r#"{"status": "In Progress", "priority": "low", "project": "ignored"}"#,
        )
        .unwrap();
        assert_eq!(req.status, Some(TaskStatus::InProgress));
        assert_eq!(req.priority, Some(TaskPriority::Low));
        assert!(req.title.is_none());
    }
}
