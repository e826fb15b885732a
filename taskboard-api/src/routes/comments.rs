/// Comment endpoints, nested under their task
///
/// - `GET    /v1/projects/:project_id/tasks/:task_id/comments`
/// - `POST   /v1/projects/:project_id/tasks/:task_id/comments`
/// - `GET    /v1/projects/:project_id/tasks/:task_id/comments/:comment_id`
/// - `PUT    /v1/projects/:project_id/tasks/:task_id/comments/:comment_id`
/// - `DELETE /v1/projects/:project_id/tasks/:task_id/comments/:comment_id`
///
/// The assigned developer and the project's board member may comment. A
/// comment can only be edited or deleted by its author, whatever their role.
/// `file` is a reference to an attachment stored elsewhere.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::{enqueue_notification, load_actor},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgConnection;
use taskboard_shared::{
    auth::{
        authorization::{require_comment_author, require_task_commenter, require_task_viewer},
        middleware::AuthContext,
    },
    models::{
        comment::{Comment, CreateComment, UpdateComment},
        project::Project,
        task::Task,
        user::User,
    },
    notify::OutgoingMail,
};
use uuid::Uuid;
use validator::Validate;

const MAX_FILE_LEN: usize = 512;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[serde(deserialize_with = "crate::extract::trimmed")]
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,

    #[validate(length(min = 1, max = 512, message = "File reference must be 1 to 512 characters"))]
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[serde(default, deserialize_with = "crate::extract::trimmed_opt")]
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: Option<String>,

    /// Absent leaves the attachment alone, `null` removes it
    #[serde(default, deserialize_with = "present")]
    pub file: Option<Option<String>>,
}

/// Marks a field as present even when its value is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub text: String,
    pub user: Uuid,
    pub task: Uuid,
    pub file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            user: comment.user_id,
            task: comment.task_id,
            file: comment.file,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Resolves the project and task from the path, 404 if either is missing
async fn find_parents(
    conn: &mut PgConnection,
    project_id: Uuid,
    task_id: Uuid,
) -> ApiResult<(Project, Task)> {
    let project = Project::find_by_id(&mut *conn, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    let task = Task::find_in_project(&mut *conn, project.id, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    Ok((project, task))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let mut conn = state.db.acquire().await?;

    let (project, task) = find_parents(&mut conn, project_id, task_id).await?;
    require_task_viewer(&auth, &project, &task)?;

    let comments = Comment::list_by_task(&mut *conn, task.id).await?;

    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let mut tx = state.db.begin().await?;

    let (project, task) = find_parents(&mut tx, project_id, task_id).await?;
    require_task_commenter(&auth, &project, &task)?;

    let actor = load_actor(&mut tx, &auth).await?;

    let comment = Comment::create(
        &mut *tx,
        CreateComment {
            task_id: task.id,
            user_id: actor.id,
            text: req.text,
            file: req.file,
        },
    )
    .await?;

    let people = User::find_many_by_ids(&mut *tx, &[task.developer_id, project.board_member_id]).await?;
    let email_of = |id: Uuid| {
        people
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.email.clone())
            .unwrap_or_default()
    };
    let assignee_email = email_of(task.developer_id);
    let board_member_email = email_of(project.board_member_id);

    tx.commit().await?;

    tracing::info!(
        comment_id = %comment.id,
        task_id = %task.id,
        user_id = %actor.id,
        "Comment created"
    );

    enqueue_notification(
        &state.db,
        OutgoingMail::comment_created(
            &task.title,
            &actor.email,
            &comment.text,
            &assignee_email,
            &board_member_email,
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<CommentResponse>> {
    let mut conn = state.db.acquire().await?;

    let (project, task) = find_parents(&mut conn, project_id, task_id).await?;
    let comment = Comment::find_in_task(&mut *conn, task.id, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    require_task_viewer(&auth, &project, &task)?;

    Ok(Json(comment.into()))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    if let Some(Some(file)) = &req.file {
        if file.is_empty() || file.chars().count() > MAX_FILE_LEN {
            return Err(ApiError::validation(
                "file",
                "File reference must be 1 to 512 characters",
            ));
        }
    }

    let mut tx = state.db.begin().await?;

    let (_, task) = find_parents(&mut tx, project_id, task_id).await?;
    let comment = Comment::find_in_task_for_update(&mut *tx, task.id, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    require_comment_author(&auth, &comment)?;

    let comment = Comment::update(
        &mut *tx,
        comment.id,
        UpdateComment {
            text: req.text,
            file: req.file,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Comment"))?;

    tx.commit().await?;

    tracing::info!(comment_id = %comment.id, "Comment updated");

    Ok(Json(comment.into()))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let (_, task) = find_parents(&mut tx, project_id, task_id).await?;
    let comment = Comment::find_in_task_for_update(&mut *tx, task.id, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    require_comment_author(&auth, &comment)?;

    Comment::delete(&mut *tx, comment.id).await?;

    tx.commit().await?;

    tracing::info!(comment_id = %comment.id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
