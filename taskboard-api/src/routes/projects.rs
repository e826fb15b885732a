/// Project endpoints
///
/// - `GET    /v1/projects` - Projects the caller owns or works on
/// - `POST   /v1/projects` - Create (Board Managers only)
/// - `GET    /v1/projects/:project_id` - Retrieve (owner or assigned developer)
/// - `PUT    /v1/projects/:project_id` - Update title, description, developers (owner only)
/// - `DELETE /v1/projects/:project_id` - Delete with all tasks and comments (owner only)
///
/// Every mutation notifies the project's developers.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::{emails, enqueue_notification, load_actor, load_developers},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{
        authorization::{require_project_creator, require_project_manager, require_project_viewer},
        middleware::AuthContext,
    },
    models::project::{CreateProject, Project, UpdateProject},
    notify::OutgoingMail,
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[serde(deserialize_with = "crate::extract::trimmed")]
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: String,

    #[serde(deserialize_with = "crate::extract::trimmed")]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    /// Ids of users with the Developer role
    #[serde(default)]
    pub developers: Vec<Uuid>,
}

/// Omitted fields are left unchanged; `developers` replaces the whole set
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[serde(default, deserialize_with = "crate::extract::trimmed_opt")]
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "crate::extract::trimmed_opt")]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,

    pub developers: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub board_member: Uuid,
    pub developers: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            title: project.title,
            description: project.description,
            board_member: project.board_member_id,
            developers: project.developer_ids,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = Project::list_visible_to(&state.db, auth.user_id).await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    require_project_creator(&auth)?;

    let mut tx = state.db.begin().await?;

    let actor = load_actor(&mut tx, &auth).await?;
    let developers = load_developers(&mut tx, "developers", &req.developers).await?;

    let project = Project::create(
        &mut tx,
        CreateProject {
            title: req.title,
            description: req.description,
            board_member_id: actor.id,
            developer_ids: developers.iter().map(|d| d.id).collect(),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        project_id = %project.id,
        board_member_id = %project.board_member_id,
        developers = project.developer_ids.len(),
        "Project created"
    );

    enqueue_notification(
        &state.db,
        OutgoingMail::project_created(&project.title, &actor.email, emails(&developers)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(project.into())))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    require_project_viewer(&auth, &project)?;

    Ok(Json(project.into()))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let mut tx = state.db.begin().await?;

    let project = Project::find_by_id_for_update(&mut *tx, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    require_project_manager(&auth, &project)?;

    let actor = load_actor(&mut tx, &auth).await?;

    if let Some(ids) = &req.developers {
        let developers = load_developers(&mut tx, "developers", ids).await?;
        let ids: Vec<Uuid> = developers.iter().map(|d| d.id).collect();
        Project::set_developers(&mut tx, project.id, &ids).await?;
    }

    let changes = UpdateProject {
        title: req.title,
        description: req.description,
    };
    if !changes.is_empty() || req.developers.is_some() {
        // Touches updated_at even when only the developer set changed
        Project::update(&mut *tx, project.id, changes).await?;
    }

    let project = Project::find_by_id(&mut *tx, project.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    let developers = Project::developers(&mut *tx, project.id).await?;

    tx.commit().await?;

    tracing::info!(project_id = %project.id, "Project updated");

    enqueue_notification(
        &state.db,
        OutgoingMail::project_updated(&project.title, &actor.email, emails(&developers)),
    )
    .await;

    Ok(Json(project.into()))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let project = Project::find_by_id_for_update(&mut *tx, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    require_project_manager(&auth, &project)?;

    let actor = load_actor(&mut tx, &auth).await?;
    let developers = Project::developers(&mut *tx, project.id).await?;

    Project::delete(&mut *tx, project.id).await?;

    tx.commit().await?;

    tracing::info!(project_id = %project.id, "Project deleted");

    enqueue_notification(
        &state.db,
        OutgoingMail::project_deleted(&project.title, &actor.email, emails(&developers)),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
