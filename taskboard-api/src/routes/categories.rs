/// Category endpoints
///
/// Any authenticated user can read categories; only Board Managers create,
/// rename or delete them. Deleting a category unlinks it from its tasks.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{authorization::require_category_manager, middleware::AuthContext},
    models::category::Category,
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[serde(deserialize_with = "crate::extract::trimmed")]
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CategoryResponse>>> {
    let categories = Category::list(&state.db).await?;

    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    require_category_manager(&auth)?;

    let category = Category::create(&state.db, &req.name).await?;

    tracing::info!(category_id = %category.id, name = %category.name, "Category created");

    Ok((StatusCode::CREATED, Json(category.into())))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = Category::find_by_id(&state.db, category_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    Ok(Json(category.into()))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(category_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> ApiResult<Json<CategoryResponse>> {
    require_category_manager(&auth)?;

    let category = Category::rename(&state.db, category_id, &req.name)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    tracing::info!(category_id = %category.id, name = %category.name, "Category renamed");

    Ok(Json(category.into()))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(category_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_category_manager(&auth)?;

    if !Category::delete(&state.db, category_id).await? {
        return Err(ApiError::not_found("Category"));
    }

    tracing::info!(category_id = %category_id, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}
