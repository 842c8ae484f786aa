use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::group::{GroupCourseLink, GroupCreate, GroupMemberAdd, GroupResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", post(create_group))
        .route("/groups/:group_id/students", post(add_student))
        .route("/groups/:group_id/courses", post(link_course))
}

async fn create_group(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let group = repositories::groups::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &payload.name,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create group"))?;

    Ok((
        StatusCode::CREATED,
        Json(GroupResponse {
            id: group.id,
            name: group.name,
            created_at: format_primitive(group.created_at),
        }),
    ))
}

async fn add_student(
    CurrentAdmin(_admin): CurrentAdmin,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<GroupMemberAdd>,
) -> Result<StatusCode, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if repositories::groups::find_by_id(state.db(), &group_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch group"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Group not found".to_string()));
    }

    let student = repositories::users::find_by_id(state.db(), &payload.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    if student.role != UserRole::Student {
        return Err(ApiError::BadRequest("User is not a student".to_string()));
    }

    repositories::groups::add_member(state.db(), &group_id, &student.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to add group member"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn link_course(
    CurrentAdmin(_admin): CurrentAdmin,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<GroupCourseLink>,
) -> Result<StatusCode, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if repositories::groups::find_by_id(state.db(), &group_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch group"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Group not found".to_string()));
    }
    if repositories::courses::find_by_id(state.db(), &payload.course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    repositories::groups::add_course(state.db(), &group_id, &payload.course_id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to link course to group"))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests;
