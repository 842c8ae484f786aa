use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::repositories;
use crate::repositories::questions::CreateQuestion;
use crate::repositories::tests::{CreateBinding, CreateTest};
use crate::schemas::course::{CourseCreate, CourseResponse};
use crate::schemas::question::{QuestionCreate, QuestionResponse};
use crate::schemas::test::{
    format_primitive, AttachQuestionPayload, CourseTestBindingCreate, CourseTestBindingResponse,
    TestCreate, TestResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", post(create_course))
        .route("/tests", post(create_test))
        .route("/questions", post(create_question))
        .route("/tests/:test_id/questions", post(attach_question))
        .route("/courses/:course_id/tests", post(bind_test))
}

async fn create_course(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let course = repositories::courses::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &payload.title,
        &teacher.id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create course"))?;

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            id: course.id,
            title: course.title,
            created_by: course.created_by,
            created_at: format_primitive(course.created_at),
        }),
    ))
}

async fn create_test(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<TestCreate>,
) -> Result<(StatusCode, Json<TestResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let test = repositories::tests::create(
        state.db(),
        CreateTest {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            description: Some(&payload.description),
            time_limit_minutes: payload.time_limit_minutes,
            created_by: &teacher.id,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create test"))?;

    Ok((
        StatusCode::CREATED,
        Json(TestResponse {
            id: test.id,
            title: test.title,
            description: test.description.unwrap_or_default(),
            time_limit_minutes: test.time_limit_minutes,
            created_by: test.created_by,
            created_at: format_primitive(test.created_at),
        }),
    ))
}

async fn create_question(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    payload.validate_shape().map_err(ApiError::BadRequest)?;

    let now = primitive_now_utc();
    let question = repositories::questions::create(
        state.db(),
        CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            text: &payload.text,
            kind: payload.kind,
            difficulty: payload.difficulty,
            points: payload.points,
            correct_text: payload.correct_text.as_deref(),
            match_left: non_empty(payload.match_left),
            match_right: non_empty(payload.match_right),
            created_by: &teacher.id,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    for (position, option) in payload.options.iter().enumerate() {
        repositories::questions::insert_option(
            state.db(),
            &Uuid::new_v4().to_string(),
            &question.id,
            &option.text,
            option.is_correct,
            position as i32,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create answer option"))?;
    }

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            id: question.id,
            text: question.text,
            kind: question.kind,
            difficulty: question.difficulty,
            points: question.points,
            option_count: payload.options.len(),
            created_at: format_primitive(question.created_at),
        }),
    ))
}

async fn attach_question(
    CurrentTeacher(_teacher): CurrentTeacher,
    Path(test_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AttachQuestionPayload>,
) -> Result<StatusCode, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if repositories::tests::find_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Test not found".to_string()));
    }
    if repositories::questions::find_by_id(state.db(), &payload.question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    let position = match payload.position {
        Some(position) => position,
        None => repositories::tests::next_question_position(state.db(), &test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to compute question position"))?,
    };

    repositories::tests::attach_question(state.db(), &test_id, &payload.question_id, position)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach question"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn bind_test(
    CurrentTeacher(_teacher): CurrentTeacher,
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<CourseTestBindingCreate>,
) -> Result<(StatusCode, Json<CourseTestBindingResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if repositories::courses::find_by_id(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }
    if repositories::tests::find_by_id(state.db(), &payload.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .is_none()
    {
        return Err(ApiError::NotFound("Test not found".to_string()));
    }

    let binding = repositories::tests::create_binding(
        state.db(),
        CreateBinding {
            id: &Uuid::new_v4().to_string(),
            course_id: &course_id,
            test_id: &payload.test_id,
            deadline: payload.deadline.map(to_primitive_utc),
            attempts_allowed: payload.attempts_allowed,
            is_active: payload.is_active,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to bind test to course"))?;

    Ok((
        StatusCode::CREATED,
        Json(CourseTestBindingResponse {
            id: binding.id,
            course_id: binding.course_id,
            test_id: binding.test_id,
            deadline: binding.deadline.map(format_primitive),
            attempts_allowed: binding.attempts_allowed,
            is_active: binding.is_active,
        }),
    ))
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
