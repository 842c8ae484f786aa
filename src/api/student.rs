use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, routing::post, routing::put, Json, Router};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{AnswerOption, Question};
use crate::db::types::QuestionKind;
use crate::repositories;
use crate::repositories::attempts::UpsertAnswer;
use crate::schemas::attempt::{
    AnswerAcceptedResponse, AnswerPayload, AnsweredQuestion, AttemptDetailResponse,
    AttemptHistoryItem, AttemptOutcomeResponse, AttemptStartResponse, AvailabilityResponse,
    DeliveredOption, DeliveredQuestion,
};
use crate::schemas::course::StudentCourseItem;
use crate::schemas::test::StudentTestItem;
use crate::services::admission::{self, Denial};
use crate::services::grading;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/:course_id/tests", get(list_course_tests))
        .route("/tests/:test_id/availability", get(availability))
        .route("/tests/:test_id/attempts", post(start_attempt))
        .route("/tests/:test_id/results", get(test_results))
        .route("/attempts", get(attempt_history))
        .route("/attempts/:attempt_id", get(attempt_detail))
        .route("/attempts/:attempt_id/answers/:question_id", put(save_answer))
        .route("/attempts/:attempt_id/complete", post(complete_attempt))
}

async fn list_courses(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentCourseItem>>, ApiError> {
    let rows = repositories::courses::list_for_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list courses"))?;

    Ok(Json(
        rows.into_iter()
            .map(|row| StudentCourseItem { id: row.id, title: row.title, test_count: row.test_count })
            .collect(),
    ))
}

async fn list_course_tests(
    CurrentStudent(student): CurrentStudent,
    Path(course_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentTestItem>>, ApiError> {
    let reachable =
        repositories::groups::student_can_reach_course(state.db(), &student.id, &course_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check course access"))?;
    if !reachable {
        return Err(ApiError::Forbidden("Course is not available to you"));
    }

    let rows = repositories::tests::list_for_course_with_attempts(
        state.db(),
        &course_id,
        &student.id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list course tests"))?;

    Ok(Json(
        rows.into_iter()
            .map(|row| StudentTestItem {
                test_id: row.id,
                title: row.title,
                description: row.description.unwrap_or_default(),
                time_limit_minutes: row.time_limit_minutes,
                deadline: row.deadline.map(format_primitive),
                attempts_allowed: row.attempts_allowed,
                attempts_used: row.attempts_used,
                question_count: row.question_count,
            })
            .collect(),
    ))
}

async fn availability(
    CurrentStudent(student): CurrentStudent,
    Path(test_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let availability = admission::check_availability(&state, &test_id, &student.id).await?;

    let reason = availability.denial.map(|denial| match denial {
        Denial::DeadlineExpired => "The deadline for this test has passed".to_string(),
        Denial::QuotaExceeded => format!(
            "Attempt limit reached ({}/{})",
            availability.attempts_used, availability.binding.attempts_allowed
        ),
    });

    Ok(Json(AvailabilityResponse {
        test_id,
        can_start: availability.denial.is_none(),
        reason,
        attempts_used: availability.attempts_used,
        attempts_allowed: availability.binding.attempts_allowed,
        deadline: availability.binding.deadline.map(format_primitive),
    }))
}

async fn start_attempt(
    CurrentStudent(student): CurrentStudent,
    Path(test_id): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AttemptStartResponse>), ApiError> {
    let attempt = admission::start_attempt(&state, &test_id, &student.id).await?;

    let test = repositories::tests::find_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let questions = delivered_questions(&state, &test_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AttemptStartResponse {
            attempt_id: attempt.id,
            test_id,
            attempt_number: attempt.attempt_number,
            time_limit_minutes: test.time_limit_minutes,
            started_at: format_primitive(attempt.started_at),
            questions,
        }),
    ))
}

async fn save_answer(
    CurrentStudent(student): CurrentStudent,
    Path((attempt_id, question_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(payload): Json<AnswerPayload>,
) -> Result<Json<AnswerAcceptedResponse>, ApiError> {
    let attempt = repositories::attempts::find_owned(state.db(), &attempt_id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.is_completed {
        return Err(ApiError::Conflict("Attempt is already completed".to_string()));
    }

    let question =
        repositories::questions::find_on_test(state.db(), &attempt.test_id, &question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
            .ok_or_else(|| ApiError::NotFound("Question not found on this test".to_string()))?;

    if payload.kind() != question.kind {
        return Err(ApiError::BadRequest(format!(
            "Answer kind does not match question kind {:?}",
            question.kind
        )));
    }

    let value = serde_json::to_value(&payload)
        .map_err(|e| ApiError::internal(e, "Failed to serialize answer payload"))?;

    repositories::attempts::upsert_answer(
        state.db(),
        UpsertAnswer {
            id: &Uuid::new_v4().to_string(),
            attempt_id: &attempt_id,
            question_id: &question_id,
            student_id: &student.id,
            payload: value,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    Ok(Json(AnswerAcceptedResponse {
        attempt_id,
        question_id,
        status: "saved".to_string(),
    }))
}

async fn complete_attempt(
    CurrentStudent(student): CurrentStudent,
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttemptOutcomeResponse>, ApiError> {
    let attempt = repositories::attempts::find_owned(state.db(), &attempt_id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    let outcome = grading::complete_attempt(&state, &attempt_id, &student.id).await?;

    Ok(Json(AttemptOutcomeResponse {
        attempt_id,
        test_id: attempt.test_id,
        attempt_number: attempt.attempt_number,
        correct_count: outcome.correct_count,
        total_questions: outcome.total_questions,
        percentage: outcome.percentage,
        score: outcome.score,
        grade: outcome.grade,
        time_spent_minutes: outcome.time_spent_minutes,
        started_at: format_primitive(outcome.started_at),
        ended_at: format_primitive(outcome.ended_at),
    }))
}

async fn test_results(
    CurrentStudent(student): CurrentStudent,
    Path(test_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttemptOutcomeResponse>, ApiError> {
    let attempt =
        repositories::attempts::latest_completed_for_test(state.db(), &test_id, &student.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch results"))?
            .ok_or_else(|| ApiError::NotFound("No completed attempt for this test".to_string()))?;

    let answers = repositories::attempts::list_answers(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;
    let correct_count = answers.iter().filter(|a| a.is_correct == Some(true)).count() as i32;

    let total_questions = repositories::tests::question_count(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))? as i32;
    let percentage = if total_questions == 0 {
        0.0
    } else {
        f64::from(correct_count) / f64::from(total_questions) * 100.0
    };

    let ended_at = attempt
        .ended_at
        .ok_or_else(|| ApiError::internal("completed attempt without ended_at", "Corrupt attempt"))?;

    Ok(Json(AttemptOutcomeResponse {
        attempt_id: attempt.id,
        test_id,
        attempt_number: attempt.attempt_number,
        correct_count,
        total_questions,
        percentage,
        score: attempt.score,
        grade: attempt.grade.unwrap_or_else(|| grading::grade_band(percentage)),
        time_spent_minutes: attempt.time_spent_minutes.unwrap_or(0),
        started_at: format_primitive(attempt.started_at),
        ended_at: format_primitive(ended_at),
    }))
}

async fn attempt_history(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptHistoryItem>>, ApiError> {
    let rows = repositories::attempts::history_for_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt history"))?;

    Ok(Json(
        rows.into_iter()
            .map(|row| AttemptHistoryItem {
                attempt_id: row.id,
                test_id: row.test_id,
                test_title: row.test_title,
                attempt_number: row.attempt_number,
                is_completed: row.is_completed,
                score: row.score,
                grade: row.grade,
                time_spent_minutes: row.time_spent_minutes,
                started_at: format_primitive(row.started_at),
                ended_at: row.ended_at.map(format_primitive),
            })
            .collect(),
    ))
}

async fn attempt_detail(
    CurrentStudent(student): CurrentStudent,
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttemptDetailResponse>, ApiError> {
    let attempt = repositories::attempts::find_owned(state.db(), &attempt_id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    let answers = repositories::attempts::list_answers(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    Ok(Json(AttemptDetailResponse {
        attempt_id: attempt.id,
        test_id: attempt.test_id,
        attempt_number: attempt.attempt_number,
        is_completed: attempt.is_completed,
        score: attempt.score,
        grade: attempt.grade,
        started_at: format_primitive(attempt.started_at),
        ended_at: attempt.ended_at.map(format_primitive),
        answers: answers
            .into_iter()
            .map(|answer| AnsweredQuestion {
                question_id: answer.question_id,
                payload: answer.payload.0,
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
            })
            .collect(),
    }))
}

/// Assembles the question list handed to the student on start: delivery
/// order, correctness fields stripped.
async fn delivered_questions(
    state: &AppState,
    test_id: &str,
) -> Result<Vec<DeliveredQuestion>, ApiError> {
    let questions = repositories::questions::list_for_test(state.db(), test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_for_test(state.db(), test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    let mut by_question: HashMap<String, Vec<AnswerOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id.clone()).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| strip_question(question, &mut by_question))
        .collect())
}

fn strip_question(
    question: Question,
    options: &mut HashMap<String, Vec<AnswerOption>>,
) -> DeliveredQuestion {
    let delivered_options = match question.kind {
        QuestionKind::Single | QuestionKind::Multi => Some(
            options
                .remove(&question.id)
                .unwrap_or_default()
                .into_iter()
                .map(|o| DeliveredOption { id: o.id, text: o.text })
                .collect(),
        ),
        QuestionKind::Freetext | QuestionKind::Matching => None,
    };

    let (match_left, match_right) = match question.kind {
        QuestionKind::Matching => (
            question.match_left.map(|l| l.0),
            question.match_right.map(|r| r.0),
        ),
        _ => (None, None),
    };

    DeliveredQuestion {
        id: question.id,
        text: question.text,
        kind: question.kind,
        difficulty: question.difficulty,
        points: question.points,
        options: delivered_options,
        match_left,
        match_right,
    }
}

#[cfg(test)]
mod tests;
