use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{StudentAnswer, TestAttempt};

const COLUMNS: &str = "\
    id, test_id, student_id, attempt_number, started_at, ended_at, is_completed, \
    score, grade, time_spent_minutes, created_at, updated_at";

const ANSWER_COLUMNS: &str = "\
    id, attempt_id, question_id, student_id, payload, is_correct, points_earned, \
    created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AttemptHistoryRow {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) attempt_number: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) ended_at: Option<PrimitiveDateTime>,
    pub(crate) is_completed: bool,
    pub(crate) score: i32,
    pub(crate) grade: Option<i32>,
    pub(crate) time_spent_minutes: Option<i32>,
}

pub(crate) async fn count_for_student(
    pool: &PgPool,
    test_id: &str,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_attempts WHERE test_id = $1 AND student_id = $2")
        .bind(test_id)
        .bind(student_id)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateAttempt<'a> {
    pub id: &'a str,
    pub test_id: &'a str,
    pub student_id: &'a str,
    pub attempt_number: i32,
    pub started_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    pool: &PgPool,
    params: CreateAttempt<'_>,
) -> Result<TestAttempt, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "INSERT INTO test_attempts (
            id, test_id, student_id, attempt_number, started_at, is_completed, score,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,FALSE,0,$6,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.student_id)
    .bind(params.attempt_number)
    .bind(params.started_at)
    .bind(params.started_at)
    .bind(params.started_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_owned(
    pool: &PgPool,
    attempt_id: &str,
    student_id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE id = $1 AND student_id = $2",
    ))
    .bind(attempt_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Row-locked read used by completion so two racing submits serialize on the
/// attempt row. Returns the attempt regardless of its completed flag; the
/// caller decides how to fail.
pub(crate) async fn lock_owned(
    conn: &mut PgConnection,
    attempt_id: &str,
    student_id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE id = $1 AND student_id = $2 FOR UPDATE",
    ))
    .bind(attempt_id)
    .bind(student_id)
    .fetch_optional(conn)
    .await
}

pub(crate) async fn latest_completed_for_test(
    pool: &PgPool,
    test_id: &str,
    student_id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts
         WHERE test_id = $1 AND student_id = $2 AND is_completed = TRUE
         ORDER BY attempt_number DESC
         LIMIT 1",
    ))
    .bind(test_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Latest attempt per test for the history screen.
pub(crate) async fn history_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<AttemptHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptHistoryRow>(
        "SELECT DISTINCT ON (ta.test_id)
                ta.id,
                ta.test_id,
                t.title AS test_title,
                ta.attempt_number,
                ta.started_at,
                ta.ended_at,
                ta.is_completed,
                ta.score,
                ta.grade,
                ta.time_spent_minutes
         FROM test_attempts ta
         JOIN tests t ON t.id = ta.test_id
         WHERE ta.student_id = $1
         ORDER BY ta.test_id, ta.attempt_number DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct UpsertAnswer<'a> {
    pub id: &'a str,
    pub attempt_id: &'a str,
    pub question_id: &'a str,
    pub student_id: &'a str,
    pub payload: serde_json::Value,
    pub now: PrimitiveDateTime,
}

/// Create-or-replace the answer for one (attempt, question) pair. Correctness
/// and points are left for the grading pass.
pub(crate) async fn upsert_answer(
    pool: &PgPool,
    params: UpsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_answers (
            id, attempt_id, question_id, student_id, payload, points_earned, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,0,$6,$6)
        ON CONFLICT (attempt_id, question_id)
        DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at",
    )
    .bind(params.id)
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.student_id)
    .bind(Json(params.payload))
    .bind(params.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_answers(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM student_answers WHERE attempt_id = $1 ORDER BY created_at",
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_answers_in_tx(
    conn: &mut PgConnection,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM student_answers WHERE attempt_id = $1 ORDER BY created_at",
    ))
    .bind(attempt_id)
    .fetch_all(conn)
    .await
}

pub(crate) async fn set_answer_grade(
    conn: &mut PgConnection,
    answer_id: &str,
    is_correct: bool,
    points_earned: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_answers
         SET is_correct = $1, points_earned = $2, updated_at = $3
         WHERE id = $4",
    )
    .bind(is_correct)
    .bind(points_earned)
    .bind(now)
    .bind(answer_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) struct FinalizeAttempt {
    pub ended_at: PrimitiveDateTime,
    pub score: i32,
    pub grade: i32,
    pub time_spent_minutes: i32,
}

/// Conditional completion write; the `is_completed = FALSE` guard makes the
/// second of two racing submits a no-op. Returns the number of rows updated.
pub(crate) async fn finalize(
    conn: &mut PgConnection,
    attempt_id: &str,
    params: FinalizeAttempt,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE test_attempts
         SET ended_at = $1,
             is_completed = TRUE,
             score = $2,
             grade = $3,
             time_spent_minutes = $4,
             updated_at = $1
         WHERE id = $5 AND is_completed = FALSE",
    )
    .bind(params.ended_at)
    .bind(params.score)
    .bind(params.grade)
    .bind(params.time_spent_minutes)
    .bind(attempt_id)
    .execute(conn)
    .await?;

    Ok(updated.rows_affected())
}
