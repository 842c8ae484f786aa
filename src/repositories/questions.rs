use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{AnswerOption, Question};
use crate::db::types::{DifficultyLevel, QuestionKind};

const COLUMNS: &str = "\
    id, text, kind, difficulty, points, correct_text, match_left, match_right, \
    created_by, created_at, updated_at";

const OPTION_COLUMNS: &str = "id, question_id, text, is_correct, position";

pub(crate) struct CreateQuestion<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub kind: QuestionKind,
    pub difficulty: DifficultyLevel,
    pub points: i32,
    pub correct_text: Option<&'a str>,
    pub match_left: Option<Vec<String>>,
    pub match_right: Option<Vec<String>>,
    pub created_by: &'a str,
    pub now: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, text, kind, difficulty, points, correct_text, match_left, match_right,
            created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.text)
    .bind(params.kind)
    .bind(params.difficulty)
    .bind(params.points)
    .bind(params.correct_text)
    .bind(params.match_left.map(Json))
    .bind(params.match_right.map(Json))
    .bind(params.created_by)
    .bind(params.now)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn insert_option(
    pool: &PgPool,
    id: &str,
    question_id: &str,
    text: &str,
    is_correct: bool,
    position: i32,
) -> Result<AnswerOption, sqlx::Error> {
    sqlx::query_as::<_, AnswerOption>(&format!(
        "INSERT INTO answer_options (id, question_id, text, is_correct, position)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {OPTION_COLUMNS}",
    ))
    .bind(id)
    .bind(question_id)
    .bind(text)
    .bind(is_correct)
    .bind(position)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Questions of a test in delivery order (ascending link position).
pub(crate) async fn list_for_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT q.{}
         FROM test_questions tq
         JOIN questions q ON q.id = tq.question_id
         WHERE tq.test_id = $1
         ORDER BY tq.position, q.id",
        COLUMNS.replace(", ", ", q."),
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_on_test(
    pool: &PgPool,
    test_id: &str,
    question_id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT q.{}
         FROM test_questions tq
         JOIN questions q ON q.id = tq.question_id
         WHERE tq.test_id = $1 AND q.id = $2",
        COLUMNS.replace(", ", ", q."),
    ))
    .bind(test_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_options_for_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    sqlx::query_as::<_, AnswerOption>(&format!(
        "SELECT o.{}
         FROM answer_options o
         WHERE o.question_id IN (SELECT question_id FROM test_questions WHERE test_id = $1)
         ORDER BY o.question_id, o.position, o.id",
        OPTION_COLUMNS.replace(", ", ", o."),
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_options_by_question_ids(
    pool: &PgPool,
    question_ids: &[String],
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, AnswerOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM answer_options WHERE question_id = ANY($1)
         ORDER BY question_id, position, id",
    ))
    .bind(question_ids)
    .fetch_all(pool)
    .await
}
