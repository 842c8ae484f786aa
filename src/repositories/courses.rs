use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Course;

const COLUMNS: &str = "id, title, created_by, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StudentCourseRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) test_count: i64,
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    title: &str,
    created_by: &str,
    now: PrimitiveDateTime,
) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (id, title, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(title)
    .bind(created_by)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<StudentCourseRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentCourseRow>(
        "SELECT c.id,
                c.title,
                (SELECT COUNT(*) FROM course_tests ct WHERE ct.course_id = c.id) AS test_count
         FROM courses c
         WHERE c.id IN (
             SELECT gc.course_id
             FROM group_members gm
             JOIN group_courses gc ON gc.group_id = gm.group_id
             WHERE gm.student_id = $1
         )
         ORDER BY c.title",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}
