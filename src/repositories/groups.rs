use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Group;

const COLUMNS: &str = "id, name, created_at";

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    created_at: PrimitiveDateTime,
) -> Result<Group, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!(
        "INSERT INTO groups (id, name, created_at) VALUES ($1,$2,$3) RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(name)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!("SELECT {COLUMNS} FROM groups WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn add_member(
    pool: &PgPool,
    group_id: &str,
    student_id: &str,
    added_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO group_members (group_id, student_id, added_at)
         VALUES ($1,$2,$3)
         ON CONFLICT (group_id, student_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(student_id)
    .bind(added_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn add_course(
    pool: &PgPool,
    group_id: &str,
    course_id: &str,
    added_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO group_courses (group_id, course_id, added_at)
         VALUES ($1,$2,$3)
         ON CONFLICT (group_id, course_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(course_id)
    .bind(added_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn student_can_reach_course(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1
         FROM group_members gm
         JOIN group_courses gc ON gc.group_id = gm.group_id
         WHERE gm.student_id = $1 AND gc.course_id = $2
         LIMIT 1",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}
