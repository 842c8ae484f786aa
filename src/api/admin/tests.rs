use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::repositories;
use crate::test_support;

#[tokio::test]
async fn admin_wires_group_membership_and_courses() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_admin(db, "admin@provera.local").await;
    let teacher = test_support::insert_teacher(db, "teacher@provera.local").await;
    let student = test_support::insert_student(db, "student@provera.local").await;
    let course = test_support::insert_course(db, "Geometry", &teacher.id).await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admin/groups",
            Some(&token),
            Some(json!({"name": "7B"})),
        ))
        .await
        .expect("create group");
    let status = response.status();
    let group = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {group}");
    let group_id = group["id"].as_str().expect("group id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/admin/groups/{group_id}/students"),
            Some(&token),
            Some(json!({"student_id": student.id})),
        ))
        .await
        .expect("add student");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/admin/groups/{group_id}/courses"),
            Some(&token),
            Some(json!({"course_id": course.id})),
        ))
        .await
        .expect("link course");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let reachable = repositories::groups::student_can_reach_course(db, &student.id, &course.id)
        .await
        .expect("reachability");
    assert!(reachable);
}

#[tokio::test]
async fn only_students_can_join_groups() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let admin = test_support::insert_admin(db, "admin@provera.local").await;
    let teacher = test_support::insert_teacher(db, "teacher@provera.local").await;
    let group = test_support::insert_group(db, "7C").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/admin/groups/{}/students", group.id),
            Some(&token),
            Some(json!({"student_id": teacher.id})),
        ))
        .await
        .expect("add teacher");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn teachers_cannot_manage_groups() {
    let ctx = test_support::setup_test_context().await;
    let teacher = test_support::insert_teacher(ctx.state.db(), "teacher@provera.local").await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admin/groups",
            Some(&token),
            Some(json!({"name": "8A"})),
        ))
        .await
        .expect("create group");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
