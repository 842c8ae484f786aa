use axum::http::{Method, StatusCode};
use serde_json::json;
use time::Duration;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
use crate::db::types::QuestionKind;
use crate::test_support;

struct Fixture {
    student_token: String,
    test_id: String,
    single_ids: (String, Vec<String>),
    multi_ids: (String, Vec<String>),
    freetext_id: String,
    matching_id: String,
}

/// Course reachable by the student, one test with one question of each kind,
/// bound with the given quota.
async fn build_fixture(ctx: &test_support::TestContext, attempts_allowed: i32) -> Fixture {
    let db = ctx.state.db();
    let teacher = test_support::insert_teacher(db, "teacher@provera.local").await;
    let student = test_support::insert_student(db, "student@provera.local").await;
    let course = test_support::insert_course(db, "Biology", &teacher.id).await;
    test_support::enroll_student(db, &student, &course).await;

    let test = test_support::insert_test(db, "Midterm", Some(30), &teacher.id).await;

    let (single, single_options) = test_support::insert_choice_question(
        db,
        QuestionKind::Single,
        "Pick the right one",
        1,
        &[("wrong", false), ("right", true)],
        &teacher.id,
    )
    .await;
    let (multi, multi_options) = test_support::insert_choice_question(
        db,
        QuestionKind::Multi,
        "Pick both right ones",
        2,
        &[("yes-1", true), ("no", false), ("yes-2", true)],
        &teacher.id,
    )
    .await;
    let freetext = test_support::insert_freetext_question(
        db,
        "Name the process",
        1,
        "Photosynthesis",
        &teacher.id,
    )
    .await;
    let matching = test_support::insert_matching_question(
        db,
        "Match the pairs",
        3,
        &["a", "b", "c"],
        &["x", "y", "z"],
        &teacher.id,
    )
    .await;

    test_support::attach_question(db, &test, &single, 1).await;
    test_support::attach_question(db, &test, &multi, 2).await;
    test_support::attach_question(db, &test, &freetext, 3).await;
    test_support::attach_question(db, &test, &matching, 4).await;

    test_support::bind_test(db, &course, &test, None, attempts_allowed).await;

    Fixture {
        student_token: test_support::bearer_token(&student.id, ctx.state.settings()),
        test_id: test.id,
        single_ids: (single.id, single_options),
        multi_ids: (multi.id, multi_options),
        freetext_id: freetext.id,
        matching_id: matching.id,
    }
}

async fn start(ctx: &test_support::TestContext, fixture: &Fixture) -> serde_json::Value {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/tests/{}/attempts", fixture.test_id),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("start attempt");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    body
}

async fn put_answer(
    ctx: &test_support::TestContext,
    fixture: &Fixture,
    attempt_id: &str,
    question_id: &str,
    payload: serde_json::Value,
) -> StatusCode {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/student/attempts/{attempt_id}/answers/{question_id}"),
            Some(&fixture.student_token),
            Some(payload),
        ))
        .await
        .expect("save answer");
    response.status()
}

async fn complete(
    ctx: &test_support::TestContext,
    fixture: &Fixture,
    attempt_id: &str,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/attempts/{attempt_id}/complete"),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("complete attempt");
    let status = response.status();
    let body = test_support::read_json(response).await;
    (status, body)
}

#[tokio::test]
async fn start_delivers_questions_without_answer_keys() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let body = start(&ctx, &fixture).await;

    assert_eq!(body["attempt_number"], 1);
    assert_eq!(body["time_limit_minutes"], 30);
    let questions = body["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 4);

    // Delivery order follows the link positions.
    assert_eq!(questions[0]["id"], fixture.single_ids.0.as_str());
    assert_eq!(questions[3]["id"], fixture.matching_id.as_str());

    for question in questions {
        assert!(question.get("correct_text").is_none());
        if let Some(options) = question["options"].as_array() {
            for option in options {
                assert!(option.get("is_correct").is_none());
            }
        }
    }

    // Matching carries the item lists, free-text nothing.
    assert_eq!(questions[3]["match_left"].as_array().unwrap().len(), 3);
    assert!(questions[2].get("options").is_none());
    assert!(questions[2].get("match_left").is_none());
}

#[tokio::test]
async fn full_attempt_is_graded_and_banded() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");

    let correct_single = &fixture.single_ids.1[1];
    assert_eq!(
        put_answer(
            &ctx,
            &fixture,
            attempt_id,
            &fixture.single_ids.0,
            json!({"kind": "single", "option_id": correct_single}),
        )
        .await,
        StatusCode::OK
    );
    assert_eq!(
        put_answer(
            &ctx,
            &fixture,
            attempt_id,
            &fixture.multi_ids.0,
            json!({"kind": "multi", "option_ids": [fixture.multi_ids.1[2], fixture.multi_ids.1[0]]}),
        )
        .await,
        StatusCode::OK
    );
    assert_eq!(
        put_answer(
            &ctx,
            &fixture,
            attempt_id,
            &fixture.freetext_id,
            json!({"kind": "freetext", "text": "  PHOTOSYNTHESIS "}),
        )
        .await,
        StatusCode::OK
    );
    // Third pair is wrong.
    assert_eq!(
        put_answer(
            &ctx,
            &fixture,
            attempt_id,
            &fixture.matching_id,
            json!({"kind": "matching", "pairs": [
                {"left": 1, "right": "A"},
                {"left": 2, "right": "B"},
                {"left": 3, "right": "A"}
            ]}),
        )
        .await,
        StatusCode::OK
    );

    let (status, outcome) = complete(&ctx, &fixture, attempt_id).await;
    assert_eq!(status, StatusCode::OK, "response: {outcome}");

    // 3 of 4 correct: 75% -> grade 4; points 1 + 2 + 1 = 4.
    assert_eq!(outcome["correct_count"], 3);
    assert_eq!(outcome["total_questions"], 4);
    assert_eq!(outcome["percentage"], 75.0);
    assert_eq!(outcome["grade"], 4);
    assert_eq!(outcome["score"], 4);
    assert_eq!(outcome["time_spent_minutes"], 0);

    // Results read model reports the same outcome.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/student/tests/{}/results", fixture.test_id),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("results");
    let status = response.status();
    let results = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {results}");
    assert_eq!(results["correct_count"], 3);
    assert_eq!(results["grade"], 4);
}

#[tokio::test]
async fn resubmitted_answer_replaces_the_previous_one() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");

    let wrong = &fixture.single_ids.1[0];
    let right = &fixture.single_ids.1[1];
    put_answer(
        &ctx,
        &fixture,
        attempt_id,
        &fixture.single_ids.0,
        json!({"kind": "single", "option_id": wrong}),
    )
    .await;
    put_answer(
        &ctx,
        &fixture,
        attempt_id,
        &fixture.single_ids.0,
        json!({"kind": "single", "option_id": right}),
    )
    .await;

    let (status, outcome) = complete(&ctx, &fixture, attempt_id).await;
    assert_eq!(status, StatusCode::OK, "response: {outcome}");
    assert_eq!(outcome["correct_count"], 1);
}

#[tokio::test]
async fn unanswered_questions_count_against_the_denominator() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");

    // Answer half the test correctly, leave the rest blank.
    put_answer(
        &ctx,
        &fixture,
        attempt_id,
        &fixture.single_ids.0,
        json!({"kind": "single", "option_id": fixture.single_ids.1[1]}),
    )
    .await;
    put_answer(
        &ctx,
        &fixture,
        attempt_id,
        &fixture.freetext_id,
        json!({"kind": "freetext", "text": "photosynthesis"}),
    )
    .await;

    let (status, outcome) = complete(&ctx, &fixture, attempt_id).await;
    assert_eq!(status, StatusCode::OK, "response: {outcome}");
    assert_eq!(outcome["correct_count"], 2);
    assert_eq!(outcome["total_questions"], 4);
    assert_eq!(outcome["percentage"], 50.0);
    assert_eq!(outcome["grade"], 3);
}

#[tokio::test]
async fn answer_kind_must_match_question_kind() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");

    let status = put_answer(
        &ctx,
        &fixture,
        attempt_id,
        &fixture.freetext_id,
        json!({"kind": "single", "option_id": "whatever"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completed_attempt_rejects_further_answers_and_completion() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 2).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");

    let (status, _) = complete(&ctx, &fixture, attempt_id).await;
    assert_eq!(status, StatusCode::OK);

    let status = put_answer(
        &ctx,
        &fixture,
        attempt_id,
        &fixture.freetext_id,
        json!({"kind": "freetext", "text": "late"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = complete(&ctx, &fixture, attempt_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn quota_blocks_extra_attempts() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");
    complete(&ctx, &fixture, attempt_id).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/student/tests/{}/availability", fixture.test_id),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("availability");
    let status = response.status();
    let availability = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {availability}");
    assert_eq!(availability["can_start"], false);
    assert_eq!(availability["attempts_used"], 1);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/tests/{}/attempts", fixture.test_id),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("second attempt");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn abandoned_attempt_still_consumes_quota() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    start(&ctx, &fixture).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/tests/{}/attempts", fixture.test_id),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("second attempt");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_deadline_blocks_start() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let teacher = test_support::insert_teacher(db, "teacher@provera.local").await;
    let student = test_support::insert_student(db, "student@provera.local").await;
    let course = test_support::insert_course(db, "History", &teacher.id).await;
    test_support::enroll_student(db, &student, &course).await;
    let test = test_support::insert_test(db, "Late test", None, &teacher.id).await;
    let past = primitive_now_utc() - Duration::hours(1);
    test_support::bind_test(db, &course, &test, Some(past), 3).await;

    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/tests/{}/attempts", test.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_test_is_forbidden() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db();

    let teacher = test_support::insert_teacher(db, "teacher@provera.local").await;
    let outsider = test_support::insert_student(db, "outsider@provera.local").await;
    let course = test_support::insert_course(db, "Physics", &teacher.id).await;
    let test = test_support::insert_test(db, "Closed test", None, &teacher.id).await;
    test_support::bind_test(db, &course, &test, None, 1).await;

    let token = test_support::bearer_token(&outsider.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/tests/{}/attempts", test.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn attempt_is_private_to_its_owner() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let started = start(&ctx, &fixture).await;
    let attempt_id = started["attempt_id"].as_str().expect("attempt id");

    let other = test_support::insert_student(ctx.state.db(), "other@provera.local").await;
    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/student/attempts/{attempt_id}"),
            Some(&other_token),
            None,
        ))
        .await
        .expect("detail");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_lists_latest_attempt_per_test() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 3).await;

    let first = start(&ctx, &fixture).await;
    complete(&ctx, &fixture, first["attempt_id"].as_str().unwrap()).await;
    let second = start(&ctx, &fixture).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/student/attempts",
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("history");
    let status = response.status();
    let history = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {history}");

    let items = history.as_array().expect("history array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["attempt_id"], second["attempt_id"]);
    assert_eq!(items[0]["attempt_number"], 2);
    assert_eq!(items[0]["is_completed"], false);
}

#[tokio::test]
async fn course_listings_reflect_enrollment() {
    let ctx = test_support::setup_test_context().await;
    let fixture = build_fixture(&ctx, 1).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/student/courses",
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("courses");
    let status = response.status();
    let courses = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {courses}");

    let items = courses.as_array().expect("course array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Biology");
    assert_eq!(items[0]["test_count"], 1);

    let course_id = items[0]["id"].as_str().expect("course id");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/student/courses/{course_id}/tests"),
            Some(&fixture.student_token),
            None,
        ))
        .await
        .expect("course tests");
    let status = response.status();
    let tests = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {tests}");
    assert_eq!(tests.as_array().unwrap().len(), 1);
    assert_eq!(tests[0]["title"], "Midterm");
    assert_eq!(tests[0]["question_count"], 4);
}
