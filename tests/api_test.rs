//! End-to-end API tests: real router, real SQLite store in a temp dir

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use tutor_control::config::Config;
use tutor_control::server::{build_router, ServerState};
use tutor_control::store::TutorStore;

async fn test_app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let store = TutorStore::new(dir.path().join("test.db")).await.unwrap();
    let state = ServerState {
        config: Arc::new(Config::default()),
        store: Arc::new(store),
    };
    (dir, build_router(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Seed teacher, category, goal and student; returns their ids
async fn seed(app: &Router) -> (i64, i64, i64, i64) {
    let (status, teacher) = send(
        app,
        "POST",
        "/api/teachers",
        Some(json!({"full_name": "Anna Petrova", "subject": "Math"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, category) = send(
        app,
        "POST",
        "/api/learning-categories",
        Some(json!({"name": "Алгебра"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, goal) = send(
        app,
        "POST",
        "/api/learning-goals",
        Some(json!({"name": "Exam prep", "category_ids": [category["id"]]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, student) = send(
        app,
        "POST",
        "/api/students",
        Some(json!({
            "full_name": "Ivan Ivanov",
            "grade": 8,
            "learning_goal_id": goal["id"],
            "learning_category_id": category["id"],
            "teacher_id": teacher["id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        teacher["id"].as_i64().unwrap(),
        category["id"].as_i64().unwrap(),
        goal["id"].as_i64().unwrap(),
        student["id"].as_i64().unwrap(),
    )
}

/// Lesson + homework with two results (A easy 5/5, B medium 2/10)
async fn seed_history(app: &Router, student_id: i64) -> (i64, i64) {
    let (_, lesson_type) = send(
        app,
        "POST",
        "/api/lesson-types",
        Some(json!({"name": "Regular"})),
    )
    .await;
    let (_, topic_a) = send(app, "POST", "/api/topics", Some(json!({"name": "A"}))).await;
    let (_, topic_b) = send(app, "POST", "/api/topics", Some(json!({"name": "B"}))).await;
    let (status, lesson) = send(
        app,
        "POST",
        "/api/lessons",
        Some(json!({
            "student_id": student_id,
            "lesson_type_id": lesson_type["id"],
            "topic_id": topic_a["id"],
            "comment": "fractions intro",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, homework) = send(
        app,
        "POST",
        "/api/homeworks",
        Some(json!({
            "lesson_id": lesson["id"],
            "topic_ids": [topic_a["id"], topic_b["id"]],
            "results": [
                {"topic_id": topic_a["id"], "difficulty": "EASY", "correct_count": 5, "total_count": 5},
                {"topic_id": topic_b["id"], "difficulty": "MEDIUM", "correct_count": 2, "total_count": 10},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        lesson["id"].as_i64().unwrap(),
        homework["id"].as_i64().unwrap(),
    )
}

#[tokio::test]
async fn test_api_root_banner() {
    let (_dir, app) = test_app().await;
    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_student_crud_and_nested_view() {
    let (_dir, app) = test_app().await;
    let (teacher_id, category_id, _goal_id, student_id) = seed(&app).await;

    let (status, student) = send(&app, "GET", &format!("/api/students/{student_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(student["teacher"]["id"].as_i64().unwrap(), teacher_id);
    assert_eq!(student["learning_category"]["slug"], "algebra");
    assert_eq!(student["learning_goal"]["categories"][0]["slug"], "algebra");

    // Filter by learning category
    let (_, filtered) = send(
        &app,
        "GET",
        &format!("/api/students?learning_category={category_id}"),
        None,
    )
    .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    let (_, empty) = send(&app, "GET", "/api/students?learning_category=999", None).await;
    assert!(empty.as_array().unwrap().is_empty());

    // Delete answers 204, then 404 on retrieve
    let (status, _) = send(&app, "DELETE", &format!("/api/students/{student_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/students/{student_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_slug_lookup_and_conflict() {
    let (_dir, app) = test_app().await;
    seed(&app).await;

    // Lookup by slug returns a single object, not a list
    let (status, category) = send(
        &app,
        "GET",
        "/api/learning-categories?slug=algebra",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(category.is_object());
    assert_eq!(category["name"], "Алгебра");

    let (status, _) = send(&app, "GET", "/api/learning-categories?slug=nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Same name derives the same slug: uniqueness violation
    let (status, body) = send(
        &app,
        "POST",
        "/api/learning-categories",
        Some(json!({"name": "Алгебра"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "uniqueness violation");
}

#[tokio::test]
async fn test_homework_embedded_results() {
    let (_dir, app) = test_app().await;
    let (_, _, _, student_id) = seed(&app).await;
    let (lesson_id, homework_id) = seed_history(&app, student_id).await;

    let (status, results) = send(
        &app,
        "GET",
        &format!("/api/homeworks/{homework_id}/results"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap().clone();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["percentage"].as_f64().unwrap(), 100.0);
    assert_eq!(results[1]["percentage"].as_f64().unwrap(), 20.0);

    // Filterable by lesson through the flat collection too
    let (_, by_lesson) = send(
        &app,
        "GET",
        &format!("/api/homework-results?lesson={lesson_id}"),
        None,
    )
    .await;
    assert_eq!(by_lesson.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_result_zero_total_is_not_an_error() {
    let (_dir, app) = test_app().await;
    let (_, _, _, student_id) = seed(&app).await;
    let (_, homework_id) = seed_history(&app, student_id).await;
    let (_, topic) = send(&app, "POST", "/api/topics", Some(json!({"name": "C"}))).await;

    let (status, result) = send(
        &app,
        "POST",
        "/api/homework-results",
        Some(json!({
            "homework_id": homework_id,
            "topic_id": topic["id"],
            "difficulty": "HARD",
            "correct_count": 3,
            "total_count": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["percentage"].as_f64().unwrap(), 0.0);
}

#[tokio::test]
async fn test_generate_journal_entry() {
    let (_dir, app) = test_app().await;
    let (_, _, _, student_id) = seed(&app).await;

    // Missing student
    let (status, _) = send(
        &app,
        "POST",
        "/api/journal/generate",
        Some(json!({"student_id": 999})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No lessons yet
    let (status, body) = send(
        &app,
        "POST",
        "/api/journal/generate",
        Some(json!({"student_id": student_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad request");

    seed_history(&app, student_id).await;

    let (status, entry) = send(
        &app,
        "POST",
        "/api/journal/generate",
        Some(json!({"student_id": student_id, "lessons_count": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["recommended_lessons"].as_i64().unwrap(), 1);
    assert!(entry["working_on"].as_str().unwrap().contains("B medium"));
    assert!(entry["good_results"].as_str().unwrap().contains("A easy"));
    assert_eq!(entry["bad_results"], entry["covered_topics"]);
    assert_eq!(entry["student"]["id"].as_i64().unwrap(), student_id);

    // Listed and filterable by student
    let (_, listed) = send(
        &app,
        "GET",
        &format!("/api/journal?student={student_id}"),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (_, other) = send(&app, "GET", "/api/journal?student=999", None).await;
    assert!(other.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (_dir, app) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/teachers")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Wrong field types are a 400 too, not a framework-specific status
    let (status, _) = send(
        &app,
        "POST",
        "/api/journal/generate",
        Some(json!({"student_id": "not-a-number"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_field_is_validation_error() {
    let (_dir, app) = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/teachers",
        Some(json!({"full_name": "  ", "subject": "Math"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation error");
}
