//! HTTP request handlers
//!
//! Thin adapters between the router and the store: extract, validate,
//! delegate, serialize. Creation endpoints answer 201, deletions 204.

use axum::extract::{FromRequest, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::journal::{self, DEFAULT_LESSONS_COUNT};
use crate::models::{
    NewCategory, NewGoal, NewHomework, NewHomeworkResult, NewLesson, NewLessonType, NewStudent,
    NewTeacher, NewTopic,
};
use crate::server::ServerState;

/// JSON extractor whose rejection maps into the API error taxonomy
/// (malformed bodies are a plain 400, not a framework-specific status)
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

// ---------------------------------------------------------------------------
// Teachers
// ---------------------------------------------------------------------------

pub async fn list_teachers(State(state): State<ServerState>) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_teachers().await?).into_response())
}

pub async fn create_teacher(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewTeacher>,
) -> Result<Response, ApiError> {
    info!("creating teacher: {}", payload.full_name);
    let created = state.store.create_teacher(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_teacher(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_teacher(id).await?).into_response())
}

pub async fn update_teacher(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewTeacher>,
) -> Result<Response, ApiError> {
    info!("updating teacher {}", id);
    Ok(Json(state.store.update_teacher(id, &payload).await?).into_response())
}

pub async fn delete_teacher(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_teacher(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Learning categories
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub slug: Option<String>,
}

/// List categories; with `?slug=` present this is a lookup returning a
/// single object (404 when no match)
pub async fn list_categories(
    State(state): State<ServerState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Response, ApiError> {
    match query.slug {
        Some(slug) => Ok(Json(state.store.get_category_by_slug(&slug).await?).into_response()),
        None => Ok(Json(state.store.list_categories().await?).into_response()),
    }
}

pub async fn create_category(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewCategory>,
) -> Result<Response, ApiError> {
    info!("creating learning category: {}", payload.name);
    let created = state.store.create_category(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_category(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_category(id).await?).into_response())
}

pub async fn update_category(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewCategory>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_category(id, &payload).await?).into_response())
}

pub async fn delete_category(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Learning goals
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GoalQuery {
    pub category: Option<i64>,
}

pub async fn list_goals(
    State(state): State<ServerState>,
    Query(query): Query<GoalQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_goals(query.category).await?).into_response())
}

pub async fn create_goal(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewGoal>,
) -> Result<Response, ApiError> {
    let created = state.store.create_goal(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_goal(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_goal(id).await?).into_response())
}

pub async fn update_goal(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewGoal>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_goal(id, &payload).await?).into_response())
}

pub async fn delete_goal(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_goal(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StudentQuery {
    pub learning_category: Option<i64>,
}

pub async fn list_students(
    State(state): State<ServerState>,
    Query(query): Query<StudentQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_students(query.learning_category).await?).into_response())
}

pub async fn create_student(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewStudent>,
) -> Result<Response, ApiError> {
    info!("creating student: {}", payload.full_name);
    let created = state.store.create_student(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_student(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_student(id).await?).into_response())
}

pub async fn update_student(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewStudent>,
) -> Result<Response, ApiError> {
    info!("updating student {}", id);
    Ok(Json(state.store.update_student(id, &payload).await?).into_response())
}

pub async fn delete_student(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_student(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Lesson types
// ---------------------------------------------------------------------------

pub async fn list_lesson_types(State(state): State<ServerState>) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_lesson_types().await?).into_response())
}

pub async fn create_lesson_type(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewLessonType>,
) -> Result<Response, ApiError> {
    let created = state.store.create_lesson_type(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_lesson_type(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_lesson_type(id).await?).into_response())
}

pub async fn update_lesson_type(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewLessonType>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_lesson_type(id, &payload).await?).into_response())
}

pub async fn delete_lesson_type(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_lesson_type(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    pub student: Option<i64>,
}

pub async fn list_topics(
    State(state): State<ServerState>,
    Query(query): Query<TopicQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_topics(query.student).await?).into_response())
}

pub async fn create_topic(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewTopic>,
) -> Result<Response, ApiError> {
    let created = state.store.create_topic(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_topic(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_topic(id).await?).into_response())
}

pub async fn update_topic(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewTopic>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_topic(id, &payload).await?).into_response())
}

pub async fn delete_topic(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_topic(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    pub student: Option<i64>,
}

pub async fn list_lessons(
    State(state): State<ServerState>,
    Query(query): Query<LessonQuery>,
) -> Result<Response, ApiError> {
    info!("listing lessons (student filter: {:?})", query.student);
    Ok(Json(state.store.list_lessons(query.student).await?).into_response())
}

pub async fn create_lesson(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewLesson>,
) -> Result<Response, ApiError> {
    let created = state.store.create_lesson(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_lesson(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_lesson(id).await?).into_response())
}

pub async fn update_lesson(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewLesson>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_lesson(id, &payload).await?).into_response())
}

pub async fn delete_lesson(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_lesson(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Homework
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HomeworkQuery {
    pub lesson: Option<i64>,
    pub student: Option<i64>,
}

pub async fn list_homeworks(
    State(state): State<ServerState>,
    Query(query): Query<HomeworkQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(
        state
            .store
            .list_homeworks(query.lesson, query.student)
            .await?,
    )
    .into_response())
}

/// Create a homework; embedded `results` entries are persisted as child
/// rows after the homework itself
pub async fn create_homework(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewHomework>,
) -> Result<Response, ApiError> {
    let created = state.store.create_homework(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_homework(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_homework(id).await?).into_response())
}

pub async fn update_homework(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewHomework>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_homework(id, &payload).await?).into_response())
}

pub async fn delete_homework(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_homework(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn homework_results(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.results_for_homework(id).await?).into_response())
}

// ---------------------------------------------------------------------------
// Homework results
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub lesson: Option<i64>,
}

pub async fn list_results(
    State(state): State<ServerState>,
    Query(query): Query<ResultQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_results(query.lesson).await?).into_response())
}

pub async fn create_result(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<NewHomeworkResult>,
) -> Result<Response, ApiError> {
    let created = state.store.create_result(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn get_result(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_result(id).await?).into_response())
}

pub async fn update_result(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<NewHomeworkResult>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.update_result(id, &payload).await?).into_response())
}

pub async fn delete_result(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store.delete_result(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JournalQuery {
    pub student: Option<i64>,
}

pub async fn list_journal(
    State(state): State<ServerState>,
    Query(query): Query<JournalQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_journal(query.student).await?).into_response())
}

pub async fn get_journal_entry(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.get_journal_entry(id).await?).into_response())
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub student_id: i64,
    #[serde(default)]
    pub lessons_count: Option<u32>,
}

pub async fn generate_journal(
    State(state): State<ServerState>,
    AppJson(payload): AppJson<GenerateRequest>,
) -> Result<Response, ApiError> {
    let window = payload
        .lessons_count
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_LESSONS_COUNT);
    let entry = journal::generate(&state.store, payload.student_id, window).await?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}
