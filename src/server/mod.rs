//! Web server module

pub mod http;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::store::TutorStore;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub store: Arc<TutorStore>,
}

/// Build the full API router
pub fn build_router(state: ServerState) -> Router {
    // The frontend is served from another origin, so CORS stays permissive
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/teachers", get(http::list_teachers).post(http::create_teacher))
        .route(
            "/teachers/{id}",
            get(http::get_teacher)
                .put(http::update_teacher)
                .delete(http::delete_teacher),
        )
        .route(
            "/learning-categories",
            get(http::list_categories).post(http::create_category),
        )
        .route(
            "/learning-categories/{id}",
            get(http::get_category)
                .put(http::update_category)
                .delete(http::delete_category),
        )
        .route(
            "/learning-goals",
            get(http::list_goals).post(http::create_goal),
        )
        .route(
            "/learning-goals/{id}",
            get(http::get_goal)
                .put(http::update_goal)
                .delete(http::delete_goal),
        )
        .route(
            "/students",
            get(http::list_students).post(http::create_student),
        )
        .route(
            "/students/{id}",
            get(http::get_student)
                .put(http::update_student)
                .delete(http::delete_student),
        )
        .route(
            "/lesson-types",
            get(http::list_lesson_types).post(http::create_lesson_type),
        )
        .route(
            "/lesson-types/{id}",
            get(http::get_lesson_type)
                .put(http::update_lesson_type)
                .delete(http::delete_lesson_type),
        )
        .route("/topics", get(http::list_topics).post(http::create_topic))
        .route(
            "/topics/{id}",
            get(http::get_topic)
                .put(http::update_topic)
                .delete(http::delete_topic),
        )
        .route("/lessons", get(http::list_lessons).post(http::create_lesson))
        .route(
            "/lessons/{id}",
            get(http::get_lesson)
                .put(http::update_lesson)
                .delete(http::delete_lesson),
        )
        .route(
            "/homeworks",
            get(http::list_homeworks).post(http::create_homework),
        )
        .route(
            "/homeworks/{id}",
            get(http::get_homework)
                .put(http::update_homework)
                .delete(http::delete_homework),
        )
        .route("/homeworks/{id}/results", get(http::homework_results))
        .route(
            "/homework-results",
            get(http::list_results).post(http::create_result),
        )
        .route(
            "/homework-results/{id}",
            get(http::get_result)
                .put(http::update_result)
                .delete(http::delete_result),
        )
        // Journal entries are append-only: list, retrieve and generate only
        .route("/journal", get(http::list_journal))
        .route("/journal/generate", post(http::generate_journal))
        .route("/journal/{id}", get(http::get_journal_entry));

    Router::new()
        .route("/", get(api_root))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(config: Config) -> Result<()> {
    let store = TutorStore::new(&config.database.path).await?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = ServerState {
        config: Arc::new(config),
        store: Arc::new(store),
    };
    let app = build_router(state);

    info!("listening on http://{}", addr);
    println!("Tutor Control API listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}

/// Handler for the API root banner
async fn api_root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Tutor Control System API",
        "status": "running",
        "endpoints": {
            "api": "/api/",
        }
    }))
}
