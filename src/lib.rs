//! Tutor Control - tutoring tracking backend library
//!
//! A small administrative backend for a private-tutoring practice:
//! - CRUD over teachers, students, goals, categories, topics, lessons and homework
//! - Homework results with per-save percentage recomputation
//! - Auto-generated progress journal entries aggregated from recent lessons
//! - SQLite persistence, JSON HTTP API, explicit admin provisioning
//!
//! # Example
//!
//! ```ignore
//! use tutor_control::store::TutorStore;
//! use tutor_control::journal;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = TutorStore::new("tutor.db").await?;
//!     let entry = journal::generate(&store, 1, 5).await?;
//!     println!("{}", entry.good_results);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod error;
pub mod models;
pub mod slug;
pub mod store; // Must come before journal since journal depends on store
pub mod journal;
pub mod config;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use error::ApiError;
pub use models::{
    Difficulty, HomeworkView, JournalEntryView, LessonView, StudentView,
};
pub use store::TutorStore;
pub use config::Config;
pub use server::{ServerState, start as start_server};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Tutoring Tracking Backend", NAME, VERSION)
}
