//! SQLite-based record access layer
//!
//! All reads and writes go through [`TutorStore`]. Read views embed related
//! objects (a student carries its goal, category and teacher) the way the
//! API serves them. Writes are single-row atomic; there is no multi-statement
//! transaction around the journal generation sequence.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::models::{
    percentage_of, CategoryView, Difficulty, GoalView, HomeworkResultView,
    HomeworkView, JournalEntryView, LessonTypeView, LessonView, NewCategory, NewGoal, NewHomework,
    NewHomeworkResult, NewLesson, NewLessonType, NewStudent, NewTeacher, NewTopic, StudentView,
    TeacherView, TopicView,
};
use crate::slug::slugify;

/// One homework result row in a student's recent-lesson window, joined with
/// its topic name. Ordered by (topic, difficulty, newest first) so the first
/// row per key is the current one.
#[derive(Debug, Clone)]
pub struct LatestResultRow {
    pub topic_id: i64,
    pub topic_name: String,
    pub difficulty: Difficulty,
    pub percentage: f64,
    pub created_at: DateTime<Utc>,
}

/// Narrative fields of a journal entry, produced by the generator.
#[derive(Debug, Clone)]
pub struct JournalFields {
    pub good_results: String,
    pub bad_results: String,
    pub covered_topics: String,
    pub working_on: String,
    pub recommended_lessons: i64,
    pub recommendation_reason: String,
}

/// SQLite-backed store shared across request handlers
pub struct TutorStore {
    conn: Arc<Mutex<Connection>>,
}

impl TutorStore {
    /// Open (or create) the database at the given path
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrency, foreign keys enforced per connection
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teachers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                subject TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS learning_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS learning_goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS goal_categories (
                goal_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (goal_id, category_id),
                FOREIGN KEY (goal_id) REFERENCES learning_goals(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES learning_categories(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                grade INTEGER NOT NULL DEFAULT 1,
                learning_goal_id INTEGER NOT NULL,
                learning_category_id INTEGER NOT NULL,
                teacher_id INTEGER NOT NULL,
                FOREIGN KEY (learning_goal_id) REFERENCES learning_goals(id) ON DELETE CASCADE,
                FOREIGN KEY (learning_category_id) REFERENCES learning_categories(id) ON DELETE CASCADE,
                FOREIGN KEY (teacher_id) REFERENCES teachers(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS lesson_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS topic_students (
                topic_id INTEGER NOT NULL,
                student_id INTEGER NOT NULL,
                PRIMARY KEY (topic_id, student_id),
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );

            -- Lessons are append-only: created per tutoring session
            CREATE TABLE IF NOT EXISTS lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL,
                lesson_type_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                comment TEXT,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
                FOREIGN KEY (lesson_type_id) REFERENCES lesson_types(id) ON DELETE CASCADE,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS homeworks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lesson_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS homework_topics (
                homework_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                PRIMARY KEY (homework_id, topic_id),
                FOREIGN KEY (homework_id) REFERENCES homeworks(id) ON DELETE CASCADE,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS homework_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                homework_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                difficulty TEXT NOT NULL CHECK(difficulty IN ('EASY', 'MEDIUM', 'HARD')),
                correct_count INTEGER NOT NULL DEFAULT 0,
                total_count INTEGER NOT NULL DEFAULT 0,
                percentage REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (homework_id) REFERENCES homeworks(id) ON DELETE CASCADE,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            -- Journal entries are append-only: created only by generation
            CREATE TABLE IF NOT EXISTS journal_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                good_results TEXT NOT NULL,
                bad_results TEXT NOT NULL,
                covered_topics TEXT NOT NULL,
                working_on TEXT NOT NULL,
                recommended_lessons INTEGER NOT NULL,
                recommendation_reason TEXT NOT NULL,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS admin_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Indexes for the journal window queries and common filters
            CREATE INDEX IF NOT EXISTS idx_lessons_student_date ON lessons(student_id, date DESC);
            CREATE INDEX IF NOT EXISTS idx_homeworks_lesson ON homeworks(lesson_id);
            CREATE INDEX IF NOT EXISTS idx_results_key ON homework_results(topic_id, difficulty, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_journal_student ON journal_entries(student_id);
        "#,
        )?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Teachers
    // -----------------------------------------------------------------------

    pub async fn create_teacher(&self, new: &NewTeacher) -> Result<TeacherView, ApiError> {
        require_text("full_name", &new.full_name)?;
        require_text("subject", &new.subject)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO teachers (full_name, subject) VALUES (?1, ?2)",
            params![new.full_name, new.subject],
        )?;
        let id = conn.last_insert_rowid();
        teacher_view(&conn, id)?.ok_or_else(|| missing("teacher", id))
    }

    pub async fn list_teachers(&self) -> Result<Vec<TeacherView>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT id, full_name, subject FROM teachers")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(TeacherView {
                    id: r.get(0)?,
                    full_name: r.get(1)?,
                    subject: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn get_teacher(&self, id: i64) -> Result<TeacherView, ApiError> {
        let conn = self.conn.lock().await;
        teacher_view(&conn, id)?.ok_or_else(|| not_found("Teacher"))
    }

    pub async fn update_teacher(&self, id: i64, new: &NewTeacher) -> Result<TeacherView, ApiError> {
        require_text("full_name", &new.full_name)?;
        require_text("subject", &new.subject)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE teachers SET full_name = ?1, subject = ?2 WHERE id = ?3",
            params![new.full_name, new.subject, id],
        )?;
        if changed == 0 {
            return Err(not_found("Teacher"));
        }
        teacher_view(&conn, id)?.ok_or_else(|| missing("teacher", id))
    }

    pub async fn delete_teacher(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "teachers", id, "Teacher")
    }

    // -----------------------------------------------------------------------
    // Learning categories
    // -----------------------------------------------------------------------

    pub async fn create_category(&self, new: &NewCategory) -> Result<CategoryView, ApiError> {
        require_text("name", &new.name)?;
        // Derive the slug from the name when none is supplied
        let slug = match new.slug.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => s.to_string(),
            None => slugify(&new.name),
        };
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO learning_categories (name, slug) VALUES (?1, ?2)",
            params![new.name, slug],
        )?;
        let id = conn.last_insert_rowid();
        category_view(&conn, id)?.ok_or_else(|| missing("category", id))
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryView>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT id, name, slug FROM learning_categories")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(CategoryView {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    slug: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn get_category(&self, id: i64) -> Result<CategoryView, ApiError> {
        let conn = self.conn.lock().await;
        category_view(&conn, id)?.ok_or_else(|| not_found("Learning category"))
    }

    /// Lookup a single category by slug (404 when absent)
    pub async fn get_category_by_slug(&self, slug: &str) -> Result<CategoryView, ApiError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, name, slug FROM learning_categories WHERE slug = ?1",
                params![slug],
                |r| {
                    Ok(CategoryView {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        slug: r.get(2)?,
                    })
                },
            )
            .optional()?;
        row.ok_or_else(|| not_found("Learning category"))
    }

    pub async fn update_category(
        &self,
        id: i64,
        new: &NewCategory,
    ) -> Result<CategoryView, ApiError> {
        require_text("name", &new.name)?;
        let slug = match new.slug.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => s.to_string(),
            None => slugify(&new.name),
        };
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE learning_categories SET name = ?1, slug = ?2 WHERE id = ?3",
            params![new.name, slug, id],
        )?;
        if changed == 0 {
            return Err(not_found("Learning category"));
        }
        category_view(&conn, id)?.ok_or_else(|| missing("category", id))
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "learning_categories", id, "Learning category")
    }

    // -----------------------------------------------------------------------
    // Learning goals
    // -----------------------------------------------------------------------

    pub async fn create_goal(&self, new: &NewGoal) -> Result<GoalView, ApiError> {
        require_text("name", &new.name)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO learning_goals (name) VALUES (?1)",
            params![new.name],
        )?;
        let id = conn.last_insert_rowid();
        set_goal_categories(&conn, id, &new.category_ids)?;
        goal_view(&conn, id)?.ok_or_else(|| missing("goal", id))
    }

    /// List goals, optionally only those linked to a category
    pub async fn list_goals(&self, category: Option<i64>) -> Result<Vec<GoalView>, ApiError> {
        let conn = self.conn.lock().await;
        let ids: Vec<i64> = match category {
            Some(cat) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT g.id FROM learning_goals g
                     JOIN goal_categories gc ON gc.goal_id = g.id
                     WHERE gc.category_id = ?1",
                )?;
                let ids = stmt.query_map(params![cat], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            None => {
                let mut stmt = conn.prepare_cached("SELECT id FROM learning_goals")?;
                let ids = stmt.query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };
        ids.into_iter()
            .map(|id| goal_view(&conn, id)?.ok_or_else(|| missing("goal", id)))
            .collect()
    }

    pub async fn get_goal(&self, id: i64) -> Result<GoalView, ApiError> {
        let conn = self.conn.lock().await;
        goal_view(&conn, id)?.ok_or_else(|| not_found("Learning goal"))
    }

    pub async fn update_goal(&self, id: i64, new: &NewGoal) -> Result<GoalView, ApiError> {
        require_text("name", &new.name)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE learning_goals SET name = ?1 WHERE id = ?2",
            params![new.name, id],
        )?;
        if changed == 0 {
            return Err(not_found("Learning goal"));
        }
        conn.execute(
            "DELETE FROM goal_categories WHERE goal_id = ?1",
            params![id],
        )?;
        set_goal_categories(&conn, id, &new.category_ids)?;
        goal_view(&conn, id)?.ok_or_else(|| missing("goal", id))
    }

    pub async fn delete_goal(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "learning_goals", id, "Learning goal")
    }

    // -----------------------------------------------------------------------
    // Students
    // -----------------------------------------------------------------------

    pub async fn create_student(&self, new: &NewStudent) -> Result<StudentView, ApiError> {
        require_text("full_name", &new.full_name)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO students (full_name, grade, learning_goal_id, learning_category_id, teacher_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.full_name,
                new.grade,
                new.learning_goal_id,
                new.learning_category_id,
                new.teacher_id
            ],
        )?;
        let id = conn.last_insert_rowid();
        student_view(&conn, id)?.ok_or_else(|| missing("student", id))
    }

    /// List students, optionally filtered by learning category
    pub async fn list_students(
        &self,
        learning_category: Option<i64>,
    ) -> Result<Vec<StudentView>, ApiError> {
        let conn = self.conn.lock().await;
        let ids: Vec<i64> = match learning_category {
            Some(cat) => {
                let mut stmt = conn
                    .prepare_cached("SELECT id FROM students WHERE learning_category_id = ?1")?;
                let ids = stmt.query_map(params![cat], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            None => {
                let mut stmt = conn.prepare_cached("SELECT id FROM students")?;
                let ids = stmt.query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };
        ids.into_iter()
            .map(|id| student_view(&conn, id)?.ok_or_else(|| missing("student", id)))
            .collect()
    }

    pub async fn get_student(&self, id: i64) -> Result<StudentView, ApiError> {
        let conn = self.conn.lock().await;
        student_view(&conn, id)?.ok_or_else(|| not_found("Student"))
    }

    pub async fn update_student(&self, id: i64, new: &NewStudent) -> Result<StudentView, ApiError> {
        require_text("full_name", &new.full_name)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE students SET full_name = ?1, grade = ?2, learning_goal_id = ?3,
             learning_category_id = ?4, teacher_id = ?5 WHERE id = ?6",
            params![
                new.full_name,
                new.grade,
                new.learning_goal_id,
                new.learning_category_id,
                new.teacher_id,
                id
            ],
        )?;
        if changed == 0 {
            return Err(not_found("Student"));
        }
        student_view(&conn, id)?.ok_or_else(|| missing("student", id))
    }

    pub async fn delete_student(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "students", id, "Student")
    }

    // -----------------------------------------------------------------------
    // Lesson types
    // -----------------------------------------------------------------------

    pub async fn create_lesson_type(&self, new: &NewLessonType) -> Result<LessonTypeView, ApiError> {
        require_text("name", &new.name)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO lesson_types (name) VALUES (?1)",
            params![new.name],
        )?;
        let id = conn.last_insert_rowid();
        lesson_type_view(&conn, id)?.ok_or_else(|| missing("lesson type", id))
    }

    pub async fn list_lesson_types(&self) -> Result<Vec<LessonTypeView>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT id, name FROM lesson_types")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(LessonTypeView {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn get_lesson_type(&self, id: i64) -> Result<LessonTypeView, ApiError> {
        let conn = self.conn.lock().await;
        lesson_type_view(&conn, id)?.ok_or_else(|| not_found("Lesson type"))
    }

    pub async fn update_lesson_type(
        &self,
        id: i64,
        new: &NewLessonType,
    ) -> Result<LessonTypeView, ApiError> {
        require_text("name", &new.name)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE lesson_types SET name = ?1 WHERE id = ?2",
            params![new.name, id],
        )?;
        if changed == 0 {
            return Err(not_found("Lesson type"));
        }
        lesson_type_view(&conn, id)?.ok_or_else(|| missing("lesson type", id))
    }

    pub async fn delete_lesson_type(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "lesson_types", id, "Lesson type")
    }

    // -----------------------------------------------------------------------
    // Topics
    // -----------------------------------------------------------------------

    pub async fn create_topic(&self, new: &NewTopic) -> Result<TopicView, ApiError> {
        require_text("name", &new.name)?;
        let conn = self.conn.lock().await;
        conn.execute("INSERT INTO topics (name) VALUES (?1)", params![new.name])?;
        let id = conn.last_insert_rowid();
        set_topic_students(&conn, id, &new.students)?;
        topic_view(&conn, id)?.ok_or_else(|| missing("topic", id))
    }

    /// List topics, optionally only those assigned to a student
    pub async fn list_topics(&self, student: Option<i64>) -> Result<Vec<TopicView>, ApiError> {
        let conn = self.conn.lock().await;
        let ids: Vec<i64> = match student {
            Some(sid) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT t.id FROM topics t
                     JOIN topic_students ts ON ts.topic_id = t.id
                     WHERE ts.student_id = ?1",
                )?;
                let ids = stmt.query_map(params![sid], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            None => {
                let mut stmt = conn.prepare_cached("SELECT id FROM topics")?;
                let ids = stmt.query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };
        ids.into_iter()
            .map(|id| topic_view(&conn, id)?.ok_or_else(|| missing("topic", id)))
            .collect()
    }

    pub async fn get_topic(&self, id: i64) -> Result<TopicView, ApiError> {
        let conn = self.conn.lock().await;
        topic_view(&conn, id)?.ok_or_else(|| not_found("Topic"))
    }

    pub async fn update_topic(&self, id: i64, new: &NewTopic) -> Result<TopicView, ApiError> {
        require_text("name", &new.name)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE topics SET name = ?1 WHERE id = ?2",
            params![new.name, id],
        )?;
        if changed == 0 {
            return Err(not_found("Topic"));
        }
        conn.execute("DELETE FROM topic_students WHERE topic_id = ?1", params![id])?;
        set_topic_students(&conn, id, &new.students)?;
        topic_view(&conn, id)?.ok_or_else(|| missing("topic", id))
    }

    pub async fn delete_topic(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "topics", id, "Topic")
    }

    // -----------------------------------------------------------------------
    // Lessons
    // -----------------------------------------------------------------------

    pub async fn create_lesson(&self, new: &NewLesson) -> Result<LessonView, ApiError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO lessons (student_id, lesson_type_id, topic_id, date, comment)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.student_id,
                new.lesson_type_id,
                new.topic_id,
                Utc::now().to_rfc3339(),
                new.comment
            ],
        )?;
        let id = conn.last_insert_rowid();
        lesson_view(&conn, id)?.ok_or_else(|| missing("lesson", id))
    }

    /// List lessons, optionally filtered by student, newest first
    pub async fn list_lessons(&self, student: Option<i64>) -> Result<Vec<LessonView>, ApiError> {
        let conn = self.conn.lock().await;
        let ids: Vec<i64> = match student {
            Some(sid) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT id FROM lessons WHERE student_id = ?1 ORDER BY date DESC, id DESC",
                )?;
                let ids = stmt.query_map(params![sid], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            None => {
                let mut stmt =
                    conn.prepare_cached("SELECT id FROM lessons ORDER BY date DESC, id DESC")?;
                let ids = stmt.query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };
        ids.into_iter()
            .map(|id| lesson_view(&conn, id)?.ok_or_else(|| missing("lesson", id)))
            .collect()
    }

    pub async fn get_lesson(&self, id: i64) -> Result<LessonView, ApiError> {
        let conn = self.conn.lock().await;
        lesson_view(&conn, id)?.ok_or_else(|| not_found("Lesson"))
    }

    pub async fn update_lesson(&self, id: i64, new: &NewLesson) -> Result<LessonView, ApiError> {
        let conn = self.conn.lock().await;
        // date is creation time and stays untouched
        let changed = conn.execute(
            "UPDATE lessons SET student_id = ?1, lesson_type_id = ?2, topic_id = ?3, comment = ?4
             WHERE id = ?5",
            params![
                new.student_id,
                new.lesson_type_id,
                new.topic_id,
                new.comment,
                id
            ],
        )?;
        if changed == 0 {
            return Err(not_found("Lesson"));
        }
        lesson_view(&conn, id)?.ok_or_else(|| missing("lesson", id))
    }

    pub async fn delete_lesson(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "lessons", id, "Lesson")
    }

    /// Ids of the student's most recent lessons, newest first
    pub async fn recent_lesson_ids(
        &self,
        student_id: i64,
        count: usize,
    ) -> Result<Vec<i64>, ApiError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM lessons WHERE student_id = ?1 ORDER BY date DESC, id DESC LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![student_id, count as i64], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Homework
    // -----------------------------------------------------------------------

    pub async fn create_homework(&self, new: &NewHomework) -> Result<HomeworkView, ApiError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO homeworks (lesson_id, created_at) VALUES (?1, ?2)",
            params![new.lesson_id, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        for topic_id in &new.topic_ids {
            conn.execute(
                "INSERT OR IGNORE INTO homework_topics (homework_id, topic_id) VALUES (?1, ?2)",
                params![id, topic_id],
            )?;
        }
        // Embedded results are persisted after the homework itself
        for result in &new.results {
            insert_result(
                &conn,
                id,
                result.topic_id,
                result.difficulty,
                result.correct_count,
                result.total_count,
            )?;
        }
        homework_view(&conn, id)?.ok_or_else(|| missing("homework", id))
    }

    /// List homework, optionally filtered by lesson or by the lesson's student
    pub async fn list_homeworks(
        &self,
        lesson: Option<i64>,
        student: Option<i64>,
    ) -> Result<Vec<HomeworkView>, ApiError> {
        let conn = self.conn.lock().await;
        let ids: Vec<i64> = match (lesson, student) {
            (Some(lid), _) => {
                let mut stmt =
                    conn.prepare_cached("SELECT id FROM homeworks WHERE lesson_id = ?1")?;
                let ids = stmt.query_map(params![lid], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            (None, Some(sid)) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT h.id FROM homeworks h
                     JOIN lessons l ON l.id = h.lesson_id
                     WHERE l.student_id = ?1",
                )?;
                let ids = stmt.query_map(params![sid], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            (None, None) => {
                let mut stmt = conn.prepare_cached("SELECT id FROM homeworks")?;
                let ids = stmt.query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };
        ids.into_iter()
            .map(|id| homework_view(&conn, id)?.ok_or_else(|| missing("homework", id)))
            .collect()
    }

    pub async fn get_homework(&self, id: i64) -> Result<HomeworkView, ApiError> {
        let conn = self.conn.lock().await;
        homework_view(&conn, id)?.ok_or_else(|| not_found("Homework"))
    }

    pub async fn update_homework(&self, id: i64, new: &NewHomework) -> Result<HomeworkView, ApiError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE homeworks SET lesson_id = ?1 WHERE id = ?2",
            params![new.lesson_id, id],
        )?;
        if changed == 0 {
            return Err(not_found("Homework"));
        }
        conn.execute(
            "DELETE FROM homework_topics WHERE homework_id = ?1",
            params![id],
        )?;
        for topic_id in &new.topic_ids {
            conn.execute(
                "INSERT OR IGNORE INTO homework_topics (homework_id, topic_id) VALUES (?1, ?2)",
                params![id, topic_id],
            )?;
        }
        homework_view(&conn, id)?.ok_or_else(|| missing("homework", id))
    }

    pub async fn delete_homework(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "homeworks", id, "Homework")
    }

    /// Child results of one homework
    pub async fn results_for_homework(
        &self,
        homework_id: i64,
    ) -> Result<Vec<HomeworkResultView>, ApiError> {
        let conn = self.conn.lock().await;
        if !row_exists(&conn, "homeworks", homework_id)? {
            return Err(not_found("Homework"));
        }
        result_views(&conn, homework_id)
    }

    // -----------------------------------------------------------------------
    // Homework results
    // -----------------------------------------------------------------------

    pub async fn create_result(
        &self,
        new: &NewHomeworkResult,
    ) -> Result<HomeworkResultView, ApiError> {
        let conn = self.conn.lock().await;
        let id = insert_result(
            &conn,
            new.homework_id,
            new.topic_id,
            new.difficulty,
            new.correct_count,
            new.total_count,
        )?;
        result_view(&conn, id)?.ok_or_else(|| missing("homework result", id))
    }

    /// List results, optionally only those belonging to one lesson's homework
    pub async fn list_results(
        &self,
        lesson: Option<i64>,
    ) -> Result<Vec<HomeworkResultView>, ApiError> {
        let conn = self.conn.lock().await;
        let sql = match lesson {
            Some(_) => {
                "SELECT hr.id FROM homework_results hr
                 JOIN homeworks h ON h.id = hr.homework_id
                 WHERE h.lesson_id = ?1"
            }
            None => "SELECT id FROM homework_results",
        };
        let mut stmt = conn.prepare_cached(sql)?;
        let ids: Vec<i64> = match lesson {
            Some(lid) => stmt
                .query_map(params![lid], |r| r.get(0))?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], |r| r.get(0))?
                .collect::<Result<Vec<_>, _>>()?,
        };
        ids.into_iter()
            .map(|id| result_view(&conn, id)?.ok_or_else(|| missing("homework result", id)))
            .collect()
    }

    pub async fn get_result(&self, id: i64) -> Result<HomeworkResultView, ApiError> {
        let conn = self.conn.lock().await;
        result_view(&conn, id)?.ok_or_else(|| not_found("Homework result"))
    }

    /// Update a result; the percentage is recomputed from the new counts
    pub async fn update_result(
        &self,
        id: i64,
        new: &NewHomeworkResult,
    ) -> Result<HomeworkResultView, ApiError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE homework_results SET homework_id = ?1, topic_id = ?2, difficulty = ?3,
             correct_count = ?4, total_count = ?5, percentage = ?6 WHERE id = ?7",
            params![
                new.homework_id,
                new.topic_id,
                new.difficulty.as_str(),
                new.correct_count,
                new.total_count,
                percentage_of(new.correct_count, new.total_count),
                id
            ],
        )?;
        if changed == 0 {
            return Err(not_found("Homework result"));
        }
        result_view(&conn, id)?.ok_or_else(|| missing("homework result", id))
    }

    pub async fn delete_result(&self, id: i64) -> Result<(), ApiError> {
        let conn = self.conn.lock().await;
        delete_row(&conn, "homework_results", id, "Homework result")
    }

    /// All results attached to homework of the given lessons, ordered by
    /// (topic, difficulty, newest first) for first-write-wins deduplication.
    pub async fn results_for_lessons(
        &self,
        lesson_ids: &[i64],
    ) -> Result<Vec<LatestResultRow>, ApiError> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let placeholders = vec!["?"; lesson_ids.len()].join(", ");
        let sql = format!(
            "SELECT hr.topic_id, t.name, hr.difficulty, hr.percentage, hr.created_at
             FROM homework_results hr
             JOIN topics t ON t.id = hr.topic_id
             JOIN homeworks h ON h.id = hr.homework_id
             WHERE h.lesson_id IN ({placeholders})
             ORDER BY hr.topic_id, hr.difficulty, hr.created_at DESC, hr.id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(lesson_ids.iter()), |r| {
                let difficulty_raw: String = r.get(2)?;
                let created_at_raw: String = r.get(4)?;
                Ok(LatestResultRow {
                    topic_id: r.get(0)?,
                    topic_name: r.get(1)?,
                    difficulty: parse_difficulty(&difficulty_raw)?,
                    percentage: r.get(3)?,
                    created_at: parse_ts(&created_at_raw),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Journal
    // -----------------------------------------------------------------------

    pub async fn create_journal_entry(
        &self,
        student_id: i64,
        fields: &JournalFields,
    ) -> Result<JournalEntryView, ApiError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO journal_entries
             (student_id, created_at, good_results, bad_results, covered_topics,
              working_on, recommended_lessons, recommendation_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                student_id,
                Utc::now().to_rfc3339(),
                fields.good_results,
                fields.bad_results,
                fields.covered_topics,
                fields.working_on,
                fields.recommended_lessons,
                fields.recommendation_reason
            ],
        )?;
        let id = conn.last_insert_rowid();
        journal_view(&conn, id)?.ok_or_else(|| missing("journal entry", id))
    }

    /// List journal entries, optionally filtered by student
    pub async fn list_journal(
        &self,
        student: Option<i64>,
    ) -> Result<Vec<JournalEntryView>, ApiError> {
        let conn = self.conn.lock().await;
        let ids: Vec<i64> = match student {
            Some(sid) => {
                let mut stmt =
                    conn.prepare_cached("SELECT id FROM journal_entries WHERE student_id = ?1")?;
                let ids = stmt.query_map(params![sid], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            None => {
                let mut stmt = conn.prepare_cached("SELECT id FROM journal_entries")?;
                let ids = stmt.query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };
        ids.into_iter()
            .map(|id| journal_view(&conn, id)?.ok_or_else(|| missing("journal entry", id)))
            .collect()
    }

    pub async fn get_journal_entry(&self, id: i64) -> Result<JournalEntryView, ApiError> {
        let conn = self.conn.lock().await;
        journal_view(&conn, id)?.ok_or_else(|| not_found("Journal entry"))
    }

    pub async fn journal_count(&self) -> Result<usize, ApiError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM journal_entries", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    // -----------------------------------------------------------------------
    // Admin provisioning
    // -----------------------------------------------------------------------

    /// Create the admin account if it does not exist yet. Returns true when a
    /// row was created, false when the username was already provisioned.
    pub async fn provision_admin(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, ApiError> {
        require_text("username", username)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO admin_users (username, password_hash, created_at)
             VALUES (?1, ?2, ?3)",
            params![username, password_hash, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// Row/view helpers (run under the connection lock)
// ---------------------------------------------------------------------------

fn not_found(entity: &str) -> ApiError {
    ApiError::NotFound(format!("{entity} not found"))
}

/// A row that existed a statement ago has vanished; only possible if the
/// schema or a concurrent writer misbehaves.
fn missing(entity: &str, id: i64) -> ApiError {
    ApiError::Internal(anyhow!("{entity} {id} disappeared after write"))
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

fn delete_row(conn: &Connection, table: &str, id: i64, entity: &str) -> Result<(), ApiError> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    if changed == 0 {
        return Err(not_found(entity));
    }
    Ok(())
}

fn row_exists(conn: &Connection, table: &str, id: i64) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {table} WHERE id = ?1"),
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn parse_difficulty(raw: &str) -> Result<Difficulty, rusqlite::Error> {
    Difficulty::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("invalid difficulty: {raw}").into(),
        )
    })
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn insert_result(
    conn: &Connection,
    homework_id: i64,
    topic_id: i64,
    difficulty: Difficulty,
    correct_count: i64,
    total_count: i64,
) -> Result<i64, ApiError> {
    conn.execute(
        "INSERT INTO homework_results
         (homework_id, topic_id, difficulty, correct_count, total_count, percentage, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            homework_id,
            topic_id,
            difficulty.as_str(),
            correct_count,
            total_count,
            percentage_of(correct_count, total_count),
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn teacher_view(conn: &Connection, id: i64) -> Result<Option<TeacherView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, full_name, subject FROM teachers WHERE id = ?1",
            params![id],
            |r| {
                Ok(TeacherView {
                    id: r.get(0)?,
                    full_name: r.get(1)?,
                    subject: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn category_view(conn: &Connection, id: i64) -> Result<Option<CategoryView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, name, slug FROM learning_categories WHERE id = ?1",
            params![id],
            |r| {
                Ok(CategoryView {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    slug: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn goal_view(conn: &Connection, id: i64) -> Result<Option<GoalView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, name FROM learning_goals WHERE id = ?1",
            params![id],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((id, name)) = row else {
        return Ok(None);
    };
    let mut stmt = conn.prepare_cached(
        "SELECT c.id, c.name, c.slug FROM learning_categories c
         JOIN goal_categories gc ON gc.category_id = c.id
         WHERE gc.goal_id = ?1",
    )?;
    let categories = stmt
        .query_map(params![id], |r| {
            Ok(CategoryView {
                id: r.get(0)?,
                name: r.get(1)?,
                slug: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(GoalView {
        id,
        name,
        categories,
    }))
}

fn student_view(conn: &Connection, id: i64) -> Result<Option<StudentView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, full_name, grade, learning_goal_id, learning_category_id, teacher_id
             FROM students WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, i64>(4)?,
                    r.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, full_name, grade, goal_id, category_id, teacher_id)) = row else {
        return Ok(None);
    };
    let learning_goal =
        goal_view(conn, goal_id)?.ok_or_else(|| missing("learning goal", goal_id))?;
    let learning_category =
        category_view(conn, category_id)?.ok_or_else(|| missing("category", category_id))?;
    let teacher = teacher_view(conn, teacher_id)?.ok_or_else(|| missing("teacher", teacher_id))?;
    Ok(Some(StudentView {
        id,
        full_name,
        grade,
        learning_goal,
        learning_category,
        teacher,
    }))
}

fn lesson_type_view(conn: &Connection, id: i64) -> Result<Option<LessonTypeView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, name FROM lesson_types WHERE id = ?1",
            params![id],
            |r| {
                Ok(LessonTypeView {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn topic_view(conn: &Connection, id: i64) -> Result<Option<TopicView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, name FROM topics WHERE id = ?1",
            params![id],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((id, name)) = row else {
        return Ok(None);
    };
    let mut stmt =
        conn.prepare_cached("SELECT student_id FROM topic_students WHERE topic_id = ?1")?;
    let students = stmt
        .query_map(params![id], |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(TopicView { id, name, students }))
}

fn lesson_view(conn: &Connection, id: i64) -> Result<Option<LessonView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, student_id, lesson_type_id, topic_id, date, comment
             FROM lessons WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<String>>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, student_id, lesson_type_id, topic_id, date_raw, comment)) = row else {
        return Ok(None);
    };
    let student = student_view(conn, student_id)?.ok_or_else(|| missing("student", student_id))?;
    let lesson_type = lesson_type_view(conn, lesson_type_id)?
        .ok_or_else(|| missing("lesson type", lesson_type_id))?;
    let topic = topic_view(conn, topic_id)?.ok_or_else(|| missing("topic", topic_id))?;
    Ok(Some(LessonView {
        id,
        student,
        lesson_type,
        topic,
        date: parse_ts(&date_raw),
        comment,
    }))
}

fn result_view(conn: &Connection, id: i64) -> Result<Option<HomeworkResultView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, topic_id, difficulty, correct_count, total_count, percentage, created_at
             FROM homework_results WHERE id = ?1",
            params![id],
            |r| {
                let difficulty_raw: String = r.get(2)?;
                let created_at_raw: String = r.get(6)?;
                Ok(HomeworkResultView {
                    id: r.get(0)?,
                    topic_id: r.get(1)?,
                    difficulty: parse_difficulty(&difficulty_raw)?,
                    correct_count: r.get(3)?,
                    total_count: r.get(4)?,
                    percentage: r.get(5)?,
                    created_at: parse_ts(&created_at_raw),
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn result_views(conn: &Connection, homework_id: i64) -> Result<Vec<HomeworkResultView>, ApiError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, topic_id, difficulty, correct_count, total_count, percentage, created_at
         FROM homework_results WHERE homework_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![homework_id], |r| {
            let difficulty_raw: String = r.get(2)?;
            let created_at_raw: String = r.get(6)?;
            Ok(HomeworkResultView {
                id: r.get(0)?,
                topic_id: r.get(1)?,
                difficulty: parse_difficulty(&difficulty_raw)?,
                correct_count: r.get(3)?,
                total_count: r.get(4)?,
                percentage: r.get(5)?,
                created_at: parse_ts(&created_at_raw),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn homework_view(conn: &Connection, id: i64) -> Result<Option<HomeworkView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, lesson_id, created_at FROM homeworks WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((id, lesson_id, created_at_raw)) = row else {
        return Ok(None);
    };
    let mut stmt =
        conn.prepare_cached("SELECT topic_id FROM homework_topics WHERE homework_id = ?1")?;
    let topic_ids = stmt
        .query_map(params![id], |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let results = result_views(conn, id)?;
    Ok(Some(HomeworkView {
        id,
        lesson_id,
        topic_ids,
        created_at: parse_ts(&created_at_raw),
        results,
    }))
}

fn journal_view(conn: &Connection, id: i64) -> Result<Option<JournalEntryView>, ApiError> {
    let row = conn
        .query_row(
            "SELECT id, student_id, created_at, good_results, bad_results, covered_topics,
                    working_on, recommended_lessons, recommendation_reason
             FROM journal_entries WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, i64>(7)?,
                    r.get::<_, String>(8)?,
                ))
            },
        )
        .optional()?;
    let Some((
        id,
        student_id,
        created_at_raw,
        good_results,
        bad_results,
        covered_topics,
        working_on,
        recommended_lessons,
        recommendation_reason,
    )) = row
    else {
        return Ok(None);
    };
    let student = student_view(conn, student_id)?.ok_or_else(|| missing("student", student_id))?;
    Ok(Some(JournalEntryView {
        id,
        student,
        created_at: parse_ts(&created_at_raw),
        good_results,
        bad_results,
        covered_topics,
        working_on,
        recommended_lessons,
        recommendation_reason,
    }))
}

fn set_goal_categories(conn: &Connection, goal_id: i64, category_ids: &[i64]) -> Result<(), ApiError> {
    for category_id in category_ids {
        conn.execute(
            "INSERT OR IGNORE INTO goal_categories (goal_id, category_id) VALUES (?1, ?2)",
            params![goal_id, category_id],
        )?;
    }
    Ok(())
}

fn set_topic_students(conn: &Connection, topic_id: i64, student_ids: &[i64]) -> Result<(), ApiError> {
    for student_id in student_ids {
        conn.execute(
            "INSERT OR IGNORE INTO topic_students (topic_id, student_id) VALUES (?1, ?2)",
            params![topic_id, student_id],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddedResult, NewCategory, NewGoal, NewStudent, NewTeacher};
    use tempfile::tempdir;

    async fn open_store() -> (tempfile::TempDir, TutorStore) {
        let dir = tempdir().unwrap();
        let store = TutorStore::new(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    /// Teacher + category + goal + student, returning the student id
    async fn seed_student(store: &TutorStore) -> i64 {
        let teacher = store
            .create_teacher(&NewTeacher {
                full_name: "Anna Petrova".to_string(),
                subject: "Math".to_string(),
            })
            .await
            .unwrap();
        let category = store
            .create_category(&NewCategory {
                name: "Algebra".to_string(),
                slug: None,
            })
            .await
            .unwrap();
        let goal = store
            .create_goal(&NewGoal {
                name: "Exam preparation".to_string(),
                category_ids: vec![category.id],
            })
            .await
            .unwrap();
        store
            .create_student(&NewStudent {
                full_name: "Ivan Ivanov".to_string(),
                grade: 8,
                learning_goal_id: goal.id,
                learning_category_id: category.id,
                teacher_id: teacher.id,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_teacher_crud() {
        let (_dir, store) = open_store().await;
        let t = store
            .create_teacher(&NewTeacher {
                full_name: "Anna Petrova".to_string(),
                subject: "Math".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.list_teachers().await.unwrap().len(), 1);

        let updated = store
            .update_teacher(
                t.id,
                &NewTeacher {
                    full_name: "Anna Petrova".to_string(),
                    subject: "Physics".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.subject, "Physics");

        store.delete_teacher(t.id).await.unwrap();
        assert!(matches!(
            store.get_teacher(t.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let (_dir, store) = open_store().await;
        let err = store
            .create_teacher(&NewTeacher {
                full_name: "  ".to_string(),
                subject: "Math".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_category_slug_derivation_and_lookup() {
        let (_dir, store) = open_store().await;
        let cat = store
            .create_category(&NewCategory {
                name: "Алгебра".to_string(),
                slug: None,
            })
            .await
            .unwrap();
        assert_eq!(cat.slug, "algebra");

        let by_slug = store.get_category_by_slug("algebra").await.unwrap();
        assert_eq!(by_slug.id, cat.id);
        assert!(matches!(
            store.get_category_by_slug("geometry").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let (_dir, store) = open_store().await;
        store
            .create_category(&NewCategory {
                name: "Algebra".to_string(),
                slug: None,
            })
            .await
            .unwrap();
        let err = store
            .create_category(&NewCategory {
                name: "Algebra".to_string(),
                slug: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_student_with_dangling_reference_is_validation_error() {
        let (_dir, store) = open_store().await;
        let err = store
            .create_student(&NewStudent {
                full_name: "Ivan".to_string(),
                grade: 5,
                learning_goal_id: 999,
                learning_category_id: 999,
                teacher_id: 999,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_student_view_embeds_relations() {
        let (_dir, store) = open_store().await;
        let sid = seed_student(&store).await;
        let student = store.get_student(sid).await.unwrap();
        assert_eq!(student.teacher.subject, "Math");
        assert_eq!(student.learning_category.slug, "algebra");
        assert_eq!(student.learning_goal.categories.len(), 1);

        let filtered = store
            .list_students(Some(student.learning_category.id))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        let none = store
            .list_students(Some(student.learning_category.id + 100))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_recent_lessons_window_order() {
        let (_dir, store) = open_store().await;
        let sid = seed_student(&store).await;
        let lt = store
            .create_lesson_type(&NewLessonType {
                name: "Regular".to_string(),
            })
            .await
            .unwrap();
        let topic = store
            .create_topic(&NewTopic {
                name: "Fractions".to_string(),
                students: vec![sid],
            })
            .await
            .unwrap();

        let mut lesson_ids = Vec::new();
        for _ in 0..3 {
            let lesson = store
                .create_lesson(&NewLesson {
                    student_id: sid,
                    lesson_type_id: lt.id,
                    topic_id: topic.id,
                    comment: None,
                })
                .await
                .unwrap();
            lesson_ids.push(lesson.id);
        }

        let recent = store.recent_lesson_ids(sid, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0], lesson_ids[2]);
        assert_eq!(recent[1], lesson_ids[1]);

        let all = store.recent_lesson_ids(sid, 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_homework_with_embedded_results() {
        let (_dir, store) = open_store().await;
        let sid = seed_student(&store).await;
        let lt = store
            .create_lesson_type(&NewLessonType {
                name: "Regular".to_string(),
            })
            .await
            .unwrap();
        let topic = store
            .create_topic(&NewTopic {
                name: "Fractions".to_string(),
                students: vec![],
            })
            .await
            .unwrap();
        let lesson = store
            .create_lesson(&NewLesson {
                student_id: sid,
                lesson_type_id: lt.id,
                topic_id: topic.id,
                comment: Some("intro".to_string()),
            })
            .await
            .unwrap();

        let hw = store
            .create_homework(&NewHomework {
                lesson_id: lesson.id,
                topic_ids: vec![topic.id],
                results: vec![EmbeddedResult {
                    topic_id: topic.id,
                    difficulty: Difficulty::Easy,
                    correct_count: 5,
                    total_count: 5,
                }],
            })
            .await
            .unwrap();
        assert_eq!(hw.results.len(), 1);
        assert_eq!(hw.results[0].percentage, 100.0);

        let children = store.results_for_homework(hw.id).await.unwrap();
        assert_eq!(children.len(), 1);

        // Percentage recomputed on update
        let updated = store
            .update_result(
                hw.results[0].id,
                &NewHomeworkResult {
                    homework_id: hw.id,
                    topic_id: topic.id,
                    difficulty: Difficulty::Easy,
                    correct_count: 2,
                    total_count: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.percentage, 20.0);

        // Zero total yields zero percentage, not an error
        let zero = store
            .create_result(&NewHomeworkResult {
                homework_id: hw.id,
                topic_id: topic.id,
                difficulty: Difficulty::Hard,
                correct_count: 3,
                total_count: 0,
            })
            .await
            .unwrap();
        assert_eq!(zero.percentage, 0.0);
    }

    #[tokio::test]
    async fn test_delete_lesson_cascades_to_homework() {
        let (_dir, store) = open_store().await;
        let sid = seed_student(&store).await;
        let lt = store
            .create_lesson_type(&NewLessonType {
                name: "Regular".to_string(),
            })
            .await
            .unwrap();
        let topic = store
            .create_topic(&NewTopic {
                name: "Fractions".to_string(),
                students: vec![],
            })
            .await
            .unwrap();
        let lesson = store
            .create_lesson(&NewLesson {
                student_id: sid,
                lesson_type_id: lt.id,
                topic_id: topic.id,
                comment: None,
            })
            .await
            .unwrap();
        let hw = store
            .create_homework(&NewHomework {
                lesson_id: lesson.id,
                topic_ids: vec![],
                results: vec![],
            })
            .await
            .unwrap();

        store.delete_lesson(lesson.id).await.unwrap();
        assert!(matches!(
            store.get_homework(hw.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_provision_admin_is_idempotent() {
        let (_dir, store) = open_store().await;
        assert!(store.provision_admin("admin", "hash").await.unwrap());
        assert!(!store.provision_admin("admin", "hash").await.unwrap());
    }
}
