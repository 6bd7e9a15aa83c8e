//! Shared data types used across modules
//!
//! Write payloads carry `*_id` references; read views embed the related
//! objects, matching what the frontend consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Homework difficulty level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Wire/storage form, e.g. "EASY"
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }

    /// Lowercase form used in report sentences, e.g. "easy"
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EASY" => Some(Difficulty::Easy),
            "MEDIUM" => Some(Difficulty::Medium),
            "HARD" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherView {
    pub id: i64,
    pub full_name: String,
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalView {
    pub id: i64,
    pub name: String,
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentView {
    pub id: i64,
    pub full_name: String,
    pub grade: i64,
    pub learning_goal: GoalView,
    pub learning_category: CategoryView,
    pub teacher: TeacherView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonTypeView {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicView {
    pub id: i64,
    pub name: String,
    /// Student ids this topic is assigned to
    pub students: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonView {
    pub id: i64,
    pub student: StudentView,
    pub lesson_type: LessonTypeView,
    pub topic: TopicView,
    pub date: DateTime<Utc>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeworkResultView {
    pub id: i64,
    pub topic_id: i64,
    pub difficulty: Difficulty,
    pub correct_count: i64,
    pub total_count: i64,
    pub percentage: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeworkView {
    pub id: i64,
    pub lesson_id: i64,
    pub topic_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub results: Vec<HomeworkResultView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntryView {
    pub id: i64,
    pub student: StudentView,
    pub created_at: DateTime<Utc>,
    pub good_results: String,
    pub bad_results: String,
    pub covered_topics: String,
    pub working_on: String,
    pub recommended_lessons: i64,
    pub recommendation_reason: String,
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

fn default_grade() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeacher {
    pub full_name: String,
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    /// Derived from the name when absent
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub name: String,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub full_name: String,
    #[serde(default = "default_grade")]
    pub grade: i64,
    pub learning_goal_id: i64,
    pub learning_category_id: i64,
    pub teacher_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLessonType {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTopic {
    pub name: String,
    #[serde(default)]
    pub students: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLesson {
    pub student_id: i64,
    pub lesson_type_id: i64,
    pub topic_id: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Result embedded in a homework create request
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedResult {
    pub topic_id: i64,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub correct_count: i64,
    #[serde(default)]
    pub total_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHomework {
    pub lesson_id: i64,
    #[serde(default)]
    pub topic_ids: Vec<i64>,
    #[serde(default)]
    pub results: Vec<EmbeddedResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHomeworkResult {
    pub homework_id: i64,
    pub topic_id: i64,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub correct_count: i64,
    #[serde(default)]
    pub total_count: i64,
}

/// Derived percentage, recomputed on every save
pub fn percentage_of(correct_count: i64, total_count: i64) -> f64 {
    if total_count > 0 {
        (correct_count as f64 / total_count as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_round_trip() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::parse(d.as_str()), Some(d));
        }
        assert_eq!(Difficulty::parse("easy"), None);
    }

    #[test]
    fn test_difficulty_serde_uppercase() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        let back: Difficulty = serde_json::from_str("\"HARD\"").unwrap();
        assert_eq!(back, Difficulty::Hard);
    }

    #[test]
    fn test_percentage_zero_total_is_zero() {
        assert_eq!(percentage_of(3, 0), 0.0);
        assert_eq!(percentage_of(5, 5), 100.0);
        assert_eq!(percentage_of(2, 10), 20.0);
    }
}
