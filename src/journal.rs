//! Journal generation
//!
//! Aggregates a student's recent lesson/homework history into a narrative
//! progress report and persists it as a new journal entry. For every
//! (topic, difficulty) pair only the most recent homework result counts;
//! a result is mastered only at exactly 100%.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::error::ApiError;
use crate::models::{Difficulty, JournalEntryView};
use crate::store::{JournalFields, LatestResultRow, TutorStore};

/// Default lesson window when the request does not specify one
pub const DEFAULT_LESSONS_COUNT: usize = 5;

/// Structured per-topic record built while classifying results.
/// Currently flattened into the covered-topics sentence; the legacy journal
/// format stores text in every narrative column.
#[derive(Debug, Clone, Serialize)]
pub struct CoveredTopic {
    pub topic_id: i64,
    pub topic_name: String,
    pub difficulty: Difficulty,
    pub percentage: f64,
}

/// Generate a journal entry from the student's `lessons_count` most recent
/// lessons. Fails with NotFound when the student does not exist and
/// BadRequest when the window contains no lessons. Creates exactly one
/// entry per successful call; existing rows are never mutated.
pub async fn generate(
    store: &TutorStore,
    student_id: i64,
    lessons_count: usize,
) -> Result<JournalEntryView, ApiError> {
    store.get_student(student_id).await.map_err(|e| match e {
        ApiError::NotFound(_) => ApiError::NotFound("Student not found".to_string()),
        other => other,
    })?;

    let lesson_ids = store.recent_lesson_ids(student_id, lessons_count).await?;
    if lesson_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "No lessons found for this student".to_string(),
        ));
    }

    let rows = store.results_for_lessons(&lesson_ids).await?;
    let latest = latest_per_key(rows);
    let fields = compose_fields(&latest);

    info!(
        student_id,
        lessons = lesson_ids.len(),
        results = latest.len(),
        recommended = fields.recommended_lessons,
        "generating journal entry"
    );

    store.create_journal_entry(student_id, &fields).await
}

/// Keep only the first (most recent) result per "{topic_id}-{difficulty}"
/// key. Input rows are ordered by (topic, difficulty, created_at desc), so
/// first-write-wins selects the current result for each pair.
fn latest_per_key(rows: Vec<LatestResultRow>) -> Vec<LatestResultRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(format!("{}-{}", row.topic_id, row.difficulty)))
        .collect()
}

fn topic_label(name: &str, difficulty: Difficulty) -> String {
    format!("{} {} level", name, difficulty.label())
}

/// Classify retained results and synthesize the narrative report fields.
fn compose_fields(latest: &[LatestResultRow]) -> JournalFields {
    let mut mastered = Vec::new();
    let mut unmastered = Vec::new();
    let mut covered = Vec::new();

    for row in latest {
        covered.push(CoveredTopic {
            topic_id: row.topic_id,
            topic_name: row.topic_name.clone(),
            difficulty: row.difficulty,
            percentage: row.percentage,
        });
        let label = topic_label(&row.topic_name, row.difficulty);
        if row.percentage == 100.0 {
            mastered.push(label);
        } else {
            unmastered.push(label);
        }
    }

    let good_results = match (mastered.is_empty(), unmastered.is_empty()) {
        (false, false) => format!(
            "The student has this grade because they mastered the following topics well \
             during the lessons: {}. However, they still understand these topics poorly: {}.",
            mastered.join(", "),
            unmastered.join(", ")
        ),
        (false, true) => format!(
            "The student has this grade because they mastered the following topics well \
             during the lessons: {}.",
            mastered.join(", ")
        ),
        (true, false) => format!(
            "The student has this grade because they mastered the following topics poorly \
             during the lessons: {}.",
            unmastered.join(", ")
        ),
        (true, true) => "The student has no homework results.".to_string(),
    };

    let covered_labels: Vec<String> = covered
        .iter()
        .map(|t| topic_label(&t.topic_name, t.difficulty))
        .collect();
    let covered_topics_text = if covered_labels.is_empty() {
        "No topics were covered during the lessons.".to_string()
    } else {
        format!(
            "The following topics were covered during the lessons: {}.",
            covered_labels.join(", ")
        )
    };

    let working_on = if unmastered.is_empty() {
        "All topics are mastered at 100%.".to_string()
    } else {
        format!("We keep working on: {}.", unmastered.join(", "))
    };

    // At least one lesson, more when topics are still weak
    let recommended_lessons = unmastered.len().max(1) as i64;

    let recommendation_reason = if unmastered.is_empty() {
        "I recommend this amount of lessons to maintain the current level of knowledge."
            .to_string()
    } else {
        format!(
            "I recommend this amount of lessons because the student has not yet mastered: {}.",
            unmastered.join(", ")
        )
    };

    JournalFields {
        good_results,
        // bad_results keeps the covered-topics text; legacy journal format
        // preserved as-is
        bad_results: covered_topics_text.clone(),
        covered_topics: covered_topics_text,
        working_on,
        recommended_lessons,
        recommendation_reason,
    }
}
