// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::exam::{Section, Stream};

/// Question id -> selected option index (0-based).
pub type AnswerMap = HashMap<i64, usize>;

/// One candidate's instantiation of an exam, as returned by start-attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub stream: Stream,
    pub sections: Vec<Section>,
    pub start_date_time: DateTime<Utc>,
}

/// One entry of the submission payload.
///
/// `selected_option` is `None` for unanswered questions; the field is still
/// emitted (as `null`) so every question is accounted for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: i64,
    pub selected_option: Option<usize>,
    #[serde(default)]
    pub option_map: serde_json::Value,
}

/// DTO for submitting an attempt.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(length(min = 1, max = 1000, message = "Answers must cover 1 to 1000 questions."))]
    pub answers: Vec<AnswerRecord>,
}

/// Result of a scored submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAttemptResponse {
    pub score: i64,
    pub correct_count: i64,
    pub total_questions: i64,
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptRow {
    pub id: i64,
    pub exam_id: i64,

    /// Subject claim of the candidate's token.
    pub candidate: String,

    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i64>,
}
