// src/handlers/attempts.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::exams::load_exam,
    models::attempt::{AnswerRecord, Attempt, SubmitAttemptRequest, SubmitAttemptResponse},
    repository::AttemptRepository,
    utils::jwt::Claims,
};

/// Translates a client-side option index into the canonical one.
///
/// The option map is either an array (`map[client] = canonical`) or an
/// object keyed by the client index. Anything else means the options were
/// not shuffled.
pub fn canonical_index(option_map: &serde_json::Value, selected: usize) -> Option<usize> {
    let mapped = match option_map {
        serde_json::Value::Array(items) => items.get(selected),
        serde_json::Value::Object(map) => map.get(&selected.to_string()),
        _ => return Some(selected),
    };
    mapped.and_then(|v| v.as_u64()).map(|v| v as usize)
}

/// Rejects records for questions outside the exam and repeated questions.
pub fn check_answer_records(
    answers: &[AnswerRecord],
    answer_keys: &HashMap<i64, i32>,
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for record in answers {
        if !answer_keys.contains_key(&record.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is not part of this exam",
                record.question_id
            )));
        }
        if !seen.insert(record.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is answered more than once",
                record.question_id
            )));
        }
    }
    Ok(())
}

/// Returns (correct_count, total_questions).
///
/// `answer_keys` maps question id to canonical answer index. Each question
/// counts at most once; unanswered questions and records for unknown
/// questions never count.
pub fn score_answers(answers: &[AnswerRecord], answer_keys: &HashMap<i64, i32>) -> (usize, usize) {
    let by_question: HashMap<i64, &AnswerRecord> =
        answers.iter().map(|record| (record.question_id, record)).collect();

    let correct_count = answer_keys
        .iter()
        .filter(|(question_id, key)| {
            let canonical = by_question.get(question_id).and_then(|record| {
                record
                    .selected_option
                    .and_then(|selected| canonical_index(&record.option_map, selected))
            });
            match canonical {
                Some(canonical) => **key >= 0 && **key as usize == canonical,
                None => false,
            }
        })
        .count();
    (correct_count, answer_keys.len())
}

/// Starts the caller's attempt at an exam.
///
/// * 404 if the exam does not exist.
/// * 400 if the early-entry window has not opened yet.
/// * 409 if the candidate already has an attempt.
pub async fn start_attempt(
    State(repo): State<Arc<dyn AttemptRepository>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let loaded = load_exam(repo.as_ref(), exam_id).await?;

    let now = Utc::now();
    let gate = chrono::Duration::from_std(config.early_entry_gate)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if now < loaded.row.start_date_time - gate {
        return Err(AppError::BadRequest("Exam is not open yet".to_string()));
    }

    if repo.find_attempt(exam_id, &claims.sub).await?.is_some() {
        return Err(AppError::Conflict("Exam already attempted".to_string()));
    }

    let row = repo.create_attempt(exam_id, &claims.sub, now).await?;
    tracing::info!("Candidate {} started attempt {} on exam {}", claims.sub, row.id, exam_id);

    let attempt = Attempt {
        id: row.id,
        stream: loaded.definition.stream,
        sections: loaded.definition.sections,
        start_date_time: loaded.definition.start_date_time,
    };
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Finalizes and scores the caller's attempt.
pub async fn submit_attempt(
    State(repo): State<Arc<dyn AttemptRepository>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let attempt = repo
        .find_attempt(exam_id, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("No attempt in progress".to_string()))?;
    if attempt.submitted_at.is_some() {
        return Err(AppError::Conflict("Attempt already submitted".to_string()));
    }

    let questions = repo.exam_questions(exam_id).await?;
    let answer_keys: HashMap<i64, i32> = questions.iter().map(|q| (q.id, q.answer)).collect();
    check_answer_records(&req.answers, &answer_keys)?;
    let (correct_count, total_questions) = score_answers(&req.answers, &answer_keys);
    let score = correct_count as i64;

    repo.complete_attempt(attempt.id, score, Utc::now(), &req.answers)
        .await?;
    tracing::info!(
        "Candidate {} submitted attempt {} on exam {}: {}/{}",
        claims.sub,
        attempt.id,
        exam_id,
        correct_count,
        total_questions
    );

    Ok(Json(SubmitAttemptResponse {
        score,
        correct_count: correct_count as i64,
        total_questions: total_questions as i64,
    }))
}
