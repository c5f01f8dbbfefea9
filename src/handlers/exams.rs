// src/handlers/exams.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::exam::{ExamDefinition, ExamRow, QuestionRow, Stream, assemble_sections},
    repository::AttemptRepository,
};

/// Exam row, its question rows (with answer keys) and the public definition.
pub(crate) struct LoadedExam {
    pub row: ExamRow,
    pub questions: Vec<QuestionRow>,
    pub definition: ExamDefinition,
}

pub(crate) async fn load_exam(
    repo: &dyn AttemptRepository,
    exam_id: i64,
) -> Result<LoadedExam, AppError> {
    let row = repo
        .find_exam(exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;
    let questions = repo.exam_questions(exam_id).await?;

    let stream = row
        .stream
        .parse::<Stream>()
        .map_err(AppError::InternalServerError)?;

    let definition = ExamDefinition {
        id: row.id,
        stream,
        start_date_time: row.start_date_time,
        sections: assemble_sections(&questions),
    };

    Ok(LoadedExam {
        row,
        questions,
        definition,
    })
}

/// Public exam definition, answer keys stripped.
pub async fn get_exam(
    State(repo): State<Arc<dyn AttemptRepository>>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let loaded = load_exam(repo.as_ref(), exam_id).await?;
    Ok(Json(loaded.definition))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
