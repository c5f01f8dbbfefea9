// src/repository/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerRecord, AttemptRow},
        exam::{ExamRow, QuestionRow},
    },
    repository::AttemptRepository,
};

const ATTEMPT_COLUMNS: &str = "id, exam_id, candidate, started_at, submitted_at, score";

#[derive(Debug, Clone)]
pub struct PgAttemptRepository {
    pool: PgPool,
}

impl PgAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    // Postgres error code for unique violation is 23505
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[async_trait]
impl AttemptRepository for PgAttemptRepository {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<ExamRow>, AppError> {
        sqlx::query_as::<_, ExamRow>("SELECT id, stream, start_date_time FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch exam {}: {:?}", exam_id, e);
                AppError::from(e)
            })
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<QuestionRow>, AppError> {
        sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, exam_id, section, position, prompt, options, option_map, answer
            FROM questions
            WHERE exam_id = $1
            ORDER BY section, position
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions for exam {}: {:?}", exam_id, e);
            AppError::from(e)
        })
    }

    async fn find_attempt(&self, exam_id: i64, candidate: &str) -> Result<Option<AttemptRow>, AppError> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE exam_id = $1 AND candidate = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(exam_id)
        .bind(candidate)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn create_attempt(
        &self,
        exam_id: i64,
        candidate: &str,
        started_at: DateTime<Utc>,
    ) -> Result<AttemptRow, AppError> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "INSERT INTO attempts (exam_id, candidate, started_at) VALUES ($1, $2, $3) RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(exam_id)
        .bind(candidate)
        .bind(started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Exam already attempted".to_string())
            } else {
                tracing::error!("Failed to create attempt: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn complete_attempt(
        &self,
        attempt_id: i64,
        score: i64,
        submitted_at: DateTime<Utc>,
        answers: &[AnswerRecord],
    ) -> Result<(), AppError> {
        // Only the first submission lands; the WHERE clause makes the update a no-op afterwards.
        let result = sqlx::query(
            r#"
            UPDATE attempts
            SET submitted_at = $2, score = $3, answers = $4
            WHERE id = $1 AND submitted_at IS NULL
            "#,
        )
        .bind(attempt_id)
        .bind(submitted_at)
        .bind(score)
        .bind(Json(answers))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to complete attempt {}: {:?}", attempt_id, e);
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Attempt already submitted".to_string()));
        }
        Ok(())
    }
}
