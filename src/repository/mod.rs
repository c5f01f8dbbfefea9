// src/repository/mod.rs

//! Storage behind the attempt service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerRecord, AttemptRow},
        exam::{ExamRow, QuestionRow},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryAttemptRepository;
pub use postgres::PgAttemptRepository;

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<ExamRow>, AppError>;

    /// Questions ordered by section, then position.
    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<QuestionRow>, AppError>;

    async fn find_attempt(&self, exam_id: i64, candidate: &str) -> Result<Option<AttemptRow>, AppError>;

    /// Fails with `AppError::Conflict` if the candidate already has an attempt.
    async fn create_attempt(
        &self,
        exam_id: i64,
        candidate: &str,
        started_at: DateTime<Utc>,
    ) -> Result<AttemptRow, AppError>;

    /// Fails with `AppError::Conflict` if the attempt was already submitted.
    async fn complete_attempt(
        &self,
        attempt_id: i64,
        score: i64,
        submitted_at: DateTime<Utc>,
        answers: &[AnswerRecord],
    ) -> Result<(), AppError>;
}
