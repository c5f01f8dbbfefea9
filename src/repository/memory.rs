// src/repository/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerRecord, AttemptRow},
        exam::{ExamRow, QuestionRow},
    },
    repository::AttemptRepository,
};

#[derive(Debug, Default)]
struct Tables {
    exams: HashMap<i64, ExamRow>,
    questions: Vec<QuestionRow>,
    attempts: Vec<AttemptRow>,
    answers: HashMap<i64, Vec<AnswerRecord>>,
}

/// In-process repository for tests and local runs without Postgres.
#[derive(Debug, Default)]
pub struct MemoryAttemptRepository {
    tables: RwLock<Tables>,
}

impl MemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_exam(&self, exam: ExamRow, questions: Vec<QuestionRow>) {
        let mut tables = self.tables.write().await;
        tables.questions.retain(|q| q.exam_id != exam.id);
        tables.questions.extend(questions);
        tables
            .questions
            .sort_by(|a, b| (a.exam_id, &a.section, a.position).cmp(&(b.exam_id, &b.section, b.position)));
        tables.exams.insert(exam.id, exam);
    }

    /// Stored answers of a completed attempt.
    pub async fn submitted_answers(&self, attempt_id: i64) -> Option<Vec<AnswerRecord>> {
        self.tables.read().await.answers.get(&attempt_id).cloned()
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptRepository {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<ExamRow>, AppError> {
        Ok(self.tables.read().await.exams.get(&exam_id).cloned())
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<QuestionRow>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn find_attempt(&self, exam_id: i64, candidate: &str) -> Result<Option<AttemptRow>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .attempts
            .iter()
            .find(|a| a.exam_id == exam_id && a.candidate == candidate)
            .cloned())
    }

    async fn create_attempt(
        &self,
        exam_id: i64,
        candidate: &str,
        started_at: DateTime<Utc>,
    ) -> Result<AttemptRow, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .attempts
            .iter()
            .any(|a| a.exam_id == exam_id && a.candidate == candidate)
        {
            return Err(AppError::Conflict("Exam already attempted".to_string()));
        }
        let row = AttemptRow {
            id: tables.attempts.len() as i64 + 1,
            exam_id,
            candidate: candidate.to_string(),
            started_at,
            submitted_at: None,
            score: None,
        };
        tables.attempts.push(row.clone());
        Ok(row)
    }

    async fn complete_attempt(
        &self,
        attempt_id: i64,
        score: i64,
        submitted_at: DateTime<Utc>,
        answers: &[AnswerRecord],
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let attempt = tables
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;
        if attempt.submitted_at.is_some() {
            return Err(AppError::Conflict("Attempt already submitted".to_string()));
        }
        attempt.submitted_at = Some(submitted_at);
        attempt.score = Some(score);
        tables.answers.insert(attempt_id, answers.to_vec());
        Ok(())
    }
}
