// src/models/exam.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Subject track an exam is offered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stream {
    Science,
    Commerce,
    Arts,
}

impl FromStr for Stream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCIENCE" => Ok(Stream::Science),
            "COMMERCE" => Ok(Stream::Commerce),
            "ARTS" => Ok(Stream::Arts),
            other => Err(format!("Unknown stream '{}'", other)),
        }
    }
}

/// A question as the exam client sees it.
///
/// `option_map` is opaque to the client. It travels back untouched with the
/// answer so the server can translate the chosen index into its canonical one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub option_map: serde_json::Value,
}

/// An ordered block of questions sharing one countdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Single-letter code ("A", "B", ...).
    pub name: String,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn contains(&self, question_id: i64) -> bool {
        self.questions.iter().any(|q| q.id == question_id)
    }
}

/// Read-only exam description handed to the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub id: i64,
    pub stream: Stream,
    pub start_date_time: DateTime<Utc>,
    pub sections: Vec<Section>,
}

impl ExamDefinition {
    /// Index of the section holding `question_id`, if any.
    pub fn section_of(&self, question_id: i64) -> Option<usize> {
        self.sections.iter().position(|s| s.contains(question_id))
    }

    pub fn question(&self, question_id: i64) -> Option<&Question> {
        self.sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .find(|q| q.id == question_id)
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct ExamRow {
    pub id: i64,

    /// Upper-case stream code, see [`Stream`].
    pub stream: String,
    pub start_date_time: DateTime<Utc>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub exam_id: i64,

    /// Section code the question belongs to.
    pub section: String,

    /// Ordering inside the section.
    pub position: i32,

    pub prompt: String,

    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    pub option_map: Json<serde_json::Value>,

    /// Canonical index of the correct option. Never sent to clients.
    pub answer: i32,
}

impl QuestionRow {
    /// Strips the answer key.
    pub fn to_public(&self) -> Question {
        Question {
            id: self.id,
            prompt: self.prompt.clone(),
            options: self.options.0.clone(),
            option_map: self.option_map.0.clone(),
        }
    }
}

/// Groups question rows (already ordered by section, position) into sections.
pub fn assemble_sections(rows: &[QuestionRow]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for row in rows {
        match sections.last_mut() {
            Some(last) if last.name == row.section => last.questions.push(row.to_public()),
            _ => sections.push(Section {
                name: row.section.clone(),
                questions: vec![row.to_public()],
            }),
        }
    }
    sections
}
