// src/session/answer_store.rs

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::{
    error::StoreError,
    models::attempt::{AnswerMap, AnswerRecord},
};

/// Durable key for the in-progress answers of one exam.
pub fn answers_key(exam_id: i64) -> String {
    format!("exam_answers_{}", exam_id)
}

/// Durable key for a submission that could not be delivered.
pub fn pending_key(exam_id: i64) -> String {
    format!("exam_pending_{}", exam_id)
}

fn decode_answers(exam_id: i64, raw: Option<String>) -> AnswerMap {
    let Some(raw) = raw else {
        return AnswerMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!("Discarding unreadable saved answers for exam {}: {}", exam_id, e);
        AnswerMap::new()
    })
}

/// Client-side persistence of in-progress answers.
///
/// `load` fails soft: missing or malformed data yields an empty map.
pub trait AnswerStore: Send {
    fn persist(&self, exam_id: i64, answers: &AnswerMap) -> Result<(), StoreError>;

    fn load(&self, exam_id: i64) -> AnswerMap;

    /// Keeps a payload whose delivery failed so it can be reconciled later.
    fn persist_pending(&self, exam_id: i64, records: &[AnswerRecord]) -> Result<(), StoreError>;

    fn load_pending(&self, exam_id: i64) -> Option<Vec<AnswerRecord>>;
}

/// One JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileAnswerStore {
    dir: PathBuf,
}

impl FileAnswerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    /// Write-then-rename so a crash never leaves a half-written file.
    fn write(&self, key: &str, contents: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }
}

impl AnswerStore for FileAnswerStore {
    fn persist(&self, exam_id: i64, answers: &AnswerMap) -> Result<(), StoreError> {
        let json = serde_json::to_string(answers)?;
        self.write(&answers_key(exam_id), &json)
    }

    fn load(&self, exam_id: i64) -> AnswerMap {
        decode_answers(exam_id, self.read(&answers_key(exam_id)))
    }

    fn persist_pending(&self, exam_id: i64, records: &[AnswerRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string(records)?;
        self.write(&pending_key(exam_id), &json)
    }

    fn load_pending(&self, exam_id: i64) -> Option<Vec<AnswerRecord>> {
        self.read(&pending_key(exam_id))
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryAnswerStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryAnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw value under `key`, bypassing encoding.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: String, value: String) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
        entries.insert(key, value);
        Ok(())
    }
}

impl AnswerStore for MemoryAnswerStore {
    fn persist(&self, exam_id: i64, answers: &AnswerMap) -> Result<(), StoreError> {
        let json = serde_json::to_string(answers)?;
        self.put(answers_key(exam_id), json)
    }

    fn load(&self, exam_id: i64) -> AnswerMap {
        decode_answers(exam_id, self.raw(&answers_key(exam_id)))
    }

    fn persist_pending(&self, exam_id: i64, records: &[AnswerRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string(records)?;
        self.put(pending_key(exam_id), json)
    }

    fn load_pending(&self, exam_id: i64) -> Option<Vec<AnswerRecord>> {
        self.raw(&pending_key(exam_id))
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }
}
