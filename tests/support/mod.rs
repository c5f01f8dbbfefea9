// tests/support/mod.rs

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_session::{
    config::SessionConfig,
    error::ApiError,
    models::{
        attempt::{AnswerRecord, Attempt},
        exam::{ExamDefinition, Question, Section, Stream},
    },
    session::{
        ExamSessionController, SessionPorts, SubmitOutcome,
        answer_store::MemoryAnswerStore,
        ports::{ExamApi, ExamEnvironment, ManualClock, ManualScheduler},
    },
};

pub const EXAM_ID: i64 = 42;

pub fn t0() -> DateTime<Utc> {
    "2026-05-10T09:00:00Z".parse().unwrap()
}

pub fn minutes(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}

/// Sections "A", "B", ... with `per_section` four-option questions each.
/// Question ids are `100 * (section + 1) + n`.
pub fn exam(start: DateTime<Utc>, sections: usize, per_section: usize) -> ExamDefinition {
    let sections = (0..sections)
        .map(|s| Section {
            name: ((b'A' + s as u8) as char).to_string(),
            questions: (0..per_section)
                .map(|n| Question {
                    id: 100 * (s as i64 + 1) + n as i64,
                    prompt: format!("Question {}-{}", s, n),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    option_map: serde_json::json!([3, 2, 1, 0]),
                })
                .collect(),
        })
        .collect();
    ExamDefinition {
        id: EXAM_ID,
        stream: Stream::Science,
        start_date_time: start,
        sections,
    }
}

pub fn attempt_for(exam: &ExamDefinition) -> Attempt {
    Attempt {
        id: 7,
        stream: exam.stream,
        sections: exam.sections.clone(),
        start_date_time: exam.start_date_time,
    }
}

#[derive(Debug, Default)]
pub struct ApiLog {
    pub starts: usize,
    pub submissions: Vec<Vec<AnswerRecord>>,
}

/// Scripted [`ExamApi`].
#[derive(Clone)]
pub struct FakeApi {
    pub attempt: Attempt,
    pub start_failures: Arc<Mutex<usize>>,
    pub submit_failures: Arc<Mutex<usize>>,
    pub log: Arc<Mutex<ApiLog>>,
}

impl FakeApi {
    pub fn new(attempt: Attempt) -> Self {
        Self {
            attempt,
            start_failures: Arc::new(Mutex::new(0)),
            submit_failures: Arc::new(Mutex::new(0)),
            log: Arc::new(Mutex::new(ApiLog::default())),
        }
    }

    pub fn fail_starts(&self, n: usize) {
        *self.start_failures.lock().unwrap() = n;
    }

    pub fn fail_submits(&self, n: usize) {
        *self.submit_failures.lock().unwrap() = n;
    }

    pub fn starts(&self) -> usize {
        self.log.lock().unwrap().starts
    }

    pub fn submissions(&self) -> Vec<Vec<AnswerRecord>> {
        self.log.lock().unwrap().submissions.clone()
    }
}

#[async_trait]
impl ExamApi for FakeApi {
    async fn start_attempt(&self, _exam_id: i64) -> Result<Attempt, ApiError> {
        self.log.lock().unwrap().starts += 1;
        let mut failures = self.start_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ApiError::Rejected {
                status: 400,
                message: "Exam is not open yet".to_string(),
            });
        }
        Ok(self.attempt.clone())
    }

    async fn submit_attempt(&self, _exam_id: i64, answers: Vec<AnswerRecord>) -> Result<(), ApiError> {
        self.log.lock().unwrap().submissions.push(answers);
        let mut failures = self.submit_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ApiError::Network("connection reset".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EnvLog {
    pub fullscreen_requests: usize,
    pub warnings: usize,
    pub navigations: Vec<SubmitOutcome>,
    pub deny_fullscreen: bool,
}

/// [`ExamEnvironment`] that records what the controller asked of the page.
#[derive(Clone, Default)]
pub struct RecordingEnvironment {
    pub log: Arc<Mutex<EnvLog>>,
}

impl RecordingEnvironment {
    pub fn fullscreen_requests(&self) -> usize {
        self.log.lock().unwrap().fullscreen_requests
    }

    pub fn warnings(&self) -> usize {
        self.log.lock().unwrap().warnings
    }

    pub fn navigations(&self) -> Vec<SubmitOutcome> {
        self.log.lock().unwrap().navigations.clone()
    }
}

impl ExamEnvironment for RecordingEnvironment {
    fn request_fullscreen(&mut self) -> Result<(), String> {
        let mut log = self.log.lock().unwrap();
        log.fullscreen_requests += 1;
        if log.deny_fullscreen {
            Err("Permissions check failed".to_string())
        } else {
            Ok(())
        }
    }

    fn show_violation_warning(&mut self) {
        self.log.lock().unwrap().warnings += 1;
    }

    fn navigate_away(&mut self, outcome: &SubmitOutcome) {
        self.log.lock().unwrap().navigations.push(outcome.clone());
    }
}

/// A controller wired to fakes, plus handles on every fake.
pub struct Harness {
    pub controller: ExamSessionController,
    pub clock: ManualClock,
    pub scheduler: ManualScheduler,
    pub api: FakeApi,
    pub store: MemoryAnswerStore,
    pub env: RecordingEnvironment,
}

pub fn quick_config() -> SessionConfig {
    SessionConfig {
        submit_retry_base_delay: std::time::Duration::ZERO,
        ..SessionConfig::default()
    }
}

pub fn harness(exam: ExamDefinition, now: DateTime<Utc>) -> Harness {
    harness_with_store(exam, now, MemoryAnswerStore::new())
}

pub fn harness_with_store(exam: ExamDefinition, now: DateTime<Utc>, store: MemoryAnswerStore) -> Harness {
    let clock = ManualClock::new(now);
    let scheduler = ManualScheduler::new(clock.clone());
    let api = FakeApi::new(attempt_for(&exam));
    let env = RecordingEnvironment::default();

    let ports = SessionPorts {
        api: Box::new(api.clone()),
        store: Box::new(store.clone()),
        clock: Arc::new(clock.clone()),
        scheduler: Box::new(scheduler.clone()),
        environment: Box::new(env.clone()),
    };
    let controller = ExamSessionController::new(exam, quick_config(), ports);

    Harness {
        controller,
        clock,
        scheduler,
        api,
        store,
        env,
    }
}

impl Harness {
    /// Delivers every timer due up to `until`, in order.
    pub fn run_until(&mut self, until: DateTime<Utc>) {
        while let Some(id) = self.scheduler.pop_due(until) {
            self.controller.on_timer(id);
        }
    }

    pub fn run_for(&mut self, span: chrono::Duration) {
        let until = {
            use exam_session::session::ports::Clock;
            self.clock.now() + span
        };
        self.run_until(until);
    }
}
