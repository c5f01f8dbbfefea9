// src/session/ports.rs

//! Capabilities the session controller is wired with.
//!
//! Everything with a side effect (time, timers, network, the host page) is
//! behind one of these traits so the state machine can be driven by a fake
//! clock in tests and by tokio in production.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::ApiError,
    models::attempt::{AnswerRecord, Attempt},
    session::answer_store::AnswerStore,
};

/// Handle returned by [`Scheduler::schedule_repeating`].
pub type TimerId = u64;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// "Schedule repeating callback" / "cancel" capability.
///
/// Fired timers are delivered back to the controller by whoever drives it
/// (`ExamSessionController::on_timer`); the scheduler itself never calls
/// into the controller.
pub trait Scheduler: Send {
    fn schedule_repeating(&mut self, period: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Shortest period a timer may repeat at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct ManualTimer {
    period: chrono::Duration,
    due: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ManualSchedulerInner {
    next_id: TimerId,
    timers: BTreeMap<TimerId, ManualTimer>,
}

/// Deterministic scheduler bound to a [`ManualClock`].
///
/// Tests call [`ManualScheduler::pop_due`] in a loop: each call moves the
/// clock to the earliest due timer and returns its id, which the test then
/// feeds to the controller.
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    inner: Arc<Mutex<ManualSchedulerInner>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            inner: Arc::new(Mutex::new(ManualSchedulerInner::default())),
        }
    }

    /// Number of timers currently scheduled.
    pub fn active(&self) -> usize {
        self.inner.lock().map(|inner| inner.timers.len()).unwrap_or(0)
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.timers.contains_key(&id))
            .unwrap_or(false)
    }

    /// Fires the earliest timer due at or before `until`, advancing the clock
    /// to its due instant. Returns `None` (and moves the clock to `until`)
    /// when nothing is due.
    pub fn pop_due(&self, until: DateTime<Utc>) -> Option<TimerId> {
        let mut inner = self.inner.lock().ok()?;
        let next = inner
            .timers
            .iter()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, _)| *id);

        match next {
            Some(id) => {
                let timer = inner.timers.get_mut(&id)?;
                let fired_at = timer.due;
                timer.due = fired_at + timer.period;
                drop(inner);
                self.clock.set(fired_at.max(self.clock.now()));
                Some(id)
            }
            None => {
                drop(inner);
                if self.clock.now() < until {
                    self.clock.set(until);
                }
                None
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&mut self, period: Duration) -> TimerId {
        let period = chrono::Duration::from_std(period.max(MIN_PERIOD))
            .unwrap_or_else(|_| chrono::Duration::seconds(1));
        let due = self.clock.now() + period;
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.timers.insert(id, ManualTimer { period, due });
                id
            }
            Err(_) => 0,
        }
    }

    fn cancel(&mut self, id: TimerId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.timers.remove(&id);
        }
    }
}

/// The two remote calls the controller depends on.
#[async_trait]
pub trait ExamApi: Send + Sync {
    async fn start_attempt(&self, exam_id: i64) -> Result<Attempt, ApiError>;

    async fn submit_attempt(&self, exam_id: i64, answers: Vec<AnswerRecord>) -> Result<(), ApiError>;
}

/// How the final submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted,
    /// Every retry failed. The payload was kept as a pending submission.
    Failed { error: String },
}

/// The page hosting the exam.
pub trait ExamEnvironment: Send {
    /// Best effort; an error is logged and otherwise ignored.
    fn request_fullscreen(&mut self) -> Result<(), String>;

    /// Blocking warning after the first integrity violation.
    fn show_violation_warning(&mut self);

    /// Leave the exam page once the attempt is finalized.
    fn navigate_away(&mut self, outcome: &SubmitOutcome);
}

/// Bundle of capabilities handed to the controller.
pub struct SessionPorts {
    pub api: Box<dyn ExamApi>,
    pub store: Box<dyn AnswerStore>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Box<dyn Scheduler>,
    pub environment: Box<dyn ExamEnvironment>,
}
