// src/session/controller.rs

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    config::SessionConfig,
    error::SessionError,
    models::{
        attempt::{AnswerMap, AnswerRecord, Attempt},
        exam::{ExamDefinition, Section},
    },
    session::{
        countdown::{Countdown, CountdownTick},
        integrity::{Assessment, IntegrityMonitor, Signal, Verdict, ViolationState},
        navigator::{LockOutcome, SectionNavigator},
        ports::{SessionPorts, SubmitOutcome, TimerId},
    },
};

/// Coarse lifecycle of one exam page. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    WaitingRoom,
    InProgress(usize),
    /// The last section is locked; waiting for the final submit.
    SectionLocked(usize),
    Submitted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::NotStarted => write!(f, "not started"),
            Phase::WaitingRoom => write!(f, "in the waiting room"),
            Phase::InProgress(i) => write!(f, "in section {}", i + 1),
            Phase::SectionLocked(i) => write!(f, "section {} locked", i + 1),
            Phase::Submitted => write!(f, "submitted"),
        }
    }
}

/// Which deadline the global countdown is aiming at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalTarget {
    /// Opening of the early-entry window (start minus the gate).
    EntryGate,
    ScheduledStart,
}

/// Chooses the global countdown deadline for `now`.
pub fn global_target(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    gate: Duration,
) -> (GlobalTarget, DateTime<Utc>) {
    let gate = chrono::Duration::from_std(gate).unwrap_or_else(|_| chrono::Duration::zero());
    let gate_opens = start - gate;
    if now < gate_opens {
        (GlobalTarget::EntryGate, gate_opens)
    } else {
        (GlobalTarget::ScheduledStart, start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// The candidate pressed "submit exam".
    Manual,
    /// The integrity monitor reached its second strike.
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finalized {
    Submitted(SubmitOutcome),
    /// An earlier finalize already ran; nothing was sent.
    AlreadySubmitted,
}

/// One record per question across every section, in exam order.
pub fn build_answer_records(sections: &[Section], answers: &AnswerMap) -> Vec<AnswerRecord> {
    sections
        .iter()
        .flat_map(|section| section.questions.iter())
        .map(|question| AnswerRecord {
            question_id: question.id,
            selected_option: answers.get(&question.id).copied(),
            option_map: question.option_map.clone(),
        })
        .collect()
}

/// Drives one candidate through a timed, sectioned, proctored exam.
pub struct ExamSessionController {
    exam: ExamDefinition,
    config: SessionConfig,
    ports: SessionPorts,
    phase: Phase,
    attempt: Option<Attempt>,
    answers: AnswerMap,
    navigator: SectionNavigator,
    integrity: IntegrityMonitor,
    global: Countdown,
    global_target: GlobalTarget,
    section: Countdown,
    autosave: Option<TimerId>,
    starting: bool,
    submitted: bool,
    entered: bool,
    last_error: Option<String>,
    outcome: Option<SubmitOutcome>,
}

impl ExamSessionController {
    /// Restores saved answers and starts the pre-entry countdown.
    pub fn new(exam: ExamDefinition, config: SessionConfig, ports: SessionPorts) -> Self {
        let answers = ports.store.load(exam.id);
        let navigator = SectionNavigator::new(exam.sections.len());

        let mut controller = Self {
            exam,
            config: config.normalized(),
            ports,
            phase: Phase::NotStarted,
            attempt: None,
            answers,
            navigator,
            integrity: IntegrityMonitor::new(),
            global: Countdown::new(),
            global_target: GlobalTarget::ScheduledStart,
            section: Countdown::new(),
            autosave: None,
            starting: false,
            submitted: false,
            entered: false,
            last_error: None,
            outcome: None,
        };

        if !controller.answers.is_empty() {
            tracing::info!(
                "Restored {} saved answers for exam {}",
                controller.answers.len(),
                controller.exam.id
            );
        }
        let start = controller.exam.start_date_time;
        controller.start_global_countdown(start);
        controller
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    /// Sections of the running attempt, or of the definition before start.
    pub fn sections(&self) -> &[Section] {
        &self.exam.sections
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn navigator(&self) -> &SectionNavigator {
        &self.navigator
    }

    pub fn violation_state(&self) -> ViolationState {
        self.integrity.state()
    }

    pub fn warning_pending(&self) -> bool {
        self.integrity.warning_pending()
    }

    pub fn global_target(&self) -> GlobalTarget {
        self.global_target
    }

    /// Remaining time of whichever countdown the phase shows.
    pub fn remaining(&self) -> Option<Duration> {
        match self.phase {
            Phase::NotStarted | Phase::WaitingRoom => Some(self.global.remaining()),
            Phase::InProgress(_) => Some(self.section.remaining()),
            Phase::SectionLocked(_) | Phase::Submitted => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn outcome(&self) -> Option<&SubmitOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_ready_to_finish(&self) -> bool {
        matches!(self.phase, Phase::SectionLocked(_))
    }

    /// The candidate accepted the instructions: create the attempt.
    pub async fn acknowledge_instructions(&mut self) -> Result<Phase, SessionError> {
        if self.phase != Phase::NotStarted {
            return Err(self.invalid_phase("acknowledge the instructions"));
        }
        if self.starting {
            return Err(SessionError::StartPending);
        }

        self.starting = true;
        let result = self.ports.api.start_attempt(self.exam.id).await;
        self.starting = false;

        let attempt = match result {
            Ok(attempt) if attempt.sections.is_empty() => {
                return Err(self.start_failed("the exam has no sections".to_string()));
            }
            Ok(attempt) => attempt,
            Err(e) => return Err(self.start_failed(e.to_string())),
        };

        // The attempt's copy of the sections is authoritative from here on.
        self.exam.sections = attempt.sections.clone();
        tracing::info!(
            "Attempt {} started for exam {} ({} questions)",
            attempt.id,
            self.exam.id,
            self.exam.question_count()
        );
        self.last_error = None;
        self.navigator = SectionNavigator::new(attempt.sections.len());
        self.integrity = IntegrityMonitor::new();
        let start = attempt.start_date_time;
        self.attempt = Some(attempt);

        if self.ports.clock.now() < start {
            self.phase = Phase::WaitingRoom;
            tracing::info!("Exam {} entered the waiting room", self.exam.id);
            self.start_global_countdown(start);
        } else {
            self.enter_in_progress();
        }
        Ok(self.phase)
    }

    /// Delivers a fired timer. Ticks from cancelled timers are ignored.
    pub fn on_timer(&mut self, id: TimerId) {
        if self.autosave == Some(id) {
            self.persist_answers();
            return;
        }

        let now = self.ports.clock.now();
        if self.global.owns(id) {
            if self.global.tick(id, now, self.ports.scheduler.as_mut()) == CountdownTick::Expired {
                self.on_global_expired();
            }
        } else if self.section.owns(id) {
            if self.section.tick(id, now, self.ports.scheduler.as_mut()) == CountdownTick::Expired {
                let expired = self.navigator.current();
                tracing::info!("Section {} time is up", expired + 1);
                self.lock_section(expired);
            }
        } else {
            tracing::trace!("Ignoring tick from stale timer {}", id);
        }
    }

    pub fn select_answer(&mut self, question_id: i64, option: usize) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::InProgress(_)) {
            return Err(self.invalid_phase("answer"));
        }
        self.ensure_no_warning()?;

        let index = self
            .exam
            .section_of(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        let option_count = self
            .exam
            .question(question_id)
            .map(|q| q.options.len())
            .unwrap_or(0);

        if !self.navigator.is_editable(index) {
            return Err(SessionError::SectionNotEditable(question_id));
        }
        if option >= option_count {
            return Err(SessionError::OptionOutOfRange { question_id, option });
        }

        self.answers.insert(question_id, option);
        Ok(())
    }

    /// Manual "submit section" for the section the candidate submitted from.
    pub fn submit_section(&mut self, index: usize) -> Result<Phase, SessionError> {
        if !matches!(self.phase, Phase::InProgress(_) | Phase::SectionLocked(_)) {
            return Err(self.invalid_phase("submit a section"));
        }
        self.ensure_no_warning()?;
        self.lock_section(index);
        Ok(self.phase)
    }

    /// Moves the review cursor forward. `Ok(false)` when not allowed.
    pub fn next_section(&mut self) -> Result<bool, SessionError> {
        self.ensure_no_warning()?;
        Ok(self.navigator.advance())
    }

    pub fn previous_section(&mut self) -> Result<bool, SessionError> {
        self.ensure_no_warning()?;
        Ok(self.navigator.retreat())
    }

    /// Feeds one environment signal to the integrity monitor.
    pub async fn handle_signal(&mut self, signal: Signal) -> Assessment {
        let assessment = self.integrity.observe(&signal);
        match assessment.verdict {
            Verdict::Ignored => {}
            Verdict::Warning => {
                tracing::warn!("Integrity violation on exam {}: {:?}", self.exam.id, signal);
                self.ports.environment.show_violation_warning();
            }
            Verdict::Terminate => {
                tracing::warn!(
                    "Second integrity violation on exam {} ({:?}), submitting",
                    self.exam.id,
                    signal
                );
                if let Err(e) = self.finalize(FinalizeReason::Forced).await {
                    tracing::error!("Forced submission refused: {}", e);
                }
            }
        }
        assessment
    }

    /// Clears the blocking warning by going back to fullscreen.
    pub fn acknowledge_warning(&mut self) {
        if !self.integrity.warning_pending() {
            return;
        }
        self.request_fullscreen();
        self.integrity.acknowledge_warning();
    }

    /// Final submit from the "ready to finish" state.
    pub async fn submit_exam(&mut self) -> Result<Finalized, SessionError> {
        self.ensure_no_warning()?;
        self.finalize(FinalizeReason::Manual).await
    }

    /// The single submission path for both the manual and the forced case.
    pub async fn finalize(&mut self, reason: FinalizeReason) -> Result<Finalized, SessionError> {
        if self.submitted {
            tracing::debug!("Ignoring {:?} finalize, attempt already submitted", reason);
            return Ok(Finalized::AlreadySubmitted);
        }
        let allowed = match reason {
            FinalizeReason::Manual => matches!(self.phase, Phase::SectionLocked(_)),
            FinalizeReason::Forced => {
                matches!(self.phase, Phase::InProgress(_) | Phase::SectionLocked(_))
            }
        };
        if !allowed {
            return Err(self.invalid_phase("submit the exam"));
        }

        self.submitted = true;
        self.teardown();
        self.persist_answers();
        self.phase = Phase::Submitted;

        let records = build_answer_records(self.sections(), &self.answers);
        tracing::info!(
            "Submitting exam {} ({:?}): {} answered of {}",
            self.exam.id,
            reason,
            self.answers.len(),
            records.len()
        );

        let outcome = self.deliver(records).await;
        self.ports.environment.navigate_away(&outcome);
        self.outcome = Some(outcome.clone());
        Ok(Finalized::Submitted(outcome))
    }

    /// Page teardown: release every timer and listener without submitting.
    pub fn shutdown(&mut self) {
        self.teardown();
        if !self.submitted && matches!(self.phase, Phase::InProgress(_) | Phase::SectionLocked(_)) {
            self.persist_answers();
        }
    }

    async fn deliver(&mut self, records: Vec<AnswerRecord>) -> SubmitOutcome {
        let attempts = self.config.submit_retry_attempts.max(1);
        let mut delay = self.config.submit_retry_base_delay;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.ports.api.submit_attempt(self.exam.id, records.clone()).await {
                Ok(()) => {
                    tracing::info!("Exam {} submitted", self.exam.id);
                    return SubmitOutcome::Accepted;
                }
                Err(e) => {
                    tracing::warn!(
                        "Submit attempt {}/{} for exam {} failed: {}",
                        attempt,
                        attempts,
                        self.exam.id,
                        e
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }

        tracing::error!(
            event = "submission_failed",
            exam_id = self.exam.id,
            records = records.len(),
            "Exam submission failed after {} attempts: {}",
            attempts,
            last_error
        );
        if let Err(e) = self.ports.store.persist_pending(self.exam.id, &records) {
            tracing::error!("Could not keep pending submission for exam {}: {}", self.exam.id, e);
        }
        SubmitOutcome::Failed { error: last_error }
    }

    fn start_global_countdown(&mut self, start: DateTime<Utc>) {
        let now = self.ports.clock.now();
        let (target, deadline) = global_target(now, start, self.config.early_entry_gate);
        self.global_target = target;
        self.global.start(
            deadline,
            now,
            self.config.tick_interval,
            self.ports.scheduler.as_mut(),
        );
    }

    fn on_global_expired(&mut self) {
        let start = self
            .attempt
            .as_ref()
            .map(|a| a.start_date_time)
            .unwrap_or(self.exam.start_date_time);

        match (self.global_target, self.phase) {
            (GlobalTarget::EntryGate, Phase::NotStarted | Phase::WaitingRoom) => {
                tracing::info!("Early entry open for exam {}", self.exam.id);
                self.start_global_countdown(start);
            }
            (GlobalTarget::ScheduledStart, Phase::WaitingRoom) => self.enter_in_progress(),
            _ => {}
        }
    }

    fn enter_in_progress(&mut self) {
        self.global.stop(self.ports.scheduler.as_mut());
        self.phase = Phase::InProgress(self.navigator.current());
        tracing::info!("Exam {} in progress", self.exam.id);

        if !self.entered {
            self.entered = true;
            self.request_fullscreen();
            self.integrity.start();
            self.autosave = Some(
                self.ports
                    .scheduler
                    .schedule_repeating(self.config.autosave_interval),
            );
        }
        self.start_section_countdown();
    }

    fn start_section_countdown(&mut self) {
        let now = self.ports.clock.now();
        let length = chrono::Duration::from_std(self.config.section_duration)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.section.start(
            now + length,
            now,
            self.config.tick_interval,
            self.ports.scheduler.as_mut(),
        );
    }

    fn lock_section(&mut self, index: usize) {
        match self.navigator.lock_section(index) {
            LockOutcome::AlreadyLocked => {}
            LockOutcome::Advanced { from, to } => {
                tracing::info!("Section {} locked, moving to section {}", from + 1, to + 1);
                self.phase = Phase::InProgress(to);
                self.start_section_countdown();
            }
            LockOutcome::Finished { last } => {
                tracing::info!("Final section {} locked, ready to finish", last + 1);
                self.section.stop(self.ports.scheduler.as_mut());
                self.phase = Phase::SectionLocked(last);
            }
        }
    }

    fn request_fullscreen(&mut self) {
        if let Err(e) = self.ports.environment.request_fullscreen() {
            tracing::warn!("Fullscreen request failed: {}", e);
        }
    }

    fn persist_answers(&mut self) {
        if let Err(e) = self.ports.store.persist(self.exam.id, &self.answers) {
            tracing::warn!("Failed to save answers for exam {}: {}", self.exam.id, e);
        }
    }

    fn teardown(&mut self) {
        let scheduler = self.ports.scheduler.as_mut();
        self.global.stop(scheduler);
        self.section.stop(scheduler);
        if let Some(id) = self.autosave.take() {
            scheduler.cancel(id);
        }
        self.integrity.stop();
    }

    fn start_failed(&mut self, reason: String) -> SessionError {
        tracing::warn!("Could not start exam {}: {}", self.exam.id, reason);
        self.last_error = Some(reason.clone());
        SessionError::StartFailed(reason)
    }

    fn ensure_no_warning(&self) -> Result<(), SessionError> {
        if self.integrity.warning_pending() {
            return Err(SessionError::WarningPending);
        }
        Ok(())
    }

    fn invalid_phase(&self, action: &'static str) -> SessionError {
        SessionError::InvalidPhase {
            action,
            phase: self.phase.to_string(),
        }
    }
}

impl Drop for ExamSessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
