// src/session/driver.rs

//! Runs a controller on one tokio task.
//!
//! Timer tasks, UI actions and page signals all reach the controller through
//! a single `mpsc` channel, so the controller itself is only ever touched by
//! the task that owns it.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::session::{
    controller::{ExamSessionController, Phase},
    integrity::{Signal, ViolationState},
    ports::{MIN_PERIOD, Scheduler, TimerId},
};

/// Everything the page can ask of a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    AcknowledgeInstructions,
    SelectAnswer { question_id: i64, option: usize },
    SubmitSection { section: usize },
    NextSection,
    PreviousSection,
    SubmitExam,
    Signal(Signal),
    AcknowledgeWarning,
    TimerFired(TimerId),
    Shutdown,
}

/// State published after every command, for the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: String,
    pub section: usize,
    pub viewing: usize,
    pub remaining_secs: Option<u64>,
    pub answered: usize,
    pub violation: ViolationState,
    pub warning_pending: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn of(controller: &ExamSessionController) -> Self {
        Self {
            phase: controller.phase().to_string(),
            section: controller.navigator().current(),
            viewing: controller.navigator().viewing(),
            remaining_secs: controller.remaining().map(|d| d.as_secs()),
            answered: controller.answers().len(),
            violation: controller.violation_state(),
            warning_pending: controller.warning_pending(),
            error: controller.last_error().map(str::to_string),
        }
    }
}

/// Scheduler backed by `tokio::time::interval` tasks.
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<SessionCommand>,
    next_id: TimerId,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self {
            events,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&mut self, period: Duration) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        let events = self.events.clone();
        let period = period.max(MIN_PERIOD);

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(SessionCommand::TimerFired(id)).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(id, task);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Sending side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Returns false once the session loop has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Queues an environment signal and returns whether the page must
    /// suppress the browser's default action for it.
    ///
    /// The decision is made here, synchronously, so the page can call
    /// `preventDefault` inside its event handler. It holds even after the
    /// session loop has ended.
    pub fn report_signal(&self, signal: Signal) -> bool {
        let block = signal.blocks_default();
        if !self.send(SessionCommand::Signal(signal)) {
            tracing::debug!("Signal reported after the session ended");
        }
        block
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

/// Channel pair to build a session with.
///
/// The sender is needed by [`TokioScheduler`] before the controller exists;
/// the receiver goes to [`spawn_session`].
pub fn session_channel() -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::UnboundedReceiver<SessionCommand>,
) {
    mpsc::unbounded_channel()
}

/// Spawns the command loop. The task yields the controller back when the
/// attempt is submitted or the session is shut down.
pub fn spawn_session(
    controller: ExamSessionController,
    commands: mpsc::UnboundedSender<SessionCommand>,
    inbox: mpsc::UnboundedReceiver<SessionCommand>,
) -> (SessionHandle, JoinHandle<ExamSessionController>) {
    let (snapshots_tx, snapshots_rx) = watch::channel(SessionSnapshot::of(&controller));
    let task = tokio::spawn(run_session(controller, inbox, snapshots_tx));
    (
        SessionHandle {
            commands,
            snapshots: snapshots_rx,
        },
        task,
    )
}

async fn run_session(
    mut controller: ExamSessionController,
    mut inbox: mpsc::UnboundedReceiver<SessionCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
) -> ExamSessionController {
    while let Some(command) = inbox.recv().await {
        if command == SessionCommand::Shutdown {
            controller.shutdown();
            break;
        }
        apply(&mut controller, command).await;
        let _ = snapshots.send(SessionSnapshot::of(&controller));

        if controller.phase() == Phase::Submitted {
            break;
        }
    }
    controller.shutdown();
    let _ = snapshots.send(SessionSnapshot::of(&controller));
    controller
}

async fn apply(controller: &mut ExamSessionController, command: SessionCommand) {
    let result = match command {
        SessionCommand::AcknowledgeInstructions => {
            controller.acknowledge_instructions().await.map(|_| ())
        }
        SessionCommand::SelectAnswer {
            question_id,
            option,
        } => controller.select_answer(question_id, option),
        SessionCommand::SubmitSection { section } => controller.submit_section(section).map(|_| ()),
        SessionCommand::NextSection => controller.next_section().map(|_| ()),
        SessionCommand::PreviousSection => controller.previous_section().map(|_| ()),
        SessionCommand::SubmitExam => controller.submit_exam().await.map(|_| ()),
        SessionCommand::Signal(signal) => {
            controller.handle_signal(signal).await;
            Ok(())
        }
        SessionCommand::AcknowledgeWarning => {
            controller.acknowledge_warning();
            Ok(())
        }
        SessionCommand::TimerFired(id) => {
            controller.on_timer(id);
            Ok(())
        }
        SessionCommand::Shutdown => Ok(()),
    };

    if let Err(e) = result {
        tracing::debug!("Session command rejected: {}", e);
    }
}
