// tests/driver_tests.rs

mod support;

use std::sync::Arc;
use std::time::Duration;

use exam_session::session::{
    ExamSessionController, Phase, SessionPorts,
    answer_store::{AnswerStore, MemoryAnswerStore},
    driver::{SessionCommand, SessionHandle, TokioScheduler, session_channel, spawn_session},
    integrity::{ClipboardAction, KeyCombo, Signal, ViolationState},
    ports::SystemClock,
};
use support::*;

fn spawn(
    api: FakeApi,
    store: MemoryAnswerStore,
    env: RecordingEnvironment,
) -> (
    SessionHandle,
    tokio::task::JoinHandle<ExamSessionController>,
) {
    let exam = exam(chrono::Utc::now() - chrono::Duration::minutes(1), 2, 2);
    let (tx, rx) = session_channel();
    let ports = SessionPorts {
        api: Box::new(api),
        store: Box::new(store),
        clock: Arc::new(SystemClock),
        scheduler: Box::new(TokioScheduler::new(tx.clone())),
        environment: Box::new(env),
    };
    let controller = ExamSessionController::new(exam, quick_config(), ports);
    spawn_session(controller, tx, rx)
}

#[tokio::test(start_paused = true)]
async fn forced_submission_through_the_driver() {
    let template = exam(chrono::Utc::now(), 2, 2);
    let api = FakeApi::new(attempt_for(&template));
    let env = RecordingEnvironment::default();
    let (handle, task) = spawn(api.clone(), MemoryAnswerStore::new(), env.clone());

    assert!(handle.send(SessionCommand::AcknowledgeInstructions));
    assert!(handle.send(SessionCommand::SelectAnswer { question_id: 100, option: 1 }));
    assert!(handle.send(SessionCommand::Signal(Signal::VisibilityHidden)));
    assert!(handle.send(SessionCommand::AcknowledgeWarning));
    assert!(handle.send(SessionCommand::Signal(Signal::Key(KeyCombo::plain("F12")))));

    let controller = task.await.unwrap();
    assert_eq!(controller.phase(), Phase::Submitted);
    assert_eq!(api.submissions().len(), 1);
    assert_eq!(api.submissions()[0][0].selected_option, Some(1));
    assert_eq!(env.navigations().len(), 1);
    assert_eq!(handle.snapshot().phase, "submitted");
}

#[tokio::test(start_paused = true)]
async fn autosave_fires_on_tokio_timers() {
    let template = exam(chrono::Utc::now(), 2, 2);
    let api = FakeApi::new(attempt_for(&template));
    let store = MemoryAnswerStore::new();
    let (handle, task) = spawn(api, store.clone(), RecordingEnvironment::default());

    handle.send(SessionCommand::AcknowledgeInstructions);
    handle.send(SessionCommand::SelectAnswer { question_id: 101, option: 3 });

    let mut snapshots = handle.subscribe();
    while snapshots.borrow().answered == 0 {
        snapshots.changed().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(store.load(EXAM_ID).get(&101), Some(&3));

    handle.send(SessionCommand::Shutdown);
    let controller = task.await.unwrap();
    assert_eq!(controller.phase(), Phase::InProgress(0));
    assert!(!handle.send(SessionCommand::NextSection));
}

#[tokio::test(start_paused = true)]
async fn snapshot_tracks_phase_and_section() {
    let template = exam(chrono::Utc::now(), 2, 2);
    let api = FakeApi::new(attempt_for(&template));
    let (handle, task) = spawn(api, MemoryAnswerStore::new(), RecordingEnvironment::default());

    let mut snapshots = handle.subscribe();
    handle.send(SessionCommand::AcknowledgeInstructions);
    handle.send(SessionCommand::SubmitSection { section: 0 });
    while snapshots.borrow().section == 0 {
        snapshots.changed().await.unwrap();
    }
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, "in section 2");
    let remaining = snapshot.remaining_secs.expect("section countdown running");
    assert!(remaining >= 25 * 60 - 1);

    handle.send(SessionCommand::Shutdown);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn page_learns_which_signals_to_block() {
    let template = exam(chrono::Utc::now(), 2, 2);
    let api = FakeApi::new(attempt_for(&template));
    let (handle, task) = spawn(api.clone(), MemoryAnswerStore::new(), RecordingEnvironment::default());

    let mut snapshots = handle.subscribe();
    handle.send(SessionCommand::AcknowledgeInstructions);

    assert!(handle.report_signal(Signal::Clipboard { action: ClipboardAction::Copy }));
    assert!(!handle.report_signal(Signal::Key(KeyCombo::plain("a"))));
    assert!(!handle.report_signal(Signal::VisibilityVisible));
    while snapshots.borrow().violation != ViolationState::Warned {
        snapshots.changed().await.unwrap();
    }
    assert!(handle.snapshot().warning_pending);

    handle.send(SessionCommand::AcknowledgeWarning);
    assert!(handle.report_signal(Signal::Key(KeyCombo::plain("F12"))));

    let controller = task.await.unwrap();
    assert_eq!(controller.phase(), Phase::Submitted);
    assert_eq!(api.submissions().len(), 1);

    // Still blocked once the loop is gone.
    assert!(handle.report_signal(Signal::Clipboard { action: ClipboardAction::Paste }));
}
