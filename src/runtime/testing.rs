//! Mock implementations for testing
//!
//! These mocks let session tests observe submissions without a store on
//! disk. Tests run on a paused tokio clock so reveal delays elapse instantly.

use super::traits::*;
use super::{spawn_session, ChatSnapshot, SessionHandle};
use crate::flow::LeadRecord;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};

// ============================================================================
// Mock Sinks
// ============================================================================

/// Sink that records every submission
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LeadRecord>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LeadRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Wait until at least `n` records have arrived
    pub async fn wait_for(&self, n: usize) {
        loop {
            if self.count() >= n {
                return;
            }
            self.notify.notified().await;
        }
    }
}

#[async_trait]
impl LeadSink for RecordingSink {
    async fn submit_record(&self, record: &LeadRecord) -> Result<(), String> {
        self.records.lock().unwrap().push(record.clone());
        self.notify.notify_one();
        Ok(())
    }
}

/// Sink that rejects everything
#[derive(Default)]
pub struct FailingSink {
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl LeadSink for FailingSink {
    async fn submit_record(&self, _record: &LeadRecord) -> Result<(), String> {
        *self.attempts.lock().unwrap() += 1;
        Err("lead service unavailable".to_string())
    }
}

// ============================================================================
// Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(60);

/// Wait until the session offers input with more than `seen` messages shown
pub async fn await_prompt(rx: &mut watch::Receiver<ChatSnapshot>, seen: usize) -> ChatSnapshot {
    tokio::time::timeout(
        WAIT,
        rx.wait_for(|s| s.accepts_input && s.messages.len() > seen),
    )
    .await
    .expect("session never asked for input")
    .expect("session closed")
    .clone()
}

pub async fn await_finished(rx: &mut watch::Receiver<ChatSnapshot>) -> ChatSnapshot {
    tokio::time::timeout(WAIT, rx.wait_for(|s| s.is_finished))
        .await
        .expect("session never finished")
        .expect("session closed")
        .clone()
}

/// Answer each prompt in turn, waiting for the next one to render
pub async fn answer_all(handle: &SessionHandle, answers: &[&str]) {
    let mut rx = handle.watch();
    let mut seen = 0;
    for value in answers {
        let snapshot = await_prompt(&mut rx, seen).await;
        seen = snapshot.messages.len();
        handle.submit_answer(*value, None).await.unwrap();
    }
}

pub fn spawn_test_session<K: LeadSink + 'static>(sink: Arc<K>) -> SessionHandle {
    use crate::flow::FlowScript;
    use crate::state_machine::{ChatContext, Pacing};

    let context = ChatContext::new(Arc::new(FlowScript::lead_capture().unwrap()), Pacing::default());
    spawn_session("test-session".to_string(), context, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::script::ids;
    use crate::flow::LeadField;
    use crate::runtime::{RuntimeManager, WidgetEvent};
    use crate::state_machine::{ChatContext, Pacing, Speaker};
    use crate::store::LeadStore;

    const ASHA: [&str; 8] = [
        "parent",
        "5-7",
        "Robotics",
        "Build problem-solving skills",
        "Asha",
        "9999999999",
        "a@b.com",
        "yes",
    ];

    #[tokio::test(start_paused = true)]
    async fn asha_submits_exactly_once() {
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_test_session(sink.clone());
        handle.start().await.unwrap();

        answer_all(&handle, &ASHA).await;
        let done = await_finished(&mut handle.watch()).await;
        sink.wait_for(1).await;

        // Nothing else trickles in once the pass is over
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.count(), 1);

        let records = sink.records();
        let record = &records[0];
        assert_eq!(record.text(LeadField::Name), Some("Asha"));
        assert_eq!(record.flag(LeadField::WantsDemo), Some(true));
        assert_eq!(done.active_step, Some(ids::PARENT_DONE));
        assert!(!done.accepts_input);
        assert!(done
            .messages
            .iter()
            .any(|m| m.text == "🚀 Brilliant, Asha! Your demo request is confirmed."));
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_bubbles_arrive_one_at_a_time() {
        let handle = spawn_test_session(Arc::new(RecordingSink::new()));
        let mut events = handle.subscribe();
        handle.start().await.unwrap();

        let start = tokio::time::Instant::now();
        let mut arrivals = Vec::new();
        while arrivals.len() < 3 {
            if let Ok(WidgetEvent::Message { message }) = events.recv().await {
                assert_eq!(message.speaker, Speaker::Bot);
                arrivals.push(start.elapsed());
            }
        }

        assert_eq!(
            arrivals,
            vec![
                Duration::from_millis(820),
                Duration::from_millis(1520),
                Duration::from_millis(2220),
            ]
        );
        let snapshot = await_prompt(&mut handle.watch(), 0).await;
        assert_eq!(snapshot.options.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_mid_render_drops_old_bubbles() {
        let handle = spawn_test_session(Arc::new(RecordingSink::new()));
        let mut rx = handle.watch();
        handle.start().await.unwrap();

        let first = rx
            .wait_for(|s| s.messages.len() == 1)
            .await
            .unwrap()
            .clone();
        assert!(first.is_rendering);
        assert_eq!(first.pass, 1);

        let mut events = handle.subscribe();
        handle.start().await.unwrap();
        let snapshot = await_prompt(&mut rx, 0).await;

        assert_eq!(snapshot.pass, 2);
        assert_eq!(snapshot.messages.len(), 3);
        assert!(snapshot.messages.iter().all(|m| m.id.starts_with("msg-2-")));

        // The events after the reset belong to the new pass only
        let mut saw_reset = false;
        while let Ok(event) = events.try_recv() {
            match event {
                WidgetEvent::Reset { pass } => {
                    assert_eq!(pass, 2);
                    saw_reset = true;
                }
                WidgetEvent::Message { message } => {
                    assert!(saw_reset);
                    assert!(message.id.starts_with("msg-2-"), "{}", message.id);
                }
                _ => {}
            }
        }
        assert!(saw_reset);
    }

    #[tokio::test(start_paused = true)]
    async fn answers_while_rendering_are_ignored() {
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_test_session(sink.clone());
        let mut rx = handle.watch();
        handle.start().await.unwrap();

        rx.wait_for(|s| s.messages.len() == 1).await.unwrap();
        handle.submit_answer("parent", None).await.unwrap();

        let snapshot = await_prompt(&mut rx, 0).await;
        assert_eq!(snapshot.active_step, Some(ids::WELCOME));
        assert!(snapshot.record.is_empty());
        assert!(snapshot
            .messages
            .iter()
            .all(|m| m.speaker == Speaker::Bot));
    }

    #[tokio::test(start_paused = true)]
    async fn label_is_shown_instead_of_value() {
        let handle = spawn_test_session(Arc::new(RecordingSink::new()));
        let mut rx = handle.watch();
        handle.start().await.unwrap();

        let welcome = await_prompt(&mut rx, 0).await;
        handle
            .submit_answer("school", Some("🏫 School / Educator".to_string()))
            .await
            .unwrap();
        let next = await_prompt(&mut rx, welcome.messages.len()).await;

        let reply = &next.messages[welcome.messages.len()];
        assert_eq!(reply.speaker, Speaker::Visitor);
        assert_eq!(reply.text, "🏫 School / Educator");
        assert_eq!(next.record.text(LeadField::UserType), Some("school"));
        assert_eq!(next.active_step, Some(ids::SCHOOL_TYPE));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_finish_submits_again() {
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_test_session(sink.clone());
        handle.start().await.unwrap();
        answer_all(&handle, &ASHA).await;
        await_finished(&mut handle.watch()).await;
        sink.wait_for(1).await;

        handle.start().await.unwrap();
        let mut rx = handle.watch();
        let fresh = await_prompt(&mut rx, 0).await;
        assert_eq!(fresh.pass, 2);
        assert!(fresh.record.is_empty());
        assert_eq!(fresh.messages.len(), 3);

        answer_all(
            &handle,
            &[
                "school",
                "International",
                "500-1000",
                "Curriculum Integration",
                "Ravi",
                "Oakridge High",
                "+91 98765 43210",
                "ravi@oakridge.edu",
            ],
        )
        .await;
        await_finished(&mut rx).await;
        sink.wait_for(2).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text(LeadField::UserType), Some("school"));
        assert!(!records[1].contains(LeadField::ChildAge));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_still_finishes() {
        let sink = Arc::new(FailingSink::default());
        let handle = spawn_test_session(sink.clone());
        handle.start().await.unwrap();
        answer_all(&handle, &ASHA).await;

        let done = await_finished(&mut handle.watch()).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(*sink.attempts.lock().unwrap(), 1);
        assert!(done.messages.iter().all(|m| !m.text.contains("unavailable")));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_tears_the_session_down() {
        let sink = Arc::new(RecordingSink::new());
        let handle = spawn_test_session(sink.clone());
        handle.start().await.unwrap();

        let mut rx = handle.watch();
        rx.wait_for(|s| s.messages.len() == 1).await.unwrap();
        drop(handle);

        // The watch sender lives in the runtime task; it closes on teardown
        await_teardown(rx).await;
        assert_eq!(sink.count(), 0);
    }

    fn test_manager() -> (tempfile::TempDir, LeadStore, Arc<RuntimeManager>) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LeadStore::open(dir.path().join("leads.json")).unwrap();
        let context = ChatContext::new(
            Arc::new(crate::flow::FlowScript::lead_capture().unwrap()),
            Pacing::default(),
        );
        let manager = Arc::new(RuntimeManager::new(context, store.clone()));
        (dir, store, manager)
    }

    /// Resolves once the session task has exited
    async fn await_teardown(mut rx: watch::Receiver<ChatSnapshot>) {
        tokio::time::timeout(WAIT, async { while rx.changed().await.is_ok() {} })
            .await
            .expect("session outlived its handles");
    }

    #[tokio::test(start_paused = true)]
    async fn manager_persists_completed_leads() {
        let (_dir, store, manager) = test_manager();

        let handle = manager.create_session().await.unwrap();
        assert_eq!(manager.session_count().await, 1);
        answer_all(&handle, &ASHA).await;
        await_finished(&mut handle.watch()).await;

        let mut leads = Vec::new();
        for _ in 0..50 {
            leads = store.list_records().unwrap();
            if !leads.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].fields.text(LeadField::Phone), Some("9999999999"));

        assert!(manager.end_session(&handle.id).await);
        assert!(manager.get(&handle.id).await.is_none());
        assert!(!manager.end_session(&handle.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_reaped_by_the_sweep() {
        let (_dir, _store, manager) = test_manager();
        let mut watchers = Vec::new();
        for _ in 0..5 {
            let handle = manager.create_session().await.unwrap();
            watchers.push(handle.watch());
        }
        assert_eq!(manager.session_count().await, 5);

        manager.spawn_reaper(Duration::from_secs(30 * 60));
        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;

        assert_eq!(manager.session_count().await, 0);
        for rx in watchers {
            await_teardown(rx).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn active_and_streamed_sessions_are_kept() {
        let (_dir, _store, manager) = test_manager();
        let max_idle = Duration::from_secs(30 * 60);
        let busy = manager.create_session().await.unwrap();
        let streamed = manager.create_session().await.unwrap();
        let idle = manager.create_session().await.unwrap();
        let _events = streamed.subscribe();
        let idle_rx = idle.watch();
        let idle_id = idle.id.clone();
        drop(idle);

        tokio::time::sleep(Duration::from_secs(20 * 60)).await;
        assert!(manager.get(&busy.id).await.is_some());
        tokio::time::sleep(Duration::from_secs(20 * 60)).await;

        assert_eq!(manager.reap_idle(max_idle).await, 1);
        assert!(manager.get(&idle_id).await.is_none());
        assert!(manager.get(&busy.id).await.is_some());
        assert!(manager.get(&streamed.id).await.is_some());
        await_teardown(idle_rx).await;
    }
}
