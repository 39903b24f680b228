//! Runtime for hosting widget sessions
//!
//! Each session runs its own `ConversationRuntime` task. Handles talk to it
//! over channels; dropping every handle tears the session down and cancels
//! whatever bubble reveals are still scheduled.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

use executor::ConversationRuntime;
pub use traits::*;

use crate::flow::{ChoiceOption, FlowScript, InputMode, LeadRecord, StepId};
use crate::state_machine::{ChatContext, ChatMessage, ChatState, Event};
use crate::store::LeadStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::time::Instant;

/// How often the reaper looks for idle sessions
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// What a widget needs to render a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub pass: u64,
    pub messages: Vec<ChatMessage>,
    pub active_step: Option<StepId>,
    pub input_mode: Option<InputMode>,
    pub options: Vec<ChoiceOption>,
    pub placeholder: Option<&'static str>,
    pub record: LeadRecord,
    pub is_rendering: bool,
    pub accepts_input: bool,
    pub is_finished: bool,
}

impl ChatSnapshot {
    pub fn capture(state: &ChatState, script: &FlowScript) -> Self {
        let step = state.active_step.and_then(|id| script.step(id).ok());
        Self {
            pass: state.pass,
            messages: state.messages.clone(),
            active_step: state.active_step,
            input_mode: step.map(|s| s.input),
            options: step.map(|s| s.options.to_vec()).unwrap_or_default(),
            placeholder: step.and_then(|s| s.placeholder),
            record: state.record.clone(),
            is_rendering: state.is_rendering(),
            accepts_input: state.accepts_input(),
            is_finished: state.is_finished(),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum WidgetEvent {
    Init { snapshot: ChatSnapshot },
    Message { message: ChatMessage },
    StateChange { snapshot: ChatSnapshot },
    /// A new pass started; clients should clear their log
    Reset { pass: u64 },
}

#[derive(Debug, Error)]
#[error("Session {0} has shut down")]
pub struct SessionClosed(pub String);

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    command_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    snapshot_rx: watch::Receiver<ChatSnapshot>,
}

impl SessionHandle {
    /// Start, or restart, the conversation
    pub async fn start(&self) -> Result<(), SessionClosed> {
        self.send(Event::Start).await
    }

    /// Offer an answer. Ignored unless the session is awaiting input.
    pub async fn submit_answer(
        &self,
        value: impl Into<String>,
        label: Option<String>,
    ) -> Result<(), SessionClosed> {
        self.send(Event::answer(value, label)).await
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    #[cfg(test)]
    pub fn watch(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Open event streams
    fn subscriber_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }

    async fn send(&self, event: Event) -> Result<(), SessionClosed> {
        self.command_tx
            .send(event)
            .await
            .map_err(|_| SessionClosed(self.id.clone()))
    }
}

/// Spawn a session task and return a handle to it
pub fn spawn_session<K: LeadSink + 'static>(
    id: String,
    context: ChatContext,
    sink: Arc<K>,
) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);
    let initial = ChatSnapshot::capture(&ChatState::default(), &context.script);
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);

    let runtime = ConversationRuntime::new(
        id.clone(),
        context,
        sink,
        command_rx,
        broadcast_tx.clone(),
        snapshot_tx,
    );
    tokio::spawn(runtime.run());

    SessionHandle {
        id,
        command_tx,
        broadcast_tx,
        snapshot_rx,
    }
}

struct ManagedSession {
    handle: SessionHandle,
    last_activity: Instant,
}

/// Manager for all widget sessions
pub struct RuntimeManager {
    context: ChatContext,
    sink: Arc<StoreSink>,
    sessions: RwLock<HashMap<String, ManagedSession>>,
}

impl RuntimeManager {
    pub fn new(context: ChatContext, store: LeadStore) -> Self {
        Self {
            context,
            sink: Arc::new(StoreSink::new(store)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session and start its first pass
    pub async fn create_session(&self) -> Result<SessionHandle, SessionClosed> {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = spawn_session(id.clone(), self.context.clone(), self.sink.clone());
        handle.start().await?;
        self.sessions.write().await.insert(
            id,
            ManagedSession {
                handle: handle.clone(),
                last_activity: Instant::now(),
            },
        );
        Ok(handle)
    }

    /// Look a session up, marking it active
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.last_activity = Instant::now();
        Some(session.handle.clone())
    }

    /// Forget a session; its task stops once outstanding handles drop
    pub async fn end_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            tracing::info!(session_id = %id, "Ending widget session");
        }
        removed.is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Forget sessions untouched for longer than `max_idle`. A session with
    /// an open event stream is never idle.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.handle.subscriber_count() > 0
                || now.duration_since(session.last_activity) <= max_idle;
            if !keep {
                tracing::info!(session_id = %id, "Cleaning up idle widget session");
            }
            keep
        });
        before - sessions.len()
    }

    /// Start the background sweep. It holds only a weak reference and exits
    /// once the manager is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, max_idle: Duration) {
        let manager_weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(REAP_INTERVAL).await;
                let Some(manager) = manager_weak.upgrade() else {
                    tracing::debug!("RuntimeManager dropped, reaper exiting");
                    break;
                };
                let reaped = manager.reap_idle(max_idle).await;
                if reaped > 0 {
                    let remaining = manager.session_count().await;
                    tracing::info!(
                        reaped,
                        remaining,
                        "Reaped idle widget sessions"
                    );
                }
            }
        });
    }
}
