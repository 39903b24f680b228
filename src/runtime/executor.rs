//! Conversation runtime executor

use super::traits::LeadSink;
use super::{ChatSnapshot, WidgetEvent};

use crate::state_machine::{transition, ChatContext, ChatState, Effect, Event, TransitionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;

/// Drives one widget session: applies events through the pure transition
/// function and executes the resulting effects.
///
/// Scheduled bubble reveals live in `pending`; restarting or tearing the
/// session down aborts all of them.
pub struct ConversationRuntime<K>
where
    K: LeadSink + 'static,
{
    session_id: String,
    context: ChatContext,
    state: ChatState,
    sink: Arc<K>,
    /// Visitor commands; the session ends when every handle is dropped
    command_rx: mpsc::Receiver<Event>,
    timer_tx: mpsc::Sender<Event>,
    timer_rx: mpsc::Receiver<Event>,
    pending: JoinSet<()>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    snapshot_tx: watch::Sender<ChatSnapshot>,
}

impl<K> ConversationRuntime<K>
where
    K: LeadSink + 'static,
{
    pub fn new(
        session_id: String,
        context: ChatContext,
        sink: Arc<K>,
        command_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<WidgetEvent>,
        snapshot_tx: watch::Sender<ChatSnapshot>,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::channel(32);
        Self {
            session_id,
            context,
            state: ChatState::default(),
            sink,
            command_rx,
            timer_tx,
            timer_rx,
            pending: JoinSet::new(),
            broadcast_tx,
            snapshot_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting widget session");

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(event) => self.process_event(event),
                    None => break,
                },
                Some(event) = self.timer_rx.recv() => self.process_event(event),
                Some(_) = self.pending.join_next(), if !self.pending.is_empty() => {}
            }
        }

        self.pending.abort_all();
        tracing::info!(session_id = %self.session_id, "Widget session torn down");
    }

    fn process_event(&mut self, event: Event) {
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                self.log_rejection(&e);
                return;
            }
        };

        let previous = std::mem::replace(&mut self.state, result.new_state);

        for effect in result.effects {
            self.execute_effect(effect);
        }

        self.publish(&previous);
    }

    fn log_rejection(&self, error: &TransitionError) {
        match error {
            TransitionError::NotAcceptingInput | TransitionError::InvalidInput(_) => {
                tracing::debug!(session_id = %self.session_id, error = %error, "Ignoring answer");
            }
            TransitionError::StaleTimer { .. } => {
                tracing::trace!(session_id = %self.session_id, error = %error, "Dropping stale timer event");
            }
            TransitionError::Script(_) | TransitionError::InvalidTransition(_) => {
                tracing::warn!(session_id = %self.session_id, error = %error, "Rejected event");
            }
        }
    }

    /// Execute an effect
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::CancelPending => {
                self.cancel_pending();
            }

            Effect::Schedule { delay, event } => self.schedule(delay, event),

            Effect::SubmitLead { record } => {
                // Fire-and-forget: the rendering pipeline never waits on it
                let sink = self.sink.clone();
                let session_id = self.session_id.clone();
                tokio::spawn(async move {
                    match sink.submit_record(&record).await {
                        Ok(()) => tracing::info!(session_id = %session_id, "Lead submitted"),
                        Err(e) => {
                            tracing::error!(session_id = %session_id, error = %e, "Lead submission failed");
                        }
                    }
                });
            }

            Effect::AbortPass { step, reason } => {
                tracing::error!(
                    session_id = %self.session_id,
                    pass = self.state.pass,
                    step = %step,
                    reason = %reason,
                    "Aborting conversation pass"
                );
            }
        }
    }

    fn schedule(&mut self, delay: Duration, event: Event) {
        let tx = self.timer_tx.clone();
        self.pending.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event).await;
        });
    }

    /// Abort every scheduled reveal and drop events that already fired but
    /// have not been processed yet. Returns how many were dropped.
    fn cancel_pending(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.abort_all();
        let mut drained = 0usize;
        while self.timer_rx.try_recv().is_ok() {
            drained += 1;
        }
        if cancelled + drained > 0 {
            tracing::debug!(
                session_id = %self.session_id,
                cancelled,
                drained,
                "Cancelled pending timers"
            );
        }
        drained
    }

    fn publish(&self, previous: &ChatState) {
        if self.state.pass == previous.pass {
            for message in self.state.messages.iter().skip(previous.messages.len()) {
                let _ = self.broadcast_tx.send(WidgetEvent::Message {
                    message: message.clone(),
                });
            }
        } else {
            let _ = self.broadcast_tx.send(WidgetEvent::Reset {
                pass: self.state.pass,
            });
        }

        let snapshot = ChatSnapshot::capture(&self.state, &self.context.script);
        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self.broadcast_tx.send(WidgetEvent::StateChange { snapshot });
    }
}
