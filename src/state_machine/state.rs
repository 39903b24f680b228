//! Conversation state types

use crate::flow::{FlowScript, LeadRecord, StepId};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Who authored a bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Bot,
    Visitor,
}

/// One bubble in the message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub speaker: Speaker,
    pub text: String,
}

/// Where the conversation is in its render/answer cycle.
///
/// The UI flags (`is_rendering`, `accepts_input`, `is_finished`) are all
/// derived from this, so at most one of them holds at any time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// Bubbles of the active step still waiting to be revealed
    Rendering { pending: VecDeque<String> },
    AwaitingInput,
    Finished,
}

/// State of one widget session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    /// Incremented on every start; timer events from older passes are stale
    pub pass: u64,
    pub phase: Phase,
    pub active_step: Option<StepId>,
    pub messages: Vec<ChatMessage>,
    pub record: LeadRecord,
    pub submission_sent: bool,
    next_seq: u64,
}

impl ChatState {
    pub fn is_rendering(&self) -> bool {
        matches!(self.phase, Phase::Rendering { .. })
    }

    pub fn accepts_input(&self) -> bool {
        matches!(self.phase, Phase::AwaitingInput) && self.active_step.is_some()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    /// A blank state for the next pass
    pub fn restarted(&self) -> Self {
        Self {
            pass: self.pass + 1,
            ..Self::default()
        }
    }

    pub(crate) fn push_message(&mut self, speaker: Speaker, text: String) {
        self.next_seq += 1;
        self.messages.push(ChatMessage {
            id: format!("msg-{}-{}", self.pass, self.next_seq),
            speaker,
            text,
        });
    }
}

/// Timing of the artificial typing effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause before the entry step starts rendering after a (re)start
    pub settle: Duration,
    /// Delay before each bot bubble
    pub bubble: Duration,
}

impl Pacing {
    /// Pause after the last bubble before input unlocks
    pub fn finish(&self) -> Duration {
        self.bubble / 2
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(120),
            bubble: Duration::from_millis(700),
        }
    }
}

/// Immutable inputs shared by every transition of a session
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub script: Arc<FlowScript>,
    pub pacing: Pacing,
}

impl ChatContext {
    pub fn new(script: Arc<FlowScript>, pacing: Pacing) -> Self {
        Self { script, pacing }
    }
}
