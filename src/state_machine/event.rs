//! Events that drive a conversation

use crate::flow::StepId;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Visitor events
    /// Begin (or restart) a conversation pass
    Start,
    Answer {
        value: String,
        /// Text shown in the visitor bubble instead of the raw value
        label: Option<String>,
    },

    // Timer events, tagged with the pass that scheduled them
    EnterStep {
        pass: u64,
        step: StepId,
    },
    RevealNext {
        pass: u64,
    },
    RenderComplete {
        pass: u64,
    },
}

impl Event {
    pub fn answer(value: impl Into<String>, label: Option<String>) -> Self {
        Event::Answer {
            value: value.into(),
            label,
        }
    }

    /// Pass a timer event was scheduled in; `None` for visitor events
    pub fn pass(&self) -> Option<u64> {
        match self {
            Event::EnterStep { pass, .. }
            | Event::RevealNext { pass }
            | Event::RenderComplete { pass } => Some(*pass),
            Event::Start | Event::Answer { .. } => None,
        }
    }
}
