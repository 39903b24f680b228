//! Effects produced by state transitions

use super::Event;
use crate::flow::{LeadRecord, StepId};
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Cancel every scheduled timer event of the session
    CancelPending,

    /// Feed `event` back into the session after `delay`
    Schedule { delay: Duration, event: Event },

    /// Hand the finalized record to the lead sink (fire-and-forget)
    SubmitLead { record: LeadRecord },

    /// The script pointed at a step that does not exist; the pass is dead
    AbortPass { step: StepId, reason: String },
}

impl Effect {
    pub fn schedule(delay: Duration, event: Event) -> Self {
        Effect::Schedule { delay, event }
    }

    pub fn abort(step: StepId, reason: impl Into<String>) -> Self {
        Effect::AbortPass {
            step,
            reason: reason.into(),
        }
    }
}
