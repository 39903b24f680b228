//! Pure state transition function
//!
//! Every mutation of a session goes through here. The runtime applies the
//! returned state and executes the effects; nothing in this module touches
//! timers or I/O.

use super::state::Speaker;
use super::{ChatContext, ChatState, Effect, Event, Phase};
use crate::flow::{InputError, ScriptError, Step, StepId};
use std::collections::VecDeque;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition. None of them change state.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Not accepting input")]
    NotAcceptingInput,
    #[error("Answer rejected: {0}")]
    InvalidInput(#[from] InputError),
    #[error("Stale timer event from pass {scheduled} (current pass {current})")]
    StaleTimer { scheduled: u64, current: u64 },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ChatState,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if let Some(scheduled) = event.pass() {
        if scheduled != state.pass {
            return Err(TransitionError::StaleTimer {
                scheduled,
                current: state.pass,
            });
        }
    }

    match (&state.phase, event) {
        // Restart is valid from anywhere
        (_, Event::Start) => {
            let fresh = state.restarted();
            let enter = Event::EnterStep {
                pass: fresh.pass,
                step: context.script.entry(),
            };
            Ok(TransitionResult::new(fresh)
                .with_effect(Effect::CancelPending)
                .with_effect(Effect::schedule(context.pacing.settle, enter)))
        }

        (Phase::Idle, Event::EnterStep { step, .. }) if state.active_step.is_none() => {
            Ok(enter_step(state.clone(), context, step, Vec::new()))
        }

        (Phase::Rendering { pending }, Event::RevealNext { pass }) => {
            let mut pending = pending.clone();
            let mut next = state.clone();
            let effect = match pending.pop_front() {
                Some(text) => {
                    next.push_message(Speaker::Bot, text);
                    if pending.is_empty() {
                        Effect::schedule(context.pacing.finish(), Event::RenderComplete { pass })
                    } else {
                        Effect::schedule(context.pacing.bubble, Event::RevealNext { pass })
                    }
                }
                None => Effect::schedule(context.pacing.finish(), Event::RenderComplete { pass }),
            };
            next.phase = Phase::Rendering { pending };
            Ok(TransitionResult::new(next).with_effect(effect))
        }

        (Phase::Rendering { pending }, Event::RenderComplete { .. }) if pending.is_empty() => {
            let step_id = state
                .active_step
                .ok_or_else(|| TransitionError::InvalidTransition("rendering without a step".into()))?;
            let step = context.script.step(step_id)?;
            let mut next = state.clone();
            next.phase = if step.terminal {
                Phase::Finished
            } else {
                Phase::AwaitingInput
            };
            Ok(TransitionResult::new(next))
        }

        (Phase::AwaitingInput, Event::Answer { value, label }) => {
            accept_answer(state, context, &value, label)
        }

        (_, Event::Answer { .. }) => Err(TransitionError::NotAcceptingInput),

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} while {phase:?}"
        ))),
    }
}

fn accept_answer(
    state: &ChatState,
    context: &ChatContext,
    value: &str,
    label: Option<String>,
) -> Result<TransitionResult, TransitionError> {
    let step_id = state
        .active_step
        .ok_or(TransitionError::NotAcceptingInput)?;
    let step = context.script.step(step_id)?;
    let advance = step.transition.ok_or(TransitionError::NotAcceptingInput)?;
    let raw = step.accept(value)?;

    let mut next = state.clone();
    let shown = label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| raw.clone());
    next.push_message(Speaker::Visitor, shown);
    next.phase = Phase::Idle;

    let outcome = advance(&raw, &state.record);
    next.record
        .insert(outcome.field, outcome.stored_value(&raw));

    let mut effects = Vec::new();
    match context.script.step(outcome.next) {
        Ok(dest) if dest.terminal && !next.submission_sent => {
            next.submission_sent = true;
            effects.push(Effect::SubmitLead {
                record: next.record.clone(),
            });
        }
        Ok(_) => {}
        Err(_) => {
            return Ok(TransitionResult::new(next).with_effect(Effect::abort(
                outcome.next,
                format!("step {step_id} transitions to an unknown step"),
            )));
        }
    }

    Ok(enter_step(next, context, outcome.next, effects))
}

/// Make `step_id` active and start revealing its bubbles
fn enter_step(
    mut state: ChatState,
    context: &ChatContext,
    step_id: StepId,
    mut effects: Vec<Effect>,
) -> TransitionResult {
    let step: &Step = match context.script.step(step_id) {
        Ok(step) => step,
        Err(e) => {
            state.phase = Phase::Idle;
            effects.push(Effect::abort(step_id, e.to_string()));
            return TransitionResult {
                new_state: state,
                effects,
            };
        }
    };

    let pending: VecDeque<String> = step.messages.resolve(&state.record).into();
    let pass = state.pass;
    let first = if pending.is_empty() {
        Effect::schedule(context.pacing.finish(), Event::RenderComplete { pass })
    } else {
        Effect::schedule(context.pacing.bubble, Event::RevealNext { pass })
    };

    state.active_step = Some(step_id);
    state.phase = Phase::Rendering { pending };
    effects.push(first);

    TransitionResult {
        new_state: state,
        effects,
    }
}
