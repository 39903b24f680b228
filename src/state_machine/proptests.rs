//! Property-based tests for the conversation state machine
//!
//! These tests verify key invariants hold across all possible answer paths
//! and arbitrary interleavings of visitor and timer events.

use super::transition::transition;
use super::*;
use crate::flow::script::ids;
use crate::flow::{FlowScript, InputMode, LeadField, StepId};
use proptest::prelude::*;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ChatContext {
    ChatContext::new(
        Arc::new(FlowScript::lead_capture().unwrap()),
        Pacing::default(),
    )
}

/// Run `event` and every timer event it schedules, counting submissions
fn settle(state: ChatState, ctx: &ChatContext, event: Event, submitted: &mut usize) -> ChatState {
    let mut state = state;
    let mut queue = VecDeque::from([event]);
    while let Some(ev) = queue.pop_front() {
        let Ok(result) = transition(&state, ctx, ev) else {
            continue;
        };
        state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::Schedule { event, .. } => queue.push_back(event),
                Effect::SubmitLead { .. } => *submitted += 1,
                _ => {}
            }
        }
    }
    state
}

/// Answer whatever the active step asks, picking choices by index
fn walk(ctx: &ChatContext, branch: &str, picks: &[usize], name: &str) -> (ChatState, usize) {
    let mut submitted = 0;
    let mut state = settle(ChatState::default(), ctx, Event::Start, &mut submitted);
    state = settle(state, ctx, Event::answer(branch, None), &mut submitted);

    let mut picks = picks.iter().cycle();
    while state.accepts_input() {
        let step = ctx.script.step(state.active_step.unwrap()).unwrap();
        let value = match step.input {
            InputMode::QuickChoice => {
                let i = picks.next().copied().unwrap_or(0) % step.options.len();
                step.options[i].value.to_string()
            }
            InputMode::Phone => "+91 98765 43210".to_string(),
            InputMode::Email => "visitor@example.com".to_string(),
            InputMode::FreeText | InputMode::None => name.to_string(),
        };
        state = settle(state, ctx, Event::answer(value, None), &mut submitted);
    }
    (state, submitted)
}

fn field_set(state: &ChatState) -> BTreeSet<&'static str> {
    state.record.fields().map(LeadField::as_str).collect()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_picks() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0usize..8, 1..8)
}

fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,15}"
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::Start),
        3 => prop_oneof![
            Just("parent"), Just("school"), Just("5-7"), Just("Robotics"),
            Just("yes"), Just("no"), Just(""), Just("Asha"), Just("9999999999"),
            Just("a@b.com"),
        ]
        .prop_map(|v| Event::answer(v, None)),
        2 => (0u64..4).prop_map(|pass| Event::RevealNext { pass }),
        1 => (0u64..4).prop_map(|pass| Event::RenderComplete { pass }),
        1 => (0u64..4).prop_map(|pass| Event::EnterStep { pass, step: ids::WELCOME }),
        1 => (0u64..4).prop_map(|pass| Event::EnterStep { pass, step: StepId::new("nowhere") }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn parent_branch_collects_exactly_parent_fields(picks in arb_picks(), name in arb_name()) {
        let ctx = test_context();
        let (state, submitted) = walk(&ctx, "parent", &picks, &name);

        prop_assert!(state.is_finished());
        prop_assert_eq!(state.active_step, Some(ids::PARENT_DONE));
        prop_assert_eq!(submitted, 1);
        let expected: BTreeSet<_> = [
            "userType", "childAge", "stemInterest", "parentGoal",
            "name", "phone", "email", "wantsDemo",
        ].into_iter().collect();
        prop_assert_eq!(field_set(&state), expected);
        for field in LeadField::SCHOOL_ONLY {
            prop_assert!(!state.record.contains(field));
        }
        prop_assert!(state.record.flag(LeadField::WantsDemo).is_some());
    }

    #[test]
    fn school_branch_collects_exactly_school_fields(picks in arb_picks(), name in arb_name()) {
        let ctx = test_context();
        let (state, submitted) = walk(&ctx, "school", &picks, &name);

        prop_assert!(state.is_finished());
        prop_assert_eq!(state.active_step, Some(ids::SCHOOL_DONE));
        prop_assert_eq!(submitted, 1);
        let expected: BTreeSet<_> = [
            "userType", "schoolType", "schoolSize", "schoolProgram",
            "name", "schoolName", "phone", "email",
        ].into_iter().collect();
        prop_assert_eq!(field_set(&state), expected);
        for field in LeadField::PARENT_ONLY {
            prop_assert!(!state.record.contains(field));
        }
    }

    #[test]
    fn flags_never_overlap(events in proptest::collection::vec(arb_event(), 0..60)) {
        let ctx = test_context();
        let mut state = ChatState::default();
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
            let raised = [state.is_rendering(), state.accepts_input(), state.is_finished()]
                .into_iter()
                .filter(|f| *f)
                .count();
            prop_assert!(raised <= 1);
        }
    }

    #[test]
    fn at_most_one_submission_per_pass(events in proptest::collection::vec(arb_event(), 0..80)) {
        let ctx = test_context();
        let mut state = ChatState::default();
        let mut per_pass: std::collections::HashMap<u64, usize> = std::collections::HashMap::new();
        for event in events {
            let mut submitted = 0;
            state = settle(state, &ctx, event, &mut submitted);
            *per_pass.entry(state.pass).or_default() += submitted;
        }
        for (pass, count) in per_pass {
            prop_assert!(count <= 1, "pass {} submitted {} times", pass, count);
        }
    }

    #[test]
    fn message_ids_stay_unique(events in proptest::collection::vec(arb_event(), 0..40)) {
        let ctx = test_context();
        let mut state = ChatState::default();
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }
        let ids: BTreeSet<_> = state.messages.iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(ids.len(), state.messages.len());
    }

    #[test]
    fn record_only_grows_within_a_pass(events in proptest::collection::vec(arb_event(), 0..60)) {
        let ctx = test_context();
        let mut state = ChatState::default();
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                let next = result.new_state;
                if next.pass == state.pass {
                    for field in state.record.fields() {
                        prop_assert!(next.record.contains(field));
                    }
                    prop_assert!(next.messages.len() >= state.messages.len());
                    prop_assert!(next.submission_sent || !state.submission_sent);
                }
                state = next;
            }
        }
    }
}
