//! Step definitions for the flow script

use super::record::{FieldValue, LeadField, LeadRecord};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Identifier of a step in the flow script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(&'static str);

impl StepId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Produces the bot bubbles for a step
#[derive(Clone, Copy)]
pub enum MessageProducer {
    Fixed(&'static [&'static str]),
    /// Personalized from whatever has been captured so far. Must not assume
    /// any field is present.
    Derived(fn(&LeadRecord) -> Vec<String>),
}

impl MessageProducer {
    pub fn resolve(&self, record: &LeadRecord) -> Vec<String> {
        match self {
            MessageProducer::Fixed(lines) => lines.iter().map(|s| (*s).to_string()).collect(),
            MessageProducer::Derived(produce) => produce(record),
        }
    }
}

impl fmt::Debug for MessageProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageProducer::Fixed(lines) => f.debug_tuple("Fixed").field(lines).finish(),
            MessageProducer::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// How the visitor answers a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    QuickChoice,
    FreeText,
    Phone,
    Email,
    None,
}

/// One pre-labeled answer of a quick-choice step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub label: &'static str,
    pub value: &'static str,
}

impl ChoiceOption {
    pub const fn new(label: &'static str, value: &'static str) -> Self {
        Self { label, value }
    }
}

/// Outcome of a step's transition function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub next: StepId,
    pub field: LeadField,
    /// Overrides the stored value; the raw answer is stored when `None`
    pub stored: Option<FieldValue>,
}

impl Advance {
    pub fn to(next: StepId, field: LeadField) -> Self {
        Self {
            next,
            field,
            stored: None,
        }
    }

    pub fn storing(mut self, value: FieldValue) -> Self {
        self.stored = Some(value);
        self
    }

    pub fn stored_value(&self, raw: &str) -> FieldValue {
        self.stored
            .clone()
            .unwrap_or_else(|| FieldValue::text(raw))
    }
}

pub type TransitionFn = fn(&str, &LeadRecord) -> Advance;

/// Why an answer was refused before reaching the transition function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("answer is empty")]
    Empty,
    #[error("'{0}' is not one of the offered choices")]
    UnknownChoice(String),
    #[error("'{0}' does not look like a phone number")]
    MalformedPhone(String),
    #[error("'{0}' does not look like an email address")]
    MalformedEmail(String),
    #[error("step does not take an answer")]
    NotExpected,
}

const MIN_PHONE_DIGITS: usize = 7;

/// One node of the flow script
#[derive(Debug, Clone)]
pub struct Step {
    pub id: StepId,
    pub messages: MessageProducer,
    pub input: InputMode,
    pub options: &'static [ChoiceOption],
    pub placeholder: Option<&'static str>,
    pub transition: Option<TransitionFn>,
    pub terminal: bool,
}

impl Step {
    /// Check a visitor answer against this step's input mode.
    ///
    /// Returns the normalized (trimmed) value to feed the transition.
    pub fn accept(&self, raw: &str) -> Result<String, InputError> {
        let value = raw.trim();
        if self.input == InputMode::None || self.transition.is_none() {
            return Err(InputError::NotExpected);
        }
        if value.is_empty() {
            return Err(InputError::Empty);
        }

        match self.input {
            InputMode::QuickChoice => {
                if !self.options.iter().any(|o| o.value == value) {
                    return Err(InputError::UnknownChoice(value.to_string()));
                }
            }
            InputMode::Phone => {
                if !is_plausible_phone(value) {
                    return Err(InputError::MalformedPhone(value.to_string()));
                }
            }
            InputMode::Email => {
                if !is_plausible_email(value) {
                    return Err(InputError::MalformedEmail(value.to_string()));
                }
            }
            InputMode::FreeText | InputMode::None => {}
        }

        Ok(value.to_string())
    }

    /// Label shown for a choice value, if the step offers it
    #[cfg(test)]
    pub fn label_for(&self, value: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label)
    }
}

fn is_plausible_phone(value: &str) -> bool {
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'));
    let digits = value.chars().filter(char::is_ascii_digit).count();
    allowed && digits >= MIN_PHONE_DIGITS
}

fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
