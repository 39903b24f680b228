//! The lead-capture dialogue
//!
//! Two branches split at the first question (parent vs. school) and each
//! ends at its own terminal step. Everything here is data plus pure
//! functions; the engine owns all mutable state.

use super::record::{FieldValue, LeadField, LeadRecord};
use super::step::{Advance, ChoiceOption, InputMode, MessageProducer, Step, StepId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub mod ids {
    use super::StepId;

    pub const WELCOME: StepId = StepId::new("welcome");

    pub const PARENT_AGE: StepId = StepId::new("parent_age");
    pub const PARENT_INTEREST: StepId = StepId::new("parent_interest");
    pub const PARENT_GOAL: StepId = StepId::new("parent_goal");
    pub const PARENT_NAME: StepId = StepId::new("parent_name");
    pub const PARENT_PHONE: StepId = StepId::new("parent_phone");
    pub const PARENT_EMAIL: StepId = StepId::new("parent_email");
    pub const PARENT_DEMO: StepId = StepId::new("parent_demo");
    pub const PARENT_DONE: StepId = StepId::new("parent_done");

    pub const SCHOOL_TYPE: StepId = StepId::new("school_type");
    pub const SCHOOL_SIZE: StepId = StepId::new("school_size");
    pub const SCHOOL_PROGRAM: StepId = StepId::new("school_program");
    pub const SCHOOL_CONTACT: StepId = StepId::new("school_contact");
    pub const SCHOOL_NAME: StepId = StepId::new("school_name");
    pub const SCHOOL_PHONE: StepId = StepId::new("school_phone");
    pub const SCHOOL_EMAIL: StepId = StepId::new("school_email");
    pub const SCHOOL_DONE: StepId = StepId::new("school_done");
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("Unknown step: {0}")]
    UnknownStep(StepId),
    #[error("Duplicate step id: {0}")]
    DuplicateStep(StepId),
    #[error("Step {step} offers value '{value}' more than once")]
    DuplicateOption { step: StepId, value: &'static str },
    #[error("Step {0}: options must be present exactly when input is quick-choice")]
    OptionsMismatch(StepId),
    #[error("Step {0}: terminal steps take no input, other steps need a transition")]
    TerminalMismatch(StepId),
    #[error("Step {from} transitions to unknown step {to}")]
    DanglingTarget { from: StepId, to: StepId },
}

/// A complete dialogue: steps keyed by id plus the entry point
#[derive(Debug, Clone)]
pub struct FlowScript {
    entry: StepId,
    steps: HashMap<StepId, Step>,
}

impl FlowScript {
    pub fn new(entry: StepId, steps: Vec<Step>) -> Result<Self, ScriptError> {
        let mut map = HashMap::with_capacity(steps.len());
        for step in steps {
            let id = step.id;
            if map.insert(id, step).is_some() {
                return Err(ScriptError::DuplicateStep(id));
            }
        }
        if !map.contains_key(&entry) {
            return Err(ScriptError::UnknownStep(entry));
        }
        Ok(Self { entry, steps: map })
    }

    pub fn entry(&self) -> StepId {
        self.entry
    }

    pub fn step(&self, id: StepId) -> Result<&Step, ScriptError> {
        self.steps.get(&id).ok_or(ScriptError::UnknownStep(id))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    /// Structural checks over the whole script.
    ///
    /// Transitions are pure, so targets are discovered by probing each step
    /// with every offered choice (or a sample answer for typed input).
    pub fn validate(&self) -> Vec<ScriptError> {
        let mut problems = Vec::new();
        let empty_record = LeadRecord::new();

        for step in self.steps.values() {
            let is_choice = step.input == InputMode::QuickChoice;
            if is_choice == step.options.is_empty() {
                problems.push(ScriptError::OptionsMismatch(step.id));
            }

            let mut seen = HashSet::new();
            for option in step.options {
                if !seen.insert(option.value) {
                    problems.push(ScriptError::DuplicateOption {
                        step: step.id,
                        value: option.value,
                    });
                }
            }

            match (step.terminal, step.transition) {
                (true, None) if step.input == InputMode::None => {}
                (false, Some(advance)) if step.input != InputMode::None => {
                    let samples: Vec<&str> = if is_choice {
                        step.options.iter().map(|o| o.value).collect()
                    } else {
                        vec![sample_answer(step.input)]
                    };
                    for sample in samples {
                        let to = advance(sample, &empty_record).next;
                        if !self.steps.contains_key(&to) {
                            problems.push(ScriptError::DanglingTarget { from: step.id, to });
                        }
                    }
                }
                _ => problems.push(ScriptError::TerminalMismatch(step.id)),
            }
        }

        problems
    }

    /// The parent/school lead-capture dialogue
    pub fn lead_capture() -> Result<Self, ScriptError> {
        let mut steps = vec![welcome()];
        steps.extend(parent_steps());
        steps.extend(school_steps());
        Self::new(ids::WELCOME, steps)
    }
}

fn sample_answer(input: InputMode) -> &'static str {
    match input {
        InputMode::Phone => "9999999999",
        InputMode::Email => "visitor@example.com",
        _ => "sample",
    }
}

// ============================================================================
// Option tables
// ============================================================================

const USER_TYPE_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("👨‍👩‍👧 Parent", "parent"),
    ChoiceOption::new("🏫 School / Educator", "school"),
];

const AGE_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("5 – 7 years", "5-7"),
    ChoiceOption::new("8 – 10 years", "8-10"),
    ChoiceOption::new("11 – 13 years", "11-13"),
    ChoiceOption::new("14 – 17 years", "14-17"),
];

const INTEREST_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("💻 Coding & Programming", "Coding & Programming"),
    ChoiceOption::new("🤖 Robotics", "Robotics"),
    ChoiceOption::new("🧠 AI & Machine Learning", "AI & Machine Learning"),
    ChoiceOption::new("🔢 Critical Thinking & Math", "Critical Thinking & Math"),
    ChoiceOption::new("🎯 Not sure yet", "Not sure yet"),
];

const GOAL_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("🚀 Build problem-solving skills", "Build problem-solving skills"),
    ChoiceOption::new("📚 Prepare for competitive exams", "Prepare for competitive exams"),
    ChoiceOption::new("🌐 Explore tech career paths", "Explore tech career paths"),
    ChoiceOption::new("🎮 Make learning fun & engaging", "Make learning fun & engaging"),
];

const DEMO_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("✅ Yes, book a free demo!", "yes"),
    ChoiceOption::new("📩 Just send me the details", "no"),
];

const SCHOOL_TYPE_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("🏛️ Government / Public School", "Government/Public"),
    ChoiceOption::new("🏫 Private School", "Private"),
    ChoiceOption::new("🌍 International School", "International"),
    ChoiceOption::new("🎓 College / University", "College/University"),
];

const SCHOOL_SIZE_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("Under 500", "Under 500"),
    ChoiceOption::new("500 – 1,000", "500-1000"),
    ChoiceOption::new("1,000 – 2,000", "1000-2000"),
    ChoiceOption::new("2,000+", "2000+"),
];

const PROGRAM_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new("🧩 After-school STEM Clubs", "After-school STEM Clubs"),
    ChoiceOption::new("📘 Curriculum Integration", "Curriculum Integration"),
    ChoiceOption::new("👩‍🏫 Teacher Training Program", "Teacher Training"),
    ChoiceOption::new("🤝 Full School Partnership", "Full School Partnership"),
];

/// Name to address the visitor by, tolerating a record without one
fn name_of(record: &LeadRecord) -> &str {
    record.text(LeadField::Name).unwrap_or("there")
}

fn welcome() -> Step {
    Step {
        id: ids::WELCOME,
        messages: MessageProducer::Fixed(&[
            "Hi there! 👋 Welcome to **WizKlub**!",
            "I'm **Wiz**, your personal learning guide. WizKlub helps young minds build real-world skills through AI, Coding, and Higher-Order Thinking programs.",
            "To get started, who are you?",
        ]),
        input: InputMode::QuickChoice,
        options: USER_TYPE_OPTIONS,
        placeholder: None,
        transition: Some(|value, _| {
            let next = if value == "parent" {
                ids::PARENT_AGE
            } else {
                ids::SCHOOL_TYPE
            };
            Advance::to(next, LeadField::UserType)
        }),
        terminal: false,
    }
}

// ============================================================================
// Parent branch
// ============================================================================

fn parent_steps() -> Vec<Step> {
    vec![
        Step {
            id: ids::PARENT_AGE,
            messages: MessageProducer::Fixed(&["That's great! 🌟 What is your child's age group?"]),
            input: InputMode::QuickChoice,
            options: AGE_OPTIONS,
            placeholder: None,
            transition: Some(|_, _| Advance::to(ids::PARENT_INTEREST, LeadField::ChildAge)),
            terminal: false,
        },
        Step {
            id: ids::PARENT_INTEREST,
            messages: MessageProducer::Fixed(&["Which area excites your child the most? ✨"]),
            input: InputMode::QuickChoice,
            options: INTEREST_OPTIONS,
            placeholder: None,
            transition: Some(|_, _| Advance::to(ids::PARENT_GOAL, LeadField::StemInterest)),
            terminal: false,
        },
        Step {
            id: ids::PARENT_GOAL,
            messages: MessageProducer::Fixed(&[
                "Awesome choice! What's your biggest goal for your child right now?",
            ]),
            input: InputMode::QuickChoice,
            options: GOAL_OPTIONS,
            placeholder: None,
            transition: Some(|_, _| Advance::to(ids::PARENT_NAME, LeadField::ParentGoal)),
            terminal: false,
        },
        Step {
            id: ids::PARENT_NAME,
            messages: MessageProducer::Fixed(&[
                "Perfect! I'd love to connect you with our expert team. 😊",
                "What's your name?",
            ]),
            input: InputMode::FreeText,
            options: &[],
            placeholder: Some("Your name…"),
            transition: Some(|_, _| Advance::to(ids::PARENT_PHONE, LeadField::Name)),
            terminal: false,
        },
        Step {
            id: ids::PARENT_PHONE,
            messages: MessageProducer::Derived(|record| {
                vec![format!(
                    "Thanks, {}! 👍 What's the best phone number to reach you?",
                    name_of(record)
                )]
            }),
            input: InputMode::Phone,
            options: &[],
            placeholder: Some("+91 98765 43210"),
            transition: Some(|_, _| Advance::to(ids::PARENT_EMAIL, LeadField::Phone)),
            terminal: false,
        },
        Step {
            id: ids::PARENT_EMAIL,
            messages: MessageProducer::Fixed(&[
                "And your email address? (We'll send program details here)",
            ]),
            input: InputMode::Email,
            options: &[],
            placeholder: Some("you@example.com"),
            transition: Some(|_, _| Advance::to(ids::PARENT_DEMO, LeadField::Email)),
            terminal: false,
        },
        Step {
            id: ids::PARENT_DEMO,
            messages: MessageProducer::Fixed(&[
                "🎉 You're all set! One last thing —",
                "Would you like to book a **FREE live demo class** for your child? It's a 45-minute interactive session with no obligations!",
            ]),
            input: InputMode::QuickChoice,
            options: DEMO_OPTIONS,
            placeholder: None,
            transition: Some(|value, _| {
                Advance::to(ids::PARENT_DONE, LeadField::WantsDemo)
                    .storing(FieldValue::Flag(value == "yes"))
            }),
            terminal: false,
        },
        Step {
            id: ids::PARENT_DONE,
            messages: MessageProducer::Derived(parent_closing),
            input: InputMode::None,
            options: &[],
            placeholder: None,
            transition: None,
            terminal: true,
        },
    ]
}

fn parent_closing(record: &LeadRecord) -> Vec<String> {
    let name = name_of(record);
    if record.flag(LeadField::WantsDemo).unwrap_or(false) {
        vec![
            format!("🚀 Brilliant, {name}! Your demo request is confirmed."),
            "Our team will call you within **24 hours** to lock in a time slot that works for you."
                .to_string(),
            "📧 Check your inbox — a confirmation will be on its way shortly!".to_string(),
            "**See you at the demo!** 🎓".to_string(),
        ]
    } else {
        vec![
            format!("Thanks, {name}! 😊"),
            "We've noted your interest. Our team will send across WizKlub program details to your email within **24 hours**."
                .to_string(),
            "Feel free to reach us anytime at **hello@wizklab.com** 💌".to_string(),
        ]
    }
}

// ============================================================================
// School branch
// ============================================================================

fn school_steps() -> Vec<Step> {
    vec![
        Step {
            id: ids::SCHOOL_TYPE,
            messages: MessageProducer::Fixed(&[
                "Excellent! 🏫 We love partnering with schools to bring world-class STEM education to students.",
                "What type of institution are you representing?",
            ]),
            input: InputMode::QuickChoice,
            options: SCHOOL_TYPE_OPTIONS,
            placeholder: None,
            transition: Some(|_, _| Advance::to(ids::SCHOOL_SIZE, LeadField::SchoolType)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_SIZE,
            messages: MessageProducer::Fixed(&[
                "Approximately how many students does your institution have?",
            ]),
            input: InputMode::QuickChoice,
            options: SCHOOL_SIZE_OPTIONS,
            placeholder: None,
            transition: Some(|_, _| Advance::to(ids::SCHOOL_PROGRAM, LeadField::SchoolSize)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_PROGRAM,
            messages: MessageProducer::Fixed(&[
                "Which WizKlub programs are you most interested in? 🔍",
            ]),
            input: InputMode::QuickChoice,
            options: PROGRAM_OPTIONS,
            placeholder: None,
            transition: Some(|_, _| Advance::to(ids::SCHOOL_CONTACT, LeadField::SchoolProgram)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_CONTACT,
            messages: MessageProducer::Fixed(&[
                "Great choice! Let me collect your details so our partnerships team can reach out. 😊",
                "What's your name?",
            ]),
            input: InputMode::FreeText,
            options: &[],
            placeholder: Some("Your name…"),
            transition: Some(|_, _| Advance::to(ids::SCHOOL_NAME, LeadField::Name)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_NAME,
            messages: MessageProducer::Derived(|record| {
                vec![format!(
                    "Nice to meet you, {}! What is the name of your school / institution?",
                    name_of(record)
                )]
            }),
            input: InputMode::FreeText,
            options: &[],
            placeholder: Some("School name…"),
            transition: Some(|_, _| Advance::to(ids::SCHOOL_PHONE, LeadField::SchoolName)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_PHONE,
            messages: MessageProducer::Fixed(&["What is your official phone number?"]),
            input: InputMode::Phone,
            options: &[],
            placeholder: Some("+91 98765 43210"),
            transition: Some(|_, _| Advance::to(ids::SCHOOL_EMAIL, LeadField::Phone)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_EMAIL,
            messages: MessageProducer::Fixed(&["And your official work email?"]),
            input: InputMode::Email,
            options: &[],
            placeholder: Some("principal@school.edu"),
            transition: Some(|_, _| Advance::to(ids::SCHOOL_DONE, LeadField::Email)),
            terminal: false,
        },
        Step {
            id: ids::SCHOOL_DONE,
            messages: MessageProducer::Derived(school_closing),
            input: InputMode::None,
            options: &[],
            placeholder: None,
            transition: None,
            terminal: true,
        },
    ]
}

fn school_closing(record: &LeadRecord) -> Vec<String> {
    let school = record
        .text(LeadField::SchoolName)
        .unwrap_or("your institution");
    vec![
        format!("🎉 Thank you, {}!", name_of(record)),
        format!("We've logged your partnership inquiry for **{school}**."),
        "Our dedicated School Partnerships team will reach out within **48 hours** with a tailored proposal."
            .to_string(),
        "📧 A confirmation has been sent to your email. We look forward to transforming student outcomes together! 🚀"
            .to_string(),
    ]
}
