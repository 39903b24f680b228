//! Scripted dialogue: steps, the lead record they fill, and the built-in
//! parent/school flow.

mod record;
pub mod script;
mod step;

pub use record::{FieldValue, LeadField, LeadRecord, UserType};
pub use script::{FlowScript, ScriptError};
pub use step::{Advance, ChoiceOption, InputError, InputMode, MessageProducer, Step, StepId};
