//! API request and response types

use crate::flow::{FieldValue, LeadField, LeadRecord};
use crate::runtime::ChatSnapshot;
use crate::store::StoredLead;
use serde::{Deserialize, Serialize};

/// Lead posted directly to `POST /api/leads`.
///
/// Unknown keys are ignored; the store decides which fields are required.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    pub user_type: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub child_age: Option<String>,
    pub stem_interest: Option<String>,
    pub parent_goal: Option<String>,
    pub wants_demo: Option<bool>,
    pub school_name: Option<String>,
    pub school_type: Option<String>,
    pub school_size: Option<String>,
    pub school_program: Option<String>,
}

impl LeadSubmission {
    pub fn into_record(self) -> LeadRecord {
        let texts = [
            (LeadField::UserType, self.user_type),
            (LeadField::Name, self.name),
            (LeadField::Phone, self.phone),
            (LeadField::Email, self.email),
            (LeadField::ChildAge, self.child_age),
            (LeadField::StemInterest, self.stem_interest),
            (LeadField::ParentGoal, self.parent_goal),
            (LeadField::SchoolName, self.school_name),
            (LeadField::SchoolType, self.school_type),
            (LeadField::SchoolSize, self.school_size),
            (LeadField::SchoolProgram, self.school_program),
        ];

        let mut record = LeadRecord::new();
        for (field, value) in texts {
            if let Some(value) = value {
                record.insert(field, FieldValue::Text(value));
            }
        }
        if let Some(flag) = self.wants_demo {
            record.insert(LeadField::WantsDemo, FieldValue::Flag(flag));
        }
        record
    }
}

/// Answer to the active step of a widget session
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub value: String,
    /// Text shown in the visitor bubble instead of `value`
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ts: String,
}

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub success: bool,
    pub count: usize,
    pub leads: Vec<StoredLead>,
}

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub success: bool,
    pub lead: StoredLead,
}

/// Response for a newly created widget session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub snapshot: ChatSnapshot,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}
