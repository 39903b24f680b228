//! Lead record accumulated over a conversation pass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fields a conversation can capture.
///
/// Serialized in camelCase so the record matches the shape the dashboard
/// and the lead store expect (`userType`, `childAge`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadField {
    UserType,
    Name,
    Phone,
    Email,
    // Parent branch
    ChildAge,
    StemInterest,
    ParentGoal,
    WantsDemo,
    // School branch
    SchoolType,
    SchoolSize,
    SchoolProgram,
    SchoolName,
}

impl LeadField {
    /// Fields collected on both branches
    pub const COMMON: [LeadField; 4] = [
        LeadField::UserType,
        LeadField::Name,
        LeadField::Phone,
        LeadField::Email,
    ];

    pub const PARENT_ONLY: [LeadField; 4] = [
        LeadField::ChildAge,
        LeadField::StemInterest,
        LeadField::ParentGoal,
        LeadField::WantsDemo,
    ];

    pub const SCHOOL_ONLY: [LeadField; 4] = [
        LeadField::SchoolType,
        LeadField::SchoolSize,
        LeadField::SchoolProgram,
        LeadField::SchoolName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeadField::UserType => "userType",
            LeadField::Name => "name",
            LeadField::Phone => "phone",
            LeadField::Email => "email",
            LeadField::ChildAge => "childAge",
            LeadField::StemInterest => "stemInterest",
            LeadField::ParentGoal => "parentGoal",
            LeadField::WantsDemo => "wantsDemo",
            LeadField::SchoolType => "schoolType",
            LeadField::SchoolSize => "schoolSize",
            LeadField::SchoolProgram => "schoolProgram",
            LeadField::SchoolName => "schoolName",
        }
    }

    /// Whether this field belongs on a record of the given visitor type
    pub fn belongs_to(self, user_type: UserType) -> bool {
        match user_type {
            UserType::Parent => !Self::SCHOOL_ONLY.contains(&self),
            UserType::School => !Self::PARENT_ONLY.contains(&self),
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which branch of the flow a visitor took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Parent,
    School,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Parent => "parent",
            UserType::School => "school",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "parent" => Some(UserType::Parent),
            "school" => Some(UserType::School),
            _ => None,
        }
    }
}

/// A captured answer. Most answers are text; choice steps may coerce
/// their answer into a flag (the demo opt-in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Mapping from field to captured value.
///
/// Fields are only ever added or overwritten during a pass; a fresh record
/// is created when the conversation restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadRecord(BTreeMap<LeadField, FieldValue>);

impl LeadRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field, returning the previous value
    pub fn insert(&mut self, field: LeadField, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(field, value)
    }

    pub fn with(mut self, field: LeadField, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: LeadField) -> Option<&FieldValue> {
        self.0.get(&field)
    }

    pub fn text(&self, field: LeadField) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn flag(&self, field: LeadField) -> Option<bool> {
        self.get(field).and_then(FieldValue::as_flag)
    }

    pub fn contains(&self, field: LeadField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn user_type(&self) -> Option<UserType> {
        self.text(LeadField::UserType).and_then(UserType::parse)
    }

    pub fn fields(&self) -> impl Iterator<Item = LeadField> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop every field that does not belong to `user_type`
    pub fn retain_branch(&mut self, user_type: UserType) {
        self.0.retain(|field, _| field.belongs_to(user_type));
    }
}
