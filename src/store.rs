//! Lead store
//!
//! Persists completed leads as a pretty-printed JSON array on disk, the
//! format the dashboard has always read.

mod export;

use export::to_csv;

use crate::flow::{FieldValue, LeadField, LeadRecord, UserType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt lead file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("name, phone, and userType are required.")]
    MissingFields,
    #[error("Unknown userType: {0}")]
    UnknownUserType(String),
    #[error("Lead not found.")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A lead as stored: the captured record plus bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLead {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: LeadRecord,
}

impl StoredLead {
    pub fn user_type(&self) -> Option<UserType> {
        self.fields.user_type()
    }

    pub fn wants_demo(&self) -> bool {
        self.fields.flag(LeadField::WantsDemo).unwrap_or(false)
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total: usize,
    pub parents: usize,
    pub schools: usize,
    pub demo_requests: usize,
}

/// Thread-safe handle to the lead file
#[derive(Clone)]
pub struct LeadStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl LeadStore {
    /// Open the lead file, creating it (and its directory) if missing
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            fs::write(&path, "[]")?;
        }
        let store = Self {
            path: Arc::new(path),
            lock: Arc::new(Mutex::new(())),
        };
        // Fail fast on a corrupt file rather than on the first submission
        store.read_all()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and append a lead. Only the fields of the visitor's branch
    /// are kept; a missing email is stored as an empty string.
    pub fn create_record(&self, submission: &LeadRecord) -> StoreResult<StoredLead> {
        let lead = normalize(submission)?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut leads = self.read_all()?;
        leads.push(lead.clone());
        self.write_all(&leads)?;
        Ok(lead)
    }

    /// All leads, newest first
    pub fn list_records(&self) -> StoreResult<Vec<StoredLead>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut leads = self.read_all()?;
        leads.reverse();
        Ok(leads)
    }

    pub fn delete_record(&self, id: &str) -> StoreResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut leads = self.read_all()?;
        let before = leads.len();
        leads.retain(|l| l.id != id);
        if leads.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.write_all(&leads)
    }

    /// CSV of every lead in insertion order
    pub fn export_csv(&self) -> StoreResult<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(to_csv(&self.read_all()?))
    }

    pub fn stats(&self) -> StoreResult<LeadStats> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let leads = self.read_all()?;
        let mut stats = LeadStats {
            total: leads.len(),
            ..LeadStats::default()
        };
        for lead in &leads {
            match lead.user_type() {
                Some(UserType::Parent) => stats.parents += 1,
                Some(UserType::School) => stats.schools += 1,
                None => {}
            }
            if lead.wants_demo() {
                stats.demo_requests += 1;
            }
        }
        Ok(stats)
    }

    fn read_all(&self) -> StoreResult<Vec<StoredLead>> {
        let raw = fs::read_to_string(self.path.as_path())?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write via a sibling temp file so readers never see a torn array
    fn write_all(&self, leads: &[StoredLead]) -> StoreResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, leads)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.path.as_path())?;
        Ok(())
    }
}

fn normalize(submission: &LeadRecord) -> StoreResult<StoredLead> {
    let present = |field| {
        submission
            .text(field)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let (Some(user_type), Some(_), Some(_)) = (
        present(LeadField::UserType),
        present(LeadField::Name),
        present(LeadField::Phone),
    ) else {
        return Err(StoreError::MissingFields);
    };
    let user_type =
        UserType::parse(user_type).ok_or_else(|| StoreError::UnknownUserType(user_type.to_string()))?;

    let mut fields = submission.clone();
    fields.retain_branch(user_type);
    if !fields.contains(LeadField::Email) {
        fields.insert(LeadField::Email, FieldValue::text(""));
    }

    Ok(StoredLead {
        id: uuid::Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        fields,
    })
}
