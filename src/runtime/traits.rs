//! Trait abstractions for runtime I/O
//!
//! The lead sink is the only collaborator a session talks to; the trait
//! lets tests observe submissions without a store on disk.

use crate::flow::LeadRecord;
use crate::store::LeadStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives finalized lead records
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Persist a completed record. Sessions only log failures.
    async fn submit_record(&self, record: &LeadRecord) -> Result<(), String>;
}

#[async_trait]
impl<T: LeadSink + ?Sized> LeadSink for Arc<T> {
    async fn submit_record(&self, record: &LeadRecord) -> Result<(), String> {
        (**self).submit_record(record).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `LeadStore` as a `LeadSink`
#[derive(Clone)]
pub struct StoreSink {
    store: LeadStore,
}

impl StoreSink {
    pub fn new(store: LeadStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LeadSink for StoreSink {
    async fn submit_record(&self, record: &LeadRecord) -> Result<(), String> {
        let lead = self.store.create_record(record).map_err(|e| e.to_string())?;
        tracing::info!(lead_id = %lead.id, user_type = %lead.user_type().map_or("?", |t| t.as_str()), "Lead stored");
        Ok(())
    }
}
