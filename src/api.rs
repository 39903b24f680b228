//! HTTP API: the lead dashboard and the widget session endpoints

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::RuntimeManager;
use crate::state_machine::ChatContext;
use crate::store::LeadStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: LeadStore,
    pub sessions: Arc<RuntimeManager>,
}

impl AppState {
    pub fn new(store: LeadStore, context: ChatContext) -> Self {
        Self {
            sessions: Arc::new(RuntimeManager::new(context, store.clone())),
            store,
        }
    }
}
