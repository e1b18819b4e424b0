//! Persistence hand-off for finished (and in-flight) presentation bundles.
//!
//! The orchestrator treats storage as strictly best-effort: a write failure
//! is logged and the run continues. [`MemoryStore`] backs tests and
//! single-process use; real deployments implement [`PresentationStore`]
//! over their own database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::orchestrator::Bundle;
use crate::PipelineError;

/// Async storage for presentation bundles.
///
/// Object-safe; the orchestrator holds it as `Arc<dyn PresentationStore>`.
#[async_trait]
pub trait PresentationStore: Send + Sync {
    /// Persist a new bundle, returning its generated id.
    async fn insert(&self, bundle: &Bundle) -> Result<String>;

    /// Replace the bundle stored under `id`.
    async fn update(&self, id: &str, bundle: &Bundle) -> Result<()>;

    /// Fetch a bundle by id.
    async fn select(&self, id: &str) -> Result<Option<Bundle>>;
}

/// In-memory store keyed by generated ids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Bundle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bundles.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the store holds no bundles.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl PresentationStore for MemoryStore {
    async fn insert(&self, bundle: &Bundle) -> Result<String> {
        let id = format!("pres-{:012x}", fastrand::u64(..));
        self.entries.lock().await.insert(id.clone(), bundle.clone());
        Ok(id)
    }

    async fn update(&self, id: &str, bundle: &Bundle) -> Result<()> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(id) {
            Some(slot) => {
                *slot = bundle.clone();
                Ok(())
            }
            None => Err(PipelineError::Other(format!("unknown presentation id {}", id))),
        }
    }

    async fn select(&self, id: &str) -> Result<Option<Bundle>> {
        Ok(self.entries.lock().await.get(id).cloned())
    }
}
