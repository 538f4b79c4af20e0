use std::sync::{Arc, RwLock};

use crate::scoring::{ConfigSnapshot, SnapshotDocument};

/// Source of configuration snapshots for scoring runs.
///
/// Implementations hand out immutable snapshots; replacing the configuration
/// never mutates a snapshot a run already holds.
pub trait ConfigStore: Send + Sync {
    fn snapshot(&self) -> Result<Arc<ConfigSnapshot>, StoreError>;
    fn replace(&self, document: SnapshotDocument) -> Result<Arc<ConfigSnapshot>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("configuration store unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store holding the live admin configuration.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl InMemoryConfigStore {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn snapshot(&self) -> Result<Arc<ConfigSnapshot>, StoreError> {
        let guard = self
            .current
            .read()
            .map_err(|_| StoreError::Unavailable("configuration lock poisoned".to_string()))?;
        Ok(Arc::clone(&guard))
    }

    /// Revisions only move forward: a document carrying a stale revision is
    /// stored under the next one.
    fn replace(&self, mut document: SnapshotDocument) -> Result<Arc<ConfigSnapshot>, StoreError> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| StoreError::Unavailable("configuration lock poisoned".to_string()))?;
        let next = guard.revision().saturating_add(1);
        document.revision = document.revision.max(next);

        let snapshot = Arc::new(ConfigSnapshot::from_document(document));
        *guard = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}
