//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::project::WorkspaceRecord;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, WorkspaceRecord>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, record: &WorkspaceRecord) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let record = record.clone();
        Box::pin(async move {
            let mut records = self
                .records
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            records.insert(id, record);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<WorkspaceRecord>> {
        let id = id.to_string();
        Box::pin(async move {
            let records = self
                .records
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            records
                .get(&id)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut records = self
                .records
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            records.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let records = self
                .records
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(records.keys().cloned().collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let records = self
                .records
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(records.contains_key(&id))
        })
    }
}
