//! In-memory [`GroupStore`] for tests and embedding.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StorageError;
use crate::record::GroupRecord;
use crate::traits::{check_key, GroupStore};

#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    records: Mutex<BTreeMap<String, GroupRecord>>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, GroupRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

impl GroupStore for MemoryGroupStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self, group_id: &str) -> Result<Option<GroupRecord>, StorageError> {
        check_key(group_id)?;
        Ok(self.lock()?.get(group_id).cloned())
    }

    fn save(&self, record: &GroupRecord) -> Result<(), StorageError> {
        check_key(&record.group_id)?;
        self.lock()?
            .insert(record.group_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, group_id: &str) -> Result<bool, StorageError> {
        check_key(group_id)?;
        Ok(self.lock()?.remove(group_id).is_some())
    }

    fn list(&self) -> Result<Vec<GroupRecord>, StorageError> {
        // BTreeMap iteration is already key-ordered.
        Ok(self.lock()?.values().cloned().collect())
    }
}
