use crate::error::StorageError;
use crate::record::GroupRecord;

/// Durable per-project storage for Group Records, keyed by `group_id`.
///
/// ## Atomicity
///
/// `save` replaces the whole record at once: a concurrent or later reader
/// observes either the previous document or the new one, never a mix.
///
/// ## Keys
///
/// Implementations must reject group ids that are not safe persistence keys
/// with `StorageError::InvalidKey` rather than silently mapping them.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so a store can be shared with a
/// future parallel batch runner. Writes to one key are expected to come from
/// a single writer.
pub trait GroupStore: Send + Sync {
    /// Short backend name for logs.
    fn describe(&self) -> String;

    /// Read one record. `Ok(None)` if nothing is stored under the key.
    fn load(&self, group_id: &str) -> Result<Option<GroupRecord>, StorageError>;

    /// Atomically write (insert or replace) a record.
    fn save(&self, record: &GroupRecord) -> Result<(), StorageError>;

    /// Delete a record. Returns whether anything was removed.
    fn remove(&self, group_id: &str) -> Result<bool, StorageError>;

    /// Every readable stored record, sorted by `group_id`. Corrupt
    /// documents are skipped; `load` still reports them.
    fn list(&self) -> Result<Vec<GroupRecord>, StorageError>;
}

pub(crate) fn check_key(group_id: &str) -> Result<(), StorageError> {
    commongroups_core::validate_group_id(group_id).map_err(|e| StorageError::InvalidKey {
        group_id: group_id.to_string(),
        reason: e.to_string(),
    })
}
