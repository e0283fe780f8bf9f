use crate::record::GroupStatus;

/// All errors that can be returned by a [`GroupStore`](crate::GroupStore)
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The group id cannot be used as a persistence key.
    #[error("invalid group key '{group_id}': {reason}")]
    InvalidKey { group_id: String, reason: String },

    /// A persisted document exists but does not deserialize as a record.
    #[error("corrupt record for group {group_id}: {message}")]
    Corrupt { group_id: String, message: String },

    /// Filesystem failure while reading or writing a record.
    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A backend-specific storage error (serialization, poisoned lock, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// An illegal Group Record status transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} group {group_id} while it is {from}")]
pub struct TransitionError {
    pub group_id: String,
    pub from: GroupStatus,
    pub action: &'static str,
}
