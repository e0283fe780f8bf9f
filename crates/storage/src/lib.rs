//! commongroups-storage: durable Group Records.
//!
//! A [`GroupRecord`] carries one group's status and results through
//! `pending → running → {done, failed}`. [`GroupStore`] backends persist
//! records atomically per group so an interrupted batch can resume.

pub mod conformance;
mod error;
mod fs;
mod memory;
mod record;
mod traits;

pub use error::{StorageError, TransitionError};
pub use fs::FsGroupStore;
pub use memory::MemoryGroupStore;
pub use record::{now_rfc3339, GroupRecord, GroupStatus};
pub use traits::GroupStore;
