//! Filesystem [`GroupStore`]: one JSON document per group under a data
//! directory (`<data>/<group_id>.json`).
//!
//! Writes go to a temporary file in the same directory, are fsynced, then
//! renamed over the target, so readers never observe a partial document.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::record::GroupRecord;
use crate::traits::{check_key, GroupStore};

#[derive(Debug, Clone)]
pub struct FsGroupStore {
    dir: PathBuf,
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl FsGroupStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        Ok(FsGroupStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document path for a group id. The id must already be a checked key.
    pub fn path_for(&self, group_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", group_id))
    }

    fn read(&self, group_id: &str, path: &Path) -> Result<Option<GroupRecord>, StorageError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, e)),
        };
        let record: GroupRecord =
            serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
                group_id: group_id.to_string(),
                message: e.to_string(),
            })?;
        if record.group_id != group_id {
            return Err(StorageError::Corrupt {
                group_id: group_id.to_string(),
                message: format!("document holds group_id '{}'", record.group_id),
            });
        }
        Ok(Some(record))
    }
}

impl GroupStore for FsGroupStore {
    fn describe(&self) -> String {
        format!("fs:{}", self.dir.display())
    }

    fn load(&self, group_id: &str) -> Result<Option<GroupRecord>, StorageError> {
        check_key(group_id)?;
        self.read(group_id, &self.path_for(group_id))
    }

    fn save(&self, record: &GroupRecord) -> Result<(), StorageError> {
        check_key(&record.group_id)?;
        let target = self.path_for(&record.group_id);
        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| StorageError::Backend(format!("serialize {}: {}", record.group_id, e)))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        tmp.write_all(&body)
            .and_then(|_| tmp.write_all(b"\n"))
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&target).map_err(|e| io_error(&target, e.error))?;
        tracing::debug!(group_id = %record.group_id, path = %target.display(), "record saved");
        Ok(())
    }

    fn remove(&self, group_id: &str) -> Result<bool, StorageError> {
        check_key(group_id)?;
        let path = self.path_for(group_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn list(&self) -> Result<Vec<GroupRecord>, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(group_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Stray files that could never have been written by `save`.
            if check_key(group_id).is_err() {
                continue;
            }
            match self.read(group_id, &path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e @ StorageError::Corrupt { .. }) => {
                    tracing::warn!(group_id, error = %e, "skipping unreadable record");
                }
                Err(e) => return Err(e),
            }
        }
        records.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(records)
    }
}
