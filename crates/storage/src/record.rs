use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Lifecycle status of one compound group within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Pending => "pending",
            GroupStatus::Running => "running",
            GroupStatus::Done => "done",
            GroupStatus::Failed => "failed",
        }
    }

    /// `done` and `failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, GroupStatus::Done | GroupStatus::Failed)
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

/// The persisted state and results of one compound group.
///
/// Status changes go through the transition methods, which enforce
/// `pending → running → {done, failed}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group_id: String,
    pub name: String,
    pub status: GroupStatus,
    /// Literal compiled query, for provenance.
    #[serde(default)]
    pub query_text: Option<String>,
    /// Matched compound ids, deduplicated, in database return order.
    #[serde(default)]
    pub result_ids: Vec<String>,
    #[serde(default)]
    pub result_count: usize,
    /// Last error message (terminal reason when `failed`).
    #[serde(default)]
    pub error: Option<String>,
    /// Number of failed query attempts.
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub attempts: u32,
    /// ISO 8601 / RFC 3339 timestamp string.
    #[serde(default)]
    pub started_at: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp of the terminal transition.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Fingerprint of the definition the results were computed from.
    #[serde(default)]
    pub definition_hash: Option<String>,
    #[serde(default)]
    pub info: BTreeMap<String, serde_json::Value>,
}

impl GroupRecord {
    pub fn new(group_id: &str, name: &str) -> Self {
        GroupRecord {
            group_id: group_id.to_string(),
            name: name.to_string(),
            status: GroupStatus::Pending,
            query_text: None,
            result_ids: Vec::new(),
            result_count: 0,
            error: None,
            error_count: 0,
            attempts: 0,
            started_at: None,
            timestamp: None,
            definition_hash: None,
            info: BTreeMap::new(),
        }
    }

    fn require(&self, expected: GroupStatus, action: &'static str) -> Result<(), TransitionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(TransitionError {
                group_id: self.group_id.clone(),
                from: self.status,
                action,
            })
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// `pending → running`, recording the start time.
    pub fn start(&mut self, at: &str) -> Result<(), TransitionError> {
        self.require(GroupStatus::Pending, "start")?;
        self.status = GroupStatus::Running;
        self.started_at = Some(at.to_string());
        Ok(())
    }

    /// Count one query attempt. Only valid while running.
    pub fn note_attempt(&mut self) -> Result<(), TransitionError> {
        self.require(GroupStatus::Running, "attempt")?;
        self.attempts += 1;
        Ok(())
    }

    /// Record a retryable failure; the group stays `running`.
    pub fn note_retryable_error(&mut self, message: &str) -> Result<(), TransitionError> {
        self.require(GroupStatus::Running, "record an error for")?;
        self.error_count += 1;
        self.error = Some(message.to_string());
        Ok(())
    }

    /// `running → done`. Zero results is a valid outcome.
    pub fn complete(
        &mut self,
        query_text: &str,
        result_ids: Vec<String>,
        at: &str,
    ) -> Result<(), TransitionError> {
        self.require(GroupStatus::Running, "complete")?;
        self.status = GroupStatus::Done;
        self.query_text = Some(query_text.to_string());
        self.result_count = result_ids.len();
        self.result_ids = result_ids;
        self.error = None;
        self.timestamp = Some(at.to_string());
        Ok(())
    }

    /// `running → failed`, storing the error summary.
    pub fn fail(
        &mut self,
        error: &str,
        query_text: Option<&str>,
        at: &str,
    ) -> Result<(), TransitionError> {
        self.require(GroupStatus::Running, "fail")?;
        self.status = GroupStatus::Failed;
        if let Some(text) = query_text {
            self.query_text = Some(text.to_string());
        }
        self.result_ids.clear();
        self.result_count = 0;
        self.error = Some(error.to_string());
        self.timestamp = Some(at.to_string());
        Ok(())
    }

    /// Demote a terminal record whose persistence failed. The results are
    /// dropped so the record agrees with the batch tally.
    pub fn mark_unsaved(&mut self, reason: &str, at: &str) {
        let previous = self.error.take();
        self.status = GroupStatus::Failed;
        self.result_ids.clear();
        self.result_count = 0;
        self.error = Some(match previous {
            Some(previous) => format!("not persisted: {}; {}", reason, previous),
            None => format!("not persisted: {}", reason),
        });
        self.timestamp = Some(at.to_string());
    }
}
