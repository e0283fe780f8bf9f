//! Batch Controller: resumable resolution of every configured group.
//!
//! Groups are processed one at a time, in declaration order, over one
//! shared connection. A group's failure never aborts the batch; the
//! controller is the only place that decides retry vs. terminal failure.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use commongroups_core::{GroupDefinition, QueryCompiler};
use commongroups_storage::{
    now_rfc3339, GroupRecord, GroupStatus, GroupStore, StorageError, TransitionError,
};
use serde::Serialize;

use crate::executor::{QueryExecutor, StructureConnection};
use crate::resolver::{Attempt, GroupResolver};

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// How existing persisted records are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Discard existing records for the selected groups first.
    CleanStart,
    /// Skip groups already `done`; retry everything else.
    Resume,
    /// Like `Resume`, without expecting prior state.
    #[default]
    Default,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchMode::CleanStart => "clean_start",
            BatchMode::Resume => "resume",
            BatchMode::Default => "default",
        })
    }
}

/// Bounded retry of transport failures, with linearly growing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per group, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Pause after the `attempt`-th failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub mode: BatchMode,
    pub retry: RetryPolicy,
    /// Restrict the run to these group ids.
    pub only: Option<BTreeSet<String>>,
    /// Re-run `done` groups whose definition fingerprint changed.
    pub rerun_changed: bool,
}

// ──────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchTally {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    /// Groups left untouched because they were already `done`.
    pub skipped: usize,
    pub queries_issued: usize,
    pub total_matches: usize,
    pub failed_ids: Vec<String>,
}

impl fmt::Display for BatchTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} groups: {} done ({} skipped), {} failed; {} queries, {} matches",
            self.total,
            self.done,
            self.skipped,
            self.failed,
            self.queries_issued,
            self.total_matches
        )
    }
}

/// Outcome of a batch, for aggregate output.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub mode: BatchMode,
    /// Counts for the groups selected by this run.
    pub tally: BatchTally,
    /// Terminal records of every defined group, including groups an
    /// `only` selection left untouched.
    pub records: Vec<GroupRecord>,
}

#[derive(Debug, thiserror::Error)]
#[error("report generation failed: {message}")]
pub struct ReportError {
    pub message: String,
}

/// Receives the final report once every group has been persisted.
pub trait ReportSink {
    fn write_report(&mut self, report: &BatchReport) -> Result<(), ReportError>;
}

/// A sink that discards the report.
pub struct NoReport;

impl ReportSink for NoReport {
    fn write_report(&mut self, _report: &BatchReport) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Failures that stop a batch as a whole.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("--only names groups that are not defined: {}", ids.join(", "))]
    UnknownGroups { ids: Vec<String> },

    #[error("cannot discard previous records: {0}")]
    Discard(#[source] StorageError),

    #[error("internal state error: {0}")]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

// ──────────────────────────────────────────────
// Controller
// ──────────────────────────────────────────────

pub struct BatchController<'a> {
    resolver: GroupResolver<'a>,
    store: &'a dyn GroupStore,
    options: BatchOptions,
}

impl<'a> BatchController<'a> {
    pub fn new(
        compiler: &'a QueryCompiler,
        executor: QueryExecutor,
        store: &'a dyn GroupStore,
        options: BatchOptions,
    ) -> Self {
        BatchController {
            resolver: GroupResolver::new(compiler, executor),
            store,
            options,
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Run every selected definition to a terminal state, then hand the
    /// report to `sink`.
    pub fn run(
        &self,
        definitions: &[GroupDefinition],
        conn: &mut dyn StructureConnection,
        sink: &mut dyn ReportSink,
    ) -> Result<BatchReport, BatchError> {
        let selected = self.select(definitions)?;
        let mode = self.options.mode;
        tracing::info!(%mode, groups = selected.len(), "batch started");

        if mode == BatchMode::CleanStart {
            let mut removed = 0;
            for definition in &selected {
                if self
                    .store
                    .remove(&definition.group_id)
                    .map_err(BatchError::Discard)?
                {
                    removed += 1;
                }
            }
            tracing::info!(removed, "previous records discarded");
        }

        let mut tally = BatchTally::default();
        let mut records = Vec::with_capacity(selected.len());
        let mut loaded = 0;

        for definition in &selected {
            tally.total += 1;
            let previous = match mode {
                BatchMode::CleanStart => None,
                _ => self.load_previous(&definition.group_id),
            };
            if previous.is_some() {
                loaded += 1;
            }

            let record = match previous {
                Some(record) if self.is_settled(definition, &record) => {
                    tally.skipped += 1;
                    record
                }
                _ => {
                    let mut record = self.resolve(definition, conn)?;
                    tally.queries_issued += record.attempts as usize;
                    if let Err(e) = self.store.save(&record) {
                        tracing::error!(group_id = %record.group_id, error = %e, "record not persisted");
                        record.mark_unsaved(&e.to_string(), &now_rfc3339());
                    }
                    record
                }
            };

            match record.status {
                GroupStatus::Done => {
                    tally.done += 1;
                    tally.total_matches += record.result_count;
                }
                _ => {
                    tally.failed += 1;
                    tally.failed_ids.push(record.group_id.clone());
                }
            }
            records.push(record);
        }

        if mode == BatchMode::Resume && loaded == 0 && !selected.is_empty() {
            tracing::warn!("resume requested but no previous records were found");
        }

        tracing::info!(%tally, "batch finished");
        if !tally.failed_ids.is_empty() {
            tracing::warn!(failed = %tally.failed_ids.join(","), "groups failed");
        }

        let report = BatchReport {
            mode,
            tally,
            records: self.project_records(definitions, records),
        };
        sink.write_report(&report)?;
        Ok(report)
    }

    fn select<'d>(
        &self,
        definitions: &'d [GroupDefinition],
    ) -> Result<Vec<&'d GroupDefinition>, BatchError> {
        let Some(only) = &self.options.only else {
            return Ok(definitions.iter().collect());
        };
        let unknown: Vec<String> = only
            .iter()
            .filter(|id| !definitions.iter().any(|d| &d.group_id == *id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(BatchError::UnknownGroups { ids: unknown });
        }
        Ok(definitions
            .iter()
            .filter(|d| only.contains(&d.group_id))
            .collect())
    }

    /// Every defined group's terminal record, in declaration order: this
    /// run's records plus the stored ones of groups outside the selection.
    fn project_records(
        &self,
        definitions: &[GroupDefinition],
        ran: Vec<GroupRecord>,
    ) -> Vec<GroupRecord> {
        if self.options.only.is_none() {
            return ran;
        }
        let mut ran: BTreeMap<String, GroupRecord> = ran
            .into_iter()
            .map(|r| (r.group_id.clone(), r))
            .collect();
        definitions
            .iter()
            .filter_map(|d| {
                ran.remove(&d.group_id).or_else(|| {
                    self.load_previous(&d.group_id)
                        .filter(|r| r.status.is_terminal())
                })
            })
            .collect()
    }

    /// A stored record, or `None` if absent or unreadable.
    fn load_previous(&self, group_id: &str) -> Option<GroupRecord> {
        match self.store.load(group_id) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%group_id, error = %e, "ignoring unreadable record; group will re-run");
                None
            }
        }
    }

    /// Whether a stored record means the group needs no work this run.
    fn is_settled(&self, definition: &GroupDefinition, record: &GroupRecord) -> bool {
        if record.status != GroupStatus::Done {
            if record.status == GroupStatus::Running {
                tracing::info!(group_id = %record.group_id, "interrupted run found; retrying from scratch");
            }
            return false;
        }
        let changed = record
            .definition_hash
            .as_deref()
            .is_some_and(|hash| hash != definition.fingerprint());
        if !changed {
            tracing::debug!(group_id = %record.group_id, "already done; skipping");
            return true;
        }
        if self.options.rerun_changed {
            tracing::info!(group_id = %record.group_id, "definition changed; re-running");
            false
        } else {
            tracing::warn!(
                group_id = %record.group_id,
                "definition changed since this group was resolved; keeping previous results"
            );
            true
        }
    }

    /// Drive one group to a terminal state, retrying transport failures.
    fn resolve(
        &self,
        definition: &GroupDefinition,
        conn: &mut dyn StructureConnection,
    ) -> Result<GroupRecord, BatchError> {
        let retry = self.options.retry;
        let mut record = self.resolver.begin(definition)?;
        loop {
            match self.resolver.attempt(definition, &mut record, conn)? {
                Attempt::Done | Attempt::Failed => return Ok(record),
                Attempt::Retry(e) if record.attempts >= retry.max_attempts => {
                    self.resolver.give_up(&mut record, &e)?;
                    return Ok(record);
                }
                Attempt::Retry(e) => {
                    let pause = retry.delay_for(record.attempts);
                    tracing::warn!(
                        group_id = %record.group_id,
                        attempt = record.attempts,
                        error = %e,
                        retry_in_ms = pause.as_millis() as u64,
                        "transport failure; retrying"
                    );
                    std::thread::sleep(pause);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
    }

    #[test]
    fn tally_summary_line() {
        let tally = BatchTally {
            total: 2,
            done: 1,
            failed: 1,
            queries_issued: 1,
            total_matches: 2,
            failed_ids: vec!["G2".into()],
            ..BatchTally::default()
        };
        assert_eq!(
            tally.to_string(),
            "2 groups: 1 done (0 skipped), 1 failed; 1 queries, 2 matches"
        );
    }

    #[test]
    fn mode_names() {
        assert_eq!(BatchMode::CleanStart.to_string(), "clean_start");
        assert_eq!(BatchMode::default(), BatchMode::Default);
    }
}
