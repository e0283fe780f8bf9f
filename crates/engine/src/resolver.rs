//! Group Resolver: one group's path from definition to terminal record.
//!
//! The resolver owns the `pending → running → {done, failed}` transitions
//! for a single [`GroupRecord`]. It never retries and never persists: a
//! retryable failure comes back as [`Attempt::Retry`] so the batch can
//! decide, and the batch writes the record once it is terminal.

use commongroups_core::{CompiledQuery, GroupDefinition, QueryCompiler};
use commongroups_storage::{now_rfc3339, GroupRecord, TransitionError};
use serde_json::json;

use crate::executor::{ExecutionError, QueryExecutor, ResultSet, StructureConnection};

/// Outcome of one compile + execute attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Done,
    Failed,
    /// Transport failure; the record is still `running`.
    Retry(ExecutionError),
}

pub struct GroupResolver<'a> {
    compiler: &'a QueryCompiler,
    executor: QueryExecutor,
}

impl<'a> GroupResolver<'a> {
    pub fn new(compiler: &'a QueryCompiler, executor: QueryExecutor) -> Self {
        GroupResolver { compiler, executor }
    }

    /// A fresh `running` record for `definition`.
    pub fn begin(&self, definition: &GroupDefinition) -> Result<GroupRecord, TransitionError> {
        let mut record = GroupRecord::new(&definition.group_id, &definition.name);
        record.start(&now_rfc3339())?;
        record.definition_hash = Some(definition.fingerprint());
        record.info = definition.info.clone();
        record
            .info
            .insert("method".to_string(), json!(definition.method.trim()));
        tracing::info!(group_id = %definition.group_id, "group started");
        Ok(record)
    }

    /// Compile and execute once, moving `record` to a terminal state unless
    /// the failure is retryable.
    pub fn attempt(
        &self,
        definition: &GroupDefinition,
        record: &mut GroupRecord,
        conn: &mut dyn StructureConnection,
    ) -> Result<Attempt, TransitionError> {
        let query = match self.compiler.compile(definition) {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(group_id = %record.group_id, error = %e, "definition rejected");
                record.fail(&format!("invalid definition: {}", e), None, &now_rfc3339())?;
                return Ok(Attempt::Failed);
            }
        };
        let query_text = query.to_literal_sql();

        record.note_attempt()?;
        match self.executor.execute(&query, conn) {
            Ok(result) => {
                annotate(record, &query, &query_text, &result);
                record.complete(&query_text, result.ids, &now_rfc3339())?;
                tracing::info!(
                    group_id = %record.group_id,
                    result_count = record.result_count,
                    attempts = record.attempts,
                    "group done"
                );
                Ok(Attempt::Done)
            }
            Err(e) if e.is_retryable() => {
                record.note_retryable_error(&e.to_string())?;
                Ok(Attempt::Retry(e))
            }
            Err(e) => {
                tracing::error!(
                    group_id = %record.group_id,
                    query = %query_text,
                    error = %e,
                    "query failed"
                );
                annotate_query(record, &query, &query_text);
                record.fail(&e.to_string(), Some(&query_text), &now_rfc3339())?;
                Ok(Attempt::Failed)
            }
        }
    }

    /// Demote a group whose retries are exhausted.
    pub fn give_up(
        &self,
        record: &mut GroupRecord,
        last_error: &ExecutionError,
    ) -> Result<(), TransitionError> {
        let message = format!(
            "gave up after {} attempt(s): {}",
            record.attempts, last_error
        );
        tracing::error!(group_id = %record.group_id, error = %message, "group failed");
        record
            .info
            .insert("attempts".to_string(), json!(record.attempts));
        record.fail(&message, None, &now_rfc3339())
    }
}

fn annotate_query(record: &mut GroupRecord, query: &CompiledQuery, query_text: &str) {
    record
        .info
        .insert("query_text".to_string(), json!(query_text));
    if let Some(function) = query.function() {
        record.info.insert("function".to_string(), json!(function));
    }
    if let Some(doc) = query.function_doc() {
        record.info.insert("function_doc".to_string(), json!(doc));
    }
    record
        .info
        .insert("attempts".to_string(), json!(record.attempts));
}

fn annotate(record: &mut GroupRecord, query: &CompiledQuery, query_text: &str, result: &ResultSet) {
    annotate_query(record, query, query_text);
    record
        .info
        .insert("result_count".to_string(), json!(result.len()));
    record
        .info
        .insert("duplicate_rows".to_string(), json!(result.duplicates));
}
