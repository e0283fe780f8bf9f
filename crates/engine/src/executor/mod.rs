//! Query Executor: runs one compiled query against a structure connection.
//!
//! The executor runs a query exactly once per call. Retrying is a batch
//! policy, so a transport failure is returned to the caller classified as
//! retryable rather than retried here.

mod sqlite;

pub use sqlite::{Molecule, SqliteConnection, StructureMatcher};

use std::collections::HashSet;

use commongroups_core::{CompiledQuery, RenderedQuery, SqlDialect};

/// Default number of rows fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Failure of a single query attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Connection lost, busy, timed out. Worth retrying.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The database rejected the query itself. Retrying would reproduce it.
    #[error("query failed: {message}")]
    Semantic { message: String },
}

impl ExecutionError {
    pub fn transport(message: impl Into<String>) -> Self {
        ExecutionError::Transport {
            message: message.into(),
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        ExecutionError::Semantic {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionError::Transport { .. })
    }
}

/// A database session able to evaluate structure-search SQL.
///
/// Exactly one query is in flight per connection at a time.
pub trait StructureConnection {
    /// The dialect queries must be rendered in for this connection.
    fn dialect(&self) -> &dyn SqlDialect;

    /// Run `query`, delivering the first projected column of each row as a
    /// compound id, `page_size` rows at a time.
    ///
    /// A page callback error aborts the stream and is returned unchanged.
    fn stream(
        &mut self,
        query: &RenderedQuery,
        page_size: usize,
        on_page: &mut dyn FnMut(Vec<String>) -> Result<(), ExecutionError>,
    ) -> Result<(), ExecutionError>;
}

/// Compound ids matched by one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Deduplicated, in database return order.
    pub ids: Vec<String>,
    /// Rows returned before deduplication.
    pub rows: usize,
    pub duplicates: usize,
    pub pages: usize,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    page_size: usize,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        QueryExecutor {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryExecutor {
    pub fn new(page_size: usize) -> Self {
        QueryExecutor {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Execute `query` once. An empty result is a valid outcome.
    pub fn execute(
        &self,
        query: &CompiledQuery,
        conn: &mut dyn StructureConnection,
    ) -> Result<ResultSet, ExecutionError> {
        let rendered = query.render(conn.dialect());
        tracing::debug!(sql = %rendered.sql, params = ?rendered.params, "executing structure query");

        let mut seen = HashSet::new();
        let mut result = ResultSet::default();
        conn.stream(&rendered, self.page_size, &mut |page| {
            result.pages += 1;
            result.rows += page.len();
            for id in page {
                if seen.insert(id.clone()) {
                    result.ids.push(id);
                } else {
                    result.duplicates += 1;
                }
            }
            tracing::trace!(page = result.pages, rows = result.rows, "page received");
            Ok(())
        })?;
        Ok(result)
    }
}
