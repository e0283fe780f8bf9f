//! SQLite structure connection.
//!
//! The structure-match primitive is supplied either by a loadable SQLite
//! extension or by an in-process [`StructureMatcher`] registered as the SQL
//! functions `mol_is_substruct(molecule, query)` and `mol_from_smarts(text)`.

use std::panic::RefUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use commongroups_core::{RenderedQuery, SqlDialect, TemplateDialect};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};

use super::{ExecutionError, StructureConnection};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A structure-column value as stored: a line notation or a binary
/// molecule in the matcher's native format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Molecule<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// In-process implementation of the structure-match primitive.
pub trait StructureMatcher: Send + Sync + RefUnwindSafe {
    /// Reject a query pattern the matcher cannot interpret.
    fn check_query(&self, smarts: &str) -> Result<(), String>;

    /// Whether `molecule` (as stored in the structure column) contains `query`.
    fn is_substruct(&self, molecule: Molecule<'_>, query: &str) -> Result<bool, String>;
}

/// A single SQLite database session.
pub struct SqliteConnection {
    conn: Connection,
    dialect: TemplateDialect,
}

/// Map a SQLite failure onto the retryable/fatal split.
pub(crate) fn classify(err: rusqlite::Error) -> ExecutionError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::CannotOpen
            | ErrorCode::OperationInterrupted => ExecutionError::transport(err.to_string()),
            _ => ExecutionError::semantic(err.to_string()),
        },
        _ => ExecutionError::semantic(err.to_string()),
    }
}

impl SqliteConnection {
    /// Open an existing database file read-only.
    pub fn open(path: &Path) -> Result<Self, ExecutionError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        // A missing database file will not appear on retry.
        .map_err(|e| ExecutionError::semantic(format!("cannot open {}: {}", path.display(), e)))?;
        Self::from_connection(conn)
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Result<Self, ExecutionError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(classify)?;
        Ok(SqliteConnection {
            conn,
            dialect: TemplateDialect::default(),
        })
    }

    /// Use a different substructure predicate template.
    pub fn with_dialect(mut self, dialect: TemplateDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Load a SQLite extension providing the structure-match functions.
    pub fn load_extension(&self, path: &Path) -> Result<(), ExecutionError> {
        // SAFETY: the extension path comes from the operator's configuration;
        // loading is re-disabled when the guard drops.
        unsafe {
            let _guard = rusqlite::LoadExtensionGuard::new(&self.conn).map_err(classify)?;
            self.conn
                .load_extension(path, None::<&str>)
                .map_err(|e| {
                    ExecutionError::semantic(format!(
                        "cannot load extension {}: {}",
                        path.display(),
                        e
                    ))
                })?;
        }
        tracing::info!(extension = %path.display(), "structure extension loaded");
        Ok(())
    }

    /// Register `matcher` as `mol_is_substruct` / `mol_from_smarts`.
    pub fn register_matcher(&self, matcher: Arc<dyn StructureMatcher>) -> Result<(), ExecutionError> {
        let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

        let m = Arc::clone(&matcher);
        self.conn
            .create_scalar_function("mol_from_smarts", 1, flags, move |ctx| {
                let smarts: String = ctx.get(0)?;
                m.check_query(&smarts)
                    .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
                Ok(smarts)
            })
            .map_err(classify)?;

        let m = matcher;
        self.conn
            .create_scalar_function("mol_is_substruct", 2, flags, move |ctx| {
                let query: String = ctx.get(1)?;
                let molecule = match ctx.get_raw(0) {
                    ValueRef::Null => return Ok(false),
                    ValueRef::Blob(bytes) => Molecule::Binary(bytes),
                    ValueRef::Text(bytes) => Molecule::Text(
                        std::str::from_utf8(bytes)
                            .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?,
                    ),
                    ValueRef::Integer(_) | ValueRef::Real(_) => {
                        return Err(rusqlite::Error::UserFunctionError(
                            "structure column holds a number, not a molecule".into(),
                        ))
                    }
                };
                m.is_substruct(molecule, &query)
                    .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))
            })
            .map_err(classify)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn id_text(value: ValueRef<'_>) -> Result<String, ExecutionError> {
    match value {
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(f) => Ok(f.to_string()),
        ValueRef::Text(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Null => Err(ExecutionError::semantic(
            "query returned a NULL compound id",
        )),
        ValueRef::Blob(_) => Err(ExecutionError::semantic(
            "query returned a binary compound id",
        )),
    }
}

impl StructureConnection for SqliteConnection {
    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    fn stream(
        &mut self,
        query: &RenderedQuery,
        page_size: usize,
        on_page: &mut dyn FnMut(Vec<String>) -> Result<(), ExecutionError>,
    ) -> Result<(), ExecutionError> {
        let mut stmt = self.conn.prepare(&query.sql).map_err(classify)?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(query.params.iter()))
            .map_err(classify)?;

        let mut page = Vec::with_capacity(page_size);
        while let Some(row) = rows.next().map_err(classify)? {
            page.push(id_text(row.get_ref(0).map_err(classify)?)?);
            if page.len() >= page_size {
                on_page(std::mem::replace(&mut page, Vec::with_capacity(page_size)))?;
            }
        }
        if !page.is_empty() {
            on_page(page)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryExecutor;
    use commongroups_core::{CompiledQuery, Pattern, Predicate, TableSchema};

    /// Treats bracketed element symbols as "contains this substring".
    struct SymbolMatcher;

    impl StructureMatcher for SymbolMatcher {
        fn check_query(&self, smarts: &str) -> Result<(), String> {
            if smarts.contains('!') {
                Err(format!("unsupported query '{}'", smarts))
            } else {
                Ok(())
            }
        }

        fn is_substruct(&self, molecule: Molecule<'_>, query: &str) -> Result<bool, String> {
            let symbol = query.trim_matches(|c| c == '[' || c == ']');
            Ok(match molecule {
                Molecule::Text(text) => text.contains(symbol),
                Molecule::Binary(bytes) => String::from_utf8_lossy(bytes).contains(symbol),
            })
        }
    }

    fn fixture() -> SqliteConnection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE compounds (cid INTEGER PRIMARY KEY, molecule TEXT);
             INSERT INTO compounds VALUES (1, 'ClCCl'), (2, 'CCO'), (3, 'Cl[Hg]Cl'), (4, NULL);",
        )
        .unwrap();
        let sqlite = SqliteConnection::from_connection(conn).unwrap();
        sqlite.register_matcher(Arc::new(SymbolMatcher)).unwrap();
        sqlite
    }

    fn query(pattern: &str) -> CompiledQuery {
        CompiledQuery::select(
            &TableSchema::default(),
            Predicate::contains(Pattern::parse(pattern).unwrap()),
        )
    }

    #[test]
    fn registered_matcher_drives_the_search() {
        let mut conn = fixture();
        let result = QueryExecutor::new(1).execute(&query("[Cl]"), &mut conn).unwrap();
        assert_eq!(result.ids, vec!["1", "3"]);
        assert_eq!(result.pages, 2);
    }

    #[test]
    fn negation_uses_the_same_functions() {
        let mut conn = fixture();
        let q = CompiledQuery::select(
            &TableSchema::default(),
            Predicate::All(vec![
                Predicate::contains(Pattern::parse("[Cl]").unwrap()),
                Predicate::excludes(Pattern::parse("[Hg]").unwrap()),
            ]),
        );
        let result = QueryExecutor::default().execute(&q, &mut conn).unwrap();
        assert_eq!(result.ids, vec!["1"]);
    }

    #[test]
    fn matcher_rejection_is_semantic() {
        let mut conn = fixture();
        let err = QueryExecutor::default()
            .execute(&query("[C!H0]"), &mut conn)
            .unwrap_err();
        assert!(!err.is_retryable(), "{}", err);
    }

    #[test]
    fn unknown_column_is_semantic() {
        let mut conn = fixture();
        let schema = TableSchema {
            mol_column: "mol".to_string(),
            ..TableSchema::default()
        };
        let q = CompiledQuery::select(&schema, Predicate::contains(Pattern::parse("[Cl]").unwrap()));
        let err = QueryExecutor::default().execute(&q, &mut conn).unwrap_err();
        assert!(matches!(err, ExecutionError::Semantic { .. }));
    }

    #[test]
    fn binary_structure_column_reaches_the_matcher() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE compounds (cid INTEGER PRIMARY KEY, molecule BLOB);
             INSERT INTO compounds VALUES (1, X'436C4343'), (2, X'43434F'), (3, NULL);",
        )
        .unwrap();
        let mut conn = SqliteConnection::from_connection(conn).unwrap();
        conn.register_matcher(Arc::new(SymbolMatcher)).unwrap();
        let result = QueryExecutor::default().execute(&query("[Cl]"), &mut conn).unwrap();
        assert_eq!(result.ids, vec!["1"]);
    }

    #[test]
    fn null_ids_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE compounds (cid TEXT, molecule TEXT);
             INSERT INTO compounds VALUES (NULL, 'Cl');",
        )
        .unwrap();
        let mut conn = SqliteConnection::from_connection(conn)
            .unwrap()
            .with_dialect(TemplateDialect::new("instr", "instr({column}, {pattern}) > 0").unwrap());
        let err = QueryExecutor::default()
            .execute(&query("Cl"), &mut conn)
            .unwrap_err();
        assert_eq!(err, ExecutionError::semantic("query returned a NULL compound id"));
    }

    #[test]
    fn missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sqlite");
        assert!(SqliteConnection::open(&path).is_err());
        assert!(!path.exists());
    }
}
