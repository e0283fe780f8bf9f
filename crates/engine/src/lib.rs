//! commongroups-engine: resolving compound groups against a structure
//! database.
//!
//! - [`provider`] -- where Group Definitions come from
//! - [`executor`] -- running compiled queries over a [`StructureConnection`]
//! - [`resolver`] -- one group's lifecycle
//! - [`batch`] -- the resumable Batch Controller

pub mod batch;
pub mod executor;
pub mod provider;
pub mod resolver;

pub use batch::{
    BatchController, BatchError, BatchMode, BatchOptions, BatchReport, BatchTally, NoReport,
    ReportError, ReportSink, RetryPolicy,
};
pub use executor::{
    ExecutionError, Molecule, QueryExecutor, ResultSet, SqliteConnection, StructureConnection,
    StructureMatcher, DEFAULT_PAGE_SIZE,
};
pub use provider::{
    DefinitionProvider, JsonFileProvider, ProviderError, StaticProvider, WorkbookProvider,
};
pub use resolver::{Attempt, GroupResolver};
