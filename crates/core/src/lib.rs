//! commongroups-core: compound group definitions and their compilation to
//! structure-search queries.
//!
//! Nothing in this crate performs I/O. A [`GroupDefinition`] is compiled by
//! a [`QueryCompiler`] into a [`CompiledQuery`], which renders to
//! parameterized SQL for a given [`SqlDialect`] and to literal
//! cartridge-style SQL for provenance.
//!
//! # Public API
//!
//! - [`GroupDefinition`] / [`RecordError`] -- configuration records
//! - [`QueryCompiler`] / [`CompileError`] -- definition → query
//! - [`CompiledQuery`], [`Predicate`], [`TableSchema`] -- the query model
//! - [`functions`] -- the closed registry of composite query builders

pub mod compile;
pub mod definition;
pub mod functions;
pub mod pattern;
pub mod query;

// ── Convenience re-exports ───────────────────────────────────────────

pub use compile::{CompileError, QueryCompiler};
pub use definition::{
    validate_group_id, GroupDefinition, RecordError, SearchMethod, StructureType,
};
pub use functions::CompositeFunction;
pub use pattern::{Pattern, PatternError};
pub use query::{
    CompiledQuery, Predicate, RdkitCartridge, RenderedQuery, SchemaError, SqlDialect,
    TableSchema, TemplateDialect, DEFAULT_SUBSTRUCTURE_TEMPLATE,
};
