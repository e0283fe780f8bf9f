//! Definition providers: where Group Definitions come from.
//!
//! The batch never reads a configuration transport directly. Each source
//! (static JSON file, spreadsheet export, in-memory fixture) implements
//! [`DefinitionProvider`] and yields records already mapped onto
//! [`GroupDefinition`]s, in declaration order.

mod json;
mod static_provider;
mod workbook;

pub use json::JsonFileProvider;
pub use static_provider::StaticProvider;
pub use workbook::{WorkbookProvider, DEFAULT_WORKSHEET};

use std::collections::HashSet;

use commongroups_core::{GroupDefinition, RecordError};

/// Errors raised while loading a set of definitions.
///
/// Any of these aborts the load: the batch never starts on a partial set.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {message}")]
    Json { path: String, message: String },

    #[error("{path} does not match the definitions schema:\n  {}", errors.join("\n  "))]
    Schema { path: String, errors: Vec<String> },

    #[error("cannot read spreadsheet {path}: {message}")]
    Csv { path: String, message: String },

    #[error("worksheet '{worksheet}' not found (available: {})", available.join(", "))]
    UnknownWorksheet {
        worksheet: String,
        available: Vec<String>,
    },

    #[error("source has several worksheets; choose one of: {}", available.join(", "))]
    WorksheetRequired { available: Vec<String> },

    #[error("record {index}: {source}")]
    Record {
        /// 1-based position in the source.
        index: usize,
        #[source]
        source: RecordError,
    },

    #[error("group_id '{group_id}' is defined more than once")]
    DuplicateGroupId { group_id: String },
}

/// A source of Group Definitions.
pub trait DefinitionProvider {
    /// Human-readable description of the source, for logs.
    fn describe(&self) -> String;

    /// Every definition, in declaration order, with unique group ids.
    fn definitions(&self) -> Result<Vec<GroupDefinition>, ProviderError>;
}

/// Map raw records onto definitions, rejecting duplicate ids.
pub(crate) fn from_records<I>(records: I) -> Result<Vec<GroupDefinition>, ProviderError>
where
    I: IntoIterator<Item = serde_json::Map<String, serde_json::Value>>,
{
    let mut seen = HashSet::new();
    let mut definitions = Vec::new();
    for (i, record) in records.into_iter().enumerate() {
        let definition = GroupDefinition::from_record(&record)
            .map_err(|source| ProviderError::Record { index: i + 1, source })?;
        ensure_unique(&mut seen, &definition)?;
        definitions.push(definition);
    }
    Ok(definitions)
}

pub(crate) fn ensure_unique(
    seen: &mut HashSet<String>,
    definition: &GroupDefinition,
) -> Result<(), ProviderError> {
    if !seen.insert(definition.group_id.clone()) {
        return Err(ProviderError::DuplicateGroupId {
            group_id: definition.group_id.clone(),
        });
    }
    Ok(())
}

/// Pick one named subset out of `available`.
///
/// With no selector, a single subset is chosen implicitly.
pub(crate) fn select_worksheet<'a>(
    requested: Option<&str>,
    available: &'a [String],
) -> Result<&'a str, ProviderError> {
    match requested {
        Some(name) => available
            .iter()
            .find(|s| s.as_str() == name)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::UnknownWorksheet {
                worksheet: name.to_string(),
                available: available.to_vec(),
            }),
        None => match available {
            [only] => Ok(only.as_str()),
            _ => Err(ProviderError::WorksheetRequired {
                available: available.to_vec(),
            }),
        },
    }
}
