//! In-memory definitions, for tests and embedding.

use std::collections::HashSet;

use commongroups_core::{validate_group_id, GroupDefinition};

use super::{ensure_unique, DefinitionProvider, ProviderError};

/// Provider that returns a fixed list of definitions.
pub struct StaticProvider {
    definitions: Vec<GroupDefinition>,
}

impl StaticProvider {
    pub fn new(definitions: Vec<GroupDefinition>) -> Self {
        StaticProvider { definitions }
    }

    /// Build from raw JSON-shaped records, as a configuration source would.
    pub fn from_records(
        records: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Self, ProviderError> {
        Ok(StaticProvider {
            definitions: super::from_records(records)?,
        })
    }
}

impl DefinitionProvider for StaticProvider {
    fn describe(&self) -> String {
        format!("static ({} definitions)", self.definitions.len())
    }

    fn definitions(&self) -> Result<Vec<GroupDefinition>, ProviderError> {
        let mut seen = HashSet::new();
        for (i, definition) in self.definitions.iter().enumerate() {
            validate_group_id(&definition.group_id)
                .map_err(|source| ProviderError::Record { index: i + 1, source })?;
            ensure_unique(&mut seen, definition)?;
        }
        Ok(self.definitions.clone())
    }
}
