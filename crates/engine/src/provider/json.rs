//! Static JSON definition file.
//!
//! The document is either an array of group records or an object mapping
//! worksheet names to arrays. It is validated against the embedded schema
//! before any record is mapped.

use std::path::{Path, PathBuf};

use commongroups_core::GroupDefinition;
use serde_json::Value;

use super::{from_records, select_worksheet, DefinitionProvider, ProviderError};

const DEFINITIONS_SCHEMA: &str = include_str!("../../schema/definitions.schema.json");

pub struct JsonFileProvider {
    path: PathBuf,
    worksheet: Option<String>,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileProvider {
            path: path.into(),
            worksheet: None,
        }
    }

    /// Select a named subset when the file holds several.
    pub fn with_worksheet(mut self, worksheet: Option<String>) -> Self {
        self.worksheet = worksheet;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn validate(&self, doc: &Value) -> Result<(), ProviderError> {
        let schema: Value =
            serde_json::from_str(DEFINITIONS_SCHEMA).map_err(|e| ProviderError::Json {
                path: "<embedded definitions schema>".to_string(),
                message: e.to_string(),
            })?;
        let validator = jsonschema::validator_for(&schema).map_err(|e| ProviderError::Schema {
            path: "<embedded definitions schema>".to_string(),
            errors: vec![e.to_string()],
        })?;
        let errors: Vec<String> = validator
            .iter_errors(doc)
            .map(|e| format!("{}", e))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::Schema {
                path: self.display_path(),
                errors,
            })
        }
    }

    fn sheet<'a>(&self, doc: &'a Value) -> Result<&'a [Value], ProviderError> {
        match doc {
            Value::Array(items) => {
                if let Some(ws) = &self.worksheet {
                    tracing::debug!(worksheet = %ws, "single-list definitions file; worksheet ignored");
                }
                Ok(items)
            }
            Value::Object(sheets) => {
                let available: Vec<String> = sheets.keys().cloned().collect();
                let name = select_worksheet(self.worksheet.as_deref(), &available)?;
                match sheets.get(name) {
                    Some(Value::Array(items)) => Ok(items),
                    _ => Ok(&[][..]),
                }
            }
            _ => Ok(&[][..]),
        }
    }
}

impl DefinitionProvider for JsonFileProvider {
    fn describe(&self) -> String {
        match &self.worksheet {
            Some(ws) => format!("json file {} [{}]", self.display_path(), ws),
            None => format!("json file {}", self.display_path()),
        }
    }

    fn definitions(&self) -> Result<Vec<GroupDefinition>, ProviderError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ProviderError::Io {
            path: self.display_path(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&text).map_err(|e| ProviderError::Json {
            path: self.display_path(),
            message: e.to_string(),
        })?;
        self.validate(&doc)?;

        // Schema validation guarantees every item is an object.
        let records = self
            .sheet(&doc)?
            .iter()
            .filter_map(|item| item.as_object().cloned());
        from_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_a_plain_list_in_order() {
        let file = write_json(
            r#"[
                {"group_id": "G1", "method": "substructure", "structure": "[Cl]", "structure_type": "pattern"},
                {"group_id": "G2", "method": "function", "function_name": "unregistered_fn", "structure": "X"}
            ]"#,
        );
        let defs = JsonFileProvider::new(file.path()).definitions().unwrap();
        let ids: Vec<_> = defs.iter().map(|d| d.group_id.as_str()).collect();
        assert_eq!(ids, vec!["G1", "G2"]);
        assert_eq!(defs[1].function_name.as_deref(), Some("unregistered_fn"));
    }

    #[test]
    fn selects_a_worksheet() {
        let file = write_json(
            r#"{
                "new CMGs": [{"group_id": "N1", "method": "substructure", "structure": "[Br]"}],
                "archive": [{"group_id": "A1"}, {"group_id": "A2"}]
            }"#,
        );
        let provider =
            JsonFileProvider::new(file.path()).with_worksheet(Some("new CMGs".to_string()));
        let defs = provider.definitions().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].group_id, "N1");

        let err = JsonFileProvider::new(file.path()).definitions().unwrap_err();
        assert!(matches!(err, ProviderError::WorksheetRequired { .. }));
    }

    #[test]
    fn schema_violations_are_reported() {
        let file = write_json(r#"[{"group_id": "G1", "method": ["substructure"]}]"#);
        let err = JsonFileProvider::new(file.path()).definitions().unwrap_err();
        match err {
            ProviderError::Schema { errors, .. } => assert!(!errors.is_empty()),
            other => panic!("expected schema error, got {}", other),
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        let file = write_json("[{");
        assert!(matches!(
            JsonFileProvider::new(file.path()).definitions(),
            Err(ProviderError::Json { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            JsonFileProvider::new("/nonexistent/defs.json").definitions(),
            Err(ProviderError::Io { .. })
        ));
    }
}
