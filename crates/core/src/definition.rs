//! Group definitions as authored in the configuration source.
//!
//! Fields are kept as the raw strings the author wrote. Interpreting them
//! (enum values, function names, patterns) is the compiler's job, so a bad
//! value fails only its own group instead of the whole load.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One externally authored compound group definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub group_id: String,
    pub name: String,
    /// `substructure` or `function`.
    pub method: String,
    pub structure: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Human-facing metadata. Never consulted by the compiler or the batch.
    #[serde(default)]
    pub info: BTreeMap<String, serde_json::Value>,
}

/// A configuration record that cannot be turned into a definition at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    MissingGroupId,
    InvalidGroupId { group_id: String, reason: String },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::MissingGroupId => write!(f, "record has no group_id"),
            RecordError::InvalidGroupId { group_id, reason } => {
                write!(f, "invalid group_id '{}': {}", group_id, reason)
            }
        }
    }
}

impl std::error::Error for RecordError {}

// ──────────────────────────────────────────────
// Record mapping
// ──────────────────────────────────────────────

/// Map a configuration column name onto a definition field.
///
/// Legacy spreadsheet headings are accepted alongside the current names.
fn canonical_column(column: &str) -> Option<&'static str> {
    match column.trim().to_ascii_lowercase().as_str() {
        "group_id" | "materialid" => Some("group_id"),
        "name" => Some("name"),
        "method" | "searchtype" => Some("method"),
        "structure" | "searchstring" => Some("structure"),
        "structure_type" | "structtype" => Some("structure_type"),
        "function_name" | "function" => Some("function_name"),
        "info" => Some("info"),
        _ => None,
    }
}

fn cell_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

impl GroupDefinition {
    /// Build a definition from one configuration record (column → value).
    ///
    /// Only the `group_id` is checked here, because it is the persistence
    /// key. Unknown columns, and the members of an `info` object, are
    /// collected into `info`.
    pub fn from_record(
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, RecordError> {
        let mut fields: BTreeMap<&'static str, String> = BTreeMap::new();
        let mut info = BTreeMap::new();

        for (column, value) in record {
            match canonical_column(column) {
                Some("info") => match value {
                    serde_json::Value::Object(map) => {
                        for (k, v) in map {
                            info.insert(k.clone(), v.clone());
                        }
                    }
                    serde_json::Value::Null => {}
                    other => {
                        info.insert("info".to_string(), other.clone());
                    }
                },
                Some(field) => {
                    if let Some(text) = cell_text(value) {
                        fields.insert(field, text);
                    }
                }
                None => {
                    if !value.is_null() {
                        info.insert(column.clone(), value.clone());
                    }
                }
            }
        }

        let group_id = fields
            .remove("group_id")
            .ok_or(RecordError::MissingGroupId)?;
        validate_group_id(&group_id)?;

        Ok(GroupDefinition {
            name: fields.remove("name").unwrap_or_else(|| group_id.clone()),
            method: fields.remove("method").unwrap_or_default(),
            structure: fields.remove("structure").unwrap_or_default(),
            structure_type: fields.remove("structure_type"),
            function_name: fields.remove("function_name"),
            group_id,
            info,
        })
    }

    /// SHA-256 over the fields that influence query compilation.
    ///
    /// `name` and `info` are excluded: editing them never invalidates a
    /// completed group.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "method": self.method.trim().to_ascii_lowercase(),
            "structure": self.structure.trim(),
            "structure_type": self.structure_type.as_deref().map(str::trim),
            "function_name": self.function_name.as_deref().map(str::trim),
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        format!("{:x}", digest)
    }
}

/// Check that a group id is usable as a persistence key.
pub fn validate_group_id(group_id: &str) -> Result<(), RecordError> {
    let invalid = |reason: &str| RecordError::InvalidGroupId {
        group_id: group_id.to_string(),
        reason: reason.to_string(),
    };
    if group_id.is_empty() {
        return Err(invalid("empty"));
    }
    if group_id.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if let Some(c) = group_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(&format!("character {:?} is not allowed", c)));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Enumerations
// ──────────────────────────────────────────────

/// How a group's membership is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Substructure,
    Function,
}

impl SearchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMethod::Substructure => "substructure",
            SearchMethod::Function => "function",
        }
    }
}

impl FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substructure" => Ok(SearchMethod::Substructure),
            "function" => Ok(SearchMethod::Function),
            other => Err(other.to_string()),
        }
    }
}

/// Notation a structure string is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    /// Query notation; the only form the matching engine consumes.
    Smarts,
    /// Line notation for concrete molecules.
    Smiles,
    Inchi,
}

impl StructureType {
    pub fn as_str(self) -> &'static str {
        match self {
            StructureType::Smarts => "smarts",
            StructureType::Smiles => "smiles",
            StructureType::Inchi => "inchi",
        }
    }
}

impl FromStr for StructureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smarts" | "pattern" => Ok(StructureType::Smarts),
            "smiles" | "line" => Ok(StructureType::Smiles),
            "inchi" => Ok(StructureType::Inchi),
            other => Err(other.to_string()),
        }
    }
}
