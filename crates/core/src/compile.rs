//! Group definition → structure-search query.
//!
//! [`QueryCompiler::compile`] is pure and total over valid definitions: it
//! never touches a database and returns a [`CompileError`] for anything it
//! can detect statically (bad enum value, missing conditional field,
//! unregistered function name, malformed pattern, notation mismatch).

use std::fmt;

use crate::definition::{GroupDefinition, SearchMethod, StructureType};
use crate::functions;
use crate::pattern::{Pattern, PatternError};
use crate::query::{CompiledQuery, Predicate, SchemaError, TableSchema};

/// A definition-level validation failure. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    MissingField {
        field: &'static str,
    },
    InvalidMethod {
        value: String,
    },
    InvalidStructureType {
        value: String,
    },
    MissingFunctionName,
    UnknownFunction {
        name: String,
        known: Vec<&'static str>,
    },
    /// The notation is valid but the matching engine does not consume it.
    UnsupportedStructureType {
        structure_type: StructureType,
    },
    MalformedPattern {
        pattern: String,
        source: PatternError,
    },
    FunctionArguments {
        function: String,
        message: String,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::MissingField { field } => {
                write!(f, "definition is missing required field '{}'", field)
            }
            CompileError::InvalidMethod { value } => write!(
                f,
                "invalid method '{}' (expected 'substructure' or 'function')",
                value
            ),
            CompileError::InvalidStructureType { value } => write!(
                f,
                "invalid structure_type '{}' (expected smarts, smiles or inchi)",
                value
            ),
            CompileError::MissingFunctionName => {
                write!(f, "method 'function' requires a function_name")
            }
            CompileError::UnknownFunction { name, known } => write!(
                f,
                "function '{}' is not registered (known: {})",
                name,
                known.join(", ")
            ),
            CompileError::UnsupportedStructureType { structure_type } => write!(
                f,
                "structure_type '{}' cannot be matched directly; supply a SMARTS pattern \
                 (notation is never converted automatically)",
                structure_type.as_str()
            ),
            CompileError::MalformedPattern { pattern, source } => {
                write!(f, "malformed pattern '{}': {}", pattern, source)
            }
            CompileError::FunctionArguments { function, message } => {
                write!(f, "bad arguments for function '{}': {}", function, message)
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::MalformedPattern { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Compiles group definitions against one compound table schema.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    schema: TableSchema,
}

impl QueryCompiler {
    pub fn new(schema: TableSchema) -> Result<Self, SchemaError> {
        schema.validate()?;
        Ok(QueryCompiler { schema })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Compile one definition into an executable query.
    pub fn compile(&self, definition: &GroupDefinition) -> Result<CompiledQuery, CompileError> {
        let method = required(&definition.method, "method")?;
        let method: SearchMethod = method
            .parse()
            .map_err(|value| CompileError::InvalidMethod { value })?;
        let structure_type = definition
            .structure_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<StructureType>()
                    .map_err(|value| CompileError::InvalidStructureType { value })
            })
            .transpose()?;

        match method {
            SearchMethod::Substructure => {
                let structure_type = structure_type.ok_or(CompileError::MissingField {
                    field: "structure_type",
                })?;
                require_smarts(structure_type)?;
                let structure = required(&definition.structure, "structure")?;
                let pattern =
                    Pattern::parse(structure).map_err(|source| CompileError::MalformedPattern {
                        pattern: structure.to_string(),
                        source,
                    })?;
                Ok(CompiledQuery::select(
                    &self.schema,
                    Predicate::contains(pattern),
                ))
            }
            SearchMethod::Function => {
                let name = definition
                    .function_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or(CompileError::MissingFunctionName)?;
                let function =
                    functions::lookup(name).ok_or_else(|| CompileError::UnknownFunction {
                        name: name.to_string(),
                        known: functions::names(),
                    })?;
                // Composite builders combine SMARTS patterns only.
                if let Some(structure_type) = structure_type {
                    require_smarts(structure_type)?;
                }
                let structure = required(&definition.structure, "structure")?;
                let predicate = function.build(structure, &self.schema).map_err(|message| {
                    CompileError::FunctionArguments {
                        function: name.to_string(),
                        message,
                    }
                })?;
                Ok(CompiledQuery::select(&self.schema, predicate)
                    .with_function(function.name, function.doc))
            }
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, CompileError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CompileError::MissingField { field })
    } else {
        Ok(trimmed)
    }
}

fn require_smarts(structure_type: StructureType) -> Result<(), CompileError> {
    match structure_type {
        StructureType::Smarts => Ok(()),
        other => Err(CompileError::UnsupportedStructureType {
            structure_type: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn compiler() -> QueryCompiler {
        QueryCompiler::new(TableSchema::default()).unwrap()
    }

    fn substructure(structure: &str, structure_type: &str) -> GroupDefinition {
        GroupDefinition {
            group_id: "G1".to_string(),
            name: "G1".to_string(),
            method: "substructure".to_string(),
            structure: structure.to_string(),
            structure_type: Some(structure_type.to_string()),
            function_name: None,
            info: BTreeMap::new(),
        }
    }

    fn function(name: &str, structure: &str) -> GroupDefinition {
        GroupDefinition {
            group_id: "G2".to_string(),
            name: "G2".to_string(),
            method: "function".to_string(),
            structure: structure.to_string(),
            structure_type: None,
            function_name: Some(name.to_string()),
            info: BTreeMap::new(),
        }
    }

    #[test]
    fn substructure_uses_the_pattern_verbatim() {
        let query = compiler().compile(&substructure("[Cl]", "pattern")).unwrap();
        assert_eq!(query.id_column(), "cid");
        assert_eq!(query.patterns(), vec!["[Cl]"]);
        assert_eq!(query.function(), None);
    }

    #[test]
    fn substructure_requires_structure_type() {
        let mut def = substructure("[Cl]", "smarts");
        def.structure_type = None;
        assert_eq!(
            compiler().compile(&def),
            Err(CompileError::MissingField {
                field: "structure_type"
            })
        );
    }

    #[test]
    fn line_notation_is_not_silently_reinterpreted() {
        let err = compiler().compile(&substructure("ClC", "smiles")).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedStructureType {
                structure_type: StructureType::Smiles
            }
        );
    }

    #[test]
    fn invalid_enum_values_are_validation_errors() {
        let err = compiler().compile(&substructure("[Cl]", "mol2")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidStructureType { .. }));

        let mut def = substructure("[Cl]", "smarts");
        def.method = "similarity".to_string();
        assert!(matches!(
            compiler().compile(&def),
            Err(CompileError::InvalidMethod { .. })
        ));
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let err = compiler().compile(&substructure("[Cl", "smarts")).unwrap_err();
        assert!(matches!(err, CompileError::MalformedPattern { .. }));
    }

    #[test]
    fn unregistered_function_is_rejected() {
        let err = compiler()
            .compile(&function("unregistered_fn", "X"))
            .unwrap_err();
        match err {
            CompileError::UnknownFunction { name, known } => {
                assert_eq!(name, "unregistered_fn");
                assert!(known.contains(&"substruct_exclude"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn function_requires_a_name() {
        let mut def = function("", "[Hg]");
        def.function_name = None;
        assert_eq!(
            compiler().compile(&def),
            Err(CompileError::MissingFunctionName)
        );
    }

    #[test]
    fn registered_function_carries_its_documentation() {
        let query = compiler()
            .compile(&function("element_inorganic", "[Hg]"))
            .unwrap();
        assert_eq!(query.function(), Some("element_inorganic"));
        assert!(query.function_doc().unwrap().contains("C-C"));
        assert_eq!(query.patterns()[0], "[Hg]");
        assert_eq!(query.projection()[0], "cid");
    }

    #[test]
    fn info_never_changes_the_query() {
        let plain = substructure("[Cl]", "smarts");
        let mut annotated = plain.clone();
        annotated
            .info
            .insert("method".to_string(), serde_json::json!("function"));
        annotated
            .info
            .insert("structure".to_string(), serde_json::json!("[Br]"));
        assert_eq!(
            compiler().compile(&plain).unwrap(),
            compiler().compile(&annotated).unwrap()
        );
    }
}
