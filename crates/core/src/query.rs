//! Typed structure-search queries and their SQL rendering.
//!
//! A [`CompiledQuery`] is a SELECT over the compound table whose WHERE
//! clause is a tree of substructure tests. It is rendered twice:
//!
//! - [`CompiledQuery::render`]: parameterized SQL for execution, using the
//!   connection's [`SqlDialect`]; patterns are bound, never spliced.
//! - [`CompiledQuery::to_literal_sql`]: the provenance text stored on the
//!   group record, in PostgreSQL RDKit-cartridge form with quoted literals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pattern::Pattern;

// ──────────────────────────────────────────────
// TableSchema
// ──────────────────────────────────────────────

/// Where compounds live and which columns a query returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    pub table: String,
    /// Stable compound identifier; always projected first.
    pub id_column: String,
    /// Column holding the native structural representation.
    pub mol_column: String,
    pub output_columns: Vec<String>,
}

impl Default for TableSchema {
    fn default() -> Self {
        TableSchema {
            table: "compounds".to_string(),
            id_column: "cid".to_string(),
            mol_column: "molecule".to_string(),
            output_columns: vec!["cid".to_string()],
        }
    }
}

/// A schema identifier that is not a plain SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub field: String,
    pub value: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schema {} '{}' is not a plain SQL identifier",
            self.field, self.value
        )
    }
}

impl std::error::Error for SchemaError {}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl TableSchema {
    /// Reject identifiers that would need quoting (or could inject SQL).
    pub fn validate(&self) -> Result<(), SchemaError> {
        let check = |field: &str, value: &str| {
            if is_identifier(value) {
                Ok(())
            } else {
                Err(SchemaError {
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
        };
        check("table", &self.table)?;
        check("id_column", &self.id_column)?;
        check("mol_column", &self.mol_column)?;
        for column in &self.output_columns {
            check("output column", column)?;
        }
        Ok(())
    }

    /// The id column followed by the other output columns, deduplicated.
    pub fn projection(&self) -> Vec<String> {
        let mut columns = vec![self.id_column.clone()];
        for column in &self.output_columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }
}

// ──────────────────────────────────────────────
// Predicate
// ──────────────────────────────────────────────

/// Boolean combination of substructure tests on the structure column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Predicate {
    /// The compound's structure contains the pattern.
    Contains(Pattern),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn contains(pattern: Pattern) -> Self {
        Predicate::Contains(pattern)
    }

    pub fn excludes(pattern: Pattern) -> Self {
        Predicate::Not(Box::new(Predicate::Contains(pattern)))
    }

    /// Every pattern in the tree, in rendering order.
    pub fn patterns(&self) -> Vec<&Pattern> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a Pattern>) {
        match self {
            Predicate::Contains(p) => out.push(p),
            Predicate::Not(inner) => inner.collect_patterns(out),
            Predicate::All(items) | Predicate::Any(items) => {
                for item in items {
                    item.collect_patterns(out);
                }
            }
        }
    }

    fn render_with(
        &self,
        dialect: &dyn SqlDialect,
        mol_column: &str,
        argument: &mut dyn FnMut(&Pattern) -> String,
    ) -> String {
        match self {
            Predicate::Contains(p) => {
                let arg = argument(p);
                dialect.contains(mol_column, &arg)
            }
            Predicate::Not(inner) => {
                format!("NOT ({})", inner.render_with(dialect, mol_column, argument))
            }
            Predicate::All(items) => join(items, " AND ", dialect, mol_column, argument),
            Predicate::Any(items) => join(items, " OR ", dialect, mol_column, argument),
        }
    }
}

fn join(
    items: &[Predicate],
    separator: &str,
    dialect: &dyn SqlDialect,
    mol_column: &str,
    argument: &mut dyn FnMut(&Pattern) -> String,
) -> String {
    match items {
        [single] => single.render_with(dialect, mol_column, argument),
        _ => items
            .iter()
            .map(|item| match item {
                Predicate::All(_) | Predicate::Any(_) => {
                    format!("({})", item.render_with(dialect, mol_column, argument))
                }
                _ => item.render_with(dialect, mol_column, argument),
            })
            .collect::<Vec<_>>()
            .join(separator),
    }
}

// ──────────────────────────────────────────────
// Dialects
// ──────────────────────────────────────────────

/// How a particular database spells a substructure test and a bind slot.
pub trait SqlDialect {
    /// Name used in logs and provenance.
    fn name(&self) -> &str;

    /// Bind placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// SQL expression that is true when `mol_column` contains `pattern_arg`.
    ///
    /// `pattern_arg` is either a placeholder or a quoted literal.
    fn contains(&self, mol_column: &str, pattern_arg: &str) -> String;
}

/// PostgreSQL with the RDKit cartridge: `molecule @> 'Cl'::qmol`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RdkitCartridge;

impl SqlDialect for RdkitCartridge {
    fn name(&self) -> &str {
        "rdkit"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn contains(&self, mol_column: &str, pattern_arg: &str) -> String {
        format!("{} @> {}::qmol", mol_column, pattern_arg)
    }
}

/// A dialect whose substructure test comes from a configurable template.
///
/// The template must contain `{column}` and `{pattern}`; placeholders are
/// numbered `?1`, `?2`, … (SQLite style).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDialect {
    name: String,
    template: String,
}

/// Default predicate template for SQLite structure-matching extensions.
pub const DEFAULT_SUBSTRUCTURE_TEMPLATE: &str =
    "mol_is_substruct({column}, mol_from_smarts({pattern}))";

impl TemplateDialect {
    /// Build a dialect, checking that both template slots are present.
    pub fn new(name: &str, template: &str) -> Result<Self, String> {
        for slot in ["{column}", "{pattern}"] {
            if !template.contains(slot) {
                return Err(format!(
                    "substructure template '{}' is missing {}",
                    template, slot
                ));
            }
        }
        Ok(TemplateDialect {
            name: name.to_string(),
            template: template.to_string(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for TemplateDialect {
    fn default() -> Self {
        TemplateDialect {
            name: "sqlite".to_string(),
            template: DEFAULT_SUBSTRUCTURE_TEMPLATE.to_string(),
        }
    }
}

impl SqlDialect for TemplateDialect {
    fn name(&self) -> &str {
        &self.name
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn contains(&self, mol_column: &str, pattern_arg: &str) -> String {
        self.template
            .replace("{column}", mol_column)
            .replace("{pattern}", pattern_arg)
    }
}

// ──────────────────────────────────────────────
// CompiledQuery
// ──────────────────────────────────────────────

/// Parameterized SQL ready for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub sql: String,
    /// Pattern strings bound to placeholders 1..=n, in order.
    pub params: Vec<String>,
}

/// An executable structure search for one compound group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    table: String,
    mol_column: String,
    projection: Vec<String>,
    predicate: Predicate,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_doc: Option<String>,
}

impl CompiledQuery {
    /// Build a query over `schema`; the id column is always projected first.
    pub fn select(schema: &TableSchema, predicate: Predicate) -> Self {
        CompiledQuery {
            table: schema.table.clone(),
            mol_column: schema.mol_column.clone(),
            projection: schema.projection(),
            predicate,
            function: None,
            function_doc: None,
        }
    }

    /// Record the named composite function that produced this query.
    pub fn with_function(mut self, name: &str, doc: &str) -> Self {
        self.function = Some(name.to_string());
        self.function_doc = Some(doc.to_string());
        self
    }

    pub fn id_column(&self) -> &str {
        self.projection.first().map(String::as_str).unwrap_or_default()
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn function_doc(&self) -> Option<&str> {
        self.function_doc.as_deref()
    }

    /// Pattern strings in the order they are bound.
    pub fn patterns(&self) -> Vec<&str> {
        self.predicate
            .patterns()
            .into_iter()
            .map(Pattern::as_str)
            .collect()
    }

    fn select_clause(&self, where_clause: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {}",
            self.projection.join(", "),
            self.table,
            where_clause
        )
    }

    /// Parameterized SQL for `dialect`.
    pub fn render(&self, dialect: &dyn SqlDialect) -> RenderedQuery {
        let mut params = Vec::new();
        let where_clause = self
            .predicate
            .render_with(dialect, &self.mol_column, &mut |p: &Pattern| {
                params.push(p.as_str().to_string());
                dialect.placeholder(params.len())
            });
        RenderedQuery {
            sql: self.select_clause(&where_clause),
            params,
        }
    }

    /// Literal query text in RDKit-cartridge SQL, for provenance.
    pub fn to_literal_sql(&self) -> String {
        let where_clause =
            self.predicate
                .render_with(&RdkitCartridge, &self.mol_column, &mut |p: &Pattern| {
                    format!("'{}'", p.as_str().replace('\'', "''"))
                });
        self.select_clause(&where_clause)
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(s: &str) -> Pattern {
        Pattern::parse(s).unwrap()
    }

    #[test]
    fn projection_puts_id_first_and_dedups() {
        let schema = TableSchema {
            output_columns: vec!["inchikey".into(), "cid".into(), "inchikey".into()],
            ..TableSchema::default()
        };
        assert_eq!(schema.projection(), vec!["cid", "inchikey"]);
    }

    #[test]
    fn schema_rejects_non_identifiers() {
        let schema = TableSchema {
            table: "compounds; DROP TABLE x".into(),
            ..TableSchema::default()
        };
        let err = schema.validate().unwrap_err();
        assert_eq!(err.field, "table");
        assert!(TableSchema::default().validate().is_ok());
    }

    #[test]
    fn literal_sql_matches_cartridge_form() {
        let q = CompiledQuery::select(&TableSchema::default(), Predicate::contains(pat("[Cl]")));
        assert_eq!(
            q.to_literal_sql(),
            "SELECT cid FROM compounds WHERE molecule @> '[Cl]'::qmol"
        );
    }

    #[test]
    fn render_binds_patterns_in_order() {
        let q = CompiledQuery::select(
            &TableSchema::default(),
            Predicate::All(vec![
                Predicate::contains(pat("[Hg]")),
                Predicate::excludes(pat("[C,c]~[C,c]")),
            ]),
        );
        let rendered = q.render(&RdkitCartridge);
        assert_eq!(
            rendered.sql,
            "SELECT cid FROM compounds WHERE molecule @> $1::qmol AND NOT (molecule @> $2::qmol)"
        );
        assert_eq!(rendered.params, vec!["[Hg]", "[C,c]~[C,c]"]);
    }

    #[test]
    fn nested_groups_are_parenthesized() {
        let q = CompiledQuery::select(
            &TableSchema::default(),
            Predicate::All(vec![
                Predicate::Any(vec![
                    Predicate::contains(pat("[Br]")),
                    Predicate::contains(pat("[I]")),
                ]),
                Predicate::excludes(pat("c")),
            ]),
        );
        let rendered = q.render(&TemplateDialect::default());
        assert_eq!(
            rendered.sql,
            "SELECT cid FROM compounds WHERE (mol_is_substruct(molecule, mol_from_smarts(?1)) \
             OR mol_is_substruct(molecule, mol_from_smarts(?2))) \
             AND NOT (mol_is_substruct(molecule, mol_from_smarts(?3)))"
        );
    }

    #[test]
    fn template_dialect_requires_both_slots() {
        assert!(TemplateDialect::new("x", "instr({column}, {pattern}) > 0").is_ok());
        assert!(TemplateDialect::new("x", "instr(molecule, {pattern}) > 0").is_err());
    }
}
