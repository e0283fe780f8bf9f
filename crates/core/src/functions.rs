//! Registry of named composite query builders.
//!
//! Some groups cannot be expressed as a single substructure test ("contains
//! mercury but no carbon–carbon bond"). Those definitions use
//! `method = function` and name one of the builders below. The registry is
//! a closed, static table: a name that is not listed here is a compile
//! error for that group.

use crate::pattern::{parse_list, Pattern};
use crate::query::{Predicate, TableSchema};

/// Builds a predicate from the definition's raw `structure` string.
///
/// Receives the target schema so a builder can inspect the structure and
/// output columns it will be projected over.
pub type BuildFn = fn(structure: &str, schema: &TableSchema) -> Result<Predicate, String>;

/// A registered composite query builder.
#[derive(Debug, Clone, Copy)]
pub struct CompositeFunction {
    pub name: &'static str,
    /// Copied into the group record for auditability.
    pub doc: &'static str,
    build: BuildFn,
}

impl CompositeFunction {
    pub fn build(&self, structure: &str, schema: &TableSchema) -> Result<Predicate, String> {
        (self.build)(structure, schema)
    }
}

/// SMARTS for carbon–carbon bonds and carbon–hydrogen bonds.
const ORGANIC_MARKERS: [&str; 2] = ["[C,c]~[C,c]", "[C!H0,c!H0]"];

static REGISTRY: &[CompositeFunction] = &[
    CompositeFunction {
        name: "substruct_exclude",
        doc: "Match the first substructure and exclude every following substructure.",
        build: substruct_exclude,
    },
    CompositeFunction {
        name: "element_inorganic",
        doc: "Match compounds containing an element, excluding any compound \
              with a C-C or C-H bond.",
        build: element_inorganic,
    },
    CompositeFunction {
        name: "any_substruct",
        doc: "Match compounds containing at least one of the substructures.",
        build: any_substruct,
    },
    CompositeFunction {
        name: "all_substruct",
        doc: "Match compounds containing every one of the substructures.",
        build: all_substruct,
    },
];

/// Look up a builder by exact name.
pub fn lookup(name: &str) -> Option<&'static CompositeFunction> {
    REGISTRY.iter().find(|f| f.name == name)
}

/// Names of every registered builder, in registry order.
pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|f| f.name).collect()
}

fn patterns(structure: &str, min: usize) -> Result<Vec<Pattern>, String> {
    let list = parse_list(structure).map_err(|e| e.to_string())?;
    if list.len() < min {
        return Err(format!(
            "expected at least {} whitespace-separated SMARTS pattern(s), got {}",
            min,
            list.len()
        ));
    }
    Ok(list)
}

fn substruct_exclude(structure: &str, _schema: &TableSchema) -> Result<Predicate, String> {
    let mut list = patterns(structure, 2)?.into_iter();
    let mut clauses = Vec::new();
    if let Some(first) = list.next() {
        clauses.push(Predicate::contains(first));
    }
    clauses.extend(list.map(Predicate::excludes));
    Ok(Predicate::All(clauses))
}

fn element_inorganic(structure: &str, _schema: &TableSchema) -> Result<Predicate, String> {
    let list = patterns(structure, 1)?;
    if list.len() != 1 {
        return Err(format!(
            "expected exactly one element pattern, got {}",
            list.len()
        ));
    }
    let mut clauses: Vec<Predicate> = list.into_iter().map(Predicate::contains).collect();
    for marker in ORGANIC_MARKERS {
        let pattern = Pattern::parse(marker).map_err(|e| e.to_string())?;
        clauses.push(Predicate::excludes(pattern));
    }
    Ok(Predicate::All(clauses))
}

fn any_substruct(structure: &str, _schema: &TableSchema) -> Result<Predicate, String> {
    let list = patterns(structure, 1)?;
    Ok(Predicate::Any(
        list.into_iter().map(Predicate::contains).collect(),
    ))
}

fn all_substruct(structure: &str, _schema: &TableSchema) -> Result<Predicate, String> {
    let list = patterns(structure, 1)?;
    Ok(Predicate::All(
        list.into_iter().map(Predicate::contains).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CompiledQuery, RdkitCartridge};

    fn render(name: &str, structure: &str) -> Result<String, String> {
        let schema = TableSchema::default();
        let predicate = lookup(name).unwrap().build(structure, &schema)?;
        Ok(CompiledQuery::select(&schema, predicate).to_literal_sql())
    }

    #[test]
    fn registry_names_are_unique() {
        let mut all = names();
        let len = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), len);
    }

    #[test]
    fn unknown_name_is_absent() {
        assert!(lookup("unregistered_fn").is_none());
        assert!(lookup("SUBSTRUCT_EXCLUDE").is_none());
    }

    #[test]
    fn substruct_exclude_negates_the_tail() {
        assert_eq!(
            render("substruct_exclude", "[Sn] [Sn]C").unwrap(),
            "SELECT cid FROM compounds WHERE molecule @> '[Sn]'::qmol \
             AND NOT (molecule @> '[Sn]C'::qmol)"
        );
    }

    #[test]
    fn substruct_exclude_needs_two_patterns() {
        assert!(render("substruct_exclude", "[Sn]").is_err());
    }

    #[test]
    fn element_inorganic_excludes_organic_bonds() {
        let sql = render("element_inorganic", "[Hg]").unwrap();
        assert_eq!(
            sql,
            "SELECT cid FROM compounds WHERE molecule @> '[Hg]'::qmol \
             AND NOT (molecule @> '[C,c]~[C,c]'::qmol) \
             AND NOT (molecule @> '[C!H0,c!H0]'::qmol)"
        );
        assert!(render("element_inorganic", "[Hg] [Pb]").is_err());
    }

    #[test]
    fn any_substruct_single_pattern_is_a_plain_test() {
        assert_eq!(
            render("any_substruct", "[Br]").unwrap(),
            "SELECT cid FROM compounds WHERE molecule @> '[Br]'::qmol"
        );
    }

    #[test]
    fn builders_reject_malformed_patterns() {
        let err = render("all_substruct", "[Cl [Br]").unwrap_err();
        assert!(err.contains("never closed"), "{}", err);
    }
}
