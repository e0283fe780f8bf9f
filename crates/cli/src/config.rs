//! Project configuration for `commongroups`.
//!
//! Loaded from `--config <file>` or, when that flag is absent, from
//! `<home>/commongroups.toml` if it exists. Every section is optional and
//! falls back to built-in defaults. Relative paths are resolved against the
//! directory holding the configuration file.
//!
//! # Example
//!
//! ```toml
//! [database]
//! path = "compounds.sqlite"
//! extension = "/usr/lib/chemicalite.so"
//! substructure_sql = "mol_is_substruct({column}, mol_from_smarts({pattern}))"
//! page_size = 5000
//!
//! [schema]
//! table = "compounds"
//! id_column = "cid"
//! mol_column = "molecule"
//! output_columns = ["cid", "inchikey"]
//!
//! [batch]
//! max_attempts = 3
//! retry_delay_ms = 2000
//!
//! [definitions]
//! json_file = "groups.json"
//! worksheet = "groups"
//! ```

use std::path::{Path, PathBuf};

use commongroups_core::{TableSchema, DEFAULT_SUBSTRUCTURE_TEMPLATE};
use commongroups_engine::DEFAULT_PAGE_SIZE;
use serde::Deserialize;

/// File name looked up in the home directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "commongroups.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schema: TableSchema,
    pub batch: BatchConfig,
    pub definitions: DefinitionsConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// SQLite extension providing `mol_is_substruct` and friends.
    pub extension: Option<PathBuf>,
    /// Predicate template with `{column}` and `{pattern}` slots.
    pub substructure_sql: String,
    pub page_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: None,
            extension: None,
            substructure_sql: DEFAULT_SUBSTRUCTURE_TEMPLATE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// `[batch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            max_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

/// `[definitions]` section: where group definitions come from by default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefinitionsConfig {
    pub json_file: Option<PathBuf>,
    pub workbook: Option<PathBuf>,
    pub worksheet: Option<String>,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Parse configuration text. Paths are left as written.
pub fn parse_config(text: &str) -> Result<Config, String> {
    let config: Config = toml::from_str(text).map_err(|e| e.to_string())?;
    if config.database.page_size == 0 {
        return Err("database.page_size must be at least 1".to_string());
    }
    if config.batch.max_attempts == 0 {
        return Err("batch.max_attempts must be at least 1".to_string());
    }
    Ok(config)
}

/// Read the configuration for a project home.
///
/// An explicit path must exist; the implicit `<home>/commongroups.toml` is
/// optional. Returns the config and the file it came from, if any.
pub fn load_config(
    explicit: Option<&Path>,
    home: &Path,
) -> Result<(Config, Option<PathBuf>), String> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = home.join(DEFAULT_CONFIG_FILE);
            if !implicit.is_file() {
                return Ok((Config::default(), None));
            }
            implicit
        }
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let mut config =
        parse_config(&text).map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;

    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok((config, Some(path)))
}

impl Config {
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        resolve(&mut self.database.path);
        resolve(&mut self.database.extension);
        resolve(&mut self.definitions.json_file);
        resolve(&mut self.definitions.workbook);
    }
}
