//! Spreadsheet exports as a definition source.
//!
//! A workbook is a directory holding one CSV file per worksheet
//! (`<dir>/<worksheet>.csv`), or a single CSV file. The authored table ends
//! at the first row whose group id cell is blank; anything below it
//! (notes, scratch rows) is ignored.

use std::path::{Path, PathBuf};

use commongroups_core::GroupDefinition;
use serde_json::{Map, Value};

use super::{from_records, select_worksheet, DefinitionProvider, ProviderError};

/// Worksheet read from a workbook directory when none is requested.
pub const DEFAULT_WORKSHEET: &str = "groups";

pub struct WorkbookProvider {
    path: PathBuf,
    worksheet: Option<String>,
}

impl WorkbookProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkbookProvider {
            path: path.into(),
            worksheet: None,
        }
    }

    pub fn with_worksheet(mut self, worksheet: Option<String>) -> Self {
        self.worksheet = worksheet;
        self
    }

    /// The CSV file holding the selected worksheet.
    fn sheet_path(&self) -> Result<PathBuf, ProviderError> {
        if !self.path.is_dir() {
            return Ok(self.path.clone());
        }
        let entries = std::fs::read_dir(&self.path).map_err(|source| ProviderError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut available: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        available.sort();

        let requested = match self.worksheet.as_deref() {
            Some(ws) => Some(ws),
            None if available.iter().any(|s| s == DEFAULT_WORKSHEET) => Some(DEFAULT_WORKSHEET),
            None => None,
        };
        let name = select_worksheet(requested, &available)?;
        Ok(self.path.join(format!("{}.csv", name)))
    }
}

fn is_id_heading(heading: &str) -> bool {
    matches!(
        heading.trim().to_ascii_lowercase().as_str(),
        "group_id" | "materialid"
    )
}

fn cell_value(heading: &str, cell: &str) -> Value {
    if heading.trim().eq_ignore_ascii_case("info") {
        if let Ok(obj @ Value::Object(_)) = serde_json::from_str::<Value>(cell) {
            return obj;
        }
    }
    Value::String(cell.to_string())
}

fn read_sheet(path: &Path) -> Result<Vec<Map<String, Value>>, ProviderError> {
    let csv_error = |e: csv::Error| ProviderError::Csv {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let id_column = headers.iter().position(is_id_heading);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        if let Some(col) = id_column {
            if row.get(col).map_or(true, str::is_empty) {
                break;
            }
        }
        let mut record = Map::new();
        for (heading, cell) in headers.iter().zip(row.iter()) {
            if heading.is_empty() || cell.is_empty() {
                continue;
            }
            record.insert(heading.to_string(), cell_value(heading, cell));
        }
        records.push(record);
    }
    Ok(records)
}

impl DefinitionProvider for WorkbookProvider {
    fn describe(&self) -> String {
        match &self.worksheet {
            Some(ws) => format!("workbook {} [{}]", self.path.display(), ws),
            None => format!("workbook {}", self.path.display()),
        }
    }

    fn definitions(&self) -> Result<Vec<GroupDefinition>, ProviderError> {
        let sheet = self.sheet_path()?;
        tracing::debug!(sheet = %sheet.display(), "reading worksheet");
        from_records(read_sheet(&sheet)?)
    }
}
