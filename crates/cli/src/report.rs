//! Aggregate report written to the project's `results/` directory.
//!
//! - `index.html`: one table row per group
//! - `<group_id>.html`: the compound ids of one group, with its query
//! - `summary.json`: the tally plus a compact per-group listing
//!
//! The report always covers every stored group. A batch restricted with
//! `--only` adds its own counts under `run`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use commongroups_engine::{BatchMode, BatchReport, BatchTally, ReportError, ReportSink};
use commongroups_storage::{now_rfc3339, GroupRecord, GroupStatus};
use serde::Serialize;

pub struct ResultsWriter {
    dir: PathBuf,
    project: String,
}

#[derive(Serialize)]
struct Summary<'a> {
    project: &'a str,
    generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<RunSummary<'a>>,
    tally: BatchTally,
    groups: Vec<SummaryRow<'a>>,
}

/// The batch that produced the report, if any.
#[derive(Serialize)]
struct RunSummary<'a> {
    mode: BatchMode,
    tally: &'a BatchTally,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    group_id: &'a str,
    name: &'a str,
    status: GroupStatus,
    result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Recompute a tally from persisted records, for `report` and `status`.
///
/// Nothing ran, so every done group counts as skipped.
pub fn tally_records(records: &[GroupRecord]) -> BatchTally {
    let mut tally = BatchTally::default();
    for record in records {
        tally.total += 1;
        match record.status {
            GroupStatus::Done => {
                tally.done += 1;
                tally.skipped += 1;
                tally.total_matches += record.result_count;
            }
            _ => {
                tally.failed += 1;
                tally.failed_ids.push(record.group_id.clone());
            }
        }
    }
    tally
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

impl ResultsWriter {
    pub fn new(dir: impl Into<PathBuf>, project: &str) -> Self {
        ResultsWriter {
            dir: dir.into(),
            project: project.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every report file, replacing the previous ones. `run` carries
    /// the mode and counts of the batch that just finished.
    pub fn write(
        &self,
        records: &[GroupRecord],
        run: Option<(BatchMode, &BatchTally)>,
    ) -> Result<(), String> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| format!("cannot create '{}': {}", self.dir.display(), e))?;
        let removed = self.remove_pages()?;
        tracing::debug!(removed, "previous group pages deleted");

        let tally = tally_records(records);
        self.put("index.html", &self.render_index(records, &tally, run))?;
        for record in records {
            self.put(&format!("{}.html", record.group_id), &render_group(record))?;
        }

        let summary = Summary {
            project: &self.project,
            generated_at: now_rfc3339(),
            run: run.map(|(mode, tally)| RunSummary { mode, tally }),
            tally,
            groups: records
                .iter()
                .map(|r| SummaryRow {
                    group_id: &r.group_id,
                    name: &r.name,
                    status: r.status,
                    result_count: r.result_count,
                    error: r.error.as_deref(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| format!("cannot serialize summary: {}", e))?;
        self.put("summary.json", &format!("{}\n", json))?;

        tracing::info!(dir = %self.dir.display(), groups = records.len(), "report written");
        Ok(())
    }

    /// Delete every `*.html` page so groups no longer stored leave none behind.
    fn remove_pages(&self) -> Result<usize, String> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| format!("cannot read '{}': {}", self.dir.display(), e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| format!("cannot read '{}': {}", self.dir.display(), e))?
                .path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            fs::remove_file(&path)
                .map_err(|e| format!("cannot remove '{}': {}", path.display(), e))?;
            removed += 1;
        }
        Ok(removed)
    }

    fn put(&self, name: &str, contents: &str) -> Result<(), String> {
        let path = self.dir.join(name);
        fs::write(&path, contents).map_err(|e| format!("cannot write '{}': {}", path.display(), e))
    }

    fn render_index(
        &self,
        records: &[GroupRecord],
        tally: &BatchTally,
        run: Option<(BatchMode, &BatchTally)>,
    ) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "<h1>{}</h1>", escape_html(&self.project));
        let _ = writeln!(body, "<p>{}</p>", escape_html(&tally.to_string()));
        if let Some((mode, run_tally)) = run {
            let _ = writeln!(
                body,
                "<p>last run ({}): {}</p>",
                mode,
                escape_html(&run_tally.to_string())
            );
        }
        body.push_str("<table>\n<tr><th>group_id</th><th>name</th><th>status</th><th>result_count</th><th>info</th></tr>\n");
        for record in records {
            let info = serde_json::to_string(&record.info).unwrap_or_default();
            let _ = writeln!(
                body,
                "<tr><td><a href=\"{id}.html\">{id}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&record.name),
                record.status,
                record.result_count,
                escape_html(&info),
                id = escape_html(&record.group_id),
            );
        }
        body.push_str("</table>\n");
        page(&format!("{} results", self.project), &body)
    }
}

fn render_group(record: &GroupRecord) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<h1>{}: {}</h1>",
        escape_html(&record.group_id),
        escape_html(&record.name)
    );
    let _ = writeln!(
        body,
        "<p>status: {}; {} compound(s)</p>",
        record.status, record.result_count
    );
    if let Some(error) = &record.error {
        let _ = writeln!(body, "<p>error: {}</p>", escape_html(error));
    }
    if let Some(query) = &record.query_text {
        let _ = writeln!(body, "<pre>{}</pre>", escape_html(query));
    }
    body.push_str("<ul>\n");
    for id in &record.result_ids {
        let _ = writeln!(body, "<li>{}</li>", escape_html(id));
    }
    body.push_str("</ul>\n<p><a href=\"index.html\">all groups</a></p>\n");
    page(&record.group_id, &body)
}

impl ReportSink for ResultsWriter {
    fn write_report(&mut self, report: &BatchReport) -> Result<(), ReportError> {
        self.write(&report.records, Some((report.mode, &report.tally)))
            .map_err(|message| ReportError { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<GroupRecord> {
        let mut done = GroupRecord::new("G1", "Chlorides <Cl>");
        done.start("2024-01-01T00:00:00Z").unwrap();
        done.note_attempt().unwrap();
        done.complete("SELECT 1", vec!["101".into(), "103".into()], "2024-01-01T00:00:01Z")
            .unwrap();
        done.info.insert("source".into(), json!("a & b"));

        let mut failed = GroupRecord::new("G2", "Broken");
        failed.start("2024-01-01T00:00:00Z").unwrap();
        failed
            .fail("invalid definition: unknown function", None, "2024-01-01T00:00:01Z")
            .unwrap();
        vec![done, failed]
    }

    #[test]
    fn tally_from_records() {
        let tally = tally_records(&records());
        assert_eq!(tally.total, 2);
        assert_eq!(tally.done, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.total_matches, 2);
        assert_eq!(tally.failed_ids, vec!["G2"]);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn writes_index_pages_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultsWriter::new(dir.path().join("results"), "pfas");
        let records = records();
        let run = tally_records(&records[1..]);
        writer
            .write(&records, Some((BatchMode::Resume, &run)))
            .unwrap();

        let index = fs::read_to_string(writer.dir().join("index.html")).unwrap();
        assert!(index.contains("Chlorides &lt;Cl&gt;"));
        assert!(index.contains("a &amp; b"));
        assert!(index.contains("<td>failed</td>"));

        let group = fs::read_to_string(writer.dir().join("G1.html")).unwrap();
        assert!(group.contains("<li>103</li>"));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(writer.dir().join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["run"]["mode"], "resume");
        assert_eq!(summary["run"]["tally"]["total"], 1);
        assert_eq!(summary["tally"]["total"], 2);
        assert_eq!(summary["tally"]["failed_ids"], json!(["G2"]));
        assert_eq!(summary["groups"].as_array().unwrap().len(), 2);
        assert_eq!(summary["groups"][1]["error"], "invalid definition: unknown function");
    }

    #[test]
    fn pages_of_groups_no_longer_stored_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        fs::create_dir_all(&results).unwrap();
        fs::write(results.join("OLD.html"), "stale").unwrap();
        fs::write(results.join("notes.txt"), "kept").unwrap();

        let writer = ResultsWriter::new(&results, "pfas");
        writer.write(&records(), None).unwrap();

        assert!(!results.join("OLD.html").exists());
        assert!(results.join("notes.txt").exists());
        assert!(results.join("G1.html").is_file());
        assert!(results.join("G2.html").is_file());
    }
}
