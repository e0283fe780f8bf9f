use commongroups_storage::GroupStore;
use serde_json::json;

use super::Globals;
use crate::report::ResultsWriter;
use crate::OutputFormat;

/// Rebuild the aggregate report from persisted records.
pub(crate) fn cmd_report(globals: &Globals) {
    let session = globals.open(false);
    let store = session.store().unwrap_or_else(|e| globals.fail(&e));
    let records = store.list().unwrap_or_else(|e| globals.fail(&e.to_string()));

    let writer = ResultsWriter::new(session.env.results_dir(), session.env.name());
    writer
        .write(&records, None)
        .unwrap_or_else(|e| globals.fail(&e));

    match globals.output {
        OutputFormat::Json => globals.print_json(&json!({
            "results": writer.dir(),
            "groups": records.len(),
        })),
        OutputFormat::Text => {
            if !globals.quiet {
                println!(
                    "report for {} group(s) written to {}",
                    records.len(),
                    writer.dir().display()
                );
            }
        }
    }
}
