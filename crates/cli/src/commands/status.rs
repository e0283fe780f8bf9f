use commongroups_storage::GroupStore;
use serde_json::json;

use super::Globals;
use crate::report::tally_records;
use crate::OutputFormat;

/// List the persisted group records of the project.
pub(crate) fn cmd_status(globals: &Globals) {
    let session = globals.open(false);
    let store = session.store().unwrap_or_else(|e| globals.fail(&e));
    let records = store.list().unwrap_or_else(|e| globals.fail(&e.to_string()));
    let tally = tally_records(&records);

    match globals.output {
        OutputFormat::Json => {
            let groups: Vec<_> = records
                .iter()
                .map(|r| {
                    json!({
                        "group_id": r.group_id,
                        "name": r.name,
                        "status": r.status,
                        "result_count": r.result_count,
                        "attempts": r.attempts,
                        "timestamp": r.timestamp,
                        "error": r.error,
                    })
                })
                .collect();
            globals.print_json(&json!({
                "project": session.env.name(),
                "groups": groups,
                "done": tally.done,
                "failed": tally.failed,
            }));
        }
        OutputFormat::Text => {
            if records.is_empty() {
                if !globals.quiet {
                    println!("no group records in project '{}'", session.env.name());
                }
                return;
            }
            for r in &records {
                let detail = match &r.error {
                    Some(error) => error.clone(),
                    None => format!("{} compound(s)", r.result_count),
                };
                println!("{:<16} {:<8} {}", r.group_id, r.status.as_str(), detail);
            }
            if !globals.quiet {
                println!("{} done, {} failed", tally.done, tally.failed);
            }
        }
    }
}
