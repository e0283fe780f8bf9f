use serde_json::json;

use super::{Globals, SourceArgs};
use crate::OutputFormat;

/// Compile every definition without touching the database.
pub(crate) fn cmd_validate(globals: &Globals, sources: &SourceArgs) {
    let session = globals.open(false);
    let definitions = session
        .definitions(sources)
        .unwrap_or_else(|e| globals.fail(&e));
    let compiler = session.compiler().unwrap_or_else(|e| globals.fail(&e));

    let mut invalid = 0;
    let mut rows = Vec::with_capacity(definitions.len());
    for definition in &definitions {
        match compiler.compile(definition) {
            Ok(query) => {
                let text = query.to_literal_sql();
                if globals.output == OutputFormat::Text && !globals.quiet {
                    println!("{}: ok\n  {}", definition.group_id, text);
                }
                rows.push(json!({
                    "group_id": definition.group_id,
                    "valid": true,
                    "query_text": text,
                }));
            }
            Err(e) => {
                invalid += 1;
                if globals.output == OutputFormat::Text && !globals.quiet {
                    println!("{}: invalid\n  {}", definition.group_id, e);
                }
                rows.push(json!({
                    "group_id": definition.group_id,
                    "valid": false,
                    "error": e.to_string(),
                }));
            }
        }
    }

    if globals.output == OutputFormat::Json {
        globals.print_json(&json!({ "definitions": rows, "invalid": invalid }));
    }
    if invalid > 0 {
        globals.fail(&format!(
            "{} of {} definition(s) are invalid",
            invalid,
            definitions.len()
        ));
    }
}
