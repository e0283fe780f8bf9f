use std::path::PathBuf;
use std::process;
use std::time::Duration;

use commongroups_core::TemplateDialect;
use commongroups_engine::{
    BatchController, BatchMode, BatchOptions, QueryExecutor, RetryPolicy, SqliteConnection,
};
use serde_json::json;

use super::{Globals, SourceArgs};
use crate::report::ResultsWriter;
use crate::OutputFormat;

pub(crate) struct RunArgs {
    pub clean_start: bool,
    pub resume: bool,
    pub database: Option<PathBuf>,
    pub sources: SourceArgs,
    pub only: Option<Vec<String>>,
    pub rerun_changed: bool,
    pub max_attempts: Option<u32>,
}

impl RunArgs {
    fn mode(&self) -> BatchMode {
        if self.clean_start {
            BatchMode::CleanStart
        } else if self.resume {
            BatchMode::Resume
        } else {
            BatchMode::Default
        }
    }
}

/// Exit code of a batch that finished with failed groups.
const EXIT_GROUPS_FAILED: i32 = 2;

pub(crate) fn cmd_run(globals: &Globals, args: RunArgs) {
    let session = globals.open(true);
    let config = &session.config;
    let mode = args.mode();

    if mode == BatchMode::CleanStart {
        match session.env.clean_logs(session.log_file.as_deref()) {
            Ok(removed) => tracing::debug!(removed, "previous log files deleted"),
            Err(e) => globals.fail(&e),
        }
    }

    let definitions = session
        .definitions(&args.sources)
        .unwrap_or_else(|e| globals.fail(&e));
    let compiler = session.compiler().unwrap_or_else(|e| globals.fail(&e));

    let Some(db_path) = args.database.clone().or_else(|| config.database.path.clone()) else {
        globals.fail("no database configured; pass --database or set [database] path");
    };
    let dialect = TemplateDialect::new("sqlite", &config.database.substructure_sql)
        .unwrap_or_else(|e| globals.fail(&format!("invalid [database] substructure_sql: {}", e)));
    let mut conn = SqliteConnection::open(&db_path)
        .unwrap_or_else(|e| globals.fail(&e.to_string()))
        .with_dialect(dialect);
    if let Some(extension) = &config.database.extension {
        if let Err(e) = conn.load_extension(extension) {
            globals.fail(&e.to_string());
        }
    }

    let store = session.store().unwrap_or_else(|e| globals.fail(&e));
    let options = BatchOptions {
        mode,
        retry: RetryPolicy {
            max_attempts: args.max_attempts.unwrap_or(config.batch.max_attempts),
            delay: Duration::from_millis(config.batch.retry_delay_ms),
        },
        only: args.only.map(|ids| ids.into_iter().collect()),
        rerun_changed: args.rerun_changed,
    };
    tracing::info!(
        project = %session.env.name(),
        root = %session.env.root().display(),
        database = %db_path.display(),
        store = %store.dir().display(),
        "starting batch"
    );

    let controller = BatchController::new(
        &compiler,
        QueryExecutor::new(config.database.page_size),
        &store,
        options,
    );
    let mut writer = ResultsWriter::new(session.env.results_dir(), session.env.name());
    let report = controller
        .run(&definitions, &mut conn, &mut writer)
        .unwrap_or_else(|e| globals.fail(&e.to_string()));
    let tally = &report.tally;

    match globals.output {
        OutputFormat::Json => globals.print_json(&json!({
            "project": session.env.name(),
            "mode": report.mode,
            "tally": tally,
            "results": writer.dir(),
            "log_file": session.log_file,
        })),
        OutputFormat::Text => {
            if !globals.quiet {
                println!("{}", tally);
                if !tally.failed_ids.is_empty() {
                    println!("failed: {}", tally.failed_ids.join(","));
                }
                println!("report: {}", writer.dir().join("index.html").display());
            }
        }
    }

    if tally.failed > 0 {
        process::exit(EXIT_GROUPS_FAILED);
    }
}
