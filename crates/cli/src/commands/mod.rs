//! Subcommand implementations and the setup they share.

mod report;
mod run;
mod status;
mod validate;

pub(crate) use report::cmd_report;
pub(crate) use run::{cmd_run, RunArgs};
pub(crate) use status::cmd_status;
pub(crate) use validate::cmd_validate;

use std::path::PathBuf;
use std::process;

use commongroups_core::{GroupDefinition, QueryCompiler};
use commongroups_engine::{DefinitionProvider, JsonFileProvider, WorkbookProvider};
use commongroups_storage::FsGroupStore;

use crate::config::{load_config, Config};
use crate::env::{resolve_home, ProjectEnv};
use crate::{logging, report_error, OutputFormat};

/// Flags every subcommand honors.
pub(crate) struct Globals {
    pub env_path: Option<PathBuf>,
    pub project: String,
    pub config: Option<PathBuf>,
    pub verbose: u8,
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Where group definitions come from on this invocation.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceArgs {
    pub json_file: Option<PathBuf>,
    pub workbook: Option<PathBuf>,
    pub worksheet: Option<String>,
}

pub(crate) struct Session {
    pub env: ProjectEnv,
    pub config: Config,
    /// Log file of this invocation, when file logging is on.
    pub log_file: Option<PathBuf>,
}

impl Globals {
    /// Report `msg` and exit 1.
    pub(crate) fn fail(&self, msg: &str) -> ! {
        report_error(msg, self.output, self.quiet);
        process::exit(1);
    }

    /// Resolve the project, install logging and read the configuration.
    pub(crate) fn open(&self, log_to_file: bool) -> Session {
        let home = resolve_home(self.env_path.as_deref()).unwrap_or_else(|e| self.fail(&e));
        let env = ProjectEnv::open(&home, &self.project).unwrap_or_else(|e| self.fail(&e));
        let log_dir = env.log_dir();
        let log_file = logging::init(
            self.verbose,
            self.quiet,
            log_to_file.then_some(log_dir.as_path()),
        )
        .unwrap_or_else(|e| self.fail(&e));

        let (config, config_path) =
            load_config(self.config.as_deref(), &home).unwrap_or_else(|e| self.fail(&e));
        if let Some(path) = &config_path {
            tracing::debug!(config = %path.display(), "configuration loaded");
        }
        Session {
            env,
            config,
            log_file,
        }
    }

    pub(crate) fn print_json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => self.fail(&format!("cannot serialize output: {}", e)),
        }
    }
}

impl Session {
    /// The store holding this project's group records.
    pub(crate) fn store(&self) -> Result<FsGroupStore, String> {
        FsGroupStore::open(self.env.data_dir()).map_err(|e| e.to_string())
    }

    pub(crate) fn compiler(&self) -> Result<QueryCompiler, String> {
        QueryCompiler::new(self.config.schema.clone())
            .map_err(|e| format!("invalid [schema] configuration: {}", e))
    }

    /// Load definitions: `--json-file`, then `--workbook`, then the
    /// configured `json_file`, then the configured `workbook`.
    pub(crate) fn definitions(&self, args: &SourceArgs) -> Result<Vec<GroupDefinition>, String> {
        let configured = &self.config.definitions;
        let worksheet = args
            .worksheet
            .clone()
            .or_else(|| configured.worksheet.clone());

        let provider: Box<dyn DefinitionProvider> =
            match (&args.json_file, &args.workbook) {
                (Some(path), _) => Box::new(JsonFileProvider::new(path).with_worksheet(worksheet)),
                (None, Some(path)) => {
                    Box::new(WorkbookProvider::new(path).with_worksheet(worksheet))
                }
                (None, None) => match (&configured.json_file, &configured.workbook) {
                    (Some(path), _) => {
                        Box::new(JsonFileProvider::new(path).with_worksheet(worksheet))
                    }
                    (None, Some(path)) => {
                        Box::new(WorkbookProvider::new(path).with_worksheet(worksheet))
                    }
                    (None, None) => {
                        return Err(
                            "no group definitions configured; pass --json-file or --workbook"
                                .to_string(),
                        )
                    }
                },
            };

        let definitions = provider
            .definitions()
            .map_err(|e| format!("cannot load definitions from {}: {}", provider.describe(), e))?;
        tracing::info!(
            source = %provider.describe(),
            groups = definitions.len(),
            "definitions loaded"
        );
        Ok(definitions)
    }
}
