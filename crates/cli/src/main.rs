mod commands;
mod config;
mod env;
mod logging;
mod report;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use commands::{cmd_report, cmd_run, cmd_status, cmd_validate, Globals, RunArgs, SourceArgs};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Resolve chemical groups of concern against a compound database.
#[derive(Parser)]
#[command(
    name = "commongroups",
    version,
    about = "Resolve chemical groups of concern against a compound database"
)]
struct Cli {
    /// Home directory holding projects (default: $CMG_HOME or ~/commongroups_data)
    #[arg(long, global = true)]
    env_path: Option<PathBuf>,

    /// Project name; its files live under <home>/<project>
    #[arg(long, short = 'p', global = true, default_value = "default")]
    project: String,

    /// TOML configuration file (default: <home>/commongroups.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// More log detail (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where to read group definitions from.
#[derive(Args, Debug, Clone)]
struct SourceFlags {
    /// Static JSON file of group definitions
    #[arg(long, short = 'j', conflicts_with = "workbook")]
    json_file: Option<PathBuf>,

    /// Workbook export: a directory of CSV sheets or a single CSV file
    #[arg(long, short = 'g')]
    workbook: Option<PathBuf>,

    /// Worksheet (named subset of definitions) to use
    #[arg(long, short = 'w')]
    worksheet: Option<String>,
}

impl From<SourceFlags> for SourceArgs {
    fn from(flags: SourceFlags) -> Self {
        SourceArgs {
            json_file: flags.json_file,
            workbook: flags.workbook,
            worksheet: flags.worksheet,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every configured group and write the aggregate report
    Run {
        /// Discard previous records and logs before running
        #[arg(long, short = 'c', conflicts_with = "resume")]
        clean_start: bool,

        /// Continue a previous batch, skipping groups already done
        #[arg(long, short = 'r')]
        resume: bool,

        /// SQLite compound database
        #[arg(long, short = 'd')]
        database: Option<PathBuf>,

        #[command(flatten)]
        sources: SourceFlags,

        /// Only run these groups (comma-separated ids)
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,

        /// Re-run done groups whose definition changed
        #[arg(long)]
        rerun_changed: bool,

        /// Attempts per group before giving up on transport errors
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: Option<u32>,
    },

    /// Compile every definition and print its query, without a database
    Validate {
        #[command(flatten)]
        sources: SourceFlags,
    },

    /// List persisted group records
    Status,

    /// Regenerate the aggregate report from persisted records
    Report,
}

fn main() {
    let cli = Cli::parse();
    let globals = Globals {
        env_path: cli.env_path,
        project: cli.project,
        config: cli.config,
        verbose: cli.verbose,
        output: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Run {
            clean_start,
            resume,
            database,
            sources,
            only,
            rerun_changed,
            max_attempts,
        } => {
            cmd_run(
                &globals,
                RunArgs {
                    clean_start,
                    resume,
                    database,
                    sources: sources.into(),
                    only,
                    rerun_changed,
                    max_attempts,
                },
            );
        }
        Commands::Validate { sources } => {
            cmd_validate(&globals, &sources.into());
        }
        Commands::Status => {
            cmd_status(&globals);
        }
        Commands::Report => {
            cmd_report(&globals);
        }
    }
}

/// Print an error message to stderr, honoring `--output` and `--quiet`.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
