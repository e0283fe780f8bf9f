//! Log subscriber setup: console on stderr plus an optional per-run file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::macros::format_description;
use time::OffsetDateTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter for the given flags. `-v` flags override `RUST_LOG`.
pub fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
    let level = match (verbose, quiet) {
        (0, true) => "warn",
        (0, false) => {
            return EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
        (1, _) => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

/// `<log_dir>/<YYYYMMDDTHHMMSS>.log` for the current UTC time.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day]T[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "unknown".to_string());
    log_dir.join(format!("{}.log", stamp))
}

/// Install the global subscriber. With `log_dir`, events are also appended
/// to a fresh log file whose path is returned.
pub fn init(verbose: u8, quiet: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>, String> {
    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            let path = log_file_path(dir);
            let file: File = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| format!("cannot open log file '{}': {}", path.display(), e))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_is_a_compact_timestamp() {
        let path = log_file_path(Path::new("/tmp/log"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), "20240101T000000.log".len());
        assert_eq!(&name[8..9], "T");
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn verbosity_levels() {
        let level = |verbose, quiet| filter_for(verbose, quiet).to_string().to_lowercase();
        assert_eq!(level(1, false), "debug");
        assert_eq!(level(3, false), "trace");
        assert_eq!(level(0, true), "warn");
    }
}
