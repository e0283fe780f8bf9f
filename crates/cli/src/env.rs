//! Project environment: the on-disk layout a batch reads and writes.
//!
//! ```text
//! <home>/
//!   commongroups.toml       optional configuration
//!   <project>/
//!     data/                 one persisted group record per group
//!     results/              aggregate report
//!     log/                  one log file per invocation
//! ```

use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the home directory.
pub const HOME_VAR: &str = "CMG_HOME";

/// Directory created under the user's home when nothing else is configured.
pub const DEFAULT_HOME_DIR: &str = "commongroups_data";

/// Pick the home directory: flag, then `$CMG_HOME`, then `~/commongroups_data`.
pub fn resolve_home(flag: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = std::env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_HOME_DIR))
        .ok_or_else(|| {
            format!(
                "cannot determine a home directory; pass --env-path or set {}",
                HOME_VAR
            )
        })
}

#[derive(Debug, Clone)]
pub struct ProjectEnv {
    name: String,
    root: PathBuf,
}

impl ProjectEnv {
    /// Open (creating as needed) project `name` under `home`.
    pub fn open(home: &Path, name: &str) -> Result<Self, String> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(format!("invalid project name '{}'", name));
        }
        let env = ProjectEnv {
            name: name.to_string(),
            root: home.join(name),
        };
        for dir in [env.data_dir(), env.results_dir(), env.log_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|e| format!("cannot create '{}': {}", dir.display(), e))?;
        }
        tracing::debug!(project = %env.name, root = %env.root.display(), "project environment ready");
        Ok(env)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    /// Delete previous `*.log` files, sparing `keep`. Returns how many went.
    pub fn clean_logs(&self, keep: Option<&Path>) -> Result<usize, String> {
        let dir = self.log_dir();
        let entries =
            fs::read_dir(&dir).map_err(|e| format!("cannot read '{}': {}", dir.display(), e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| format!("cannot read '{}': {}", dir.display(), e))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            if keep.is_some_and(|k| k == path) {
                continue;
            }
            fs::remove_file(&path)
                .map_err(|e| format!("cannot remove '{}': {}", path.display(), e))?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins() {
        let home = resolve_home(Some(Path::new("/srv/cmg"))).unwrap();
        assert_eq!(home, PathBuf::from("/srv/cmg"));
    }

    #[test]
    fn open_lays_out_directories() {
        let home = tempfile::tempdir().unwrap();
        let env = ProjectEnv::open(home.path(), "pfas").unwrap();
        assert_eq!(env.root(), home.path().join("pfas"));
        assert!(env.data_dir().is_dir());
        assert!(env.results_dir().is_dir());
        assert!(env.log_dir().is_dir());
    }

    #[test]
    fn project_names_stay_inside_home() {
        let home = tempfile::tempdir().unwrap();
        assert!(ProjectEnv::open(home.path(), "../escape").is_err());
        assert!(ProjectEnv::open(home.path(), "").is_err());
    }

    #[test]
    fn clean_logs_spares_the_active_file() {
        let home = tempfile::tempdir().unwrap();
        let env = ProjectEnv::open(home.path(), "default").unwrap();
        let old = env.log_dir().join("20240101T000000.log");
        let active = env.log_dir().join("20240102T000000.log");
        let other = env.log_dir().join("notes.txt");
        for path in [&old, &active, &other] {
            fs::write(path, "x").unwrap();
        }

        assert_eq!(env.clean_logs(Some(&active)).unwrap(), 1);
        assert!(!old.exists());
        assert!(active.exists());
        assert!(other.exists());
    }
}
