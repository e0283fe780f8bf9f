//! CLI integration tests.
//!
//! Every test builds a throwaway home directory holding a small SQLite
//! compound table, a JSON file of group definitions and a
//! `commongroups.toml`, then drives the `commongroups` binary against it.
//! Structure matching uses SQLite's `instr` so no extension is needed.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG: &str = r#"
[database]
path = "compounds.sqlite"
substructure_sql = "instr({column}, {pattern}) > 0"

[batch]
retry_delay_ms = 0

[definitions]
json_file = "groups.json"
"#;

const GROUPS: &str = r#"[
  {"group_id": "G1", "name": "Chlorinated", "method": "substructure",
   "structure": "Cl", "structure_type": "smarts", "info": {"source": "fixture"}},
  {"group_id": "G2", "name": "Broken", "method": "function",
   "function_name": "unregistered_fn", "structure": "X", "structure_type": "smarts"}
]"#;

/// A home directory with a database, definitions and configuration.
fn fixture() -> TempDir {
    let home = TempDir::new().unwrap();
    let conn = rusqlite::Connection::open(home.path().join("compounds.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE compounds (cid INTEGER PRIMARY KEY, molecule TEXT);
         INSERT INTO compounds VALUES (101, 'ClCCCl'), (102, 'CCO'), (103, 'Cl[Hg]');",
    )
    .unwrap();
    fs::write(home.path().join("groups.json"), GROUPS).unwrap();
    fs::write(home.path().join("commongroups.toml"), CONFIG).unwrap();
    home
}

/// Helper: a `commongroups` command rooted at `home`.
fn cmg(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("commongroups");
    cmd.current_dir(home)
        .env_remove("CMG_HOME")
        .env_remove("RUST_LOG")
        .arg("--env-path")
        .arg(home);
    cmd
}

fn project_dir(home: &Path) -> PathBuf {
    home.join("default")
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    cargo_bin_cmd!("commongroups")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chemical groups of concern"));
}

#[test]
fn version_exits_0() {
    cargo_bin_cmd!("commongroups")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("commongroups"));
}

// ──────────────────────────────────────────────
// 2. run
// ──────────────────────────────────────────────

#[test]
fn clean_start_resolves_groups_and_exits_2_on_failures() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains(
            "2 groups: 1 done (0 skipped), 1 failed; 1 queries, 2 matches",
        ))
        .stdout(predicate::str::contains("failed: G2"));

    let data = project_dir(home.path()).join("data");
    let g1 = read_json(&data.join("G1.json"));
    assert_eq!(g1["status"], "done");
    assert_eq!(g1["result_ids"], serde_json::json!(["101", "103"]));
    assert_eq!(g1["info"]["source"], "fixture");

    let g2 = read_json(&data.join("G2.json"));
    assert_eq!(g2["status"], "failed");
    assert!(g2["error"]
        .as_str()
        .unwrap()
        .contains("unregistered_fn"));

    let results = project_dir(home.path()).join("results");
    assert!(results.join("index.html").is_file());
    assert!(results.join("G1.html").is_file());
    let summary = read_json(&results.join("summary.json"));
    assert_eq!(summary["tally"]["done"], 1);
    assert_eq!(summary["run"]["mode"], "clean_start");
    assert_eq!(summary["run"]["tally"]["queries_issued"], 1);
}

#[test]
fn resume_skips_done_groups() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start"])
        .assert()
        .code(2);

    let output = cmg(home.path())
        .args(["--output", "json", "run", "--resume"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let doc = stdout_json(&output);
    assert_eq!(doc["mode"], "resume");
    assert_eq!(doc["tally"]["skipped"], 1);
    assert_eq!(doc["tally"]["done"], 1);
    assert_eq!(doc["tally"]["queries_issued"], 0);
    assert_eq!(doc["tally"]["failed_ids"], serde_json::json!(["G2"]));
}

#[test]
fn only_restricts_the_batch() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start", "--only", "G1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 groups: 1 done"));

    assert!(!project_dir(home.path()).join("data/G2.json").exists());
}

#[test]
fn rerunning_one_group_keeps_the_others_in_the_report() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start"])
        .assert()
        .code(2);

    cmg(home.path())
        .args(["run", "--only", "G2"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("1 groups: 0 done"));

    let results = project_dir(home.path()).join("results");
    let summary = read_json(&results.join("summary.json"));
    let ids: Vec<_> = summary["groups"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["group_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["G1", "G2"]);
    assert_eq!(summary["tally"]["total"], 2);
    assert_eq!(summary["run"]["tally"]["total"], 1);
    assert!(results.join("G1.html").is_file());
    let index = fs::read_to_string(results.join("index.html")).unwrap();
    assert!(index.contains("G1.html"));
}

#[test]
fn only_with_unknown_group_exits_1() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--only", "G1,G9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("G9"));
}

#[test]
fn clean_start_and_resume_conflict() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start", "--resume"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_database_exits_1_without_creating_it() {
    let home = fixture();
    let absent = home.path().join("absent.sqlite");
    cmg(home.path())
        .args(["run", "--database"])
        .arg(&absent)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot open"));
    assert!(!absent.exists());
}

#[test]
fn errors_are_json_with_output_json() {
    let home = fixture();
    let output = cmg(home.path())
        .args(["--output", "json", "run", "--database", "absent.sqlite"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .find(|l| l.starts_with("{\"error\""))
        .expect("json error line");
    let doc: serde_json::Value = serde_json::from_str(line).unwrap();
    assert!(doc["error"].as_str().unwrap().contains("cannot open"));
}

#[test]
fn worksheet_selects_a_named_subset() {
    let home = fixture();
    fs::write(
        home.path().join("sheets.json"),
        r#"{
          "halogens": [{"group_id": "H1", "name": "Chlorine", "method": "substructure",
                        "structure": "Cl", "structure_type": "smarts"}],
          "metals": [{"group_id": "M1", "name": "Mercury", "method": "substructure",
                      "structure": "Hg", "structure_type": "smarts"}]
        }"#,
    )
    .unwrap();
    cmg(home.path())
        .args(["run", "-c", "-j", "sheets.json", "-w", "metals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 groups: 1 done"));

    let m1 = read_json(&project_dir(home.path()).join("data/M1.json"));
    assert_eq!(m1["result_ids"], serde_json::json!(["103"]));
    assert!(!project_dir(home.path()).join("data/H1.json").exists());
}

#[test]
fn clean_start_removes_old_logs() {
    let home = fixture();
    let log_dir = project_dir(home.path()).join("log");
    fs::create_dir_all(&log_dir).unwrap();
    let stale = log_dir.join("19990101T000000.log");
    fs::write(&stale, "old run\n").unwrap();

    cmg(home.path())
        .args(["run", "--clean-start"])
        .assert()
        .code(2);

    assert!(!stale.exists());
    let logs: Vec<_> = fs::read_dir(&log_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let text = fs::read_to_string(&logs[0]).unwrap();
    assert!(text.contains("batch finished"));
}

// ──────────────────────────────────────────────
// 3. validate / status / report
// ──────────────────────────────────────────────

#[test]
fn validate_prints_queries_and_exits_1_on_invalid() {
    let home = fixture();
    cmg(home.path())
        .arg("validate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("G1: ok"))
        .stdout(predicate::str::contains("'Cl'::qmol"))
        .stdout(predicate::str::contains("G2: invalid"))
        .stderr(predicate::str::contains("1 of 2 definition(s) are invalid"));
}

#[test]
fn validate_never_opens_the_database() {
    let home = fixture();
    fs::remove_file(home.path().join("compounds.sqlite")).unwrap();
    fs::write(
        home.path().join("ok.json"),
        r#"[{"group_id": "G1", "name": "Cl", "method": "substructure",
             "structure": "Cl", "structure_type": "smarts"}]"#,
    )
    .unwrap();
    cmg(home.path())
        .args(["validate", "--json-file", "ok.json"])
        .assert()
        .success();
}

#[test]
fn status_lists_persisted_records() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start"])
        .assert()
        .code(2);

    let output = cmg(home.path())
        .args(["status", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc = stdout_json(&output);
    assert_eq!(doc["groups"].as_array().unwrap().len(), 2);
    assert_eq!(doc["groups"][0]["group_id"], "G1");
    assert_eq!(doc["done"], 1);
    assert_eq!(doc["failed"], 1);
}

#[test]
fn status_of_empty_project() {
    let home = fixture();
    cmg(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no group records"));
}

#[test]
fn report_regenerates_from_records() {
    let home = fixture();
    cmg(home.path())
        .args(["run", "--clean-start"])
        .assert()
        .code(2);
    let results = project_dir(home.path()).join("results");
    fs::remove_dir_all(&results).unwrap();

    cmg(home.path())
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("report for 2 group(s)"));
    assert!(results.join("index.html").is_file());
    let summary = read_json(&results.join("summary.json"));
    assert_eq!(summary["tally"]["failed_ids"], serde_json::json!(["G2"]));
    assert!(summary.get("run").is_none());
}

#[test]
fn projects_are_isolated() {
    let home = fixture();
    cmg(home.path())
        .args(["--project", "second", "run", "--clean-start", "--only", "G1"])
        .assert()
        .success();
    assert!(home.path().join("second/data/G1.json").is_file());
    assert!(!project_dir(home.path()).join("data/G1.json").exists());
}
