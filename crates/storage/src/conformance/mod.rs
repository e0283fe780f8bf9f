//! Conformance test suite for `GroupStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `GroupStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Persist**: save/load fidelity, replacement, missing keys
//! - **Listing**: ordering and completeness
//! - **Removal**: deletion and its return value
//! - **Keys**: rejection of unsafe group ids
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that creates
//! a fresh, empty store for each test:
//!
//! ```ignore
//! use commongroups_storage::conformance::run_conformance_suite;
//! use commongroups_storage::MemoryGroupStore;
//!
//! #[test]
//! fn memory_conformance() {
//!     let report = run_conformance_suite(MemoryGroupStore::new);
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod keys;
mod listing;
mod persist;
mod removal;

use std::fmt;

use crate::record::{GroupRecord, GroupStatus};
use crate::GroupStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "persist", "listing").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store backend.
///
/// `factory` is called once per test and must return a fresh, empty store.
pub fn run_conformance_suite<S, F>(factory: F) -> ConformanceReport
where
    S: GroupStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.extend(persist::run_persist_tests(&factory));
    results.extend(listing::run_listing_tests(&factory));
    results.extend(removal::run_removal_tests(&factory));
    results.extend(keys::run_key_tests(&factory));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_done_record(group_id: &str, ids: &[&str]) -> GroupRecord {
    let mut record = GroupRecord::new(group_id, &format!("{} name", group_id));
    record.status = GroupStatus::Done;
    record.query_text =
        Some("SELECT cid FROM compounds WHERE molecule @> '[Cl]'::qmol".to_string());
    record.result_ids = ids.iter().map(|s| s.to_string()).collect();
    record.result_count = ids.len();
    record.attempts = 1;
    record.started_at = Some("2025-01-01T00:00:00Z".to_string());
    record.timestamp = Some("2025-01-01T00:01:00Z".to_string());
    record.definition_hash = Some("abc123".to_string());
    record
        .info
        .insert("source".to_string(), serde_json::json!({"list": "EU", "rev": 2}));
    record
}

fn make_failed_record(group_id: &str) -> GroupRecord {
    let mut record = GroupRecord::new(group_id, group_id);
    record.status = GroupStatus::Failed;
    record.error = Some("function 'x' is not registered".to_string());
    record.timestamp = Some("2025-01-01T00:02:00Z".to_string());
    record
}

fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, got: T, want: T) -> Result<(), String> {
    if got == want {
        Ok(())
    } else {
        Err(format!("{}: expected {:?}, got {:?}", what, want, got))
    }
}
