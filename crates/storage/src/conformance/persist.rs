use super::{expect_eq, make_done_record, make_failed_record, TestResult};
use crate::GroupStore;

pub(super) fn run_persist_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: GroupStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "persist",
            "load_missing_returns_none",
            load_missing_returns_none(factory()),
        ),
        TestResult::from_result(
            "persist",
            "save_then_load_preserves_fields",
            save_then_load_preserves_fields(factory()),
        ),
        TestResult::from_result(
            "persist",
            "save_replaces_whole_record",
            save_replaces_whole_record(factory()),
        ),
        TestResult::from_result(
            "persist",
            "result_order_is_preserved",
            result_order_is_preserved(factory()),
        ),
    ]
}

fn load_missing_returns_none<S: GroupStore>(store: S) -> Result<(), String> {
    let loaded = store.load("absent").map_err(|e| e.to_string())?;
    expect_eq("load of absent key", loaded, None)
}

fn save_then_load_preserves_fields<S: GroupStore>(store: S) -> Result<(), String> {
    let record = make_done_record("G1", &["1", "3"]);
    store.save(&record).map_err(|e| e.to_string())?;
    let loaded = store.load("G1").map_err(|e| e.to_string())?;
    expect_eq("round-tripped record", loaded, Some(record))
}

fn save_replaces_whole_record<S: GroupStore>(store: S) -> Result<(), String> {
    store
        .save(&make_done_record("G1", &["1", "3"]))
        .map_err(|e| e.to_string())?;
    let failed = make_failed_record("G1");
    store.save(&failed).map_err(|e| e.to_string())?;
    let loaded = store.load("G1").map_err(|e| e.to_string())?;
    expect_eq("replaced record", loaded, Some(failed))
}

fn result_order_is_preserved<S: GroupStore>(store: S) -> Result<(), String> {
    let ids = ["9", "2", "40", "1"];
    store
        .save(&make_done_record("G1", &ids))
        .map_err(|e| e.to_string())?;
    let loaded = store
        .load("G1")
        .map_err(|e| e.to_string())?
        .ok_or("record vanished")?;
    expect_eq("result_ids", loaded.result_ids, ids.map(String::from).to_vec())
}
