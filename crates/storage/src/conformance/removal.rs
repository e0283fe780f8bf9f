use super::{expect_eq, make_done_record, TestResult};
use crate::GroupStore;

pub(super) fn run_removal_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: GroupStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "removal",
            "remove_existing_returns_true",
            remove_existing(factory()),
        ),
        TestResult::from_result(
            "removal",
            "remove_missing_returns_false",
            remove_missing(factory()),
        ),
        TestResult::from_result(
            "removal",
            "remove_leaves_other_groups",
            remove_leaves_others(factory()),
        ),
    ]
}

fn remove_existing<S: GroupStore>(store: S) -> Result<(), String> {
    store
        .save(&make_done_record("G1", &["1"]))
        .map_err(|e| e.to_string())?;
    expect_eq("removed", store.remove("G1").map_err(|e| e.to_string())?, true)?;
    expect_eq(
        "load after remove",
        store.load("G1").map_err(|e| e.to_string())?,
        None,
    )
}

fn remove_missing<S: GroupStore>(store: S) -> Result<(), String> {
    expect_eq("removed", store.remove("G1").map_err(|e| e.to_string())?, false)
}

fn remove_leaves_others<S: GroupStore>(store: S) -> Result<(), String> {
    for id in ["G1", "G2"] {
        store
            .save(&make_done_record(id, &["1"]))
            .map_err(|e| e.to_string())?;
    }
    store.remove("G1").map_err(|e| e.to_string())?;
    let remaining: Vec<String> = store
        .list()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|r| r.group_id)
        .collect();
    expect_eq("remaining", remaining, vec!["G2".to_string()])
}
