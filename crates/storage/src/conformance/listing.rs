use super::{expect_eq, make_done_record, make_failed_record, TestResult};
use crate::GroupStore;

pub(super) fn run_listing_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: GroupStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result("listing", "empty_store_lists_nothing", empty(factory())),
        TestResult::from_result(
            "listing",
            "list_is_sorted_by_group_id",
            sorted(factory()),
        ),
        TestResult::from_result(
            "listing",
            "list_includes_every_status",
            every_status(factory()),
        ),
    ]
}

fn ids<S: GroupStore>(store: &S) -> Result<Vec<String>, String> {
    Ok(store
        .list()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|r| r.group_id)
        .collect())
}

fn empty<S: GroupStore>(store: S) -> Result<(), String> {
    expect_eq("ids", ids(&store)?, Vec::<String>::new())
}

fn sorted<S: GroupStore>(store: S) -> Result<(), String> {
    for id in ["G3", "G1", "G2"] {
        store
            .save(&make_done_record(id, &[]))
            .map_err(|e| e.to_string())?;
    }
    expect_eq("ids", ids(&store)?, vec!["G1".into(), "G2".into(), "G3".into()])
}

fn every_status<S: GroupStore>(store: S) -> Result<(), String> {
    store
        .save(&make_done_record("A", &["1"]))
        .map_err(|e| e.to_string())?;
    store
        .save(&make_failed_record("B"))
        .map_err(|e| e.to_string())?;
    expect_eq("ids", ids(&store)?, vec!["A".into(), "B".into()])
}
