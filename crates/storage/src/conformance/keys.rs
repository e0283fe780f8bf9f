use super::{make_done_record, TestResult};
use crate::{GroupStore, StorageError};

const UNSAFE_KEYS: [&str; 4] = ["../escape", "a/b", ".hidden", ""];

pub(super) fn run_key_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: GroupStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result("keys", "save_rejects_unsafe_keys", save_rejects(factory())),
        TestResult::from_result("keys", "load_rejects_unsafe_keys", load_rejects(factory())),
        TestResult::from_result(
            "keys",
            "punctuated_keys_are_accepted",
            punctuated_keys(factory()),
        ),
    ]
}

fn expect_invalid_key(what: &str, result: Result<(), StorageError>) -> Result<(), String> {
    match result {
        Err(StorageError::InvalidKey { .. }) => Ok(()),
        Err(other) => Err(format!("{}: expected InvalidKey, got {}", what, other)),
        Ok(()) => Err(format!("{}: expected InvalidKey, got Ok", what)),
    }
}

fn save_rejects<S: GroupStore>(store: S) -> Result<(), String> {
    for key in UNSAFE_KEYS {
        expect_invalid_key(key, store.save(&make_done_record(key, &[])))?;
    }
    Ok(())
}

fn load_rejects<S: GroupStore>(store: S) -> Result<(), String> {
    for key in UNSAFE_KEYS {
        expect_invalid_key(key, store.load(key).map(|_| ()))?;
    }
    Ok(())
}

fn punctuated_keys<S: GroupStore>(store: S) -> Result<(), String> {
    let key = "CMG-0042_v2.1";
    store
        .save(&make_done_record(key, &["7"]))
        .map_err(|e| e.to_string())?;
    match store.load(key).map_err(|e| e.to_string())? {
        Some(record) if record.group_id == key => Ok(()),
        other => Err(format!("expected record {}, got {:?}", key, other)),
    }
}
