use commongroups_storage::conformance::run_conformance_suite;
use commongroups_storage::{FsGroupStore, MemoryGroupStore};

#[test]
fn memory_store_conformance() {
    let report = run_conformance_suite(MemoryGroupStore::new);
    assert!(report.total > 0);
    assert!(report.failed == 0, "{report}");
}

#[test]
fn fs_store_conformance() {
    let root = tempfile::tempdir().unwrap();
    let counter = std::cell::Cell::new(0);
    let report = run_conformance_suite(|| {
        counter.set(counter.get() + 1);
        FsGroupStore::open(root.path().join(format!("run-{}", counter.get()))).unwrap()
    });
    assert!(report.failed == 0, "{report}");
}
