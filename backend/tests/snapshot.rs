//! Baseline file round trips.

use cleanslate_backend::{load_baseline, save_baseline, ProcessRecord, ProcessSet};
use proptest::prelude::*;
use tempfile::tempdir;

fn process_set() -> impl Strategy<Value = ProcessSet> {
    proptest::collection::btree_map(
        0..i32::MAX,
        "(?s).{0,40}",
        0..40,
    )
    .prop_map(|records| {
        records
            .into_iter()
            .map(|(pid, command)| ProcessRecord::new(pid, command))
            .collect()
    })
}

proptest! {
    #[test]
    fn save_then_load_round_trips(set in process_set()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        save_baseline(&set, &path).unwrap();
        prop_assert_eq!(load_baseline(&path).unwrap(), Some(set));
    }
}

#[test]
fn missing_baseline_is_absent() {
    let dir = tempdir().unwrap();
    assert_eq!(load_baseline(&dir.path().join("never-written")).unwrap(), None);
}
