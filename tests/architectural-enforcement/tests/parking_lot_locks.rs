//! All locks come from parking_lot: no poisoning, so no lock results to
//! unwrap.

use architectural_enforcement::violations;

fn uses_std_lock(line: &str) -> bool {
    let line = line.trim();
    if !line.contains("std::sync") {
        return false;
    }
    ["Mutex", "RwLock", "Condvar"]
        .iter()
        .any(|lock| line.contains(lock))
}

#[test]
fn test_no_std_sync_locks() {
    let found = violations(uses_std_lock);
    assert!(
        found.is_empty(),
        "std::sync locks in production code (use parking_lot):\n{}",
        found.join("\n")
    );
}

#[test]
fn test_detector_matches_grouped_imports() {
    assert!(uses_std_lock("use std::sync::{Arc, Mutex};"));
    assert!(!uses_std_lock("use std::sync::Arc;"));
    assert!(!uses_std_lock("use parking_lot::{Mutex, RwLock};"));
}
