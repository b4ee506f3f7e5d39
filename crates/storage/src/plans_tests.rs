// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::test_support::task;
use fleet_core::{PlanId, PlanStatus};

fn store() -> (tempfile::TempDir, PlanStore) {
    let tmp = tempfile::tempdir().unwrap();
    let store = PlanStore::new(tmp.path().to_path_buf());
    (tmp, store)
}

fn plan(id: &str) -> Plan {
    Plan {
        id: PlanId::new(id),
        project: "demo".to_string(),
        status: PlanStatus::Ready,
        tasks: vec![task("a", &[]), task("b", &["a"])],
        planning_session: None,
        created_at_ms: 1_700_000_000_000,
    }
}

#[test]
fn write_then_read_is_logically_equal() {
    let (_tmp, store) = store();
    let p = plan("plan-x");
    store.write(&p).unwrap();
    assert_eq!(store.read("plan-x"), Some(p));
}

#[test]
fn read_missing_is_none() {
    let (_tmp, store) = store();
    assert!(store.read("plan-nope").is_none());
}

#[test]
fn list_excludes_output_dropboxes() {
    let (_tmp, store) = store();
    store.write(&plan("plan-1")).unwrap();
    store.write(&plan("plan-2")).unwrap();
    store
        .write_output("plan-1", &PlanOutput { tasks: vec![task("a", &[])] })
        .unwrap();

    let mut ids: Vec<String> =
        store.list().into_iter().map(|p| p.id.as_str().to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["plan-1", "plan-2"]);
}

#[test]
fn output_dropbox_round_trips() {
    let (_tmp, store) = store();
    assert!(!store.output_exists("plan-1"));
    assert!(store.read_output("plan-1").is_none());

    let output = PlanOutput { tasks: vec![task("a", &[]), task("b", &["a"])] };
    store.write_output("plan-1", &output).unwrap();
    assert!(store.output_exists("plan-1"));
    assert_eq!(store.read_output("plan-1"), Some(output));
}

#[test]
fn malformed_output_reads_as_absent_but_existing() {
    let (tmp, store) = store();
    std::fs::write(tmp.path().join("plan-1-output.json"), "{ half written").unwrap();
    assert!(store.output_exists("plan-1"));
    assert!(store.read_output("plan-1").is_none());
}
