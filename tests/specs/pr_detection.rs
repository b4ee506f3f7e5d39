// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PR auto-detection: found, persisted, and classified in one cycle.

use super::harness::fixture;
use fleet_adapters::{CiSummary, FakePr};
use fleet_core::SessionStatus;
use fleet_engine::SpawnRequest;

#[tokio::test]
async fn detected_pr_is_persisted_and_classified() {
    let f = fixture(|_| {});
    let session = f.sessions.spawn(SpawnRequest::new("demo", "ship it")).await.unwrap();
    assert!(session.pr.is_none());

    let mut pr = FakePr::open(77);
    pr.ci = CiSummary::Failing;
    f.scm.set_pr(&session.branch, pr);

    f.lifecycle.run_cycle().await;

    let stores = f.stores();
    let record = stores.metadata.read(session.id.as_str()).unwrap();
    assert_eq!(record.pr(), Some("https://scm.example/pr/77"), "pr persisted to metadata");
    assert_eq!(
        record.status(),
        Some(SessionStatus::CiFailed),
        "classified by PR state, not stuck at working"
    );
}

#[tokio::test]
async fn no_pr_and_no_signal_promotes_to_working() {
    let f = fixture(|_| {});
    let session = f.sessions.spawn(SpawnRequest::new("demo", "ship it")).await.unwrap();
    f.lifecycle.run_cycle().await;
    assert_eq!(f.sessions.get("demo", &session.id).unwrap().status, SessionStatus::Working);
}
