// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dedup-with-escalation: skipped sends still consume the retry budget.

use super::harness::fixture;
use fleet_adapters::{CheckStatus, CiCheck, CiSummary, FakePr};
use fleet_core::{EventKind, ReactionAction, ReactionConfig};
use fleet_engine::SpawnRequest;

#[tokio::test]
async fn dedup_skips_feed_escalation() {
    let f = fixture(|config| {
        config.reactions.insert(
            "ci-failed".to_string(),
            ReactionConfig::new(ReactionAction::SendToAgent).with_retries(2),
        );
    });
    let session = f.sessions.spawn(SpawnRequest::new("demo", "fix it")).await.unwrap();
    let handle_id = session.runtime_handle.as_ref().unwrap().id.clone();
    let mut pr = FakePr::open(5);
    pr.ci = CiSummary::Failing;
    pr.checks =
        vec![CiCheck { name: "lint".to_string(), status: CheckStatus::Failing, url: None }];
    f.scm.set_pr(&session.branch, pr);

    // Cycle 1 sends (attempt 1).
    f.lifecycle.run_cycle().await;
    assert_eq!(f.runtime.sent().len(), 1);

    // Cycles 2 and 3: the agent's output shows it is on it; sends skipped
    // but attempts still count.
    f.runtime.set_output(&handle_id, "ok, fixing ci — rerunning the lint error locally");
    f.lifecycle.run_cycle().await;
    f.lifecycle.run_cycle().await;

    let events = f.events();
    let skipped: Vec<_> = events
        .iter()
        .filter(|e| {
            e.kind == EventKind::ReactionTriggered
                && e.data["skipped"] == serde_json::json!(true)
        })
        .collect();
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0].data["attempt"], serde_json::json!(2));
    assert_eq!(skipped[1].data["attempt"], serde_json::json!(3));
    assert_eq!(f.runtime.sent().len(), 1, "no second send");
    assert_eq!(
        f.lifecycle.reaction_attempts("demo", &session.id).get("ci-failed"),
        Some(&3)
    );
    assert!(!events.iter().any(|e| e.kind == EventKind::ReactionEscalated));

    // Cycle 4: output no longer looks busy; the spent budget escalates.
    f.runtime.set_output(&handle_id, "$");
    f.lifecycle.run_cycle().await;

    let escalated = f
        .events()
        .into_iter()
        .find(|e| e.kind == EventKind::ReactionEscalated)
        .expect("escalated after dedup cycles");
    assert_eq!(escalated.data["attempts"], serde_json::json!(4));
}
