// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI-fix scenarios: the happy path and attempt exhaustion.

use super::harness::{fixture, Fixture};
use fleet_adapters::{CheckStatus, CiCheck, CiSummary, FakePr};
use fleet_core::{
    EventKind, EventPriority, ReactionAction, ReactionConfig, Session,
};
use fleet_engine::SpawnRequest;

fn ci_config() -> impl FnOnce(&mut fleet_core::OrchestratorConfig) {
    |config| {
        config.reactions.insert(
            "ci-failed".to_string(),
            ReactionConfig::new(ReactionAction::SendToAgent)
                .with_retries(2)
                .with_escalate_after("30m"),
        );
    }
}

async fn session_with_failing_ci(f: &Fixture) -> Session {
    let session = f.sessions.spawn(SpawnRequest::new("demo", "fix issue 42")).await.unwrap();
    let mut pr = FakePr::open(21);
    pr.ci = CiSummary::Failing;
    pr.checks =
        vec![CiCheck { name: "jest".to_string(), status: CheckStatus::Failing, url: None }];
    f.scm.set_pr(&session.branch, pr);
    session
}

#[tokio::test]
async fn ci_fix_happy_path() {
    let f = fixture(ci_config());
    let session = session_with_failing_ci(&f).await;

    // Cycle 1: classified ci_failed, enriched fix message sent.
    f.lifecycle.run_cycle().await;
    let events = f.events();
    let fix_sent = events
        .iter()
        .find(|e| e.kind == EventKind::CiFixSent)
        .expect("fix message recorded");
    assert_eq!(fix_sent.data["attempt"], serde_json::json!(1));
    assert_eq!(f.runtime.sent().len(), 1);
    let message = &f.runtime.sent()[0].1;
    assert!(message.contains("## Failing checks"), "{message}");

    // The agent fixes it; cycle 2 classifies pr_open and settles the attempt.
    f.scm.update_pr(&session.branch, |pr| {
        pr.ci = CiSummary::Passing;
        pr.checks = vec![];
    });
    f.lifecycle.run_cycle().await;

    let events = f.events();
    let passing = events
        .iter()
        .find(|e| e.kind == EventKind::CiPassing)
        .expect("ci.passing recorded");
    assert_eq!(passing.data["resolved"], serde_json::json!(true));
    assert_eq!(passing.data["attempt"], serde_json::json!(1));
    assert!(!events.iter().any(|e| e.kind == EventKind::ReactionEscalated));
    assert_eq!(
        f.sessions.get("demo", &session.id).unwrap().status,
        fleet_core::SessionStatus::PrOpen
    );
}

#[tokio::test]
async fn ci_fix_exhaustion_escalates() {
    let f = fixture(ci_config());
    session_with_failing_ci(&f).await;

    // Three consecutive cycles observe ci_failed.
    f.lifecycle.run_cycle().await;
    f.lifecycle.run_cycle().await;
    f.lifecycle.run_cycle().await;

    let events = f.events();
    let fix_attempts: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::CiFixSent)
        .map(|e| e.data["attempt"].clone())
        .collect();
    assert_eq!(fix_attempts, vec![serde_json::json!(1), serde_json::json!(2)]);

    let escalated = events
        .iter()
        .find(|e| e.kind == EventKind::ReactionEscalated)
        .expect("escalation recorded");
    assert_eq!(escalated.data["reactionKey"], serde_json::json!("ci-failed"));
    assert_eq!(escalated.data["attempts"], serde_json::json!(3));

    let urgent_notifications: Vec<_> = f
        .notify
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::ReactionEscalated)
        .collect();
    assert_eq!(urgent_notifications.len(), 1);
    assert_eq!(urgent_notifications[0].priority, EventPriority::Urgent);
}

#[tokio::test]
async fn ci_fix_escalates_on_elapsed_time() {
    let f = fixture(ci_config());
    session_with_failing_ci(&f).await;

    f.lifecycle.run_cycle().await; // attempt 1
    f.clock.advance(std::time::Duration::from_secs(31 * 60));
    f.lifecycle.run_cycle().await; // window blown → escalate

    assert!(f.events().iter().any(|e| e.kind == EventKind::ReactionEscalated));
}
