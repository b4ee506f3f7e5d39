// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan DAG scenario: dependency-gated spawning and sibling rebases.

use super::harness::{fixture, Fixture};
use fleet_adapters::{CiSummary, FakePr, PrState};
use fleet_core::{test_support::task, EventKind, PlanOutput, SessionId};

async fn executing_plan(f: &Fixture) -> (fleet_core::Plan, SessionId, SessionId) {
    let plan = f.plans.create_plan("demo", "split the feature").await.unwrap();
    f.stores()
        .plans
        .write_output(
            plan.id.as_str(),
            &PlanOutput { tasks: vec![task("a", &[]), task("b", &[]), task("c", &["a", "b"])] },
        )
        .unwrap();
    f.plans.poll_planning("demo").await.unwrap();
    let approved = f.plans.approve_plan("demo", &plan.id).await.unwrap();

    let a = approved.task("a").unwrap().session_id.clone().expect("a spawned");
    let b = approved.task("b").unwrap().session_id.clone().expect("b spawned");
    assert!(approved.task("c").unwrap().session_id.is_none(), "c gated on a and b");
    (approved, a, b)
}

fn merge_branch(f: &Fixture, session: &SessionId, number: u64) {
    let branch = f.sessions.get("demo", session).unwrap().branch;
    let mut pr = FakePr::open(number);
    pr.ci = CiSummary::Passing;
    pr.state = PrState::Merged;
    f.scm.set_pr(&branch, pr);
}

#[tokio::test]
async fn dag_execution_with_sibling_rebases() {
    let f = fixture(|_| {});
    let (plan, a, b) = executing_plan(&f).await;

    // A merges: C still gated (B not merged); active sibling B gets a
    // rebase send.
    merge_branch(&f, &a, 31);
    f.lifecycle.run_cycle().await;

    let refreshed = f.plans.get("demo", &plan.id).unwrap();
    assert!(refreshed.task("c").unwrap().session_id.is_none(), "c waits for b");

    let rebases: Vec<_> = f
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::SessionRebaseSent)
        .collect();
    assert_eq!(rebases.len(), 1);
    assert_eq!(rebases[0].session_id.as_ref(), Some(&b));
    assert_eq!(rebases[0].data["mergedPr"], serde_json::json!(31));
    let rebase_message = f
        .runtime
        .sent()
        .into_iter()
        .map(|(_, text)| text)
        .find(|text| text.contains("Rebase"))
        .expect("rebase instruction delivered");
    assert!(rebase_message.contains("#31"), "{rebase_message}");
    assert!(rebase_message.contains("main"), "references default branch: {rebase_message}");

    // B merges: C spawns.
    merge_branch(&f, &b, 32);
    f.lifecycle.run_cycle().await;

    let refreshed = f.plans.get("demo", &plan.id).unwrap();
    let c_session = refreshed.task("c").unwrap().session_id.clone().expect("c spawned");
    assert!(f.sessions.get("demo", &c_session).is_ok());
    assert!(f.events().iter().any(|e| e.kind == EventKind::PlanTaskSpawned));
}

#[tokio::test]
async fn plan_completes_when_all_members_terminal() {
    let f = fixture(|_| {});
    let plan = f.plans.create_plan("demo", "small feature").await.unwrap();
    f.stores()
        .plans
        .write_output(plan.id.as_str(), &PlanOutput { tasks: vec![task("a", &[])] })
        .unwrap();
    f.plans.poll_planning("demo").await.unwrap();
    let approved = f.plans.approve_plan("demo", &plan.id).await.unwrap();
    let a = approved.task("a").unwrap().session_id.clone().unwrap();

    // The planner session is still alive; kill it so only task sessions
    // remain under supervision.
    let planner = plan.planning_session.clone().unwrap();
    f.sessions.kill("demo", &planner).await.unwrap();

    merge_branch(&f, &a, 41);
    f.lifecycle.run_cycle().await;

    assert_eq!(
        f.plans.get("demo", &plan.id).unwrap().status,
        fleet_core::PlanStatus::Done
    );
    assert!(f.events().iter().any(|e| e.kind == EventKind::PlanCompleted));
}
