// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::task;

fn plan_with(tasks: Vec<Task>) -> Plan {
    Plan {
        id: PlanId::new("plan-test"),
        project: "demo".to_string(),
        status: PlanStatus::Ready,
        tasks,
        planning_session: None,
        created_at_ms: 0,
    }
}

#[test]
fn valid_dag_passes() {
    let plan = plan_with(vec![task("a", &[]), task("b", &[]), task("c", &["a", "b"])]);
    assert!(plan.validate_dependencies().is_ok());
}

#[test]
fn unknown_dependency_is_rejected() {
    let plan = plan_with(vec![task("a", &["ghost"])]);
    assert_eq!(
        plan.validate_dependencies(),
        Err(PlanGraphError::UnknownDependency {
            task: "a".to_string(),
            dependency: "ghost".to_string(),
        })
    );
}

#[test]
fn two_node_cycle_is_rejected() {
    let plan = plan_with(vec![task("a", &["b"]), task("b", &["a"])]);
    assert!(matches!(plan.validate_dependencies(), Err(PlanGraphError::Cycle(_))));
}

#[test]
fn self_cycle_is_rejected() {
    let plan = plan_with(vec![task("a", &["a"])]);
    assert!(matches!(plan.validate_dependencies(), Err(PlanGraphError::Cycle(_))));
}

#[test]
fn deep_chain_is_fine() {
    let tasks = vec![
        task("a", &[]),
        task("b", &["a"]),
        task("c", &["b"]),
        task("d", &["c"]),
        task("e", &["a", "d"]),
    ];
    assert!(validate_dependencies(&tasks).is_ok());
}

#[test]
fn plan_json_round_trips() {
    let mut plan = plan_with(vec![task("a", &[]), task("b", &["a"])]);
    plan.tasks[0].session_id = Some(SessionId::new("fc-1"));
    plan.tasks[0].issue_number = Some(42);
    let raw = serde_json::to_string(&plan).unwrap();
    let back: Plan = serde_json::from_str(&raw).unwrap();
    assert_eq!(back, plan);
}

#[test]
fn plan_output_parses_task_list() {
    let raw = r#"{"tasks":[{"id":"a","title":"T","description":"D","scope":"small"}]}"#;
    let output: PlanOutput = serde_json::from_str(raw).unwrap();
    assert_eq!(output.tasks.len(), 1);
    assert_eq!(output.tasks[0].scope, TaskScope::Small);
    assert!(output.tasks[0].dependencies.is_empty());
}
