// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{EventKind, SessionId};
use serde_json::json;

fn event(kind: EventKind, data: serde_json::Value) -> OrchestratorEvent {
    OrchestratorEvent::new(kind, "demo", Some(SessionId::new("fc-1")), "m", 0).with_data(data)
}

#[test]
fn empty_log_aggregates_empty() {
    let analytics = aggregate_reactions(&[]);
    assert!(analytics.per_key.is_empty());
    assert_eq!(analytics.ci_fix, CiFixStats::default());
}

#[test]
fn counts_triggered_and_skipped_per_key() {
    let events = vec![
        event(EventKind::ReactionTriggered, json!({"reactionKey": "stuck"})),
        event(EventKind::ReactionTriggered, json!({"reactionKey": "stuck", "skipped": true})),
        event(EventKind::ReactionTriggered, json!({"reactionKey": "needs-input"})),
    ];
    let analytics = aggregate_reactions(&events);
    assert_eq!(analytics.per_key["stuck"].triggered, 2);
    assert_eq!(analytics.per_key["stuck"].skipped, 1);
    assert_eq!(analytics.per_key["needs-input"].triggered, 1);
}

#[test]
fn counts_escalations() {
    let events = vec![
        event(EventKind::ReactionEscalated, json!({"reactionKey": "ci-failed", "attempts": 3})),
    ];
    let analytics = aggregate_reactions(&events);
    assert_eq!(analytics.per_key["ci-failed"].escalated, 1);
}

#[test]
fn ci_fix_chain_produces_resolution_rate_inputs() {
    let events = vec![
        event(EventKind::CiFixSent, json!({"attempt": 1, "failingChecks": ["jest"]})),
        event(EventKind::CiFixSent, json!({"attempt": 2, "failingChecks": ["jest"]})),
        event(EventKind::CiPassing, json!({"resolved": true, "attempt": 2})),
        event(EventKind::CiFixFailed, json!({"attempt": 1})),
    ];
    let analytics = aggregate_reactions(&events);
    assert_eq!(analytics.ci_fix.fix_sent, 2);
    assert_eq!(analytics.ci_fix.resolved, 1);
    assert_eq!(analytics.ci_fix.fix_failed, 1);
    assert_eq!(analytics.ci_fix.mean_attempts_to_resolution, Some(2.0));
    assert_eq!(analytics.per_key["ci-failed"].triggered, 2);
}

#[test]
fn unresolved_passing_does_not_count() {
    let events = vec![event(EventKind::CiPassing, json!({}))];
    let analytics = aggregate_reactions(&events);
    assert_eq!(analytics.ci_fix.resolved, 0);
    assert!(analytics.ci_fix.mean_attempts_to_resolution.is_none());
}
