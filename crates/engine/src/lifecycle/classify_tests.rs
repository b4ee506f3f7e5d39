// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::session::SpawnRequest;
use crate::test_helpers::{harness, Harness};
use fleet_adapters::{CiSummary, FakePr, PrState, Review, ReviewDecision, ReviewState};
use fleet_core::{ActivityState, SessionStatus};

async fn spawned(h: &Harness) -> fleet_core::Session {
    h.sessions.spawn(SpawnRequest::new("demo", "do a thing")).await.unwrap()
}

async fn classify_now(h: &Harness, session: &fleet_core::Session, old: SessionStatus) -> SessionStatus {
    let project = h.sessions.config().project("demo").unwrap().clone();
    let stores = h.sessions.stores("demo").unwrap();
    let mut session = session.clone();
    session.status = old;
    classify(&h.lifecycle.inner, &project, &stores, &mut session, old).await
}

// ── Probe 1: liveness ─────────────────────────────────────────────────

#[tokio::test]
async fn dead_runtime_classifies_killed() {
    let h = harness();
    let session = spawned(&h).await;
    h.runtime.kill(&session.runtime_handle.as_ref().unwrap().id);

    assert_eq!(classify_now(&h, &session, SessionStatus::Working).await, SessionStatus::Killed);
}

#[tokio::test]
async fn missing_handle_classifies_killed() {
    let h = harness();
    let mut session = spawned(&h).await;
    session.runtime_handle = None;

    assert_eq!(classify_now(&h, &session, SessionStatus::Working).await, SessionStatus::Killed);
}

#[tokio::test]
async fn liveness_probe_failure_preserves_status() {
    let h = harness();
    let session = spawned(&h).await;
    h.runtime.fail_probes(true);

    assert_eq!(
        classify_now(&h, &session, SessionStatus::CiFailed).await,
        SessionStatus::CiFailed
    );
}

// ── Probe 2: activity ─────────────────────────────────────────────────

#[tokio::test]
async fn waiting_input_classifies_needs_input() {
    let h = harness();
    let session = spawned(&h).await;
    h.runtime.set_output(&session.runtime_handle.as_ref().unwrap().id, "May I edit main.rs?");
    h.agent.set_activity(Some(ActivityState::WaitingInput));

    assert_eq!(
        classify_now(&h, &session, SessionStatus::Working).await,
        SessionStatus::NeedsInput
    );
}

#[tokio::test]
async fn dead_process_with_live_session_classifies_killed() {
    // Some agents leave output on screen after the process exits.
    let h = harness();
    let session = spawned(&h).await;
    h.runtime.set_output(&session.runtime_handle.as_ref().unwrap().id, "done, exiting");
    h.agent.set_activity(Some(ActivityState::Active));
    h.agent.set_process_running(false);

    assert_eq!(classify_now(&h, &session, SessionStatus::Working).await, SessionStatus::Killed);
}

#[tokio::test]
async fn empty_output_skips_activity_probe() {
    let h = harness();
    let session = spawned(&h).await;
    h.agent.set_process_running(false); // would kill, but no output to trigger it

    assert_eq!(classify_now(&h, &session, SessionStatus::Working).await, SessionStatus::Working);
}

#[tokio::test]
async fn activity_probe_failure_preserves_human_states() {
    for status in [SessionStatus::Stuck, SessionStatus::NeedsInput] {
        let h = harness();
        let session = spawned(&h).await;
        h.runtime.set_output(&session.runtime_handle.as_ref().unwrap().id, "thinking…");
        h.agent.fail_probes(true);

        assert_eq!(classify_now(&h, &session, status).await, status);
    }
}

#[tokio::test]
async fn activity_probe_failure_does_not_stick_working() {
    let h = harness();
    let session = spawned(&h).await;
    h.runtime.set_output(&session.runtime_handle.as_ref().unwrap().id, "thinking…");
    h.agent.fail_probes(true);

    // No PR, old was working: falls through to the fallback.
    assert_eq!(classify_now(&h, &session, SessionStatus::Working).await, SessionStatus::Working);
}

// ── Probe 3: PR auto-detection ────────────────────────────────────────

#[tokio::test]
async fn detected_pr_is_persisted_and_classified_same_cycle() {
    let h = harness();
    let session = spawned(&h).await;
    let mut pr = FakePr::open(5);
    pr.ci = CiSummary::Failing;
    h.scm.set_pr(&session.branch, pr);

    let status = classify_now(&h, &session, SessionStatus::Working).await;
    assert_eq!(status, SessionStatus::CiFailed, "classified through to PR state, not pr_open");

    let stores = h.sessions.stores("demo").unwrap();
    let record = stores.metadata.read(session.id.as_str()).unwrap();
    assert_eq!(record.pr(), Some("https://scm.example/pr/5"));
}

// ── Probe 4: PR state ─────────────────────────────────────────────────

async fn with_pr(h: &Harness, configure: impl FnOnce(&mut FakePr)) -> fleet_core::Session {
    let session = spawned(h).await;
    let mut pr = FakePr::open(9);
    configure(&mut pr);
    h.scm.set_pr(&session.branch, pr);
    classify_now(h, &session, SessionStatus::Working).await; // persists pr url
    h.sessions.get("demo", &session.id).unwrap()
}

#[tokio::test]
async fn merged_pr_classifies_merged() {
    let h = harness();
    let session = with_pr(&h, |pr| pr.state = PrState::Merged).await;
    assert_eq!(classify_now(&h, &session, SessionStatus::PrOpen).await, SessionStatus::Merged);
}

#[tokio::test]
async fn closed_pr_classifies_killed() {
    let h = harness();
    let session = with_pr(&h, |pr| pr.state = PrState::Closed).await;
    assert_eq!(classify_now(&h, &session, SessionStatus::PrOpen).await, SessionStatus::Killed);
}

#[tokio::test]
async fn failing_ci_wins_over_review_state() {
    let h = harness();
    let session = with_pr(&h, |pr| {
        pr.ci = CiSummary::Failing;
        pr.decision = ReviewDecision::Approved;
        pr.mergeable = true;
    })
    .await;
    assert_eq!(classify_now(&h, &session, SessionStatus::PrOpen).await, SessionStatus::CiFailed);
}

#[tokio::test]
async fn review_state_mapping() {
    let cases = [
        (ReviewDecision::ChangesRequested, false, SessionStatus::ChangesRequested),
        (ReviewDecision::Approved, false, SessionStatus::Approved),
        (ReviewDecision::Approved, true, SessionStatus::Mergeable),
        (ReviewDecision::Pending, false, SessionStatus::ReviewPending),
        (ReviewDecision::None, false, SessionStatus::PrOpen),
    ];
    for (decision, mergeable, expected) in cases {
        let h = harness();
        let session = with_pr(&h, |pr| {
            pr.ci = CiSummary::Passing;
            pr.decision = decision;
            pr.mergeable = mergeable;
        })
        .await;
        assert_eq!(
            classify_now(&h, &session, SessionStatus::PrOpen).await,
            expected,
            "decision {decision:?} mergeable {mergeable}"
        );
    }
}

fn commented(body: &str) -> Review {
    Review {
        state: ReviewState::Commented,
        body: body.to_string(),
        submitted_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn none_decision_with_comment_verdict_classifies_changes_requested() {
    // Self-review restriction: the bot reviewer could only comment, so the
    // formal decision stays none and the verdict lives in the body.
    let h = harness();
    let session = with_pr(&h, |pr| {
        pr.ci = CiSummary::Passing;
        pr.decision = ReviewDecision::None;
        pr.reviews = vec![commented("REQUEST_CHANGES: the migration has no rollback.")];
    })
    .await;
    assert_eq!(
        classify_now(&h, &session, SessionStatus::PrOpen).await,
        SessionStatus::ChangesRequested
    );
}

#[tokio::test]
async fn none_decision_with_approve_comment_never_infers_approval() {
    let h = harness();
    let session = with_pr(&h, |pr| {
        pr.ci = CiSummary::Passing;
        pr.decision = ReviewDecision::None;
        pr.reviews = vec![commented("APPROVE, nice and small")];
    })
    .await;
    assert_eq!(
        classify_now(&h, &session, SessionStatus::PrOpen).await,
        SessionStatus::PrOpen,
        "approval comes only from the formal decision"
    );
}

#[tokio::test]
async fn scm_probe_failure_preserves_status() {
    let h = harness();
    let session = with_pr(&h, |pr| pr.ci = CiSummary::Failing).await;
    h.scm.fail_probes(true);

    assert_eq!(
        classify_now(&h, &session, SessionStatus::CiFailed).await,
        SessionStatus::CiFailed
    );
}

// ── Probe 5: fallback ─────────────────────────────────────────────────

#[tokio::test]
async fn fallback_promotion() {
    let cases = [
        (SessionStatus::Spawning, SessionStatus::Working),
        (SessionStatus::Stuck, SessionStatus::Working),
        (SessionStatus::NeedsInput, SessionStatus::Working),
        (SessionStatus::Working, SessionStatus::Working),
        (SessionStatus::CiFailed, SessionStatus::CiFailed),
    ];
    for (old, expected) in cases {
        let h = harness();
        let session = spawned(&h).await;
        assert_eq!(classify_now(&h, &session, old).await, expected, "old {old}");
    }
}
