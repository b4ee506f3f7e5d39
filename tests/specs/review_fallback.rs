// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review-decision `none` fallback: when self-review restrictions keep the
//! formal decision empty, a `REQUEST_CHANGES` token in a comment body still
//! drives the review gate — and silence never becomes approval.

use super::harness::fixture;
use fleet_adapters::{
    CiSummary, FakePr, PendingComment, Review, ReviewDecision, ReviewState,
};
use fleet_core::{EventKind, ReactionAction, ReactionConfig, SessionStatus};
use fleet_engine::SpawnRequest;

fn commented(body: &str) -> Review {
    Review {
        state: ReviewState::Commented,
        body: body.to_string(),
        submitted_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn commented_request_changes_reaches_the_session() {
    let f = fixture(|config| {
        config.reactions.insert(
            "changes-requested".to_string(),
            ReactionConfig::new(ReactionAction::ReviewGate).with_retries(9),
        );
    });
    let session = f.sessions.spawn(SpawnRequest::new("demo", "add caching")).await.unwrap();

    let mut pr = FakePr::open(14);
    pr.ci = CiSummary::Passing;
    // The review bot could only comment on its own PR; the verdict lives in
    // the body, the formal decision stays none.
    pr.decision = ReviewDecision::None;
    pr.reviews = vec![commented("REQUEST_CHANGES: the cache is never invalidated.")];
    pr.comments = vec![PendingComment {
        path: Some("src/cache.rs".to_string()),
        line: Some(10),
        body: "stale read here".to_string(),
    }];
    f.scm.set_pr(&session.branch, pr);

    f.lifecycle.run_cycle().await;

    assert_eq!(
        f.sessions.get("demo", &session.id).unwrap().status,
        SessionStatus::ChangesRequested,
        "comment-body verdict classified as changes_requested"
    );
    let sent = f.runtime.sent();
    assert_eq!(sent.len(), 1, "feedback forwarded to the coding session");
    let message = &sent[0].1;
    assert!(message.contains("the cache is never invalidated"), "{message}");
    assert!(message.contains("src/cache.rs:10"), "{message}");
    assert!(f.events().iter().any(|e| e.kind == EventKind::ReviewFeedbackSent));

    let stores = f.stores();
    assert_eq!(stores.metadata.read(session.id.as_str()).unwrap().review_attempts(), 1);
}

#[tokio::test]
async fn approve_comment_alone_never_infers_approval() {
    let f = fixture(|_| {});
    let session = f.sessions.spawn(SpawnRequest::new("demo", "add caching")).await.unwrap();

    let mut pr = FakePr::open(15);
    pr.ci = CiSummary::Passing;
    pr.decision = ReviewDecision::None;
    pr.reviews = vec![commented("APPROVE — looks good to me")];
    pr.mergeable = true;
    f.scm.set_pr(&session.branch, pr);

    f.lifecycle.run_cycle().await;

    assert_eq!(
        f.sessions.get("demo", &session.id).unwrap().status,
        SessionStatus::PrOpen,
        "no formal decision means no approval, however the comment reads"
    );
}
