// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    merged = { SessionStatus::Merged },
    killed = { SessionStatus::Killed },
    done   = { SessionStatus::Done },
)]
fn terminal_statuses(status: SessionStatus) {
    assert!(status.is_terminal());
}

#[yare::parameterized(
    spawning          = { SessionStatus::Spawning },
    working           = { SessionStatus::Working },
    pr_open           = { SessionStatus::PrOpen },
    ci_failed         = { SessionStatus::CiFailed },
    review_pending    = { SessionStatus::ReviewPending },
    changes_requested = { SessionStatus::ChangesRequested },
    approved          = { SessionStatus::Approved },
    mergeable         = { SessionStatus::Mergeable },
    needs_input       = { SessionStatus::NeedsInput },
    stuck             = { SessionStatus::Stuck },
    errored           = { SessionStatus::Errored },
)]
fn non_terminal_statuses(status: SessionStatus) {
    assert!(!status.is_terminal());
}

#[yare::parameterized(
    pr_open   = { SessionStatus::PrOpen, true },
    mergeable = { SessionStatus::Mergeable, true },
    merged    = { SessionStatus::Merged, true },
    working   = { SessionStatus::Working, false },
    ci_failed = { SessionStatus::CiFailed, false },
    killed    = { SessionStatus::Killed, false },
)]
fn pr_context(status: SessionStatus, expected: bool) {
    assert_eq!(status.has_pr_context(), expected);
}

#[test]
fn status_display_round_trips_from_str() {
    for status in [
        SessionStatus::Spawning,
        SessionStatus::Working,
        SessionStatus::PrOpen,
        SessionStatus::CiFailed,
        SessionStatus::ReviewPending,
        SessionStatus::ChangesRequested,
        SessionStatus::Approved,
        SessionStatus::Mergeable,
        SessionStatus::Merged,
        SessionStatus::NeedsInput,
        SessionStatus::Stuck,
        SessionStatus::Errored,
        SessionStatus::Killed,
        SessionStatus::Done,
    ] {
        let parsed: SessionStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
}

#[test]
fn unknown_status_is_an_error() {
    let err = "banana".parse::<SessionStatus>().unwrap_err();
    assert_eq!(err, UnknownStatus("banana".to_string()));
}

#[test]
fn runtime_handle_metadata_round_trip() {
    let mut handle = RuntimeHandle::new("h-1", "tmux");
    handle.data = serde_json::json!({"window": 3});
    let raw = handle.to_metadata();
    let back = RuntimeHandle::from_metadata(&raw).unwrap();
    assert_eq!(back, handle);
}

#[test]
fn runtime_handle_from_garbage_is_none() {
    assert!(RuntimeHandle::from_metadata("not json").is_none());
}

#[test]
fn session_builder_defaults_are_live() {
    let session = Session::builder().build();
    assert_eq!(session.status, SessionStatus::Working);
    assert!(!session.is_terminal());
    assert!(session.runtime_handle.is_some());
}
