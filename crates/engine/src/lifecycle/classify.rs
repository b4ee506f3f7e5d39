// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State classification: probes in strict priority order, first definitive
//! answer wins.
//!
//! 1. runtime liveness, 2. activity (waiting-input / dead process),
//! 3. PR auto-detection (persisted mid-cycle, then falls through),
//! 4. PR / CI / review state, 5. fallback promotion.
//!
//! Probe failures never invent a status: a failed liveness or SCM probe
//! preserves the current one, and a failed activity probe preserves an
//! existing `stuck`/`needs_input` instead of coercing to `working`.

use super::{probe, reaction, Inner};
use fleet_adapters::{CiSummary, PrState, PullRequest, ReviewDecision};
use fleet_core::{ActivityState, Clock, ProjectConfig, Session, SessionStatus};
use fleet_storage::ProjectStores;

/// How many trailing lines of terminal output feed the activity probe.
const ACTIVITY_OUTPUT_LINES: usize = 50;

pub(crate) async fn classify<C: Clock>(
    inner: &Inner<C>,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &mut Session,
    old: SessionStatus,
) -> SessionStatus {
    let runtime = inner.sessions.runtime_for(project);
    let agent = inner.sessions.agent_for(project);
    let scm = inner.sessions.scm_for(project);

    // 1. Runtime liveness. A session without a handle has nothing running.
    let Some(handle) = session.runtime_handle.clone() else {
        return SessionStatus::Killed;
    };
    if let Some(runtime) = &runtime {
        match probe(runtime.is_alive(&handle)).await {
            Ok(false) => return SessionStatus::Killed,
            Ok(true) => {}
            Err(()) => return old,
        }

        // 2. Activity, only against non-empty output.
        if let Some(agent) = &agent {
            match probe(runtime.output(&handle, ACTIVITY_OUTPUT_LINES)).await {
                Ok(output) if !output.trim().is_empty() => {
                    match probe(agent.detect_activity(&output)).await {
                        Ok(activity) => {
                            session.activity = activity;
                            if activity == Some(ActivityState::WaitingInput) {
                                return SessionStatus::NeedsInput;
                            }
                            // Some agents leave output on screen after the
                            // process dies, so the process probe runs for
                            // idle and active alike.
                            match probe(agent.is_process_running(&handle)).await {
                                Ok(false) => return SessionStatus::Killed,
                                Ok(true) => {}
                                Err(()) => {
                                    if matches!(
                                        old,
                                        SessionStatus::Stuck | SessionStatus::NeedsInput
                                    ) {
                                        return old;
                                    }
                                }
                            }
                        }
                        Err(()) => {
                            if matches!(old, SessionStatus::Stuck | SessionStatus::NeedsInput) {
                                return old;
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(()) => {
                    if matches!(old, SessionStatus::Stuck | SessionStatus::NeedsInput) {
                        return old;
                    }
                }
            }
        }
    }

    // 3. PR auto-detection. Persist in the same cycle, then fall through so
    // the PR state can classify immediately.
    if session.pr.is_none() {
        if let Some(scm) = &scm {
            if let Ok(Some(pr)) = probe(scm.detect_pr(session, project)).await {
                tracing::info!(session_id = %session.id, pr = %pr.url, "pr detected");
                if let Err(e) =
                    stores.metadata.update(session.id.as_str(), |r| r.set_pr(&pr.url))
                {
                    tracing::warn!(session_id = %session.id, error = %e, "pr persist failed");
                }
                session.pr = Some(pr.url);
            }
        }
    }

    // 4. PR state.
    if let (Some(url), Some(scm)) = (&session.pr, &scm) {
        let pr = PullRequest::from_url(url);
        let state = match probe(scm.pr_state(&pr)).await {
            Ok(state) => state,
            Err(()) => return old,
        };
        match state {
            PrState::Merged => return SessionStatus::Merged,
            PrState::Closed => return SessionStatus::Killed,
            PrState::Open => {}
        }

        match probe(scm.ci_summary(&pr)).await {
            Ok(CiSummary::Failing) => return SessionStatus::CiFailed,
            Ok(_) => {}
            Err(()) => return old,
        }

        let decision = match probe(scm.review_decision(&pr)).await {
            Ok(decision) => decision,
            Err(()) => return old,
        };
        return match decision {
            ReviewDecision::ChangesRequested => SessionStatus::ChangesRequested,
            ReviewDecision::Approved => {
                let mergeable = probe(scm.mergeability(&pr))
                    .await
                    .map(|m| m.mergeable)
                    .unwrap_or(false);
                if mergeable {
                    SessionStatus::Mergeable
                } else {
                    SessionStatus::Approved
                }
            }
            ReviewDecision::Pending => SessionStatus::ReviewPending,
            ReviewDecision::None => {
                // Self-review restrictions can leave the formal decision
                // empty while the verdict sits in a review or comment body.
                // A literal REQUEST_CHANGES token counts as a change
                // request; anything else (including APPROVE) stays pr_open.
                let reviews = match probe(scm.reviews(&pr)).await {
                    Ok(reviews) => reviews,
                    Err(()) => return old,
                };
                let comments =
                    probe(scm.pending_comments(&pr)).await.unwrap_or_default();
                if reaction::feedback_requests_changes(&reviews, &comments) {
                    SessionStatus::ChangesRequested
                } else {
                    SessionStatus::PrOpen
                }
            }
        };
    }

    // 5. Fallback: a session that was spawning (or recovered from a human
    // condition) and shows no stronger signal is working.
    match old {
        SessionStatus::Spawning | SessionStatus::Stuck | SessionStatus::NeedsInput => {
            SessionStatus::Working
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
