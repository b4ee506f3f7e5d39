// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition handling: persist, record, react, coordinate.

use super::{probe, reaction, Inner};
use crate::outcome::{outcome_kind, spawn_retrospective};
use fleet_adapters::{CheckStatus, PullRequest};
use fleet_core::{
    resolve_reaction, Clock, EventKind, EventPriority, OrchestratorEvent, ProjectConfig,
    ReactionAction, Session, SessionStatus,
};
use fleet_storage::ProjectStores;
use serde_json::json;

/// Event kind recorded when a session lands in a status.
pub(crate) fn status_event_kind(status: SessionStatus) -> Option<EventKind> {
    Some(match status {
        // Entered only via spawn/restore, which record their own events.
        SessionStatus::Spawning => return None,
        SessionStatus::Working => EventKind::SessionWorking,
        SessionStatus::PrOpen => EventKind::PrCreated,
        SessionStatus::CiFailed => EventKind::CiFailing,
        SessionStatus::ReviewPending => EventKind::ReviewPending,
        SessionStatus::ChangesRequested => EventKind::ReviewChangesRequested,
        SessionStatus::Approved => EventKind::ReviewApproved,
        SessionStatus::Mergeable => EventKind::PrReady,
        SessionStatus::Merged => EventKind::PrMerged,
        SessionStatus::NeedsInput => EventKind::SessionNeedsInput,
        SessionStatus::Stuck => EventKind::SessionStuck,
        SessionStatus::Errored => EventKind::SessionErrored,
        SessionStatus::Killed => EventKind::SessionKilled,
        SessionStatus::Done => EventKind::SessionDone,
    })
}

/// Reaction key governing an event kind, when one exists.
pub(crate) fn reaction_key_for(kind: EventKind) -> Option<&'static str> {
    Some(match kind {
        EventKind::CiFailing => "ci-failed",
        EventKind::ReviewChangesRequested => "changes-requested",
        EventKind::PrCreated => "pr-created",
        EventKind::SessionNeedsInput => "needs-input",
        EventKind::SessionStuck => "stuck",
        EventKind::SessionErrored => "errored",
        EventKind::PrReady => "mergeable",
        EventKind::PlanCompleted => "plan-complete",
        _ => return None,
    })
}

fn status_message(session: &Session, status: SessionStatus) -> String {
    match status {
        SessionStatus::Working => format!("{} is working", session.id),
        SessionStatus::PrOpen => match &session.pr {
            Some(pr) => format!("{} opened {pr}", session.id),
            None => format!("{} opened a PR", session.id),
        },
        SessionStatus::CiFailed => format!("CI failing on {}", session.id),
        SessionStatus::ReviewPending => format!("review pending on {}", session.id),
        SessionStatus::ChangesRequested => format!("changes requested on {}", session.id),
        SessionStatus::Approved => format!("{} approved", session.id),
        SessionStatus::Mergeable => format!("{} approved and mergeable", session.id),
        SessionStatus::Merged => format!("{} merged", session.id),
        SessionStatus::NeedsInput => format!("{} is waiting for input", session.id),
        SessionStatus::Stuck => format!("{} looks stuck", session.id),
        SessionStatus::Errored => format!("{} hit an error", session.id),
        SessionStatus::Killed => format!("{} is gone", session.id),
        SessionStatus::Done => format!("{} finished", session.id),
        SessionStatus::Spawning => format!("{} spawning", session.id),
    }
}

/// Names of currently failing checks, for event payloads and fix messages.
pub(crate) async fn failing_check_names<C: Clock>(
    inner: &Inner<C>,
    project: &ProjectConfig,
    session: &Session,
) -> Vec<String> {
    let (Some(url), Some(scm)) = (&session.pr, inner.sessions.scm_for(project)) else {
        return vec![];
    };
    let pr = PullRequest::from_url(url);
    match probe(scm.ci_checks(&pr)).await {
        Ok(checks) => checks
            .into_iter()
            .filter(|c| c.status == CheckStatus::Failing)
            .map(|c| c.name)
            .collect(),
        Err(()) => vec![],
    }
}

pub(crate) async fn handle_transition<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    old: SessionStatus,
    new: SessionStatus,
) {
    tracing::info!(session_id = %session.id, %old, %new, "status transition");
    let now = inner.clock.epoch_ms();

    // 1. Persist before anything observable happens.
    if let Err(e) = stores.metadata.update(session.id.as_str(), |r| r.set_status(new)) {
        tracing::warn!(session_id = %session.id, error = %e, "status persist failed");
    }

    // 2. Leaving ci_failed settles the fix attempt, one way or the other.
    if old == SessionStatus::CiFailed {
        let attempts = inner.peek_attempts(project_key, session, "ci-failed", stores);
        let event = if new.has_pr_context() {
            OrchestratorEvent::new(
                EventKind::CiPassing,
                project_key,
                Some(session.id.clone()),
                format!("CI green again on {}", session.id),
                now,
            )
            .with_data(json!({"resolved": true, "attempt": attempts}))
        } else {
            OrchestratorEvent::new(
                EventKind::CiFixFailed,
                project_key,
                Some(session.id.clone()),
                format!("{} left CI failure unresolved", session.id),
                now,
            )
            .with_data(json!({"attempt": attempts}))
        };
        inner.append_event(stores, &event);
    }

    // 3. Re-entering a state later starts a fresh retry budget.
    if let Some(old_key) = status_event_kind(old).and_then(reaction_key_for) {
        inner.clear_tracker(project_key, session, old_key, stores);
    }

    // 4.–7. Record the transition and dispatch its reaction (or fall back
    // to notifying humans).
    if let Some(kind) = status_event_kind(new) {
        let mut event = OrchestratorEvent::new(
            kind,
            project_key,
            Some(session.id.clone()),
            status_message(session, new),
            now,
        );
        if kind == EventKind::CiFailing {
            let names = failing_check_names(inner, project, session).await;
            event = event.with_data(json!({ "failingChecks": names }));
        } else if kind == EventKind::PrMerged {
            if let Some(url) = &session.pr {
                event = event
                    .with_data(json!({"pr": url, "prNumber": PullRequest::from_url(url).number}));
            }
        }
        inner.append_event(stores, &event);

        let configured = reaction_key_for(kind).and_then(|key| {
            resolve_reaction(&inner.config.reactions, &project.reactions, key)
                .map(|config| (key, config.clone()))
        });
        match configured {
            Some((key, config)) if config.dispatches() => {
                reaction::dispatch(inner, project_key, project, stores, session, key, &config, kind)
                    .await;
            }
            _ => {
                if event.priority != EventPriority::Info {
                    inner.router.notify(&event).await;
                }
            }
        }
    }

    coordinate(inner, project_key, project, stores, session, old, new).await;
}

/// Re-fire agent-directed reactions while their condition persists. Only
/// send-style actions repeat; notify-style reactions fire on the transition
/// alone. Dedup and escalation inside the dispatcher keep this from
/// spamming.
pub(crate) async fn redispatch_persistent<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    status: SessionStatus,
) {
    let Some(kind) = status_event_kind(status) else { return };
    let Some(key) = reaction_key_for(kind) else { return };
    let Some(config) =
        resolve_reaction(&inner.config.reactions, &project.reactions, key).cloned()
    else {
        return;
    };
    if !matches!(config.action, ReactionAction::SendToAgent | ReactionAction::ReviewGate) {
        return;
    }
    if !config.dispatches() {
        return;
    }
    reaction::dispatch(inner, project_key, project, stores, session, key, &config, kind).await;
}

/// Cross-session triggers on (mostly terminal) transitions.
async fn coordinate<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    old: SessionStatus,
    new: SessionStatus,
) {
    if new == SessionStatus::Merged {
        if let Some(plan_id) = &session.plan_id {
            // Snapshot siblings before new tasks spawn; fresh spawns start
            // from the updated default branch and need no rebase.
            let siblings = inner
                .plans
                .get(project_key, plan_id)
                .ok()
                .and_then(|plan| {
                    inner.plans.active_siblings(project_key, &plan, &session.id).ok()
                })
                .unwrap_or_default();

            if let Err(e) = inner.plans.spawn_ready_tasks(project_key, plan_id).await {
                tracing::warn!(plan_id = %plan_id, error = %e, "ready-task spawn failed");
            }

            let pr_number =
                session.pr.as_ref().map(|url| PullRequest::from_url(url).number).unwrap_or(0);
            for sibling in siblings {
                let message = format!(
                    "Sibling PR #{} just merged into {}. Rebase your branch onto the latest {} \
                     and resolve any conflicts before continuing.",
                    pr_number, project.default_branch, project.default_branch,
                );
                match inner.sessions.send(project_key, &sibling.id, &message).await {
                    Ok(()) => {
                        let event = OrchestratorEvent::new(
                            EventKind::SessionRebaseSent,
                            project_key,
                            Some(sibling.id.clone()),
                            format!("rebase hint sent to {} after #{} merged", sibling.id, pr_number),
                            inner.clock.epoch_ms(),
                        )
                        .with_data(json!({"mergedPr": pr_number}));
                        inner.append_event(stores, &event);
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %sibling.id, error = %e, "rebase send failed");
                    }
                }
            }
        }
    }

    if new.is_terminal() {
        if let Some(plan_id) = &session.plan_id {
            match inner.plans.check_plan_completion(project_key, plan_id) {
                Ok(true) => {
                    reaction::run_plan_complete(inner, project_key, project, stores, plan_id)
                        .await;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(plan_id = %plan_id, error = %e, "plan completion check failed");
                }
            }
        }

        if let Some(kind) = outcome_kind(old, new) {
            let mut terminal = session.clone();
            terminal.status = new;
            match inner.outcomes.capture(stores, &terminal, kind) {
                Ok(record) => {
                    let failed = new != SessionStatus::Merged;
                    let retro = resolve_reaction(
                        &inner.config.reactions,
                        &project.reactions,
                        "session-failed",
                    );
                    if failed
                        && retro
                            .map(|r| {
                                r.action == ReactionAction::SpawnRetrospective && r.dispatches()
                            })
                            .unwrap_or(false)
                    {
                        if let Err(e) =
                            spawn_retrospective(&inner.sessions, stores, &terminal, &record).await
                        {
                            tracing::warn!(
                                session_id = %session.id,
                                error = %e,
                                "retrospective spawn failed"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "outcome capture failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
