// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaction dispatcher: automated handling with retry budgets, dedup, and
//! escalation to humans.
//!
//! Ordering invariant: the attempt counter increments before the dedup
//! check, so a silently-skipped send still walks toward escalation — an
//! agent that looks busy forever cannot pin the orchestrator in a silent
//! loop.

use super::{probe, Inner, SessionKey};
use crate::classifier::format_classified_errors;
use fleet_adapters::{CheckStatus, CiCheck, PendingComment, PullRequest, Review, ReviewState};
use fleet_core::{
    resolve_reaction, Clock, EventKind, EventPriority, OrchestratorEvent, PlanId, ProjectConfig,
    ReactionAction, ReactionConfig, Session, SessionStatus,
};
use fleet_storage::ProjectStores;
use serde_json::json;

/// How many trailing output lines the dedup scan reads.
const DEDUP_OUTPUT_LINES: usize = 30;

/// Per `(session, reaction-key)` attempt state. Restored lazily from
/// metadata so a restarted orchestrator resumes the same retry budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactionTracker {
    pub attempts: u32,
    pub first_triggered_ms: u64,
}

/// Conservative busy indicators: if the agent's recent output mentions the
/// problem, it is already on it and another send would only interrupt.
fn busy_markers(key: &str) -> &'static [&'static str] {
    match key {
        "ci-failed" => &["ci fail", "fixing ci", "lint error", "failing check", "fixing test"],
        "changes-requested" => &["address comment", "addressing review", "review feedback"],
        _ => &[],
    }
}

impl<C: Clock> Inner<C> {
    fn session_key(&self, project_key: &str, session: &Session) -> SessionKey {
        (project_key.to_string(), session.id.clone())
    }

    /// Increment and return the tracker for `(session, key)`, restoring the
    /// persisted budget on first touch.
    fn bump_tracker(
        &self,
        project_key: &str,
        session: &Session,
        key: &str,
        stores: &ProjectStores,
    ) -> ReactionTracker {
        let now = self.clock.epoch_ms();
        let tracker = {
            let mut map = self.reactions.lock();
            let entry = map
                .entry((self.session_key(project_key, session), key.to_string()))
                .or_insert_with(|| {
                    let record = stores.metadata.read(session.id.as_str());
                    ReactionTracker {
                        attempts: record
                            .as_ref()
                            .and_then(|r| r.reaction_attempts(key))
                            .unwrap_or(0),
                        first_triggered_ms: record
                            .as_ref()
                            .and_then(|r| r.reaction_first_triggered(key))
                            .unwrap_or(0),
                    }
                });
            entry.attempts += 1;
            if entry.first_triggered_ms == 0 {
                entry.first_triggered_ms = now;
            }
            *entry
        };
        if let Err(e) = stores.metadata.update(session.id.as_str(), |r| {
            r.set_reaction_tracker(key, tracker.attempts, tracker.first_triggered_ms)
        }) {
            tracing::warn!(session_id = %session.id, error = %e, "tracker persist failed");
        }
        tracker
    }

    /// Current attempt count without incrementing (for attempt-carrying
    /// settlement events).
    pub(crate) fn peek_attempts(
        &self,
        project_key: &str,
        session: &Session,
        key: &str,
        stores: &ProjectStores,
    ) -> u32 {
        let map_key = (self.session_key(project_key, session), key.to_string());
        if let Some(tracker) = self.reactions.lock().get(&map_key) {
            return tracker.attempts;
        }
        stores
            .metadata
            .read(session.id.as_str())
            .and_then(|r| r.reaction_attempts(key))
            .unwrap_or(0)
    }

    /// Drop the tracker for `(session, key)` in memory and on disk.
    pub(crate) fn clear_tracker(
        &self,
        project_key: &str,
        session: &Session,
        key: &str,
        stores: &ProjectStores,
    ) {
        self.reactions
            .lock()
            .remove(&(self.session_key(project_key, session), key.to_string()));
        if let Err(e) =
            stores.metadata.update(session.id.as_str(), |r| r.clear_reaction_tracker(key))
        {
            tracing::warn!(session_id = %session.id, error = %e, "tracker clear failed");
        }
    }
}

/// Dispatch one configured reaction. Escalates instead of acting once the
/// retry budget or escalation window is spent.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn dispatch<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    key: &str,
    config: &ReactionConfig,
    trigger: EventKind,
) {
    let tracker = inner.bump_tracker(project_key, session, key, stores);
    let now = inner.clock.epoch_ms();

    // Dedup before the escalation check: while the agent visibly works the
    // problem, neither another send nor an escalation helps — but the
    // attempt was already counted, so this cannot loop silently forever.
    if config.action == ReactionAction::SendToAgent
        && send_deduped(inner, project_key, project, stores, session, key, tracker).await
    {
        return;
    }

    let over_attempts = config.retries.map(|r| tracker.attempts > r).unwrap_or(false);
    let over_time = match config.escalate_after_duration() {
        Ok(Some(window)) => {
            now.saturating_sub(tracker.first_triggered_ms) > window.as_millis() as u64
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(reaction = %key, error = %e, "bad escalateAfter, ignoring");
            false
        }
    };
    if over_attempts || over_time {
        tracing::warn!(
            session_id = %session.id,
            reaction = %key,
            attempts = tracker.attempts,
            "reaction exhausted, escalating"
        );
        let event = OrchestratorEvent::new(
            EventKind::ReactionEscalated,
            project_key,
            Some(session.id.clone()),
            format!("automation for {key} on {} exhausted, needs a human", session.id),
            now,
        )
        .with_data(json!({"reactionKey": key, "attempts": tracker.attempts}))
        .with_priority(config.escalation_priority());
        inner.append_event(stores, &event);
        inner.router.notify(&event).await;
        return;
    }

    // Shutting down: no new side effects.
    if inner.cancel.is_cancelled() {
        return;
    }

    match config.action {
        ReactionAction::SendToAgent => {
            send_to_agent(inner, project_key, project, stores, session, key, config, tracker)
                .await;
        }
        ReactionAction::Notify => {
            let event = OrchestratorEvent::new(
                EventKind::ReactionTriggered,
                project_key,
                Some(session.id.clone()),
                format!("{} on {}", trigger, session.id),
                now,
            )
            .with_data(json!({"reactionKey": key}))
            .with_priority(config.priority.unwrap_or_else(|| EventPriority::infer(trigger)));
            inner.append_event(stores, &event);
            inner.router.notify(&event).await;
        }
        ReactionAction::AutoMerge => {
            // Merge action performed elsewhere; reduced to a notify until
            // the extension lands.
            let event = OrchestratorEvent::new(
                EventKind::ReactionTriggered,
                project_key,
                Some(session.id.clone()),
                format!("{} is ready to merge", session.id),
                now,
            )
            .with_data(json!({"reactionKey": key, "autoMerge": true}))
            .with_priority(EventPriority::Action);
            inner.append_event(stores, &event);
            inner.router.notify(&event).await;
        }
        ReactionAction::SpawnReview => {
            spawn_review(inner, project_key, stores, session, key).await;
        }
        ReactionAction::ReviewGate => {
            review_gate(inner, project_key, project, stores, session, tracker).await;
        }
        ReactionAction::SpawnReconciliation => {
            if let (Some(hook), Some(plan_id)) = (&inner.reconciliation, &session.plan_id) {
                hook.spawn_reconciliation(project_key, plan_id).await;
            } else {
                let event = OrchestratorEvent::new(
                    EventKind::ReactionTriggered,
                    project_key,
                    Some(session.id.clone()),
                    format!("reconciliation requested for {}", session.id),
                    now,
                )
                .with_data(json!({"reactionKey": key}))
                .with_priority(EventPriority::Action);
                inner.append_event(stores, &event);
                inner.router.notify(&event).await;
            }
        }
        ReactionAction::SpawnRetrospective => {
            // Only meaningful on terminal transitions, where coordination
            // handles it with full outcome context.
            tracing::debug!(reaction = %key, "spawn-retrospective outside terminal handling");
        }
    }
}

/// The `plan-complete` reaction, run when the last plan member goes
/// terminal.
pub(crate) async fn run_plan_complete<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    plan_id: &PlanId,
) {
    let config = resolve_reaction(&inner.config.reactions, &project.reactions, "plan-complete");
    let action = config.map(|c| c.action);

    if action == Some(ReactionAction::SpawnReconciliation) {
        if let Some(hook) = &inner.reconciliation {
            hook.spawn_reconciliation(project_key, plan_id).await;
            return;
        }
    }

    let event = OrchestratorEvent::new(
        EventKind::PlanCompleted,
        project_key,
        None,
        format!("plan {plan_id} finished"),
        inner.clock.epoch_ms(),
    )
    .with_data(json!({"planId": plan_id.as_str(), "reactionKey": "plan-complete"}));
    inner.router.notify(&event).await;
}

/// Scan recent output for busy indicators; record a skipped trigger when
/// the agent already appears to be addressing the condition.
async fn send_deduped<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    key: &str,
    tracker: ReactionTracker,
) -> bool {
    let (Some(handle), Some(runtime)) =
        (&session.runtime_handle, inner.sessions.runtime_for(project))
    else {
        return false;
    };
    let Ok(output) = probe(runtime.output(handle, DEDUP_OUTPUT_LINES)).await else {
        return false;
    };
    let haystack = output.to_lowercase();
    if !busy_markers(key).iter().any(|marker| haystack.contains(marker)) {
        return false;
    }

    tracing::debug!(session_id = %session.id, reaction = %key, "send deduped");
    let event = OrchestratorEvent::new(
        EventKind::ReactionTriggered,
        project_key,
        Some(session.id.clone()),
        format!("{key} send skipped, agent already addressing it"),
        inner.clock.epoch_ms(),
    )
    .with_data(json!({
        "reactionKey": key,
        "skipped": true,
        "attempt": tracker.attempts,
    }));
    inner.append_event(stores, &event);
    true
}

#[allow(clippy::too_many_arguments)]
async fn send_to_agent<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    key: &str,
    config: &ReactionConfig,
    tracker: ReactionTracker,
) {
    let (message, failing_checks) = if key == "ci-failed" {
        build_ci_fix_message(inner, project, stores, session, config).await
    } else {
        let fallback = format!("Please address the {key} condition and continue.");
        (config.message.clone().unwrap_or(fallback), vec![])
    };

    if let Err(e) = inner.sessions.send(project_key, &session.id, &message).await {
        // Counted attempt; retried next cycle, escalated eventually.
        tracing::warn!(session_id = %session.id, reaction = %key, error = %e, "send failed");
        return;
    }

    let event = if key == "ci-failed" {
        OrchestratorEvent::new(
            EventKind::CiFixSent,
            project_key,
            Some(session.id.clone()),
            format!("fix instructions sent to {} (attempt {})", session.id, tracker.attempts),
            inner.clock.epoch_ms(),
        )
        .with_data(json!({"attempt": tracker.attempts, "failingChecks": failing_checks}))
    } else {
        OrchestratorEvent::new(
            EventKind::ReactionTriggered,
            project_key,
            Some(session.id.clone()),
            format!("{key} message sent to {}", session.id),
            inner.clock.epoch_ms(),
        )
        .with_data(json!({"reactionKey": key, "attempt": tracker.attempts}))
    };
    inner.append_event(stores, &event);
}

/// Enrich the static CI message with classified failing checks, PR size,
/// sibling-merge notes, and a diff against the previous attempt.
async fn build_ci_fix_message<C: Clock>(
    inner: &Inner<C>,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    config: &ReactionConfig,
) -> (String, Vec<String>) {
    let mut message = config.message.clone().unwrap_or_else(|| {
        "CI is failing on your PR. Investigate the failing checks below and push a fix."
            .to_string()
    });
    let mut names: Vec<String> = Vec::new();

    if let (Some(url), Some(scm)) = (&session.pr, inner.sessions.scm_for(project)) {
        let pr = PullRequest::from_url(url);
        if let Ok(checks) = probe(scm.ci_checks(&pr)).await {
            let failing: Vec<CiCheck> =
                checks.into_iter().filter(|c| c.status == CheckStatus::Failing).collect();
            names = failing.iter().map(|c| c.name.clone()).collect();
            let section = format_classified_errors(&failing);
            if !section.is_empty() {
                message.push_str("\n\n");
                message.push_str(&section);
            }

            if let Some(previous) =
                stores.events.last_for_session(&session.id, EventKind::CiFixSent)
            {
                let previous_names: Vec<String> = previous
                    .data
                    .get("failingChecks")
                    .and_then(|v| v.as_array())
                    .map(|names| {
                        names.iter().filter_map(|n| n.as_str().map(str::to_string)).collect()
                    })
                    .unwrap_or_default();
                if let Some(analysis) = attempt_analysis(&previous_names, &names) {
                    message.push_str("\n\n");
                    message.push_str(&analysis);
                }
            }
        }
        if let Ok(summary) = probe(scm.pr_summary(&pr)).await {
            message.push_str(&format!(
                "\n\nPR size: +{}/-{}",
                summary.additions, summary.deletions
            ));
        }
    }

    if let Some(note) = sibling_merge_note(inner, project, session) {
        message.push_str("\n\n");
        message.push_str(&note);
    }

    (message, names)
}

/// Compare the previous attempt's failing checks with the current set.
fn attempt_analysis(previous: &[String], current: &[String]) -> Option<String> {
    if previous.is_empty() {
        return None;
    }
    let still: Vec<&String> = current.iter().filter(|c| previous.contains(c)).collect();
    let passing: Vec<&String> = previous.iter().filter(|p| !current.contains(p)).collect();
    let fresh: Vec<&String> = current.iter().filter(|c| !previous.contains(c)).collect();

    let mut out = String::from("## Attempt analysis\n");
    if !still.is_empty() {
        out.push_str(&format!(
            "Still failing: {}\n",
            still.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    if !passing.is_empty() {
        out.push_str(&format!(
            "Now passing: {}\n",
            passing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    if !fresh.is_empty() {
        out.push_str(&format!(
            "New failures: {}\n",
            fresh.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }
    Some(out)
}

/// "Sibling work merged, maybe rebase" note for plan members.
fn sibling_merge_note<C: Clock>(
    inner: &Inner<C>,
    project: &ProjectConfig,
    session: &Session,
) -> Option<String> {
    let plan_id = session.plan_id.as_ref()?;
    let plan = inner.plans.get(&session.project, plan_id).ok()?;
    let stores = inner.sessions.stores(&session.project).ok()?;

    let merged: Vec<String> = plan
        .tasks
        .iter()
        .filter(|t| t.session_id.as_ref() != Some(&session.id))
        .filter(|t| {
            t.session_id
                .as_ref()
                .and_then(|sid| {
                    stores
                        .metadata
                        .read(sid.as_str())
                        .or_else(|| stores.metadata.read_archived(sid.as_str()))
                        .and_then(|r| r.status())
                })
                .map(|s| s == SessionStatus::Merged)
                .unwrap_or(false)
        })
        .map(|t| t.title.clone())
        .collect();
    if merged.is_empty() {
        return None;
    }
    Some(format!(
        "Note: sibling work has merged recently ({}). If the failure looks unrelated to your \
         diff, rebase onto {} first.",
        merged.join(", "),
        project.default_branch,
    ))
}

/// Spawn a review session for a freshly created PR, inlining plan task
/// context when the session belongs to a plan.
async fn spawn_review<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    stores: &ProjectStores,
    session: &Session,
    key: &str,
) {
    let task = session
        .plan_id
        .as_ref()
        .zip(session.extra.get("taskId"))
        .and_then(|(plan_id, task_id)| {
            inner.plans.get(project_key, plan_id).ok()?.task(task_id).cloned()
        });

    let mut prompt = match &session.pr {
        Some(pr) => format!("# Review {pr}\n\nReview this PR thoroughly.\n"),
        None => format!("# Review the PR from {}\n\nReview it thoroughly.\n", session.id),
    };
    if let Some(task) = &task {
        prompt.push_str(&format!("\nThe PR implements: {}\n", task.title));
        if !task.acceptance_criteria.is_empty() {
            prompt.push_str("\n## Acceptance criteria to verify\n");
            for criterion in &task.acceptance_criteria {
                prompt.push_str(&format!("- {criterion}\n"));
            }
        }
        if !task.constraints.is_empty() {
            prompt.push_str("\n## Constraints to check\n");
            for constraint in &task.constraints {
                prompt.push_str(&format!("- {constraint}\n"));
            }
        }
        if !task.affected_files.is_empty() {
            prompt.push_str("\n## Expected to touch\n");
            for file in &task.affected_files {
                prompt.push_str(&format!("- {file}\n"));
            }
        }
    }
    prompt.push_str(
        "\nSubmit your verdict as a review: APPROVE if it is sound, REQUEST_CHANGES with \
         concrete feedback otherwise.\n",
    );

    let mut request = crate::session::SpawnRequest::new(project_key, prompt);
    request.branch = Some(format!("review/{}", session.id));
    request.extra.insert("planRole".to_string(), "review".to_string());
    request.extra.insert("reviewOf".to_string(), session.id.as_str().to_string());

    match inner.sessions.spawn(request).await {
        Ok(reviewer) => {
            let event = OrchestratorEvent::new(
                EventKind::ReactionTriggered,
                project_key,
                Some(session.id.clone()),
                format!("review session {} spawned for {}", reviewer.id, session.id),
                inner.clock.epoch_ms(),
            )
            .with_data(json!({"reactionKey": key, "reviewSession": reviewer.id.as_str()}));
            inner.append_event(stores, &event);
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "review spawn failed");
        }
    }
}

/// Does a submitted review carry change-request feedback?
///
/// Self-review restrictions force bot reviewers to comment instead of
/// formally requesting changes, so a commented review whose body carries the
/// literal `REQUEST_CHANGES` token counts. A bare `APPROVE` token never
/// does anything here — approval is only ever taken from the SCM's formal
/// decision, never inferred.
pub(crate) fn review_requests_changes(review: &Review) -> bool {
    match review.state {
        ReviewState::ChangesRequested => true,
        ReviewState::Commented => review.body.contains("REQUEST_CHANGES"),
        ReviewState::Approved => false,
    }
}

/// The comment-body fallback for `review_decision == none`: a change request
/// hiding in a review or pending comment still classifies the session as
/// `changes_requested`. Silence stays `pr_open` — never approval.
pub(crate) fn feedback_requests_changes(
    reviews: &[Review],
    comments: &[PendingComment],
) -> bool {
    reviews.iter().any(review_requests_changes)
        || comments.iter().any(|c| c.body.contains("REQUEST_CHANGES"))
}

/// Forward review feedback to the coding session.
async fn review_gate<C: Clock>(
    inner: &Inner<C>,
    project_key: &str,
    project: &ProjectConfig,
    stores: &ProjectStores,
    session: &Session,
    tracker: ReactionTracker,
) {
    let (Some(url), Some(scm)) = (&session.pr, inner.sessions.scm_for(project)) else {
        return;
    };
    let pr = PullRequest::from_url(url);
    let reviews = probe(scm.reviews(&pr)).await.unwrap_or_default();
    let comments = probe(scm.pending_comments(&pr)).await.unwrap_or_default();

    let feedback: Vec<&Review> =
        reviews.iter().filter(|r| review_requests_changes(r)).collect();

    let mut message = format!("Reviewers requested changes on PR #{}.\n", pr.number);
    if !feedback.is_empty() {
        message.push_str("\n## Review feedback\n");
        for review in &feedback {
            message.push_str(&format!("> {}\n", review.body.replace('\n', "\n> ")));
        }
    }
    if !comments.is_empty() {
        message.push_str("\n## Pending comments\n");
        for comment in &comments {
            match (&comment.path, comment.line) {
                (Some(path), Some(line)) => {
                    message.push_str(&format!("- {path}:{line}: {}\n", comment.body));
                }
                (Some(path), None) => message.push_str(&format!("- {path}: {}\n", comment.body)),
                _ => message.push_str(&format!("- {}\n", comment.body)),
            }
        }
    }
    if let Some(note) = sibling_merge_note(inner, project, session) {
        message.push('\n');
        message.push_str(&note);
    }
    message.push_str("\nAddress each point, push your fixes, and reply to the review.\n");

    if let Err(e) = inner.sessions.send(project_key, &session.id, &message).await {
        tracing::warn!(session_id = %session.id, error = %e, "review feedback send failed");
        return;
    }

    let mut review_attempts = 0;
    if let Err(e) = stores.metadata.update(session.id.as_str(), |r| {
        review_attempts = r.review_attempts() + 1;
        r.set_review_attempts(review_attempts);
    }) {
        tracing::warn!(session_id = %session.id, error = %e, "reviewAttempts persist failed");
    }

    let event = OrchestratorEvent::new(
        EventKind::ReviewFeedbackSent,
        project_key,
        Some(session.id.clone()),
        format!("review feedback forwarded to {} (round {review_attempts})", session.id),
        inner.clock.epoch_ms(),
    )
    .with_data(json!({"reviewAttempts": review_attempts, "attempt": tracker.attempts}));
    inner.append_event(stores, &event);
}

#[cfg(test)]
#[path = "reaction_tests.rs"]
mod tests;
