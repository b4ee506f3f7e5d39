// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome capture on terminal transitions, and the retrospective spawn for
//! sessions that failed.

use crate::error::SessionError;
use crate::session::{SessionManager, SpawnRequest};
use fleet_core::{
    Clock, EventKind, OrchestratorEvent, OutcomeKind, OutcomeRecord, Session, SessionStatus,
};
use fleet_storage::ProjectStores;

/// Map a terminal transition onto an outcome kind. A session killed while
/// `stuck` or `errored` keeps that context; `done` counts as a success.
pub fn outcome_kind(old: SessionStatus, new: SessionStatus) -> Option<OutcomeKind> {
    match new {
        SessionStatus::Merged | SessionStatus::Done => Some(OutcomeKind::Merged),
        SessionStatus::Killed => Some(match old {
            SessionStatus::Stuck => OutcomeKind::Stuck,
            SessionStatus::Errored => OutcomeKind::Errored,
            _ => OutcomeKind::Killed,
        }),
        _ => None,
    }
}

/// Writes one outcome record per terminal transition, mined from the
/// session's event history.
pub struct OutcomeService<C: Clock> {
    clock: C,
}

impl<C: Clock> OutcomeService<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Capture the outcome of a session that just went terminal.
    pub fn capture(
        &self,
        stores: &ProjectStores,
        session: &Session,
        outcome: OutcomeKind,
    ) -> Result<OutcomeRecord, fleet_storage::StoreError> {
        let ci_retries = stores.events.count_for_session(&session.id, EventKind::CiFailing);
        let review_rounds =
            stores.events.count_for_session(&session.id, EventKind::ReviewChangesRequested);
        let failing_checks = stores
            .events
            .last_for_session(&session.id, EventKind::CiFailing)
            .and_then(|event| {
                let names = event.data.get("failingChecks")?.as_array()?.clone();
                Some(
                    names
                        .into_iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect::<Vec<String>>(),
                )
            })
            .filter(|names| !names.is_empty());

        let now = self.clock.epoch_ms();
        let record = OutcomeRecord {
            session_id: session.id.clone(),
            project_id: session.project.clone(),
            outcome,
            duration_ms: now.saturating_sub(session.created_at_ms),
            ci_retries,
            review_rounds,
            cost: session.agent.as_ref().and_then(|a| a.cost_usd),
            failing_checks,
            plan_id: session.plan_id.clone(),
            timestamp: self.clock.timestamp(),
        };
        stores.outcomes.append(&record)?;
        tracing::info!(
            session_id = %session.id,
            outcome = %record.outcome,
            ci_retries,
            review_rounds,
            "outcome recorded"
        );
        Ok(record)
    }
}

/// Spawn a failure-analysis session on a disposable branch.
pub async fn spawn_retrospective<C: Clock>(
    sessions: &SessionManager<C>,
    stores: &ProjectStores,
    failed: &Session,
    record: &OutcomeRecord,
) -> Result<(), SessionError> {
    let prompt = retrospective_prompt(failed, record);
    let mut request = SpawnRequest::new(&failed.project, prompt);
    request.branch = Some(format!("retro/{}", failed.id));
    request.extra.insert("planRole".to_string(), "retrospective".to_string());
    request.extra.insert("retroOf".to_string(), failed.id.as_str().to_string());
    let retro = sessions.spawn(request).await?;

    let event = OrchestratorEvent::new(
        EventKind::RetroSpawned,
        &failed.project,
        Some(retro.id.clone()),
        format!("retrospective for {} spawned as {}", failed.id, retro.id),
        sessions.clock().epoch_ms(),
    );
    if let Err(e) = stores.events.append(&event) {
        tracing::warn!(session_id = %retro.id, error = %e, "could not record retro event");
    }
    Ok(())
}

fn retrospective_prompt(failed: &Session, record: &OutcomeRecord) -> String {
    let mut prompt = format!(
        "# Retrospective: {}\n\nSession {} on branch `{}` ended `{}` after {} CI fix rounds \
         and {} review rounds.\n",
        failed.id,
        failed.id,
        failed.branch,
        record.outcome,
        record.ci_retries,
        record.review_rounds,
    );
    if let Some(checks) = &record.failing_checks {
        prompt.push_str("\nChecks failing at the end:\n");
        for check in checks {
            prompt.push_str(&format!("- {check}\n"));
        }
    }
    if let Some(pr) = &failed.pr {
        prompt.push_str(&format!("\nPR: {pr}\n"));
    }
    prompt.push_str(
        "\nAnalyze why this session failed and write a short report of the root cause and \
         what the next attempt should do differently. Do not modify production code.\n",
    );
    prompt
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
