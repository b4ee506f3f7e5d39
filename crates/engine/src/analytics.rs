// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaction analytics: how well automated handling is working, aggregated
//! from the event log.
//!
//! The `ci.fix_sent` / `ci.passing{attempt}` / `ci.fix_failed` /
//! `reaction.escalated` chain written by the lifecycle engine is the raw
//! input; this module reduces it to per-key counters and a CI fix
//! resolution rate.

use fleet_core::{EventKind, OrchestratorEvent};
use std::collections::BTreeMap;

/// Counters for one reaction key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionKeyStats {
    pub triggered: usize,
    /// Dedup-skipped dispatches (still count toward escalation).
    pub skipped: usize,
    pub escalated: usize,
}

/// CI fix-loop statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CiFixStats {
    pub fix_sent: usize,
    /// Sessions whose CI went green after at least one fix message.
    pub resolved: usize,
    /// Sessions that left `ci_failed` without a green PR state.
    pub fix_failed: usize,
    /// Mean `attempt` recorded on resolving `ci.passing` events.
    pub mean_attempts_to_resolution: Option<f64>,
}

/// Aggregated reaction analytics for one project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionAnalytics {
    pub per_key: BTreeMap<String, ReactionKeyStats>,
    pub ci_fix: CiFixStats,
}

fn reaction_key(event: &OrchestratorEvent) -> Option<String> {
    event.data.get("reactionKey")?.as_str().map(str::to_string)
}

/// Reduce an event slice (any order) to analytics.
pub fn aggregate_reactions(events: &[OrchestratorEvent]) -> ReactionAnalytics {
    let mut analytics = ReactionAnalytics::default();
    let mut resolution_attempts: Vec<f64> = Vec::new();

    for event in events {
        match event.kind {
            EventKind::ReactionTriggered => {
                if let Some(key) = reaction_key(event) {
                    let stats = analytics.per_key.entry(key).or_default();
                    stats.triggered += 1;
                    if event.data.get("skipped").and_then(|v| v.as_bool()).unwrap_or(false) {
                        stats.skipped += 1;
                    }
                }
            }
            EventKind::ReactionEscalated => {
                if let Some(key) = reaction_key(event) {
                    analytics.per_key.entry(key).or_default().escalated += 1;
                }
            }
            EventKind::CiFixSent => {
                analytics.ci_fix.fix_sent += 1;
                // A fix send is a triggered ci-failed reaction too.
                analytics.per_key.entry("ci-failed".to_string()).or_default().triggered += 1;
            }
            EventKind::CiPassing => {
                if event.data.get("resolved").and_then(|v| v.as_bool()).unwrap_or(false) {
                    analytics.ci_fix.resolved += 1;
                    if let Some(attempt) = event.data.get("attempt").and_then(|v| v.as_f64()) {
                        resolution_attempts.push(attempt);
                    }
                }
            }
            EventKind::CiFixFailed => {
                analytics.ci_fix.fix_failed += 1;
            }
            _ => {}
        }
    }

    if !resolution_attempts.is_empty() {
        analytics.ci_fix.mean_attempts_to_resolution = Some(
            resolution_attempts.iter().sum::<f64>() / resolution_attempts.len() as f64,
        );
    }
    analytics
}

#[cfg(test)]
#[path = "analytics_tests.rs"]
mod tests;
