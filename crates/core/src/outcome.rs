// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-state outcome records.

use crate::id::{PlanId, SessionId};
use serde::{Deserialize, Serialize};

/// How a session ended.
///
/// `killed` covers runtime death and closed PRs; sessions that die while
/// `stuck` or `errored` keep that context as their outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Merged,
    Killed,
    Stuck,
    Errored,
}

crate::simple_display! {
    OutcomeKind {
        Merged => "merged",
        Killed => "killed",
        Stuck => "stuck",
        Errored => "errored",
    }
}

/// One record per terminal-state transition, appended to `outcomes.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub session_id: SessionId,
    pub project_id: String,
    pub outcome: OutcomeKind,
    pub duration_ms: u64,
    pub ci_retries: usize,
    pub review_rounds: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_checks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
}
