// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session entity and its state machines.
//!
//! A session is one supervised agent run: one issue (or ad-hoc prompt), one
//! branch, one workspace, one runtime handle. The primary status is persisted
//! in the metadata store; the activity state is derived from terminal output
//! and process liveness every poll cycle and never stored as canonical.

use crate::id::{PlanId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Primary status of a session. Persisted; every change is recorded as an
/// event in the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Runtime created, agent not yet observed working
    Spawning,
    /// Agent is making progress, no PR yet
    Working,
    /// PR detected, no blocking signal
    PrOpen,
    /// CI reports a failing check on the PR
    CiFailed,
    /// A review has been requested and not yet submitted
    ReviewPending,
    /// Reviewer requested changes
    ChangesRequested,
    /// Review approved, mergeability unknown or blocked
    Approved,
    /// Review approved and the PR is mergeable
    Mergeable,
    /// PR merged
    Merged,
    /// Agent is waiting for human input
    NeedsInput,
    /// Agent has stopped making progress without asking for input
    Stuck,
    /// Agent hit an unrecoverable error
    Errored,
    /// Runtime is gone or the PR was closed without merging
    Killed,
    /// Work finished without a merge (explicitly completed)
    Done,
}

impl SessionStatus {
    /// Terminal statuses: no further polling, outcome recorded.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged | Self::Killed | Self::Done)
    }

    /// Statuses derived from an open or merged PR. Used to decide whether
    /// leaving `ci_failed` counts as the fix landing (`ci.passing`) or the
    /// session leaving the PR flow entirely (`ci.fix_failed`).
    pub fn has_pr_context(&self) -> bool {
        matches!(
            self,
            Self::PrOpen
                | Self::ReviewPending
                | Self::ChangesRequested
                | Self::Approved
                | Self::Mergeable
                | Self::Merged
        )
    }
}

crate::simple_display! {
    SessionStatus {
        Spawning => "spawning",
        Working => "working",
        PrOpen => "pr_open",
        CiFailed => "ci_failed",
        ReviewPending => "review_pending",
        ChangesRequested => "changes_requested",
        Approved => "approved",
        Mergeable => "mergeable",
        Merged => "merged",
        NeedsInput => "needs_input",
        Stuck => "stuck",
        Errored => "errored",
        Killed => "killed",
        Done => "done",
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "spawning" => Self::Spawning,
            "working" => Self::Working,
            "pr_open" => Self::PrOpen,
            "ci_failed" => Self::CiFailed,
            "review_pending" => Self::ReviewPending,
            "changes_requested" => Self::ChangesRequested,
            "approved" => Self::Approved,
            "mergeable" => Self::Mergeable,
            "merged" => Self::Merged,
            "needs_input" => Self::NeedsInput,
            "stuck" => Self::Stuck,
            "errored" => Self::Errored,
            "killed" => Self::Killed,
            "done" => Self::Done,
            other => return Err(UnknownStatus(other.to_string())),
        })
    }
}

/// Error for unrecognized persisted status strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session status: {0}")]
pub struct UnknownStatus(pub String);

/// Activity state derived from terminal output and process liveness.
///
/// Never coerced when unknown — a failed probe yields `None`, not a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    Ready,
    Idle,
    WaitingInput,
    Blocked,
    Exited,
}

crate::simple_display! {
    ActivityState {
        Active => "active",
        Ready => "ready",
        Idle => "idle",
        WaitingInput => "waiting_input",
        Blocked => "blocked",
        Exited => "exited",
    }
}

/// Opaque, serializable token identifying where an agent is executing.
///
/// Round-trips through session metadata as a single JSON value so a restarted
/// orchestrator can reattach to live runtimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeHandle {
    pub id: String,
    #[serde(rename = "runtimeName")]
    pub runtime_name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RuntimeHandle {
    pub fn new(id: impl Into<String>, runtime_name: impl Into<String>) -> Self {
        Self { id: id.into(), runtime_name: runtime_name.into(), data: serde_json::Value::Null }
    }

    /// Serialize for embedding in a metadata value.
    pub fn to_metadata(&self) -> String {
        // A struct of strings and a Value cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse from a metadata value. Returns `None` on malformed input.
    pub fn from_metadata(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Agent-reported info attached to a session (progress summary, cost).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// One supervised agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project: String,
    pub status: SessionStatus,
    /// Derived each cycle; `None` when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityState>,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<String>,
    pub worktree: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_handle: Option<RuntimeHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentInfo>,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    /// Free-form metadata; unknown keys from the on-disk record are
    /// preserved here across read/write.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Session {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
