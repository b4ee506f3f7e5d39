// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator event types.
//!
//! Events are the append-only record of everything the lifecycle engine
//! observed or did. The kind set is closed; the on-disk form is one JSON
//! object per line with a string tag (`"ci.failing"`, `"reaction.escalated"`,
//! ...) and an ISO-8601 timestamp.

use crate::id::SessionId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Generate a fresh event id.
pub fn new_event_id() -> String {
    format!("evt-{}", nanoid::nanoid!(12))
}

/// Closed set of event kinds recorded by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // -- session --
    #[serde(rename = "session.spawned")]
    SessionSpawned,
    #[serde(rename = "session.restored")]
    SessionRestored,
    #[serde(rename = "session.working")]
    SessionWorking,
    #[serde(rename = "session.needs_input")]
    SessionNeedsInput,
    #[serde(rename = "session.stuck")]
    SessionStuck,
    #[serde(rename = "session.errored")]
    SessionErrored,
    #[serde(rename = "session.killed")]
    SessionKilled,
    #[serde(rename = "session.done")]
    SessionDone,
    #[serde(rename = "session.rebase_sent")]
    SessionRebaseSent,

    // -- pr --
    #[serde(rename = "pr.created")]
    PrCreated,
    #[serde(rename = "pr.ready")]
    PrReady,
    #[serde(rename = "pr.merged")]
    PrMerged,
    #[serde(rename = "pr.closed")]
    PrClosed,

    // -- ci --
    #[serde(rename = "ci.failing")]
    CiFailing,
    #[serde(rename = "ci.passing")]
    CiPassing,
    #[serde(rename = "ci.fix_sent")]
    CiFixSent,
    #[serde(rename = "ci.fix_failed")]
    CiFixFailed,

    // -- review --
    #[serde(rename = "review.pending")]
    ReviewPending,
    #[serde(rename = "review.approved")]
    ReviewApproved,
    #[serde(rename = "review.changes_requested")]
    ReviewChangesRequested,
    #[serde(rename = "review.feedback_sent")]
    ReviewFeedbackSent,

    // -- reactions --
    #[serde(rename = "reaction.triggered")]
    ReactionTriggered,
    #[serde(rename = "reaction.escalated")]
    ReactionEscalated,

    // -- plans --
    #[serde(rename = "plan.created")]
    PlanCreated,
    #[serde(rename = "plan.ready")]
    PlanReady,
    #[serde(rename = "plan.failed")]
    PlanFailed,
    #[serde(rename = "plan.approved")]
    PlanApproved,
    #[serde(rename = "plan.task_spawned")]
    PlanTaskSpawned,
    #[serde(rename = "plan.completed")]
    PlanCompleted,

    // -- retrospectives --
    #[serde(rename = "retro.spawned")]
    RetroSpawned,

    // -- summaries --
    #[serde(rename = "summary.all_complete")]
    SummaryAllComplete,
}

impl EventKind {
    /// The string tag, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionSpawned => "session.spawned",
            Self::SessionRestored => "session.restored",
            Self::SessionWorking => "session.working",
            Self::SessionNeedsInput => "session.needs_input",
            Self::SessionStuck => "session.stuck",
            Self::SessionErrored => "session.errored",
            Self::SessionKilled => "session.killed",
            Self::SessionDone => "session.done",
            Self::SessionRebaseSent => "session.rebase_sent",
            Self::PrCreated => "pr.created",
            Self::PrReady => "pr.ready",
            Self::PrMerged => "pr.merged",
            Self::PrClosed => "pr.closed",
            Self::CiFailing => "ci.failing",
            Self::CiPassing => "ci.passing",
            Self::CiFixSent => "ci.fix_sent",
            Self::CiFixFailed => "ci.fix_failed",
            Self::ReviewPending => "review.pending",
            Self::ReviewApproved => "review.approved",
            Self::ReviewChangesRequested => "review.changes_requested",
            Self::ReviewFeedbackSent => "review.feedback_sent",
            Self::ReactionTriggered => "reaction.triggered",
            Self::ReactionEscalated => "reaction.escalated",
            Self::PlanCreated => "plan.created",
            Self::PlanReady => "plan.ready",
            Self::PlanFailed => "plan.failed",
            Self::PlanApproved => "plan.approved",
            Self::PlanTaskSpawned => "plan.task_spawned",
            Self::PlanCompleted => "plan.completed",
            Self::RetroSpawned => "retro.spawned",
            Self::SummaryAllComplete => "summary.all_complete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification priority attached to each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Urgent,
    Action,
    Warning,
    Info,
}

crate::simple_display! {
    EventPriority {
        Urgent => "urgent",
        Action => "action",
        Warning => "warning",
        Info => "info",
    }
}

impl EventPriority {
    /// Infer a priority from an event kind tag.
    ///
    /// Keyword buckets, checked in order: human-blocking conditions are
    /// urgent, progress milestones need action, regressions warn, summaries
    /// and everything else inform.
    pub fn infer(kind: EventKind) -> Self {
        let tag = kind.as_str();
        if tag.starts_with("summary.") {
            return Self::Info;
        }
        for marker in ["stuck", "needs_input", "errored"] {
            if tag.contains(marker) {
                return Self::Urgent;
            }
        }
        for marker in ["approved", "ready", "merged", "completed"] {
            if tag.contains(marker) {
                return Self::Action;
            }
        }
        for marker in ["fail", "changes_requested", "conflicts"] {
            if tag.contains(marker) {
                return Self::Warning;
            }
        }
        Self::Info
    }
}

/// One recorded orchestrator event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
    pub priority: EventPriority,
    pub session_id: Option<SessionId>,
    pub project_id: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl OrchestratorEvent {
    /// Build an event with an inferred priority and a fresh id.
    pub fn new(
        kind: EventKind,
        project_id: impl Into<String>,
        session_id: Option<SessionId>,
        message: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: new_event_id(),
            kind,
            timestamp: format_timestamp(timestamp_ms),
            priority: EventPriority::infer(kind),
            session_id,
            project_id: project_id.into(),
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach structured payload data.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Override the inferred priority.
    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Parsed timestamp; `None` when the persisted value is malformed.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok().map(|t| t.with_timezone(&Utc))
    }
}

/// Format an epoch-milliseconds value as ISO-8601 UTC.
pub fn format_timestamp(epoch_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
