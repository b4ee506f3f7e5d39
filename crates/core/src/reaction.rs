// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaction configuration: what the lifecycle engine does when a session
//! enters a noteworthy state, and when it gives up and escalates.

use crate::event::EventPriority;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Automated action dispatched on a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReactionAction {
    /// Send a (possibly enriched) message to the coding agent
    SendToAgent,
    /// Fan out to the notifier routing table
    Notify,
    /// Reduces to notify at `action` priority; merge is performed elsewhere.
    /// Retained as an extension point.
    AutoMerge,
    /// Spawn a review session for a freshly created PR
    SpawnReview,
    /// Forward review feedback to the original coding session
    ReviewGate,
    /// Delegate to the host's reconciliation service
    SpawnReconciliation,
    /// Spawn a failure-analysis session on a disposable branch
    SpawnRetrospective,
}

crate::simple_display! {
    ReactionAction {
        SendToAgent => "send-to-agent",
        Notify => "notify",
        AutoMerge => "auto-merge",
        SpawnReview => "spawn-review",
        ReviewGate => "review-gate",
        SpawnReconciliation => "spawn-reconciliation",
        SpawnRetrospective => "spawn-retrospective",
    }
}

/// Per-reaction-key configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionConfig {
    pub action: ReactionAction,
    /// Static message; send-to-agent reactions may enrich it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Attempts before escalation. `None` disables the attempt ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Duration string `<n>{s|m|h}`. Integer forms are rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<EventPriority>,
    /// `Some(false)` disables automatic dispatch (notify still fires).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
}

impl ReactionConfig {
    pub fn new(action: ReactionAction) -> Self {
        Self {
            action,
            message: None,
            retries: None,
            escalate_after: None,
            priority: None,
            auto: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_escalate_after(mut self, spec: impl Into<String>) -> Self {
        self.escalate_after = Some(spec.into());
        self
    }

    /// Whether automatic dispatch applies: `auto` defaults to true, and
    /// notify reactions always dispatch.
    pub fn dispatches(&self) -> bool {
        self.auto.unwrap_or(true) || self.action == ReactionAction::Notify
    }

    /// Escalation notification priority (defaults to urgent).
    pub fn escalation_priority(&self) -> EventPriority {
        self.priority.unwrap_or(EventPriority::Urgent)
    }

    /// Parse `escalate_after`, if set. A malformed value is a configuration
    /// error surfaced to the caller, never silently defaulted.
    pub fn escalate_after_duration(&self) -> Result<Option<Duration>, DurationError> {
        self.escalate_after.as_deref().map(parse_duration).transpose()
    }
}

/// Compose the effective reaction for a key: a project override replaces the
/// global default wholesale.
pub fn resolve_reaction<'a>(
    global: &'a IndexMap<String, ReactionConfig>,
    project: &'a IndexMap<String, ReactionConfig>,
    key: &str,
) -> Option<&'a ReactionConfig> {
    project.get(key).or_else(|| global.get(key))
}

/// Error from [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {0:?}: expected <n>{{s|m|h}}")]
pub struct DurationError(pub String);

/// Parse a duration string like "30s", "5m", "1h".
///
/// Only the three suffixes are accepted; a bare integer is rejected so that
/// configs cannot silently mix representations.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError(s.to_string()));
    }

    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| DurationError(s.to_string()))?;

    let multiplier = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(DurationError(s.to_string())),
    };

    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
#[path = "reaction_tests.rs"]
mod tests;
