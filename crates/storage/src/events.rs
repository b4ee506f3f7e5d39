// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log with lazy pruning.
//!
//! File order is append order. The log is capped: when an append would push
//! the line count past `max_events` the file is first rewritten keeping the
//! most recent `max_events - 1` events. Readers drop malformed lines
//! silently — a torn write must never poison history.

use crate::StoreError;
use chrono::{DateTime, Utc};
use fleet_core::{EventKind, EventPriority, OrchestratorEvent, SessionId};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Default event cap per project.
pub const DEFAULT_MAX_EVENTS: usize = 500;

/// Query filter; every field is optional and conjunctive.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub project_id: Option<String>,
    pub kinds: Option<Vec<EventKind>>,
    pub priorities: Option<Vec<EventPriority>>,
    pub session_id: Option<SessionId>,
    pub since: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn for_session(session_id: &SessionId) -> Self {
        Self { session_id: Some(session_id.clone()), ..Self::default() }
    }

    fn matches(&self, event: &OrchestratorEvent) -> bool {
        if let Some(project) = &self.project_id {
            if &event.project_id != project {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(priorities) = &self.priorities {
            if !priorities.contains(&event.priority) {
                return false;
            }
        }
        if let Some(session) = &self.session_id {
            if event.session_id.as_ref() != Some(session) {
                return false;
            }
        }
        if let Some(since) = &self.since {
            match event.timestamp_utc() {
                Some(ts) if ts >= *since => {}
                _ => return false,
            }
        }
        true
    }
}

/// Append-only JSONL store for one project's events.
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
    max_events: usize,
}

impl EventStore {
    pub fn new(path: PathBuf, max_events: usize) -> Self {
        Self { path, max_events }
    }

    /// Append one event, pruning first if the file is at capacity.
    pub fn append(&self, event: &OrchestratorEvent) -> Result<(), StoreError> {
        let existing = self.read_all();
        if existing.len() >= self.max_events {
            let keep = &existing[existing.len() + 1 - self.max_events..];
            let mut out = String::new();
            for kept in keep {
                out.push_str(&serde_json::to_string(kept)?);
                out.push('\n');
            }
            fs::write(&self.path, out).map_err(|e| StoreError::io(&self.path, e))?;
            tracing::debug!(
                path = %self.path.display(),
                dropped = existing.len() + 1 - self.max_events,
                "pruned event log"
            );
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| StoreError::io(&self.path, e))
    }

    /// All events in file (append) order, malformed lines dropped.
    pub fn read_all(&self) -> Vec<OrchestratorEvent> {
        let Ok(raw) = fs::read_to_string(&self.path) else { return vec![] };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Filtered query, sorted newest-first, then offset/limit applied.
    pub fn query(&self, filter: &EventFilter) -> Vec<OrchestratorEvent> {
        let mut events: Vec<OrchestratorEvent> =
            self.read_all().into_iter().filter(|e| filter.matches(e)).collect();
        // Reverse before the stable sort so ties within one timestamp come
        // back latest-append-first.
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Count events of one kind for a session (cheap helper for outcome
    /// capture and analytics).
    pub fn count_for_session(&self, session_id: &SessionId, kind: EventKind) -> usize {
        self.read_all()
            .iter()
            .filter(|e| e.kind == kind && e.session_id.as_ref() == Some(session_id))
            .count()
    }

    /// The most recent event of one kind for a session, by file order.
    pub fn last_for_session(
        &self,
        session_id: &SessionId,
        kind: EventKind,
    ) -> Option<OrchestratorEvent> {
        self.read_all()
            .into_iter()
            .rev()
            .find(|e| e.kind == kind && e.session_id.as_ref() == Some(session_id))
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
