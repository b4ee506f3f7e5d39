// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flat `key=value` session records with atomic rename-based updates.
//!
//! One file per session under `sessions/`, archived (never deleted) under
//! `sessions/archive/<id>_<ts>` once terminal. Keys match `[A-Za-z0-9_]+`;
//! values are opaque single-line strings. Unknown keys round-trip untouched
//! so newer and older orchestrators can share a data directory.

use crate::paths::ProjectPaths;
use crate::StoreError;
use fleet_core::{
    AgentInfo, PlanId, RuntimeHandle, Session, SessionId, SessionStatus,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const RESERVE_ATTEMPTS: u32 = 10;

/// Reserved keys with typed accessors. Everything else is preserved as-is.
mod keys {
    pub const PROJECT: &str = "project";
    pub const WORKTREE: &str = "worktree";
    pub const BRANCH: &str = "branch";
    pub const STATUS: &str = "status";
    pub const TMUX_NAME: &str = "tmuxName";
    pub const PR: &str = "pr";
    pub const ISSUE: &str = "issue";
    pub const SUMMARY: &str = "summary";
    pub const AGENT: &str = "agent";
    pub const CREATED_AT: &str = "createdAt";
    pub const LAST_ACTIVITY_AT: &str = "lastActivityAt";
    pub const RUNTIME_HANDLE: &str = "runtimeHandle";
    pub const PLAN_ID: &str = "planId";
    pub const REVIEW_ATTEMPTS: &str = "reviewAttempts";
}

/// One parsed session metadata record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    entries: BTreeMap<String, String>,
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines, skipping malformed ones.
    pub fn parse(raw: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in raw.lines() {
            let Some((key, value)) = line.split_once('=') else { continue };
            if valid_key(key) {
                entries.insert(key.to_string(), value.to_string());
            }
        }
        Self { entries }
    }

    /// Serialize back to `key=value` lines.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set a value. Newlines are flattened since the format is line-based.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let value = if value.contains('\n') { value.replace('\n', " ") } else { value };
        self.entries.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    // ── Typed accessors for reserved keys ─────────────────────────────────

    pub fn status(&self) -> Option<SessionStatus> {
        self.get(keys::STATUS)?.parse().ok()
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.set(keys::STATUS, status.to_string());
    }

    pub fn pr(&self) -> Option<&str> {
        self.get(keys::PR)
    }

    pub fn set_pr(&mut self, url: &str) {
        self.set(keys::PR, url);
    }

    pub fn runtime_handle(&self) -> Option<RuntimeHandle> {
        RuntimeHandle::from_metadata(self.get(keys::RUNTIME_HANDLE)?)
    }

    pub fn set_runtime_handle(&mut self, handle: &RuntimeHandle) {
        self.set(keys::RUNTIME_HANDLE, handle.to_metadata());
    }

    pub fn plan_id(&self) -> Option<PlanId> {
        self.get(keys::PLAN_ID).map(PlanId::new)
    }

    pub fn review_attempts(&self) -> u32 {
        self.get(keys::REVIEW_ATTEMPTS).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    pub fn set_review_attempts(&mut self, attempts: u32) {
        self.set(keys::REVIEW_ATTEMPTS, attempts.to_string());
    }

    // ── Reaction tracker section ──────────────────────────────────────────
    // The `reaction_<key>_*` mapping is part of the data contract; these
    // helpers are the only place that formats those key names.

    fn reaction_key(key: &str, suffix: &str) -> String {
        // Reaction keys are kebab-case but metadata keys only allow
        // [A-Za-z0-9_], so dashes flatten to underscores.
        format!("reaction_{}_{suffix}", key.replace('-', "_"))
    }

    pub fn reaction_attempts(&self, key: &str) -> Option<u32> {
        self.get(&Self::reaction_key(key, "attempts"))?.parse().ok()
    }

    pub fn reaction_first_triggered(&self, key: &str) -> Option<u64> {
        self.get(&Self::reaction_key(key, "firstTriggered"))?.parse().ok()
    }

    pub fn set_reaction_tracker(&mut self, key: &str, attempts: u32, first_triggered_ms: u64) {
        self.set(&Self::reaction_key(key, "attempts"), attempts.to_string());
        self.set(&Self::reaction_key(key, "firstTriggered"), first_triggered_ms.to_string());
    }

    pub fn clear_reaction_tracker(&mut self, key: &str) {
        self.remove(&Self::reaction_key(key, "attempts"));
        self.remove(&Self::reaction_key(key, "firstTriggered"));
    }

    // ── Session conversion ────────────────────────────────────────────────

    /// Build a record from a session. Unknown keys carried in
    /// `session.extra` are written back untouched.
    pub fn from_session(session: &Session) -> Self {
        let mut record = Self::new();
        for (key, value) in &session.extra {
            if valid_key(key) {
                record.set(key, value.clone());
            }
        }
        record.set(keys::PROJECT, session.project.clone());
        record.set(keys::WORKTREE, session.worktree.to_string_lossy().into_owned());
        record.set(keys::BRANCH, session.branch.clone());
        record.set_status(session.status);
        record.set(keys::CREATED_AT, session.created_at_ms.to_string());
        record.set(keys::LAST_ACTIVITY_AT, session.last_activity_ms.to_string());
        if let Some(pr) = &session.pr {
            record.set(keys::PR, pr.clone());
        }
        if let Some(issue) = &session.issue {
            record.set(keys::ISSUE, issue.clone());
        }
        if let Some(handle) = &session.runtime_handle {
            record.set_runtime_handle(handle);
            record.set(keys::TMUX_NAME, handle.id.clone());
        }
        if let Some(plan_id) = &session.plan_id {
            record.set(keys::PLAN_ID, plan_id.as_str());
        }
        if let Some(agent) = &session.agent {
            if let Some(summary) = &agent.summary {
                record.set(keys::SUMMARY, summary.clone());
            }
            if let Ok(raw) = serde_json::to_string(agent) {
                record.set(keys::AGENT, raw);
            }
        }
        record
    }

    /// Reconstruct a session. Reserved keys map onto fields; the rest land
    /// in `extra`.
    pub fn to_session(&self, id: &SessionId) -> Session {
        let reserved = [
            keys::PROJECT,
            keys::WORKTREE,
            keys::BRANCH,
            keys::STATUS,
            keys::TMUX_NAME,
            keys::PR,
            keys::ISSUE,
            keys::SUMMARY,
            keys::AGENT,
            keys::CREATED_AT,
            keys::LAST_ACTIVITY_AT,
            keys::RUNTIME_HANDLE,
            keys::PLAN_ID,
            keys::REVIEW_ATTEMPTS,
        ];
        let extra = self
            .entries
            .iter()
            .filter(|(k, _)| !reserved.contains(&k.as_str()) && !k.starts_with("reaction_"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let agent: Option<AgentInfo> = self
            .get(keys::AGENT)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .or_else(|| {
                self.get(keys::SUMMARY).map(|s| AgentInfo {
                    summary: Some(s.to_string()),
                    cost_usd: None,
                })
            });

        Session {
            id: id.clone(),
            project: self.get(keys::PROJECT).unwrap_or_default().to_string(),
            status: self.status().unwrap_or(SessionStatus::Spawning),
            activity: None,
            branch: self.get(keys::BRANCH).unwrap_or_default().to_string(),
            issue: self.get(keys::ISSUE).map(str::to_string),
            pr: self.get(keys::PR).map(str::to_string),
            worktree: PathBuf::from(self.get(keys::WORKTREE).unwrap_or_default()),
            runtime_handle: self.runtime_handle(),
            agent,
            created_at_ms: self.get(keys::CREATED_AT).and_then(|v| v.parse().ok()).unwrap_or(0),
            last_activity_ms: self
                .get(keys::LAST_ACTIVITY_AT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            plan_id: self.plan_id(),
            extra,
        }
    }
}

/// Store for session metadata files under one project directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    sessions_dir: PathBuf,
    archive_dir: PathBuf,
}

impl MetadataStore {
    pub fn new(paths: &ProjectPaths) -> Self {
        Self { sessions_dir: paths.sessions_dir(), archive_dir: paths.archive_dir() }
    }

    fn session_file(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(id)
    }

    /// Read a record; `None` if the session does not exist (or is archived).
    pub fn read(&self, id: &str) -> Option<SessionRecord> {
        let raw = fs::read_to_string(self.session_file(id)).ok()?;
        Some(SessionRecord::parse(&raw))
    }

    /// Atomically write a record (write-temp + rename).
    pub fn write(&self, id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.session_file(id);
        let tmp = self.sessions_dir.join(format!("{id}.tmp"));
        {
            let mut file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
            file.write_all(record.serialize().as_bytes())
                .map_err(|e| StoreError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))
    }

    /// Read, mutate, write. A missing record is an empty one.
    pub fn update(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut SessionRecord),
    ) -> Result<SessionRecord, StoreError> {
        let mut record = self.read(id).unwrap_or_default();
        mutate(&mut record);
        self.write(id, &record)?;
        Ok(record)
    }

    /// All live (non-archived) session ids, unordered.
    pub fn list_ids(&self) -> Vec<SessionId> {
        let Ok(entries) = fs::read_dir(&self.sessions_dir) else { return vec![] };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.ends_with(".tmp"))
            .map(SessionId::new)
            .collect()
    }

    /// Move a terminal session's record to the archive, preserving its id.
    pub fn archive(&self, id: &str, timestamp_ms: u64) -> Result<(), StoreError> {
        let from = self.session_file(id);
        let to = self.archive_dir.join(format!("{id}_{timestamp_ms}"));
        fs::rename(&from, &to).map_err(|e| StoreError::io(&from, e))
    }

    /// Read the newest archived record for a session id, if any.
    pub fn read_archived(&self, id: &str) -> Option<SessionRecord> {
        let prefix = format!("{id}_");
        let newest = fs::read_dir(&self.archive_dir)
            .ok()?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(&prefix))
            .max_by_key(|name| {
                name.rsplit_once('_').and_then(|(_, ts)| ts.parse::<u64>().ok()).unwrap_or(0)
            })?;
        let raw = fs::read_to_string(self.archive_dir.join(newest)).ok()?;
        Some(SessionRecord::parse(&raw))
    }

    /// Atomically reserve the next `{prefix}-{n}` session id.
    ///
    /// Scans live and archived records for the highest ordinal, then
    /// attempts an exclusive create; a concurrent spawner losing the race
    /// steps to the next ordinal. The exclusive create is the only
    /// serialization point.
    pub fn reserve_id(&self, prefix: &str) -> Result<SessionId, StoreError> {
        let mut next = self.max_ordinal(prefix) + 1;
        for _ in 0..RESERVE_ATTEMPTS {
            let id = SessionId::from_ordinal(prefix, next);
            let path = self.session_file(id.as_str());
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(id),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    next += 1;
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Err(StoreError::IdExhausted(RESERVE_ATTEMPTS))
    }

    fn max_ordinal(&self, prefix: &str) -> u64 {
        let mut max = 0;
        let live = self.list_ids();
        let archived: Vec<SessionId> = fs::read_dir(&self.archive_dir)
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter_map(|name| name.rsplit_once('_').map(|(id, _)| SessionId::new(id)))
            .collect();
        for id in live.iter().chain(archived.iter()) {
            if let Some(rest) = id.as_str().strip_prefix(prefix) {
                if let Some(n) = rest.strip_prefix('-').and_then(|n| n.parse::<u64>().ok()) {
                    max = max.max(n);
                }
            }
        }
        max
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
