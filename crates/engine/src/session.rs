// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: identity issuance, plugin composition, and the session
//! lifecycle operations (spawn, send, kill, restore, list).
//!
//! Spawn is all-or-nothing: any failure after the id reservation rolls the
//! partial state back (workspace destroyed, skeleton archived) so the data
//! directory never accumulates half-born sessions.

use crate::error::SessionError;
use fleet_adapters::{
    PluginRegistry, RuntimeAdapter, RuntimeContext, ScmAdapter, TrackerAdapter,
    WorkspaceAdapter,
};
use fleet_core::{
    Clock, EventKind, OrchestratorConfig, OrchestratorEvent, PlanId, ProjectConfig, Session,
    SessionId, SessionStatus,
};
use fleet_storage::{config_hash, ProjectStores, SessionRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Budget for mutating runtime calls (sends, teardown).
pub(crate) const ACTION_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for read-only probes (liveness, output, SCM state).
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(4);

/// Request to spawn a new supervised session.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub project: String,
    /// Prompt text, built by the caller (prompt generation is not the
    /// engine's business).
    pub prompt: String,
    /// Tracker issue id to bind the session to.
    pub issue: Option<String>,
    /// Explicit branch; wins over tracker-derived and ad-hoc names.
    pub branch: Option<String>,
    pub plan_id: Option<PlanId>,
    /// Extra metadata keys written verbatim (e.g. `taskId`, `planRole`).
    pub extra: BTreeMap<String, String>,
}

impl SpawnRequest {
    pub fn new(project: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            prompt: prompt.into(),
            issue: None,
            branch: None,
            plan_id: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Strip control characters so a prompt cannot smuggle escape sequences into
/// the agent's terminal. Newlines and tabs survive.
pub fn sanitize_input(text: &str) -> String {
    text.chars().filter(|c| !c.is_control() || *c == '\n' || *c == '\t').collect()
}

fn branch_slug(title: &str) -> String {
    let mut slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').chars().take(40).collect()
}

pub struct SessionManager<C: Clock> {
    config: Arc<OrchestratorConfig>,
    registry: Arc<PluginRegistry>,
    clock: C,
    hash: String,
}

impl<C: Clock> SessionManager<C> {
    pub fn new(config: Arc<OrchestratorConfig>, registry: Arc<PluginRegistry>, clock: C) -> Self {
        let hash = config_hash(&config.config_path);
        Self { config, registry, clock, hash }
    }

    /// The 12-hex-char config isolation hash.
    pub fn config_hash(&self) -> &str {
        &self.hash
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn project(&self, key: &str) -> Result<&ProjectConfig, SessionError> {
        self.config.project(key).ok_or_else(|| SessionError::UnknownProject(key.to_string()))
    }

    pub(crate) fn stores(&self, project_key: &str) -> Result<ProjectStores, SessionError> {
        Ok(ProjectStores::open(&self.config.data_dir, &self.config.config_path, project_key)?)
    }

    // ── Plugin resolution (missing plugins fail closed) ───────────────────

    pub(crate) fn runtime_for(
        &self,
        project: &ProjectConfig,
    ) -> Option<Arc<dyn RuntimeAdapter>> {
        self.registry.runtime(project.runtime_plugin(&self.config.defaults)?)
    }

    pub(crate) fn agent_for(
        &self,
        project: &ProjectConfig,
    ) -> Option<Arc<dyn fleet_adapters::AgentAdapter>> {
        self.registry.agent(project.agent_plugin(&self.config.defaults)?)
    }

    pub(crate) fn workspace_for(
        &self,
        project: &ProjectConfig,
    ) -> Option<Arc<dyn WorkspaceAdapter>> {
        self.registry.workspace(project.workspace_plugin(&self.config.defaults)?)
    }

    pub(crate) fn tracker_for(&self, project: &ProjectConfig) -> Option<Arc<dyn TrackerAdapter>> {
        self.registry.tracker(project.tracker.as_deref()?)
    }

    pub(crate) fn scm_for(&self, project: &ProjectConfig) -> Option<Arc<dyn ScmAdapter>> {
        self.registry.scm(project.scm.as_deref()?)
    }

    // ── Spawn ─────────────────────────────────────────────────────────────

    pub async fn spawn(&self, request: SpawnRequest) -> Result<Session, SessionError> {
        let project = self.project(&request.project)?;
        let stores = self.stores(&request.project)?;

        // Resolve the issue up front; an unreachable tracker fails the spawn
        // before anything is reserved.
        let issue = match (&request.issue, self.tracker_for(project)) {
            (Some(issue_id), Some(tracker)) => {
                let issue =
                    tracker.issue(issue_id, project).await.map_err(|e| {
                        SessionError::IssueUnreachable {
                            issue: issue_id.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                Some(issue)
            }
            _ => None,
        };

        let id = stores.metadata.reserve_id(&project.session_prefix).map_err(|e| match e {
            fleet_storage::StoreError::IdExhausted(_) => SessionError::IdCollision(e.to_string()),
            other => SessionError::Store(other),
        })?;

        // Globally unique across orchestrator installations.
        let runtime_key = format!("{}-{}", self.hash, id);

        let branch = match (&request.branch, &issue) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(issue)) => format!(
                "{}/{}-{}",
                project.session_prefix,
                issue.number,
                branch_slug(&issue.title)
            ),
            (None, None) => format!("{}/{}", project.session_prefix, id),
        };

        let Some(workspace) = self.workspace_for(project) else {
            self.rollback(project, &stores, &id, None).await;
            return Err(SessionError::WorkspaceCreateFailed(
                "workspace plugin not registered".to_string(),
            ));
        };
        let worktree = match workspace.create(&id, &branch, project).await {
            Ok(path) => path,
            Err(e) => {
                self.rollback(project, &stores, &id, None).await;
                return Err(SessionError::WorkspaceCreateFailed(e.to_string()));
            }
        };

        let Some(runtime) = self.runtime_for(project) else {
            self.rollback(project, &stores, &id, Some(&worktree)).await;
            return Err(SessionError::RuntimeCreateFailed(
                "runtime plugin not registered".to_string(),
            ));
        };
        let context = RuntimeContext {
            runtime_key,
            session_id: id.as_str().to_string(),
            project: request.project.clone(),
            workdir: worktree.clone(),
            prompt: sanitize_input(&request.prompt),
            previous: None,
        };
        let handle = match runtime.create(&context).await {
            Ok(handle) => handle,
            Err(e) => {
                self.rollback(project, &stores, &id, Some(&worktree)).await;
                return Err(SessionError::RuntimeCreateFailed(e.to_string()));
            }
        };

        let now = self.clock.epoch_ms();
        let session = Session {
            id: id.clone(),
            project: request.project.clone(),
            status: SessionStatus::Spawning,
            activity: None,
            branch,
            issue: issue.as_ref().map(|i| i.url.clone()).or(request.issue.clone()),
            pr: None,
            worktree,
            runtime_handle: Some(handle),
            agent: None,
            created_at_ms: now,
            last_activity_ms: now,
            plan_id: request.plan_id.clone(),
            extra: request.extra.clone(),
        };
        stores.metadata.write(id.as_str(), &SessionRecord::from_session(&session))?;

        let event = OrchestratorEvent::new(
            EventKind::SessionSpawned,
            &request.project,
            Some(id.clone()),
            format!("spawned {} on {}", id, session.branch),
            now,
        );
        if let Err(e) = stores.events.append(&event) {
            tracing::warn!(session_id = %id, error = %e, "could not record spawn event");
        }

        tracing::info!(session_id = %id, project = %request.project, "session spawned");
        Ok(session)
    }

    /// Undo a partially-completed spawn: tear down whatever was created and
    /// archive the reserved id's skeleton so the ordinal is never reissued.
    async fn rollback(
        &self,
        project: &ProjectConfig,
        stores: &ProjectStores,
        id: &SessionId,
        worktree: Option<&std::path::Path>,
    ) {
        if let (Some(path), Some(workspace)) = (worktree, self.workspace_for(project)) {
            if let Err(e) = workspace.destroy(path).await {
                tracing::warn!(session_id = %id, error = %e, "rollback workspace destroy failed");
            }
        }
        if let Err(e) = stores.metadata.archive(id.as_str(), self.clock.epoch_ms()) {
            tracing::warn!(session_id = %id, error = %e, "rollback archive failed");
        }
    }

    // ── Send ──────────────────────────────────────────────────────────────

    /// Deliver text to a session's agent, bounded by the action timeout.
    pub async fn send(
        &self,
        project_key: &str,
        id: &SessionId,
        text: &str,
    ) -> Result<(), SessionError> {
        let project = self.project(project_key)?;
        let stores = self.stores(project_key)?;
        let record =
            stores.metadata.read(id.as_str()).ok_or_else(|| SessionError::NotFound(id.clone()))?;
        let handle = record.runtime_handle().ok_or_else(|| SessionError::NoRuntime(id.clone()))?;
        let runtime = self
            .runtime_for(project)
            .ok_or_else(|| SessionError::SendFailed("runtime plugin not registered".into()))?;

        let sanitized = sanitize_input(text);
        match tokio::time::timeout(ACTION_TIMEOUT, runtime.send_message(&handle, &sanitized)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SessionError::SendFailed(e.to_string())),
            Err(_) => return Err(SessionError::SendTimeout(id.clone())),
        }

        let now = self.clock.epoch_ms();
        stores.metadata.update(id.as_str(), |r| r.set("lastActivityAt", now.to_string()))?;
        Ok(())
    }

    // ── Kill ──────────────────────────────────────────────────────────────

    /// Destroy runtime and workspace, mark killed, archive the record.
    pub async fn kill(&self, project_key: &str, id: &SessionId) -> Result<(), SessionError> {
        let project = self.project(project_key)?;
        let stores = self.stores(project_key)?;
        let record =
            stores.metadata.read(id.as_str()).ok_or_else(|| SessionError::NotFound(id.clone()))?;
        let session = record.to_session(id);

        if let (Some(handle), Some(runtime)) =
            (&session.runtime_handle, self.runtime_for(project))
        {
            if let Err(e) = runtime.destroy(handle).await {
                tracing::warn!(session_id = %id, error = %e, "runtime destroy failed");
            }
        }
        if let Some(workspace) = self.workspace_for(project) {
            if let Err(e) = workspace.destroy(&session.worktree).await {
                tracing::warn!(session_id = %id, error = %e, "workspace destroy failed");
            }
        }

        let now = self.clock.epoch_ms();
        stores.metadata.update(id.as_str(), |r| r.set_status(SessionStatus::Killed))?;
        let event = OrchestratorEvent::new(
            EventKind::SessionKilled,
            project_key,
            Some(id.clone()),
            format!("killed {id}"),
            now,
        );
        if let Err(e) = stores.events.append(&event) {
            tracing::warn!(session_id = %id, error = %e, "could not record kill event");
        }
        stores.metadata.archive(id.as_str(), now)?;
        tracing::info!(session_id = %id, "session killed");
        Ok(())
    }

    // ── Restore ───────────────────────────────────────────────────────────

    /// Re-create a runtime on the existing workspace from the persisted
    /// handle. The session goes back to `spawning`.
    pub async fn restore(&self, project_key: &str, id: &SessionId) -> Result<Session, SessionError> {
        let project = self.project(project_key)?;
        let stores = self.stores(project_key)?;
        let record =
            stores.metadata.read(id.as_str()).ok_or_else(|| SessionError::NotFound(id.clone()))?;
        let mut session = record.to_session(id);

        let runtime = self.runtime_for(project).ok_or_else(|| {
            SessionError::RuntimeCreateFailed("runtime plugin not registered".to_string())
        })?;
        let context = RuntimeContext {
            runtime_key: format!("{}-{}", self.hash, id),
            session_id: id.as_str().to_string(),
            project: project_key.to_string(),
            workdir: session.worktree.clone(),
            prompt: String::new(),
            previous: session.runtime_handle.clone(),
        };
        let handle = runtime
            .create(&context)
            .await
            .map_err(|e| SessionError::RuntimeCreateFailed(e.to_string()))?;

        session.status = SessionStatus::Spawning;
        session.runtime_handle = Some(handle.clone());
        session.last_activity_ms = self.clock.epoch_ms();
        // Update in place: a full rewrite would drop the persisted reaction
        // trackers that restarts are supposed to resume.
        let now = session.last_activity_ms;
        stores.metadata.update(id.as_str(), |r| {
            r.set_status(SessionStatus::Spawning);
            r.set_runtime_handle(&handle);
            r.set("lastActivityAt", now.to_string());
        })?;

        let event = OrchestratorEvent::new(
            EventKind::SessionRestored,
            project_key,
            Some(id.clone()),
            format!("restored {id}"),
            session.last_activity_ms,
        );
        if let Err(e) = stores.events.append(&event) {
            tracing::warn!(session_id = %id, error = %e, "could not record restore event");
        }
        Ok(session)
    }

    // ── List / get ────────────────────────────────────────────────────────

    /// All live sessions for a project. Sessions whose runtime no longer
    /// answers `is_alive` are marked `killed` in place — idempotent and
    /// cheap, so every caller gets a truthful view.
    pub async fn list(&self, project_key: &str) -> Result<Vec<Session>, SessionError> {
        let project = self.project(project_key)?;
        let stores = self.stores(project_key)?;
        let runtime = self.runtime_for(project);

        let mut sessions = Vec::new();
        for id in stores.metadata.list_ids() {
            let Some(record) = stores.metadata.read(id.as_str()) else { continue };
            let mut session = record.to_session(&id);

            if !session.is_terminal() {
                if let (Some(handle), Some(runtime)) = (&session.runtime_handle, &runtime) {
                    let alive =
                        tokio::time::timeout(PROBE_TIMEOUT, runtime.is_alive(handle)).await;
                    if let Ok(Ok(false)) = alive {
                        session.status = SessionStatus::Killed;
                        if let Err(e) = stores
                            .metadata
                            .update(id.as_str(), |r| r.set_status(SessionStatus::Killed))
                        {
                            tracing::warn!(session_id = %id, error = %e, "dead-runtime mark failed");
                        }
                    }
                }
            }
            sessions.push(session);
        }
        Ok(sessions)
    }

    pub fn get(&self, project_key: &str, id: &SessionId) -> Result<Session, SessionError> {
        let stores = self.stores(project_key)?;
        stores
            .metadata
            .read(id.as_str())
            .map(|record| record.to_session(id))
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
