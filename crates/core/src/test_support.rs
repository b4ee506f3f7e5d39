// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::config::{DefaultPlugins, NotificationRouting, OrchestratorConfig, ProjectConfig};
use crate::id::SessionId;
use crate::plan::{Task, TaskScope};
use crate::session::{RuntimeHandle, Session, SessionStatus};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Builder for test sessions with sensible defaults.
pub struct SessionBuilder {
    id: String,
    project: String,
    status: SessionStatus,
    branch: String,
    pr: Option<String>,
    plan_id: Option<String>,
    handle: Option<RuntimeHandle>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            id: "fc-1".to_string(),
            project: "demo".to_string(),
            status: SessionStatus::Working,
            branch: "fc/fc-1".to_string(),
            pr: None,
            plan_id: None,
            handle: Some(RuntimeHandle::new("rt-1", "fake")),
        }
    }
}

impl SessionBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn pr(mut self, pr: impl Into<String>) -> Self {
        self.pr = Some(pr.into());
        self
    }

    pub fn plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn no_handle(mut self) -> Self {
        self.handle = None;
        self
    }

    pub fn build(self) -> Session {
        Session {
            id: SessionId::new(self.id),
            project: self.project,
            status: self.status,
            activity: None,
            branch: self.branch,
            issue: None,
            pr: self.pr,
            worktree: PathBuf::from("/tmp/worktrees/test"),
            runtime_handle: self.handle,
            agent: None,
            created_at_ms: 1_700_000_000_000,
            last_activity_ms: 1_700_000_000_000,
            plan_id: self.plan_id.map(crate::id::PlanId::new),
            extra: BTreeMap::new(),
        }
    }
}

impl Session {
    /// Create a builder with test defaults.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }
}

/// A minimal task for plan tests.
pub fn task(id: &str, deps: &[&str]) -> Task {
    Task {
        id: id.to_string(),
        title: format!("Task {id}"),
        description: format!("Implement part {id}"),
        acceptance_criteria: vec!["tests pass".to_string()],
        scope: TaskScope::Small,
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        affected_files: vec![],
        constraints: vec![],
        shared_context: None,
        issue_number: None,
        issue_url: None,
        session_id: None,
        issue_error: None,
    }
}

/// A single-project config rooted at `data_dir` for store and engine tests.
pub fn test_config(data_dir: impl Into<PathBuf>) -> OrchestratorConfig {
    let mut projects = IndexMap::new();
    projects.insert(
        "demo".to_string(),
        ProjectConfig {
            name: "Demo".to_string(),
            repo: "example/demo".to_string(),
            path: PathBuf::from("/tmp/repos/demo"),
            default_branch: "main".to_string(),
            session_prefix: "fc".to_string(),
            agent: None,
            runtime: None,
            workspace: None,
            tracker: None,
            scm: None,
            reactions: IndexMap::new(),
        },
    );
    OrchestratorConfig {
        config_path: PathBuf::from("/tmp/fleet/config.yaml"),
        data_dir: data_dir.into(),
        defaults: DefaultPlugins {
            runtime: Some("fake".to_string()),
            agent: Some("fake".to_string()),
            workspace: Some("fake".to_string()),
            notifiers: vec!["fake".to_string()],
        },
        projects,
        notifiers: IndexMap::new(),
        notification_routing: NotificationRouting {
            urgent: vec!["fake".to_string()],
            action: vec!["fake".to_string()],
            warning: vec!["fake".to_string()],
            info: vec![],
        },
        reactions: IndexMap::new(),
    }
}
