// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator configuration model.
//!
//! Read once at process start by the host; the engine only consumes these
//! structs. The config file's directory (not its contents) derives the
//! isolation hash that namespaces the data directory.

use crate::event::EventPriority;
use crate::reaction::ReactionConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Path of the configuration file itself; its parent directory feeds
    /// the isolation hash.
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub defaults: DefaultPlugins,
    #[serde(default)]
    pub projects: IndexMap<String, ProjectConfig>,
    /// Notifier plugin settings, opaque to the core.
    #[serde(default)]
    pub notifiers: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub notification_routing: NotificationRouting,
    /// Global reaction defaults, overlaid by per-project reactions.
    #[serde(default)]
    pub reactions: IndexMap<String, ReactionConfig>,
}

impl OrchestratorConfig {
    pub fn project(&self, key: &str) -> Option<&ProjectConfig> {
        self.projects.get(key)
    }
}

/// Plugin names used when a project does not name its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultPlugins {
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub notifiers: Vec<String>,
}

/// One supervised project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    /// Remote repository slug (e.g. `org/repo`).
    pub repo: String,
    /// Local checkout the workspace plugin branches worktrees from.
    pub path: PathBuf,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Prefix for issued session ids.
    pub session_prefix: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub tracker: Option<String>,
    #[serde(default)]
    pub scm: Option<String>,
    #[serde(default)]
    pub reactions: IndexMap<String, ReactionConfig>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl ProjectConfig {
    /// Effective runtime plugin name, falling back to the defaults.
    pub fn runtime_plugin<'a>(&'a self, defaults: &'a DefaultPlugins) -> Option<&'a str> {
        self.runtime.as_deref().or(defaults.runtime.as_deref())
    }

    pub fn agent_plugin<'a>(&'a self, defaults: &'a DefaultPlugins) -> Option<&'a str> {
        self.agent.as_deref().or(defaults.agent.as_deref())
    }

    pub fn workspace_plugin<'a>(&'a self, defaults: &'a DefaultPlugins) -> Option<&'a str> {
        self.workspace.as_deref().or(defaults.workspace.as_deref())
    }
}

/// Per-priority notifier fan-out lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRouting {
    #[serde(default)]
    pub urgent: Vec<String>,
    #[serde(default)]
    pub action: Vec<String>,
    #[serde(default)]
    pub warning: Vec<String>,
    #[serde(default)]
    pub info: Vec<String>,
}

impl NotificationRouting {
    pub fn for_priority(&self, priority: EventPriority) -> &[String] {
        match priority {
            EventPriority::Urgent => &self.urgent,
            EventPriority::Action => &self.action,
            EventPriority::Warning => &self.warning,
            EventPriority::Info => &self.info,
        }
    }
}
