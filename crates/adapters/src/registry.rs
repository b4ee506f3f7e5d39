// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed plugin registry.
//!
//! The host statically links the adapters it ships and registers instances
//! here at startup; the engine resolves `(slot, name)` at use sites. A
//! missing plugin is not an error — lookups return `None` and the caller
//! skips the dependent code path.

use crate::agent::AgentAdapter;
use crate::notify::NotifyAdapter;
use crate::runtime::RuntimeAdapter;
use crate::scm::ScmAdapter;
use crate::tracker::TrackerAdapter;
use crate::workspace::WorkspaceAdapter;
use std::collections::HashMap;
use std::sync::Arc;

/// Generate register/lookup methods for one plugin slot.
macro_rules! slot {
    ($field:ident, $register:ident, $get:ident, $trait:ident) => {
        pub fn $register(&mut self, name: impl Into<String>, plugin: Arc<dyn $trait>) {
            self.$field.insert(name.into(), plugin);
        }

        /// Look up by name; `None` when unregistered (fail closed).
        pub fn $get(&self, name: &str) -> Option<Arc<dyn $trait>> {
            self.$field.get(name).cloned()
        }
    };
}

/// Map of `(slot, name) → instance`.
#[derive(Default)]
pub struct PluginRegistry {
    runtimes: HashMap<String, Arc<dyn RuntimeAdapter>>,
    agents: HashMap<String, Arc<dyn AgentAdapter>>,
    workspaces: HashMap<String, Arc<dyn WorkspaceAdapter>>,
    trackers: HashMap<String, Arc<dyn TrackerAdapter>>,
    scms: HashMap<String, Arc<dyn ScmAdapter>>,
    notifiers: HashMap<String, Arc<dyn NotifyAdapter>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    slot!(runtimes, register_runtime, runtime, RuntimeAdapter);
    slot!(agents, register_agent, agent, AgentAdapter);
    slot!(workspaces, register_workspace, workspace, WorkspaceAdapter);
    slot!(trackers, register_tracker, tracker, TrackerAdapter);
    slot!(scms, register_scm, scm, ScmAdapter);
    slot!(notifiers, register_notifier, notifier, NotifyAdapter);
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
