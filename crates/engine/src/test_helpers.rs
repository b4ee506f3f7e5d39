// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared engine test fixtures: a full fake-plugin harness.

use crate::lifecycle::LifecycleManager;
use crate::plan::PlanService;
use crate::session::SessionManager;
use fleet_adapters::{
    FakeAgentAdapter, FakeNotifyAdapter, FakeRuntimeAdapter, FakeScmAdapter,
    FakeTrackerAdapter, FakeWorkspaceAdapter, PluginRegistry,
};
use fleet_core::{test_support::test_config, FakeClock, OrchestratorConfig};
use std::sync::Arc;

pub(crate) struct Harness {
    pub tmp: tempfile::TempDir,
    pub clock: FakeClock,
    pub runtime: FakeRuntimeAdapter,
    pub agent: FakeAgentAdapter,
    pub workspace: FakeWorkspaceAdapter,
    pub tracker: FakeTrackerAdapter,
    pub scm: FakeScmAdapter,
    pub notify: FakeNotifyAdapter,
    pub sessions: Arc<SessionManager<FakeClock>>,
    pub plans: Arc<PlanService<FakeClock>>,
    pub lifecycle: LifecycleManager<FakeClock>,
}

pub(crate) fn harness() -> Harness {
    harness_with(|_| {})
}

pub(crate) fn harness_with(customize: impl FnOnce(&mut OrchestratorConfig)) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    if let Some(project) = config.projects.get_mut("demo") {
        project.tracker = Some("fake".to_string());
        project.scm = Some("fake".to_string());
    }
    customize(&mut config);

    let clock = FakeClock::new();
    let runtime = FakeRuntimeAdapter::new();
    let agent = FakeAgentAdapter::new();
    let workspace = FakeWorkspaceAdapter::new();
    let tracker = FakeTrackerAdapter::new();
    let scm = FakeScmAdapter::new();
    let notify = FakeNotifyAdapter::new();

    let mut registry = PluginRegistry::new();
    registry.register_runtime("fake", Arc::new(runtime.clone()));
    registry.register_agent("fake", Arc::new(agent.clone()));
    registry.register_workspace("fake", Arc::new(workspace.clone()));
    registry.register_tracker("fake", Arc::new(tracker.clone()));
    registry.register_scm("fake", Arc::new(scm.clone()));
    registry.register_notifier("fake", Arc::new(notify.clone()));

    let config = Arc::new(config);
    let registry = Arc::new(registry);
    let sessions = Arc::new(SessionManager::new(config.clone(), registry.clone(), clock.clone()));
    let plans = Arc::new(PlanService::new(sessions.clone()));
    let lifecycle =
        LifecycleManager::new(config, registry, sessions.clone(), plans.clone(), clock.clone());

    Harness { tmp, clock, runtime, agent, workspace, tracker, scm, notify, sessions, plans, lifecycle }
}
