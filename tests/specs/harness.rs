// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scenario fixture: one project, all slots filled with fakes.

use fleet_adapters::{
    FakeAgentAdapter, FakeNotifyAdapter, FakeRuntimeAdapter, FakeScmAdapter,
    FakeTrackerAdapter, FakeWorkspaceAdapter, PluginRegistry,
};
use fleet_core::{test_support::test_config, FakeClock, OrchestratorConfig, OrchestratorEvent};
use fleet_engine::{LifecycleManager, PlanService, SessionManager};
use fleet_storage::ProjectStores;
use std::sync::Arc;

pub struct Fixture {
    #[allow(dead_code)]
    pub tmp: tempfile::TempDir,
    pub config: Arc<OrchestratorConfig>,
    pub clock: FakeClock,
    pub runtime: FakeRuntimeAdapter,
    #[allow(dead_code)]
    pub agent: FakeAgentAdapter,
    pub scm: FakeScmAdapter,
    #[allow(dead_code)]
    pub tracker: FakeTrackerAdapter,
    pub notify: FakeNotifyAdapter,
    pub sessions: Arc<SessionManager<FakeClock>>,
    pub plans: Arc<PlanService<FakeClock>>,
    pub lifecycle: LifecycleManager<FakeClock>,
}

impl Fixture {
    pub fn stores(&self) -> ProjectStores {
        ProjectStores::open(&self.config.data_dir, &self.config.config_path, "demo")
            .expect("project stores")
    }

    pub fn events(&self) -> Vec<OrchestratorEvent> {
        self.stores().events.read_all()
    }
}

pub fn fixture(customize: impl FnOnce(&mut OrchestratorConfig)) -> Fixture {
    let tmp = tempfile::tempdir().expect("tempdir");
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
    let sessions =
        Arc::new(SessionManager::new(config.clone(), registry.clone(), clock.clone()));
    let plans = Arc::new(PlanService::new(sessions.clone()));
    let lifecycle = LifecycleManager::new(
        config.clone(),
        registry,
        sessions.clone(),
        plans.clone(),
        clock.clone(),
    );

    Fixture { tmp, config, clock, runtime, agent, scm, tracker, notify, sessions, plans, lifecycle }
}
