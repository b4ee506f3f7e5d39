// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::notify::FakeNotifyAdapter;
use crate::runtime::FakeRuntimeAdapter;

#[test]
fn lookup_returns_registered_instance() {
    let mut registry = PluginRegistry::new();
    let fake = FakeRuntimeAdapter::new();
    registry.register_runtime("fake", Arc::new(fake.clone()));

    assert!(registry.runtime("fake").is_some());
}

#[test]
fn missing_plugin_is_none_not_error() {
    let registry = PluginRegistry::new();
    assert!(registry.runtime("tmux").is_none());
    assert!(registry.scm("github").is_none());
    assert!(registry.notifier("desktop").is_none());
}

#[test]
fn slots_are_independent_namespaces() {
    let mut registry = PluginRegistry::new();
    registry.register_notifier("fake", Arc::new(FakeNotifyAdapter::new()));

    assert!(registry.notifier("fake").is_some());
    assert!(registry.runtime("fake").is_none(), "same name, different slot");
}

#[tokio::test]
async fn reregistration_replaces() {
    let mut registry = PluginRegistry::new();
    let first = FakeNotifyAdapter::new();
    let second = FakeNotifyAdapter::new();
    registry.register_notifier("n", Arc::new(first.clone()));
    registry.register_notifier("n", Arc::new(second.clone()));

    let event = fleet_core::OrchestratorEvent::new(
        fleet_core::EventKind::SessionWorking,
        "demo",
        None,
        "hello",
        0,
    );
    registry.notifier("n").unwrap().notify(&event).await.unwrap();
    assert_eq!(first.events().len(), 0);
    assert_eq!(second.events().len(), 1);
}
