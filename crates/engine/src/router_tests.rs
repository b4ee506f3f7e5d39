// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_adapters::FakeNotifyAdapter;
use fleet_core::{EventKind, EventPriority};

fn event(kind: EventKind) -> OrchestratorEvent {
    OrchestratorEvent::new(kind, "demo", None, "m", 0)
}

fn routing() -> NotificationRouting {
    NotificationRouting {
        urgent: vec!["a".to_string(), "b".to_string()],
        action: vec!["a".to_string()],
        warning: vec![],
        info: vec![],
    }
}

#[tokio::test]
async fn fans_out_to_all_routed_notifiers() {
    let a = FakeNotifyAdapter::new();
    let b = FakeNotifyAdapter::new();
    let mut registry = PluginRegistry::new();
    registry.register_notifier("a", Arc::new(a.clone()));
    registry.register_notifier("b", Arc::new(b.clone()));
    let router = NotificationRouter::new(Arc::new(registry), routing());

    router.notify(&event(EventKind::SessionStuck)).await;

    assert_eq!(a.events().len(), 1);
    assert_eq!(b.events().len(), 1);
}

#[tokio::test]
async fn respects_priority_routing() {
    let a = FakeNotifyAdapter::new();
    let b = FakeNotifyAdapter::new();
    let mut registry = PluginRegistry::new();
    registry.register_notifier("a", Arc::new(a.clone()));
    registry.register_notifier("b", Arc::new(b.clone()));
    let router = NotificationRouter::new(Arc::new(registry), routing());

    // PrMerged infers `action`, routed only to a.
    router.notify(&event(EventKind::PrMerged)).await;
    assert_eq!(a.events().len(), 1);
    assert_eq!(b.events().len(), 0);

    // Warning has no route.
    router.notify(&event(EventKind::CiFailing)).await;
    assert_eq!(a.events().len(), 1);
}

#[tokio::test]
async fn failures_are_swallowed_per_notifier() {
    let a = FakeNotifyAdapter::new();
    let b = FakeNotifyAdapter::new();
    a.fail_all(true);
    let mut registry = PluginRegistry::new();
    registry.register_notifier("a", Arc::new(a.clone()));
    registry.register_notifier("b", Arc::new(b.clone()));
    let router = NotificationRouter::new(Arc::new(registry), routing());

    router.notify(&event(EventKind::SessionStuck)).await;
    assert_eq!(b.events().len(), 1, "b still notified after a failed");
}

#[tokio::test]
async fn unregistered_notifier_is_skipped() {
    let registry = PluginRegistry::new();
    let router = NotificationRouter::new(Arc::new(registry), routing());
    // Must not error or panic.
    router.notify(&event(EventKind::SessionStuck)).await;

    let priority = EventPriority::infer(EventKind::SessionStuck);
    assert_eq!(priority, EventPriority::Urgent);
}
