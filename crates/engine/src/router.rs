// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifier routing: fan an event out to every notifier listed for its
//! priority. Per-notifier failures are swallowed — one broken transport must
//! not silence the rest, and notification is always best-effort.

use fleet_adapters::PluginRegistry;
use fleet_core::{NotificationRouting, OrchestratorEvent};
use std::sync::Arc;

#[derive(Clone)]
pub struct NotificationRouter {
    registry: Arc<PluginRegistry>,
    routing: NotificationRouting,
}

impl NotificationRouter {
    pub fn new(registry: Arc<PluginRegistry>, routing: NotificationRouting) -> Self {
        Self { registry, routing }
    }

    /// Deliver to every notifier routed for the event's priority.
    pub async fn notify(&self, event: &OrchestratorEvent) {
        for name in self.routing.for_priority(event.priority) {
            let Some(notifier) = self.registry.notifier(name) else {
                tracing::debug!(notifier = %name, "notifier not registered, skipping");
                continue;
            };
            if let Err(e) = notifier.notify(event).await {
                tracing::warn!(
                    notifier = %name,
                    kind = %event.kind,
                    error = %e,
                    "notifier failed"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
