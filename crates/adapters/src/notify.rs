// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notify slot: fan-out targets for events that reach humans.

use async_trait::async_trait;
use fleet_core::OrchestratorEvent;
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter for delivering events to humans
#[async_trait]
pub trait NotifyAdapter: Send + Sync {
    async fn notify(&self, event: &OrchestratorEvent) -> Result<(), NotifyError>;
}

/// Desktop notification adapter using notify-rust.
///
/// On macOS, `notify-rust` uses `mac-notification-sys` (Cocoa bindings) to send
/// notifications via the Notification Center. The first notification triggers
/// `ensure_application_set()` which runs an AppleScript to look up a bundle
/// identifier. In a daemon context without Automation permissions, that
/// AppleScript blocks forever. We pre-set the bundle identifier at construction
/// time to bypass the lookup entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifyAdapter;

impl DesktopNotifyAdapter {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            // Pre-set the application bundle identifier so mac-notification-sys
            // skips its NSAppleScript lookup (which blocks forever in daemon
            // processes that lack Automation permissions).
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        Self
    }
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn notify(&self, event: &OrchestratorEvent) -> Result<(), NotifyError> {
        let title = match &event.session_id {
            Some(id) => format!("[{}] {} {}", event.priority, event.kind, id),
            None => format!("[{}] {}", event.priority, event.kind),
        };
        let message = event.message.clone();
        // notify_rust::Notification::show() is synchronous on macOS.
        // Fire-and-forget on tokio's bounded blocking thread pool to avoid
        // blocking the async runtime while capping OS thread count.
        tokio::task::spawn_blocking(move || {
            tracing::info!(%title, %message, "sending desktop notification");
            match notify_rust::Notification::new().summary(&title).body(&message).show() {
                Ok(_) => {
                    tracing::info!(%title, "desktop notification sent");
                }
                Err(e) => {
                    tracing::warn!(%title, error = %e, "desktop notification failed");
                }
            }
        });
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{NotifyAdapter, NotifyError};
    use async_trait::async_trait;
    use fleet_core::OrchestratorEvent;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeNotifyState {
        events: Vec<OrchestratorEvent>,
        fail: bool,
    }

    /// Fake notification adapter for testing
    #[derive(Clone, Default)]
    pub struct FakeNotifyAdapter {
        inner: Arc<Mutex<FakeNotifyState>>,
    }

    impl FakeNotifyAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// All events delivered so far.
        pub fn events(&self) -> Vec<OrchestratorEvent> {
            self.inner.lock().events.clone()
        }

        pub fn fail_all(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }
    }

    #[async_trait]
    impl NotifyAdapter for FakeNotifyAdapter {
        async fn notify(&self, event: &OrchestratorEvent) -> Result<(), NotifyError> {
            let mut state = self.inner.lock();
            if state.fail {
                return Err(NotifyError::SendFailed("scripted failure".to_string()));
            }
            state.events.push(event.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifyAdapter;

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
