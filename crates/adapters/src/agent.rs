// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent slot: probes over a specific agent program's observable behavior.
//!
//! Both methods are required. Some agents keep output on screen after the
//! process exits, so the classifier consults `is_process_running` even when
//! `detect_activity` says the agent looks active.

use async_trait::async_trait;
use fleet_core::{ActivityState, RuntimeHandle};
use thiserror::Error;

/// Errors from agent probes
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("probe failed: {0}")]
    ProbeFailed(String),
}

/// Adapter for agent state detection
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Classify terminal output. `None` when the output is inconclusive —
    /// never guess.
    async fn detect_activity(
        &self,
        terminal_output: &str,
    ) -> Result<Option<ActivityState>, AgentError>;

    /// Whether the agent process itself is still running.
    async fn is_process_running(&self, handle: &RuntimeHandle) -> Result<bool, AgentError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AgentAdapter, AgentError};
    use async_trait::async_trait;
    use fleet_core::{ActivityState, RuntimeHandle};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeAgentState {
        activity: Option<ActivityState>,
        process_running: bool,
        fail_probe: bool,
    }

    /// Scriptable agent probe for tests.
    #[derive(Clone)]
    pub struct FakeAgentAdapter {
        inner: Arc<Mutex<FakeAgentState>>,
    }

    impl Default for FakeAgentAdapter {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeAgentState {
                    activity: Some(ActivityState::Active),
                    process_running: true,
                    fail_probe: false,
                })),
            }
        }
    }

    impl FakeAgentAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_activity(&self, activity: Option<ActivityState>) {
            self.inner.lock().activity = activity;
        }

        pub fn set_process_running(&self, running: bool) {
            self.inner.lock().process_running = running;
        }

        pub fn fail_probes(&self, fail: bool) {
            self.inner.lock().fail_probe = fail;
        }
    }

    #[async_trait]
    impl AgentAdapter for FakeAgentAdapter {
        async fn detect_activity(
            &self,
            _terminal_output: &str,
        ) -> Result<Option<ActivityState>, AgentError> {
            let state = self.inner.lock();
            if state.fail_probe {
                return Err(AgentError::ProbeFailed("scripted probe failure".to_string()));
            }
            Ok(state.activity)
        }

        async fn is_process_running(&self, _handle: &RuntimeHandle) -> Result<bool, AgentError> {
            let state = self.inner.lock();
            if state.fail_probe {
                return Err(AgentError::ProbeFailed("scripted probe failure".to_string()));
            }
            Ok(state.process_running)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAgentAdapter;
