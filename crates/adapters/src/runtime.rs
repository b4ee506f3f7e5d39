// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime slot: where agents execute (terminal multiplexer, container, ...).
//!
//! The handle returned by `create` is opaque to the engine and serializable
//! so it can round-trip through session metadata across restarts.

use async_trait::async_trait;
use fleet_core::RuntimeHandle;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from runtime operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("create failed: {0}")]
    CreateFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("probe failed: {0}")]
    ProbeFailed(String),
    #[error("no such runtime: {0}")]
    Gone(String),
}

/// Everything a runtime needs to start an agent.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Globally-unique runtime key: `{config-hash}-{session-id}`.
    pub runtime_key: String,
    pub session_id: String,
    pub project: String,
    pub workdir: PathBuf,
    pub prompt: String,
    /// Set when restoring onto an existing workspace.
    pub previous: Option<RuntimeHandle>,
}

/// Adapter for agent execution environments
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Start an agent and return its opaque handle.
    async fn create(&self, context: &RuntimeContext) -> Result<RuntimeHandle, RuntimeError>;

    /// Tear the runtime down. Idempotent.
    async fn destroy(&self, handle: &RuntimeHandle) -> Result<(), RuntimeError>;

    /// Deliver text to the agent. Implementations use a paste-buffer channel
    /// for long messages so control characters and quoting stay intact.
    async fn send_message(&self, handle: &RuntimeHandle, text: &str) -> Result<(), RuntimeError>;

    /// The last `lines` lines of terminal output.
    async fn output(&self, handle: &RuntimeHandle, lines: usize) -> Result<String, RuntimeError>;

    /// Whether the runtime still exists.
    async fn is_alive(&self, handle: &RuntimeHandle) -> Result<bool, RuntimeError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{RuntimeAdapter, RuntimeContext, RuntimeError};
    use async_trait::async_trait;
    use fleet_core::RuntimeHandle;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeRuntimeState {
        created: Vec<RuntimeContext>,
        alive: HashSet<String>,
        output: HashMap<String, String>,
        sent: Vec<(String, String)>,
        fail_create: bool,
        fail_probe: bool,
        next_ordinal: u64,
    }

    /// Scriptable in-memory runtime for tests.
    #[derive(Clone, Default)]
    pub struct FakeRuntimeAdapter {
        inner: Arc<Mutex<FakeRuntimeState>>,
    }

    impl FakeRuntimeAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script terminal output for a handle id.
        pub fn set_output(&self, handle_id: &str, output: impl Into<String>) {
            self.inner.lock().output.insert(handle_id.to_string(), output.into());
        }

        /// Mark a runtime dead, as if the agent process was torn down.
        pub fn kill(&self, handle_id: &str) {
            self.inner.lock().alive.remove(handle_id);
        }

        pub fn fail_next_create(&self) {
            self.inner.lock().fail_create = true;
        }

        pub fn fail_probes(&self, fail: bool) {
            self.inner.lock().fail_probe = fail;
        }

        /// Messages delivered so far, as `(handle_id, text)` pairs.
        pub fn sent(&self) -> Vec<(String, String)> {
            self.inner.lock().sent.clone()
        }

        pub fn created_count(&self) -> usize {
            self.inner.lock().created.len()
        }

        /// Contexts passed to `create`, in order.
        pub fn created(&self) -> Vec<RuntimeContext> {
            self.inner.lock().created.clone()
        }
    }

    #[async_trait]
    impl RuntimeAdapter for FakeRuntimeAdapter {
        async fn create(&self, context: &RuntimeContext) -> Result<RuntimeHandle, RuntimeError> {
            let mut state = self.inner.lock();
            if state.fail_create {
                state.fail_create = false;
                return Err(RuntimeError::CreateFailed("scripted failure".to_string()));
            }
            state.next_ordinal += 1;
            let handle_id = format!("rt-{}", state.next_ordinal);
            state.created.push(context.clone());
            state.alive.insert(handle_id.clone());
            Ok(RuntimeHandle::new(handle_id, "fake"))
        }

        async fn destroy(&self, handle: &RuntimeHandle) -> Result<(), RuntimeError> {
            self.inner.lock().alive.remove(&handle.id);
            Ok(())
        }

        async fn send_message(
            &self,
            handle: &RuntimeHandle,
            text: &str,
        ) -> Result<(), RuntimeError> {
            let mut state = self.inner.lock();
            if !state.alive.contains(&handle.id) {
                return Err(RuntimeError::Gone(handle.id.clone()));
            }
            state.sent.push((handle.id.clone(), text.to_string()));
            Ok(())
        }

        async fn output(
            &self,
            handle: &RuntimeHandle,
            _lines: usize,
        ) -> Result<String, RuntimeError> {
            let state = self.inner.lock();
            if state.fail_probe {
                return Err(RuntimeError::ProbeFailed("scripted probe failure".to_string()));
            }
            Ok(state.output.get(&handle.id).cloned().unwrap_or_default())
        }

        async fn is_alive(&self, handle: &RuntimeHandle) -> Result<bool, RuntimeError> {
            let state = self.inner.lock();
            if state.fail_probe {
                return Err(RuntimeError::ProbeFailed("scripted probe failure".to_string()));
            }
            Ok(state.alive.contains(&handle.id))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRuntimeAdapter;
