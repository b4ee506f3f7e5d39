// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace slot: isolated checkouts (git worktrees) for each session.

use async_trait::async_trait;
use fleet_core::{ProjectConfig, SessionId};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("create failed: {0}")]
    CreateFailed(String),
    #[error("destroy failed: {0}")]
    DestroyFailed(String),
}

/// Adapter for session workspaces
#[async_trait]
pub trait WorkspaceAdapter: Send + Sync {
    /// Create an isolated workspace for a session on its branch.
    async fn create(
        &self,
        session_id: &SessionId,
        branch: &str,
        project: &ProjectConfig,
    ) -> Result<PathBuf, WorkspaceError>;

    /// Remove a workspace. Idempotent.
    async fn destroy(&self, path: &Path) -> Result<(), WorkspaceError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{WorkspaceAdapter, WorkspaceError};
    use async_trait::async_trait;
    use fleet_core::{ProjectConfig, SessionId};
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeWorkspaceState {
        created: Vec<PathBuf>,
        destroyed: Vec<PathBuf>,
        fail_create: bool,
    }

    /// In-memory workspace adapter; paths are never touched on disk.
    #[derive(Clone, Default)]
    pub struct FakeWorkspaceAdapter {
        inner: Arc<Mutex<FakeWorkspaceState>>,
    }

    impl FakeWorkspaceAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next_create(&self) {
            self.inner.lock().fail_create = true;
        }

        pub fn created(&self) -> Vec<PathBuf> {
            self.inner.lock().created.clone()
        }

        pub fn destroyed(&self) -> Vec<PathBuf> {
            self.inner.lock().destroyed.clone()
        }
    }

    #[async_trait]
    impl WorkspaceAdapter for FakeWorkspaceAdapter {
        async fn create(
            &self,
            session_id: &SessionId,
            _branch: &str,
            project: &ProjectConfig,
        ) -> Result<PathBuf, WorkspaceError> {
            let mut state = self.inner.lock();
            if state.fail_create {
                state.fail_create = false;
                return Err(WorkspaceError::CreateFailed("scripted failure".to_string()));
            }
            let path = project.path.join(".worktrees").join(session_id.as_str());
            state.created.push(path.clone());
            Ok(path)
        }

        async fn destroy(&self, path: &Path) -> Result<(), WorkspaceError> {
            self.inner.lock().destroyed.push(path.to_path_buf());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeWorkspaceAdapter;
