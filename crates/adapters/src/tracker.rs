// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker slot: the issue tracker sessions are bound to.

use async_trait::async_trait;
use fleet_core::ProjectConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("issue not found: {0}")]
    NotFound(String),
    #[error("tracker unreachable: {0}")]
    Unreachable(String),
}

/// A tracked issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Request to create an issue (used during plan approval).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Adapter for issue trackers
#[async_trait]
pub trait TrackerAdapter: Send + Sync {
    async fn issue(&self, id: &str, project: &ProjectConfig) -> Result<Issue, TrackerError>;

    async fn create_issue(
        &self,
        request: &IssueRequest,
        project: &ProjectConfig,
    ) -> Result<Issue, TrackerError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Issue, IssueRequest, TrackerAdapter, TrackerError};
    use async_trait::async_trait;
    use fleet_core::ProjectConfig;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeTrackerState {
        issues: HashMap<String, Issue>,
        created: Vec<IssueRequest>,
        next_number: u64,
        fail: bool,
        fail_titles: Vec<String>,
    }

    /// In-memory tracker for tests.
    #[derive(Clone, Default)]
    pub struct FakeTrackerAdapter {
        inner: Arc<Mutex<FakeTrackerState>>,
    }

    impl FakeTrackerAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_issue(&self, id: &str, issue: Issue) {
            self.inner.lock().issues.insert(id.to_string(), issue);
        }

        pub fn fail_all(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }

        /// Fail creation only for requests with this exact title.
        pub fn fail_title(&self, title: &str) {
            self.inner.lock().fail_titles.push(title.to_string());
        }

        pub fn created(&self) -> Vec<IssueRequest> {
            self.inner.lock().created.clone()
        }
    }

    #[async_trait]
    impl TrackerAdapter for FakeTrackerAdapter {
        async fn issue(&self, id: &str, _project: &ProjectConfig) -> Result<Issue, TrackerError> {
            let state = self.inner.lock();
            if state.fail {
                return Err(TrackerError::Unreachable("scripted failure".to_string()));
            }
            state.issues.get(id).cloned().ok_or_else(|| TrackerError::NotFound(id.to_string()))
        }

        async fn create_issue(
            &self,
            request: &IssueRequest,
            _project: &ProjectConfig,
        ) -> Result<Issue, TrackerError> {
            let mut state = self.inner.lock();
            if state.fail || state.fail_titles.contains(&request.title) {
                return Err(TrackerError::Unreachable("scripted failure".to_string()));
            }
            state.next_number += 1;
            let number = state.next_number;
            state.created.push(request.clone());
            let issue = Issue {
                number,
                url: format!("https://tracker.example/issues/{number}"),
                title: request.title.clone(),
                body: Some(request.body.clone()),
            };
            // Created issues resolve by number afterwards, like a real tracker.
            state.issues.insert(number.to_string(), issue.clone());
            Ok(issue)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTrackerAdapter;
