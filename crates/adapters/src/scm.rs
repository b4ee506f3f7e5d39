// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SCM slot: pull requests, CI, and review state from the code host.
//!
//! All methods are read-only probes and are called under the engine's probe
//! timeout budget; failures preserve the session's current status.

use async_trait::async_trait;
use fleet_core::{ProjectConfig, Session};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from SCM probes
#[derive(Debug, Error)]
pub enum ScmError {
    #[error("probe failed: {0}")]
    ProbeFailed(String),
    #[error("no such pr: {0}")]
    NotFound(String),
}

/// A pull request reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl PullRequest {
    /// Rebuild a reference from a persisted PR URL. The number is the
    /// trailing path segment on every supported host; 0 when absent.
    pub fn from_url(url: &str) -> Self {
        let number = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|seg| seg.parse().ok())
            .unwrap_or(0);
        Self { number, url: url.to_string(), branch: None }
    }
}

/// Open/merged/closed state of a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// Aggregate CI verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiSummary {
    Passing,
    Failing,
    Pending,
    None,
}

/// Status of one CI check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passing,
    Failing,
    Pending,
}

/// One CI check on a PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiCheck {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Aggregate review verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    Pending,
    None,
}

/// State of one submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

/// One submitted review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub state: ReviewState,
    pub body: String,
    pub submitted_at: String,
}

/// An unresolved review comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingComment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub body: String,
}

/// Whether a PR can merge right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mergeability {
    pub mergeable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Diff-stat summary of a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSummary {
    pub additions: u64,
    pub deletions: u64,
}

/// Adapter for the code host
#[async_trait]
pub trait ScmAdapter: Send + Sync {
    /// Find the PR for a session's branch, if one has been opened.
    async fn detect_pr(
        &self,
        session: &Session,
        project: &ProjectConfig,
    ) -> Result<Option<PullRequest>, ScmError>;

    async fn pr_state(&self, pr: &PullRequest) -> Result<PrState, ScmError>;

    async fn ci_summary(&self, pr: &PullRequest) -> Result<CiSummary, ScmError>;

    async fn ci_checks(&self, pr: &PullRequest) -> Result<Vec<CiCheck>, ScmError>;

    async fn review_decision(&self, pr: &PullRequest) -> Result<ReviewDecision, ScmError>;

    async fn reviews(&self, pr: &PullRequest) -> Result<Vec<Review>, ScmError>;

    async fn pending_comments(&self, pr: &PullRequest) -> Result<Vec<PendingComment>, ScmError>;

    async fn mergeability(&self, pr: &PullRequest) -> Result<Mergeability, ScmError>;

    async fn list_open_prs(&self, project: &ProjectConfig) -> Result<Vec<PullRequest>, ScmError>;

    async fn pr_summary(&self, pr: &PullRequest) -> Result<PrSummary, ScmError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted state for one PR.
    #[derive(Clone)]
    pub struct FakePr {
        pub pr: PullRequest,
        pub state: PrState,
        pub ci: CiSummary,
        pub checks: Vec<CiCheck>,
        pub decision: ReviewDecision,
        pub reviews: Vec<Review>,
        pub comments: Vec<PendingComment>,
        pub mergeable: bool,
        pub summary: PrSummary,
    }

    impl FakePr {
        pub fn open(number: u64) -> Self {
            Self {
                pr: PullRequest {
                    number,
                    url: format!("https://scm.example/pr/{number}"),
                    branch: None,
                },
                state: PrState::Open,
                ci: CiSummary::Pending,
                checks: vec![],
                decision: ReviewDecision::None,
                reviews: vec![],
                comments: vec![],
                mergeable: false,
                summary: PrSummary { additions: 10, deletions: 2 },
            }
        }
    }

    #[derive(Default)]
    struct FakeScmState {
        /// branch → scripted PR
        by_branch: HashMap<String, FakePr>,
        fail_probe: bool,
    }

    /// Scriptable SCM for tests; PRs are keyed by session branch.
    #[derive(Clone, Default)]
    pub struct FakeScmAdapter {
        inner: Arc<Mutex<FakeScmState>>,
    }

    impl FakeScmAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a PR for a branch; later calls replace the script.
        pub fn set_pr(&self, branch: &str, scripted: FakePr) {
            self.inner.lock().by_branch.insert(branch.to_string(), scripted);
        }

        /// Mutate an already-scripted PR in place.
        pub fn update_pr(&self, branch: &str, mutate: impl FnOnce(&mut FakePr)) {
            if let Some(pr) = self.inner.lock().by_branch.get_mut(branch) {
                mutate(pr);
            }
        }

        pub fn fail_probes(&self, fail: bool) {
            self.inner.lock().fail_probe = fail;
        }

        fn find(&self, number: u64) -> Result<FakePr, ScmError> {
            let state = self.inner.lock();
            if state.fail_probe {
                return Err(ScmError::ProbeFailed("scripted probe failure".to_string()));
            }
            state
                .by_branch
                .values()
                .find(|p| p.pr.number == number)
                .cloned()
                .ok_or_else(|| ScmError::NotFound(number.to_string()))
        }
    }

    #[async_trait]
    impl ScmAdapter for FakeScmAdapter {
        async fn detect_pr(
            &self,
            session: &Session,
            _project: &ProjectConfig,
        ) -> Result<Option<PullRequest>, ScmError> {
            let state = self.inner.lock();
            if state.fail_probe {
                return Err(ScmError::ProbeFailed("scripted probe failure".to_string()));
            }
            Ok(state.by_branch.get(&session.branch).map(|p| p.pr.clone()))
        }

        async fn pr_state(&self, pr: &PullRequest) -> Result<PrState, ScmError> {
            Ok(self.find(pr.number)?.state)
        }

        async fn ci_summary(&self, pr: &PullRequest) -> Result<CiSummary, ScmError> {
            Ok(self.find(pr.number)?.ci)
        }

        async fn ci_checks(&self, pr: &PullRequest) -> Result<Vec<CiCheck>, ScmError> {
            Ok(self.find(pr.number)?.checks)
        }

        async fn review_decision(&self, pr: &PullRequest) -> Result<ReviewDecision, ScmError> {
            Ok(self.find(pr.number)?.decision)
        }

        async fn reviews(&self, pr: &PullRequest) -> Result<Vec<Review>, ScmError> {
            Ok(self.find(pr.number)?.reviews)
        }

        async fn pending_comments(
            &self,
            pr: &PullRequest,
        ) -> Result<Vec<PendingComment>, ScmError> {
            Ok(self.find(pr.number)?.comments)
        }

        async fn mergeability(&self, pr: &PullRequest) -> Result<Mergeability, ScmError> {
            let scripted = self.find(pr.number)?;
            Ok(Mergeability { mergeable: scripted.mergeable, reason: None })
        }

        async fn list_open_prs(
            &self,
            _project: &ProjectConfig,
        ) -> Result<Vec<PullRequest>, ScmError> {
            let state = self.inner.lock();
            Ok(state
                .by_branch
                .values()
                .filter(|p| p.state == PrState::Open)
                .map(|p| p.pr.clone())
                .collect())
        }

        async fn pr_summary(&self, pr: &PullRequest) -> Result<PrSummary, ScmError> {
            Ok(self.find(pr.number)?.summary)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePr, FakeScmAdapter};
