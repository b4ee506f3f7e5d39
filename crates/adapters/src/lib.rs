// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-adapters: the plugin contracts the engine consumes.
//!
//! Six slots — runtime, agent, workspace, tracker, scm, notify — each an
//! object-safe async trait. Implementations are registered explicitly by the
//! host at startup; the engine looks them up by `(slot, name)` and skips the
//! dependent code path when a slot is empty.

pub mod agent;
pub mod notify;
pub mod registry;
pub mod runtime;
pub mod scm;
pub mod tracker;
pub mod workspace;

pub use agent::{AgentAdapter, AgentError};
pub use notify::{DesktopNotifyAdapter, NotifyAdapter, NotifyError};
pub use registry::PluginRegistry;
pub use runtime::{RuntimeAdapter, RuntimeContext, RuntimeError};
pub use scm::{
    CiCheck, CiSummary, CheckStatus, Mergeability, PendingComment, PrState, PrSummary,
    PullRequest, Review, ReviewDecision, ReviewState, ScmAdapter, ScmError,
};
pub use tracker::{Issue, IssueRequest, TrackerAdapter, TrackerError};
pub use workspace::{WorkspaceAdapter, WorkspaceError};

#[cfg(any(test, feature = "test-support"))]
pub use agent::FakeAgentAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifyAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use runtime::FakeRuntimeAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use scm::{FakePr, FakeScmAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use tracker::FakeTrackerAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use workspace::FakeWorkspaceAdapter;
