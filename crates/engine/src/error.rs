// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors surfaced by engine entry points.
//!
//! The polling cycle itself is best-effort and never propagates these;
//! interactive callers (spawn, send, kill, plan operations) get them raw.

use fleet_core::{PlanId, SessionId};
use fleet_storage::StoreError;
use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("issue {issue} unreachable: {reason}")]
    IssueUnreachable { issue: String, reason: String },
    #[error("could not reserve a session id: {0}")]
    IdCollision(String),
    #[error("workspace create failed: {0}")]
    WorkspaceCreateFailed(String),
    #[error("runtime create failed: {0}")]
    RuntimeCreateFailed(String),
    #[error("session {0} has no runtime")]
    NoRuntime(SessionId),
    #[error("send to {0} timed out")]
    SendTimeout(SessionId),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from plan operations.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan not found: {0}")]
    NotFound(PlanId),
    #[error("plan {id} is {status}, expected {expected}")]
    Validation { id: PlanId, status: String, expected: String },
    #[error("invalid task graph: {0}")]
    Graph(#[from] fleet_core::PlanGraphError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from lifecycle entry points.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
