// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan and task entities.
//!
//! A plan breaks a feature into a DAG of tasks. Tasks become tracker issues
//! on approval and coding sessions once their dependencies have merged.

use crate::id::{PlanId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Planning agent is running
    Planning,
    /// Planning output parsed and validated, awaiting approval
    Ready,
    /// Approved, issue creation in progress
    Approved,
    /// Tasks are being executed
    Executing,
    /// Every task with a session reached a terminal status
    Done,
    /// Planning agent exited without producing output
    Failed,
}

crate::simple_display! {
    PlanStatus {
        Planning => "planning",
        Ready => "ready",
        Approved => "approved",
        Executing => "executing",
        Done => "done",
        Failed => "failed",
    }
}

/// Expected size of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskScope {
    Small,
    Medium,
}

/// One unit of plan work, eventually bound to an issue and a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    pub scope: TaskScope,
    /// Ids of tasks that must merge before this one spawns.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub affected_files: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Error captured when issue creation failed during approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_error: Option<String>,
}

/// The planning-agent drop-box format (`plans/<id>-output.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutput {
    pub tasks: Vec<Task>,
}

/// A feature broken into tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub project: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_session: Option<SessionId>,
    pub created_at_ms: u64,
}

impl Plan {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Validate the task dependency graph: every referenced id must exist
    /// and the graph must be acyclic.
    pub fn validate_dependencies(&self) -> Result<(), PlanGraphError> {
        validate_dependencies(&self.tasks)
    }
}

/// Dependency graph validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanGraphError {
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },
    #[error("dependency cycle involving task {0}")]
    Cycle(String),
}

/// Check a task list for unknown dependencies and cycles (three-color DFS).
pub fn validate_dependencies(tasks: &[Task]) -> Result<(), PlanGraphError> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    for task in tasks {
        for dep in &task.dependencies {
            if !by_id.contains_key(dep.as_str()) {
                return Err(PlanGraphError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Gray,
        Black,
    }

    fn visit(
        id: &str,
        by_id: &HashMap<&str, &Task>,
        marks: &mut HashMap<String, Mark>,
    ) -> Result<(), PlanGraphError> {
        match marks.get(id).copied().unwrap_or(Mark::White) {
            Mark::Gray => return Err(PlanGraphError::Cycle(id.to_string())),
            Mark::Black => return Ok(()),
            Mark::White => {}
        }
        marks.insert(id.to_string(), Mark::Gray);
        if let Some(task) = by_id.get(id) {
            for dep in &task.dependencies {
                visit(dep, by_id, marks)?;
            }
        }
        marks.insert(id.to_string(), Mark::Black);
        Ok(())
    }

    let mut marks = HashMap::new();
    for task in tasks {
        visit(&task.id, &by_id, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
