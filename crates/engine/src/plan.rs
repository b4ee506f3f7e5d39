// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan service: parallel-task DAG execution.
//!
//! A planning agent runs on a disposable `plan/<id>` branch and drops its
//! task list into `plans/<id>-output.json`. On approval, tasks become
//! tracker issues and dependency-free tasks spawn immediately; the rest wait
//! until every dependency's session has merged (the lifecycle manager calls
//! [`PlanService::spawn_ready_tasks`] on each merge).

use crate::error::PlanError;
use crate::lessons::{ProjectLessons, DEFAULT_LESSON_WINDOW};
use crate::session::{SessionManager, SpawnRequest, PROBE_TIMEOUT};
use fleet_adapters::IssueRequest;
use fleet_core::{
    Clock, EventKind, OrchestratorEvent, Plan, PlanId, PlanStatus, ProjectConfig, Session,
    SessionId, SessionStatus, Task,
};
use fleet_storage::ProjectStores;
use std::sync::Arc;

/// How much of a project's CLAUDE.md is inlined into task prompts.
const CLAUDE_MD_EXCERPT_CHARS: usize = 1500;

pub struct PlanService<C: Clock> {
    sessions: Arc<SessionManager<C>>,
}

impl<C: Clock> PlanService<C> {
    pub fn new(sessions: Arc<SessionManager<C>>) -> Self {
        Self { sessions }
    }

    fn now(&self) -> u64 {
        self.sessions.clock().epoch_ms()
    }

    fn append_event(&self, stores: &ProjectStores, event: &OrchestratorEvent) {
        if let Err(e) = stores.events.append(event) {
            tracing::warn!(kind = %event.kind, error = %e, "could not record plan event");
        }
    }

    // ── Creation ──────────────────────────────────────────────────────────

    /// Spawn a planning agent on a disposable branch and record the plan.
    pub async fn create_plan(
        &self,
        project_key: &str,
        feature_prompt: &str,
    ) -> Result<Plan, PlanError> {
        let stores = self.sessions.stores(project_key)?;
        let plan_id = PlanId::generate();

        let mut request = SpawnRequest::new(project_key, feature_prompt);
        request.branch = Some(format!("plan/{plan_id}"));
        request.plan_id = Some(plan_id.clone());
        request.extra.insert("planRole".to_string(), "planning".to_string());
        let session = self.sessions.spawn(request).await?;

        let plan = Plan {
            id: plan_id.clone(),
            project: project_key.to_string(),
            status: PlanStatus::Planning,
            tasks: vec![],
            planning_session: Some(session.id.clone()),
            created_at_ms: self.now(),
        };
        stores.plans.write(&plan)?;

        self.append_event(
            &stores,
            &OrchestratorEvent::new(
                EventKind::PlanCreated,
                project_key,
                Some(session.id),
                format!("plan {plan_id} created"),
                self.now(),
            ),
        );
        Ok(plan)
    }

    // ── Planning progress ─────────────────────────────────────────────────

    /// Advance `planning` plans: output drop-box appeared ⇒ `ready`;
    /// planning session died without output ⇒ `failed`. Called every poll
    /// cycle.
    pub async fn poll_planning(&self, project_key: &str) -> Result<(), PlanError> {
        let stores = self.sessions.stores(project_key)?;
        for mut plan in stores.plans.list() {
            if plan.status != PlanStatus::Planning {
                continue;
            }

            if let Some(output) = stores.plans.read_output(plan.id.as_str()) {
                plan.tasks = output.tasks;
                if let Err(e) = fleet_core::plan::validate_dependencies(&plan.tasks) {
                    tracing::warn!(plan_id = %plan.id, error = %e, "plan output rejected");
                    plan.status = PlanStatus::Failed;
                    stores.plans.write(&plan)?;
                    self.append_event(
                        &stores,
                        &OrchestratorEvent::new(
                            EventKind::PlanFailed,
                            project_key,
                            plan.planning_session.clone(),
                            format!("plan {} output invalid: {e}", plan.id),
                            self.now(),
                        ),
                    );
                    continue;
                }
                plan.status = PlanStatus::Ready;
                stores.plans.write(&plan)?;
                self.append_event(
                    &stores,
                    &OrchestratorEvent::new(
                        EventKind::PlanReady,
                        project_key,
                        plan.planning_session.clone(),
                        format!("plan {} ready with {} tasks", plan.id, plan.tasks.len()),
                        self.now(),
                    ),
                );
                continue;
            }

            // No output yet: a dead planning session means the plan failed.
            let planner_dead = match &plan.planning_session {
                Some(sid) => match stores.metadata.read(sid.as_str()) {
                    Some(record) => {
                        record.status().map(|s| s.is_terminal()).unwrap_or(false)
                    }
                    None => true,
                },
                None => true,
            };
            if planner_dead {
                plan.status = PlanStatus::Failed;
                stores.plans.write(&plan)?;
                self.append_event(
                    &stores,
                    &OrchestratorEvent::new(
                        EventKind::PlanFailed,
                        project_key,
                        plan.planning_session.clone(),
                        format!("plan {} failed: planner exited without output", plan.id),
                        self.now(),
                    ),
                );
            }
        }
        Ok(())
    }

    // ── Editing & approval ────────────────────────────────────────────────

    pub fn get(&self, project_key: &str, plan_id: &PlanId) -> Result<Plan, PlanError> {
        let stores = self.sessions.stores(project_key)?;
        stores.plans.read(plan_id.as_str()).ok_or_else(|| PlanError::NotFound(plan_id.clone()))
    }

    fn expect_status(plan: &Plan, expected: PlanStatus) -> Result<(), PlanError> {
        if plan.status != expected {
            return Err(PlanError::Validation {
                id: plan.id.clone(),
                status: plan.status.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    /// Replace the task list of a `ready` plan (human edits before approval).
    pub fn update_tasks(
        &self,
        project_key: &str,
        plan_id: &PlanId,
        tasks: Vec<Task>,
    ) -> Result<Plan, PlanError> {
        let stores = self.sessions.stores(project_key)?;
        let mut plan = self.get(project_key, plan_id)?;
        Self::expect_status(&plan, PlanStatus::Ready)?;
        fleet_core::plan::validate_dependencies(&tasks)?;
        plan.tasks = tasks;
        stores.plans.write(&plan)?;
        Ok(plan)
    }

    /// Approve a `ready` plan: create tracker issues (continuing on per-task
    /// failure), move to `executing`, and spawn every dependency-free task.
    pub async fn approve_plan(
        &self,
        project_key: &str,
        plan_id: &PlanId,
    ) -> Result<Plan, PlanError> {
        let project = self.sessions.project(project_key)?.clone();
        let stores = self.sessions.stores(project_key)?;
        let mut plan = self.get(project_key, plan_id)?;
        Self::expect_status(&plan, PlanStatus::Ready)?;

        plan.status = PlanStatus::Approved;
        stores.plans.write(&plan)?;
        self.append_event(
            &stores,
            &OrchestratorEvent::new(
                EventKind::PlanApproved,
                project_key,
                None,
                format!("plan {plan_id} approved"),
                self.now(),
            ),
        );

        if let Some(tracker) = self.sessions.tracker_for(&project) {
            for task in &mut plan.tasks {
                let request = IssueRequest {
                    title: task.title.clone(),
                    body: issue_body(task),
                    labels: vec!["fleet".to_string()],
                };
                match tracker.create_issue(&request, &project).await {
                    Ok(issue) => {
                        task.issue_number = Some(issue.number);
                        task.issue_url = Some(issue.url);
                    }
                    Err(e) => {
                        tracing::warn!(
                            plan_id = %plan_id,
                            task = %task.id,
                            error = %e,
                            "issue creation failed, continuing"
                        );
                        task.issue_error = Some(e.to_string());
                    }
                }
            }
        }

        plan.status = PlanStatus::Executing;
        stores.plans.write(&plan)?;

        let ready: Vec<String> = plan
            .tasks
            .iter()
            .filter(|t| t.dependencies.is_empty())
            .map(|t| t.id.clone())
            .collect();
        for task_id in ready {
            if let Err(e) =
                self.spawn_task(&project, &stores, &mut plan, &task_id, &[], &[]).await
            {
                tracing::warn!(plan_id = %plan_id, task = %task_id, error = %e, "task spawn failed");
            }
        }
        stores.plans.write(&plan)?;
        Ok(plan)
    }

    // ── Dependency-gated spawning ─────────────────────────────────────────

    /// Spawn every pending task whose dependencies have all merged.
    /// Invoked by the lifecycle manager when a plan member merges.
    pub async fn spawn_ready_tasks(
        &self,
        project_key: &str,
        plan_id: &PlanId,
    ) -> Result<Vec<SessionId>, PlanError> {
        let project = self.sessions.project(project_key)?.clone();
        let stores = self.sessions.stores(project_key)?;
        let mut plan = self.get(project_key, plan_id)?;
        if plan.status != PlanStatus::Executing {
            return Ok(vec![]);
        }

        let ready: Vec<String> = plan
            .tasks
            .iter()
            .filter(|t| t.session_id.is_none())
            .filter(|t| {
                t.dependencies.iter().all(|dep| {
                    plan.task(dep)
                        .and_then(|d| d.session_id.as_ref())
                        .map(|sid| self.session_status(&stores, sid) == Some(SessionStatus::Merged))
                        .unwrap_or(false)
                })
            })
            .map(|t| t.id.clone())
            .collect();

        let siblings = self.sibling_context(&stores, &plan);
        let mut spawned = Vec::new();
        for task_id in ready {
            let diffs = self.dependency_diffs(&stores, &plan, &task_id).await;
            match self.spawn_task(&project, &stores, &mut plan, &task_id, &siblings, &diffs).await
            {
                Ok(sid) => spawned.push(sid),
                Err(e) => {
                    tracing::warn!(plan_id = %plan_id, task = %task_id, error = %e, "task spawn failed");
                }
            }
        }
        stores.plans.write(&plan)?;
        Ok(spawned)
    }

    /// True when every task that has a session has reached a terminal
    /// status. Sessionless tasks neither complete nor block (issue creation
    /// may have failed for them).
    pub fn check_plan_completion(
        &self,
        project_key: &str,
        plan_id: &PlanId,
    ) -> Result<bool, PlanError> {
        let stores = self.sessions.stores(project_key)?;
        let mut plan = self.get(project_key, plan_id)?;
        if plan.status == PlanStatus::Done {
            return Ok(true);
        }
        if plan.status != PlanStatus::Executing {
            return Ok(false);
        }

        let complete = plan
            .tasks
            .iter()
            .filter_map(|t| t.session_id.as_ref())
            .all(|sid| {
                self.session_status(&stores, sid).map(|s| s.is_terminal()).unwrap_or(true)
            });
        if complete {
            plan.status = PlanStatus::Done;
            stores.plans.write(&plan)?;
            self.append_event(
                &stores,
                &OrchestratorEvent::new(
                    EventKind::PlanCompleted,
                    project_key,
                    None,
                    format!("plan {plan_id} complete"),
                    self.now(),
                ),
            );
        }
        Ok(complete)
    }

    /// Active (non-terminal) sessions of a plan, excluding `skip`.
    pub fn active_siblings(
        &self,
        project_key: &str,
        plan: &Plan,
        skip: &SessionId,
    ) -> Result<Vec<Session>, PlanError> {
        let stores = self.sessions.stores(project_key)?;
        Ok(plan
            .tasks
            .iter()
            .filter_map(|t| t.session_id.as_ref())
            .filter(|sid| *sid != skip)
            .filter_map(|sid| {
                stores.metadata.read(sid.as_str()).map(|r| r.to_session(sid))
            })
            .filter(|s| !s.is_terminal())
            .collect())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn session_status(&self, stores: &ProjectStores, sid: &SessionId) -> Option<SessionStatus> {
        match stores.metadata.read(sid.as_str()) {
            Some(record) => record.status(),
            None => stores.metadata.read_archived(sid.as_str()).and_then(|r| r.status()),
        }
    }

    fn sibling_context(&self, stores: &ProjectStores, plan: &Plan) -> Vec<String> {
        plan.tasks
            .iter()
            .filter_map(|t| {
                let sid = t.session_id.as_ref()?;
                let status = self.session_status(stores, sid)?;
                if status.is_terminal() {
                    return None;
                }
                Some(format!("{sid}: {} ({status})", t.title))
            })
            .collect()
    }

    /// Diff stats of the merged dependencies' PRs, for the task's prompt.
    async fn dependency_diffs(
        &self,
        stores: &ProjectStores,
        plan: &Plan,
        task_id: &str,
    ) -> Vec<String> {
        let Some(task) = plan.task(task_id) else { return vec![] };
        let Ok(project) = self.sessions.project(&plan.project) else { return vec![] };
        let Some(scm) = self.sessions.scm_for(project) else { return vec![] };

        let mut diffs = Vec::new();
        for dep_id in &task.dependencies {
            let Some(dep) = plan.task(dep_id) else { continue };
            let Some(sid) = &dep.session_id else { continue };
            let Some(record) = stores
                .metadata
                .read(sid.as_str())
                .or_else(|| stores.metadata.read_archived(sid.as_str()))
            else {
                continue;
            };
            let Some(pr_url) = record.pr() else { continue };
            let pr = fleet_adapters::PullRequest::from_url(pr_url);
            match tokio::time::timeout(PROBE_TIMEOUT, scm.pr_summary(&pr)).await {
                Ok(Ok(summary)) => diffs.push(format!(
                    "{} (PR #{}): +{}/-{}",
                    dep.title, pr.number, summary.additions, summary.deletions
                )),
                _ => diffs.push(format!("{} (PR #{})", dep.title, pr.number)),
            }
        }
        diffs
    }

    async fn spawn_task(
        &self,
        project: &ProjectConfig,
        stores: &ProjectStores,
        plan: &mut Plan,
        task_id: &str,
        sibling_context: &[String],
        dependency_diffs: &[String],
    ) -> Result<SessionId, PlanError> {
        let Some(task) = plan.task(task_id).cloned() else {
            return Err(PlanError::NotFound(plan.id.clone()));
        };

        let lessons = ProjectLessons::gather(&stores.outcomes.recent(DEFAULT_LESSON_WINDOW));
        let prompt = task_prompt(project, &task, &lessons, sibling_context, dependency_diffs);

        let mut request = SpawnRequest::new(&plan.project, prompt);
        request.issue = task.issue_number.map(|n| n.to_string());
        request.plan_id = Some(plan.id.clone());
        request.extra.insert("taskId".to_string(), task.id.clone());
        let session = self.sessions.spawn(request).await?;

        if let Some(task) = plan.task_mut(task_id) {
            task.session_id = Some(session.id.clone());
        }
        self.append_event(
            stores,
            &OrchestratorEvent::new(
                EventKind::PlanTaskSpawned,
                &plan.project,
                Some(session.id.clone()),
                format!("task {} of plan {} spawned as {}", task.id, plan.id, session.id),
                self.now(),
            ),
        );
        Ok(session.id)
    }
}

fn issue_body(task: &Task) -> String {
    let mut body = task.description.clone();
    if !task.acceptance_criteria.is_empty() {
        body.push_str("\n\n## Acceptance criteria\n");
        for criterion in &task.acceptance_criteria {
            body.push_str(&format!("- {criterion}\n"));
        }
    }
    body
}

/// Compose a coding-task prompt: the task itself, then project lessons, a
/// CLAUDE.md excerpt, sibling context and dependency diffs when present.
fn task_prompt(
    project: &ProjectConfig,
    task: &Task,
    lessons: &ProjectLessons,
    sibling_context: &[String],
    dependency_diffs: &[String],
) -> String {
    let mut prompt = format!("# Task: {}\n\n{}\n", task.title, task.description);
    if !task.acceptance_criteria.is_empty() {
        prompt.push_str("\n## Acceptance criteria\n");
        for criterion in &task.acceptance_criteria {
            prompt.push_str(&format!("- {criterion}\n"));
        }
    }
    if !task.constraints.is_empty() {
        prompt.push_str("\n## Constraints\n");
        for constraint in &task.constraints {
            prompt.push_str(&format!("- {constraint}\n"));
        }
    }
    if !task.affected_files.is_empty() {
        prompt.push_str("\n## Likely affected files\n");
        for file in &task.affected_files {
            prompt.push_str(&format!("- {file}\n"));
        }
    }
    if let Some(context) = &task.shared_context {
        prompt.push_str(&format!("\n## Shared context\n{context}\n"));
    }
    if let Some(rendered) = lessons.render() {
        prompt.push('\n');
        prompt.push_str(&rendered);
    }
    if let Some(excerpt) = claude_md_excerpt(project) {
        prompt.push_str("\n## Project notes\n");
        prompt.push_str(&excerpt);
        prompt.push('\n');
    }
    if !sibling_context.is_empty() {
        prompt.push_str("\n## Sibling sessions\n");
        for sibling in sibling_context {
            prompt.push_str(&format!("- {sibling}\n"));
        }
    }
    if !dependency_diffs.is_empty() {
        prompt.push_str("\n## Merged dependencies\n");
        for diff in dependency_diffs {
            prompt.push_str(&format!("- {diff}\n"));
        }
    }
    prompt
}

fn claude_md_excerpt(project: &ProjectConfig) -> Option<String> {
    let raw = std::fs::read_to_string(project.path.join("CLAUDE.md")).ok()?;
    let mut excerpt: String = raw.chars().take(CLAUDE_MD_EXCERPT_CHARS).collect();
    if excerpt.len() < raw.len() {
        excerpt.push_str("\n…");
    }
    Some(excerpt)
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
