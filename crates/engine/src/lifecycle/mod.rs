// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle manager: the polling loop at the center of the orchestrator.
//!
//! Every interval, each non-terminal session is re-classified by a strict
//! probe pipeline; transitions are persisted, recorded as events, and fed to
//! the reaction dispatcher, which retries automated handling and escalates
//! to humans when retries or time run out. Cross-session triggers (plan
//! spawning, sibling rebases, outcome capture, retrospectives) also hang off
//! transitions here.
//!
//! The cycle is best-effort: any single session's probes may fail without
//! taking the cycle down, and the loop itself never dies.

mod classify;
mod reaction;
mod transition;

use crate::outcome::OutcomeService;
use crate::plan::PlanService;
use crate::router::NotificationRouter;
use crate::session::SessionManager;
use async_trait::async_trait;
use fleet_adapters::PluginRegistry;
use fleet_core::{
    Clock, EventKind, OrchestratorConfig, OrchestratorEvent, PlanId, ProjectConfig, Session,
    SessionId, SessionStatus,
};
use fleet_storage::ProjectStores;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use reaction::ReactionTracker;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// `(project, session)` — session ids are only unique per project.
pub(crate) type SessionKey = (String, SessionId);

/// Host hook for the `spawn-reconciliation` reaction. The reconciliation
/// workflow itself lives outside the engine.
#[async_trait]
pub trait ReconciliationHook: Send + Sync {
    async fn spawn_reconciliation(&self, project: &str, plan_id: &PlanId);
}

pub struct LifecycleManager<C: Clock> {
    inner: Arc<Inner<C>>,
}

pub(crate) struct Inner<C: Clock> {
    pub(crate) config: Arc<OrchestratorConfig>,
    pub(crate) sessions: Arc<SessionManager<C>>,
    pub(crate) plans: Arc<PlanService<C>>,
    pub(crate) router: NotificationRouter,
    pub(crate) outcomes: OutcomeService<C>,
    pub(crate) clock: C,
    /// In-memory status cache; the "old" side of transition detection.
    pub(crate) tracked: Mutex<HashMap<SessionKey, SessionStatus>>,
    /// Attempt counters per `(session, reaction-key)`.
    pub(crate) reactions: Mutex<HashMap<(SessionKey, String), ReactionTracker>>,
    /// Projects that already got a `summary.all_complete` for the current
    /// quiescence.
    quiesced: Mutex<HashSet<String>>,
    /// Re-entrancy guard: at most one cycle in flight; `check()` serializes
    /// against it.
    cycle_lock: tokio::sync::Mutex<()>,
    pub(crate) cancel: CancellationToken,
    pub(crate) reconciliation: Option<Arc<dyn ReconciliationHook>>,
}

impl<C: Clock> LifecycleManager<C> {
    pub fn new(
        config: Arc<OrchestratorConfig>,
        registry: Arc<PluginRegistry>,
        sessions: Arc<SessionManager<C>>,
        plans: Arc<PlanService<C>>,
        clock: C,
    ) -> Self {
        let router =
            NotificationRouter::new(registry, config.notification_routing.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                sessions,
                plans,
                router,
                outcomes: OutcomeService::new(clock.clone()),
                clock,
                tracked: Mutex::new(HashMap::new()),
                reactions: Mutex::new(HashMap::new()),
                quiesced: Mutex::new(HashSet::new()),
                cycle_lock: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                reconciliation: None,
            }),
        }
    }

    /// Attach the host's reconciliation hook. Must be called before `start`.
    pub fn with_reconciliation(mut self, hook: Arc<dyn ReconciliationHook>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.reconciliation = Some(hook),
            None => tracing::warn!("reconciliation hook ignored: manager already shared"),
        }
        self
    }

    /// Start the background polling loop. The returned handle resolves after
    /// `stop()` once any in-flight cycle has finished.
    pub fn start(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Re-entrancy guard: a tick during a running cycle
                        // is skipped, not queued.
                        match inner.cycle_lock.try_lock() {
                            Ok(_guard) => inner.cycle().await,
                            Err(_) => {
                                tracing::debug!("poll tick skipped: cycle in flight");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Stop the loop. In-flight work finishes naturally; reactions observe
    /// cancellation before side effects.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Run one full poll cycle now (skipped if one is already in flight).
    pub async fn run_cycle(&self) {
        match self.inner.cycle_lock.try_lock() {
            Ok(_guard) => self.inner.cycle().await,
            Err(_) => tracing::debug!("run_cycle skipped: cycle in flight"),
        }
    }

    /// Push-based revalidation of one session (after a kill or send). A
    /// no-op for terminal sessions; serialized against the polling cycle.
    pub async fn check(&self, project_key: &str, id: &SessionId) {
        let _guard = self.inner.cycle_lock.lock().await;
        let Some(project) = self.inner.config.project(project_key) else { return };
        let Ok(stores) = self.inner.sessions.stores(project_key) else { return };
        let Some(record) = stores.metadata.read(id.as_str()) else { return };
        let session = record.to_session(id);

        let key = (project_key.to_string(), id.clone());
        let old = self.inner.old_status(&key, &session);
        if old.is_terminal() {
            return;
        }
        self.inner
            .check_session(project_key, &project.clone(), &stores, session, old)
            .await;
    }

    /// Attempt counters for one session, keyed by reaction key (test and
    /// dashboard surface).
    pub fn reaction_attempts(&self, project_key: &str, id: &SessionId) -> HashMap<String, u32> {
        let key = (project_key.to_string(), id.clone());
        self.inner
            .reactions
            .lock()
            .iter()
            .filter(|((session, _), _)| *session == key)
            .map(|((_, rkey), tracker)| (rkey.clone(), tracker.attempts))
            .collect()
    }
}

impl<C: Clock> Inner<C> {
    /// The "old" status for transition detection: the in-memory cache when
    /// known, else the metadata-persisted status. Never a derivation from
    /// `list()`.
    fn old_status(&self, key: &SessionKey, session: &Session) -> SessionStatus {
        self.tracked.lock().get(key).copied().unwrap_or(session.status)
    }

    async fn cycle(self: &Arc<Self>) {
        let project_keys: Vec<String> = self.config.projects.keys().cloned().collect();
        let mut live: HashSet<SessionKey> = HashSet::new();

        for project_key in project_keys {
            let Some(project) = self.config.project(&project_key).cloned() else { continue };
            let stores = match self.sessions.stores(&project_key) {
                Ok(stores) => stores,
                Err(e) => {
                    tracing::warn!(project = %project_key, error = %e, "stores unavailable");
                    continue;
                }
            };

            if let Err(e) = self.plans.poll_planning(&project_key).await {
                tracing::warn!(project = %project_key, error = %e, "planning poll failed");
            }

            let sessions = match self.sessions.list(&project_key).await {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!(project = %project_key, error = %e, "session list failed");
                    continue;
                }
            };
            for session in &sessions {
                live.insert((project_key.clone(), session.id.clone()));
            }

            // Fan out; failures stay per-session.
            let mut set: JoinSet<()> = JoinSet::new();
            for session in sessions {
                let key = (project_key.clone(), session.id.clone());
                let old = self.old_status(&key, &session);
                if old.is_terminal() {
                    continue;
                }
                let inner = Arc::clone(self);
                let project_key = project_key.clone();
                let project = project.clone();
                let stores = stores.clone();
                set.spawn(async move {
                    inner.check_session(&project_key, &project, &stores, session, old).await;
                });
            }
            while let Some(result) = set.join_next().await {
                if let Err(e) = result {
                    tracing::warn!(project = %project_key, error = %e, "session check panicked");
                }
            }

            self.maybe_emit_all_complete(&project_key, &stores).await;
        }

        self.prune(&live);
    }

    async fn check_session(
        self: &Arc<Self>,
        project_key: &str,
        project: &ProjectConfig,
        stores: &ProjectStores,
        mut session: Session,
        old: SessionStatus,
    ) {
        let new = classify::classify(self, project, stores, &mut session, old).await;
        let key = (project_key.to_string(), session.id.clone());
        self.tracked.lock().insert(key, new);

        if new != old {
            session.status = new;
            transition::handle_transition(self, project_key, project, stores, &session, old, new)
                .await;
        } else if !new.is_terminal() {
            transition::redispatch_persistent(self, project_key, project, stores, &session, new)
                .await;
        }
    }

    /// Emit `summary.all_complete` once when a non-empty session set has no
    /// non-terminal member left; re-arm as soon as one reappears.
    async fn maybe_emit_all_complete(&self, project_key: &str, stores: &ProjectStores) {
        let ids = stores.metadata.list_ids();
        if ids.is_empty() {
            return;
        }
        let all_terminal = ids.iter().all(|id| {
            stores
                .metadata
                .read(id.as_str())
                .and_then(|r| r.status())
                .map(|s| s.is_terminal())
                .unwrap_or(false)
        });

        if !all_terminal {
            self.quiesced.lock().remove(project_key);
            return;
        }
        if !self.quiesced.lock().insert(project_key.to_string()) {
            return;
        }

        let event = OrchestratorEvent::new(
            EventKind::SummaryAllComplete,
            project_key,
            None,
            format!("all {} sessions complete", ids.len()),
            self.clock.epoch_ms(),
        );
        if let Err(e) = stores.events.append(&event) {
            tracing::warn!(project = %project_key, error = %e, "could not record summary event");
        }
        self.router.notify(&event).await;
    }

    /// GC in-memory state for sessions that no longer exist. This is the
    /// only cleanup path for killed/archived sessions.
    fn prune(&self, live: &HashSet<SessionKey>) {
        self.tracked.lock().retain(|key, _| live.contains(key));
        self.reactions.lock().retain(|(key, _), _| live.contains(key));
    }

    pub(crate) fn append_event(&self, stores: &ProjectStores, event: &OrchestratorEvent) {
        if let Err(e) = stores.events.append(event) {
            tracing::warn!(kind = %event.kind, error = %e, "could not record event");
        }
    }
}

/// Run a read-only plugin probe under the probe budget. Timeouts and errors
/// both collapse to `Err(())`; callers decide what "preserve" means.
pub(crate) async fn probe<T, E: std::fmt::Display>(
    future: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, ()> {
    match tokio::time::timeout(crate::session::PROBE_TIMEOUT, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "probe failed");
            Err(())
        }
        Err(_) => {
            tracing::debug!("probe timed out");
            Err(())
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
