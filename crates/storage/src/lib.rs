// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-storage: the on-disk data contract.
//!
//! Flat files only: `key=value` session metadata with atomic rename updates,
//! append-only JSONL event and outcome logs, and JSON plan records. No
//! database, no WAL — correctness rests on single-writer-per-session
//! discipline (enforced by the engine) and atomic renames.

pub mod events;
pub mod metadata;
pub mod outcomes;
pub mod paths;
pub mod plans;

pub use events::{EventFilter, EventStore, DEFAULT_MAX_EVENTS};
pub use metadata::{MetadataStore, SessionRecord};
pub use outcomes::OutcomeStore;
pub use paths::{config_hash, ProjectPaths};
pub use plans::PlanStore;

use std::path::PathBuf;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("data directory {dir} already belongs to config at {existing}")]
    OriginMismatch { dir: PathBuf, existing: String },
    #[error("could not reserve a session id after {0} attempts")]
    IdExhausted(u32),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// All stores for one project directory, opened together.
#[derive(Debug, Clone)]
pub struct ProjectStores {
    pub paths: ProjectPaths,
    pub metadata: MetadataStore,
    pub events: EventStore,
    pub outcomes: OutcomeStore,
    pub plans: PlanStore,
}

impl ProjectStores {
    /// Open (and lay out) the stores for `project_id` under the config's
    /// hashed data root.
    pub fn open(
        data_dir: &std::path::Path,
        config_path: &std::path::Path,
        project_id: &str,
    ) -> Result<Self, StoreError> {
        let paths = ProjectPaths::new(data_dir, config_path, project_id);
        paths.ensure()?;
        Ok(Self {
            metadata: MetadataStore::new(&paths),
            events: EventStore::new(paths.events_file(), DEFAULT_MAX_EVENTS),
            outcomes: OutcomeStore::new(paths.outcomes_file()),
            plans: PlanStore::new(paths.plans_dir()),
            paths,
        })
    }
}
