// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic directory layout keyed by hashed configuration location.
//!
//! Two orchestrators pointing at config files in different directories get
//! disjoint data roots; the `.origin` sentinel catches the remaining case of
//! a hash collision or a copied data directory.

use crate::StoreError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// First 12 hex chars of the SHA-256 of the config file's directory.
pub fn config_hash(config_path: &Path) -> String {
    let dir = config_path.parent().unwrap_or(config_path);
    let digest = Sha256::digest(dir.to_string_lossy().as_bytes());
    let mut out = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Directory layout for one `(config, project)` pair:
///
/// ```text
/// <data-root>/<hash>-<project-id>/
///   .origin
///   sessions/<session-id>
///   sessions/archive/<id>_<ts>
///   events.jsonl
///   outcomes.jsonl
///   plans/<plan-id>.json
///   plans/<plan-id>-output.json
/// ```
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
    origin: String,
}

impl ProjectPaths {
    pub fn new(data_dir: &Path, config_path: &Path, project_id: &str) -> Self {
        let hash = config_hash(config_path);
        let origin =
            config_path.parent().unwrap_or(config_path).to_string_lossy().into_owned();
        Self { root: data_dir.join(format!("{hash}-{project_id}")), origin }
    }

    /// Create the directory tree and write (or verify) the `.origin`
    /// sentinel recording which config directory owns this data root.
    pub fn ensure(&self) -> Result<(), StoreError> {
        for dir in [self.sessions_dir(), self.archive_dir(), self.plans_dir()] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        let origin_file = self.origin_file();
        match fs::read_to_string(&origin_file) {
            Ok(existing) => {
                let existing = existing.trim();
                if existing != self.origin {
                    return Err(StoreError::OriginMismatch {
                        dir: self.root.clone(),
                        existing: existing.to_string(),
                    });
                }
            }
            Err(_) => {
                fs::write(&origin_file, format!("{}\n", self.origin))
                    .map_err(|e| StoreError::io(&origin_file, e))?;
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origin_file(&self) -> PathBuf {
        self.root.join(".origin")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("sessions").join("archive")
    }

    pub fn events_file(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }

    pub fn outcomes_file(&self) -> PathBuf {
        self.root.join("outcomes.jsonl")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root.join("plans")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
