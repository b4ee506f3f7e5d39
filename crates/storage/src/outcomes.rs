// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL outcome log. Never pruned — this is the long-term
//! memory that project lessons are mined from.

use crate::StoreError;
use fleet_core::OutcomeRecord;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OutcomeStore {
    path: PathBuf,
}

impl OutcomeStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, record: &OutcomeRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| StoreError::io(&self.path, e))
    }

    /// All outcomes in append order, malformed lines dropped.
    pub fn read_all(&self) -> Vec<OutcomeRecord> {
        let Ok(raw) = fs::read_to_string(&self.path) else { return vec![] };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// The most recent `n` outcomes, newest first.
    pub fn recent(&self, n: usize) -> Vec<OutcomeRecord> {
        let all = self.read_all();
        all.into_iter().rev().take(n).collect()
    }
}

#[cfg(test)]
#[path = "outcomes_tests.rs"]
mod tests;
