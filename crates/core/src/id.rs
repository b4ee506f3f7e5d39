// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes for sessions and plans.
//!
//! Session ids are caller-visible `{prefix}-{ordinal}` strings issued
//! atomically by the metadata store; plan ids are generated.

crate::string_id! {
    /// Unique identifier for a supervised agent session.
    ///
    /// Issued as `{prefix}-{ordinal}` and unique within
    /// `(configuration-hash, project)`.
    pub struct SessionId;
}

impl SessionId {
    /// Compose a session id from a project prefix and ordinal.
    pub fn from_ordinal(prefix: &str, ordinal: u64) -> Self {
        Self(format!("{}-{}", prefix, ordinal))
    }

    /// The ordinal component, if the id follows `{prefix}-{n}`.
    pub fn ordinal(&self) -> Option<u64> {
        self.0.rsplit_once('-').and_then(|(_, n)| n.parse().ok())
    }
}

crate::string_id! {
    /// Unique identifier for a plan.
    pub struct PlanId;
}

impl PlanId {
    /// Generate a fresh random plan id.
    pub fn generate() -> Self {
        Self(format!("plan-{}", nanoid::nanoid!(10)))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
