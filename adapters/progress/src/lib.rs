#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level-completion progress tracking.
//!
//! The runtime records which levels the player has finished plus a lifetime
//! completion counter. The counter only ever grows: re-completing a level
//! changes nothing, and there is no way to un-complete one, so hosts can use
//! it for unlock thresholds without worrying about regressions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store of per-level completion flags and the lifetime completion counter.
pub trait ProgressStore {
    /// Records the named level as completed.
    fn mark_completed(&mut self, level: &str);

    /// Whether the named level has ever been completed.
    fn is_completed(&self, level: &str) -> bool;

    /// How many distinct levels have ever been completed.
    fn total_completed(&self) -> u64;
}

/// In-memory progress store with a JSON document form for persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProgress {
    completed: BTreeSet<String>,
    total: u64,
}

impl MemoryProgress {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes the store to its JSON document form.
    #[must_use]
    pub fn export(&self) -> String {
        serde_json::to_string_pretty(self).expect("progress serialization never fails")
    }

    /// Restores a store from its JSON document form.
    pub fn parse(document: &str) -> Result<Self, ProgressError> {
        Ok(serde_json::from_str(document)?)
    }
}

impl ProgressStore for MemoryProgress {
    fn mark_completed(&mut self, level: &str) {
        if self.completed.insert(level.to_owned()) {
            self.total += 1;
        }
    }

    fn is_completed(&self, level: &str) -> bool {
        self.completed.contains(level)
    }

    fn total_completed(&self) -> u64 {
        self.total
    }
}

/// Errors restoring a persisted progress document.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The document is not valid JSON or has the wrong shape.
    #[error("malformed progress document: {0}")]
    Json(#[from] serde_json::Error),
}
