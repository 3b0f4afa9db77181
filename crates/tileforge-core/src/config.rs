//! Engine and scheduler configuration.
//!
//! Both structs deserialize from JSON with every field optional, so a host
//! config document only needs to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::action::MAX_METADATA_TAGS;
use crate::rules::PlacementRules;

/// Configuration of the [`ResolutionEngine`](crate::engine::ResolutionEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Rules used for any field a rule-set's metadata leaves out.
    pub default_placement_rules: PlacementRules,
}

/// Configuration of the [`TickScheduler`](crate::scheduler::TickScheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Raw batches at least this large are parsed in parallel.
    pub parallel_ingest_threshold: usize,
    /// Upper bound on `metadata.tags` entries per action.
    pub max_metadata_tags: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_ingest_threshold: 64,
            max_metadata_tags: MAX_METADATA_TAGS,
        }
    }
}

impl EngineConfig {
    /// Parse from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is malformed.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl SchedulerConfig {
    /// Parse from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is malformed.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
