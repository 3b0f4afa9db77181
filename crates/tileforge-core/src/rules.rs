//! Placement rules and the per-version rule cache.
//!
//! Rule-sets are immutable once published, so the engine fetches each
//! version at most once and keeps it for the life of the process.
//!
//! # Single-flight
//!
//! [`RuleCache::get`] collapses concurrent misses for the same version into a
//! single upstream call. Each version owns a slot guarded by its own mutex:
//! the first caller fetches while holding the slot lock, later callers block
//! on that lock and then read the value the first caller stored. Every caller
//! therefore observes the same `Arc<PlacementRules>`. A failed fetch is not
//! cached; the next caller tries again.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

// =============================================================================
// Placement Rules
// =============================================================================

/// Spatial constraint on where a tile may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjacency {
    /// Only next to the player's own most recent placement.
    None,
    /// Anywhere in bounds and unoccupied.
    Any,
    /// Next to at least one occupied cell.
    Orthogonal,
}

impl Adjacency {
    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "any" => Some(Self::Any),
            "orthogonal" => Some(Self::Orthogonal),
            _ => None,
        }
    }
}

impl fmt::Display for Adjacency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Any => write!(f, "any"),
            Self::Orthogonal => write!(f, "orthogonal"),
        }
    }
}

/// Adjacency and bootstrap policy for tile placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRules {
    /// Spatial constraint.
    pub adjacency: Adjacency,
    /// Waive the adjacency constraint for the first tile.
    pub allow_first_placement_anywhere: bool,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            adjacency: Adjacency::Orthogonal,
            allow_first_placement_anywhere: true,
        }
    }
}

impl PlacementRules {
    /// Read rules from a rule-set metadata document.
    ///
    /// Looks at `placement.adjacency` and
    /// `placement.allowFirstPlacementAnywhere`. Each field falls back to
    /// `defaults` independently when missing or malformed.
    #[must_use]
    pub fn from_metadata(metadata: &Value, defaults: PlacementRules) -> Self {
        let placement = metadata.get("placement");
        let adjacency = placement
            .and_then(|p| p.get("adjacency"))
            .and_then(Value::as_str)
            .and_then(Adjacency::from_wire)
            .unwrap_or(defaults.adjacency);
        let allow_first_placement_anywhere = placement
            .and_then(|p| p.get("allowFirstPlacementAnywhere"))
            .and_then(Value::as_bool)
            .unwrap_or(defaults.allow_first_placement_anywhere);
        Self {
            adjacency,
            allow_first_placement_anywhere,
        }
    }
}

// =============================================================================
// Rule-set lookup
// =============================================================================

/// A published rule-set as returned by the upstream store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetDetail {
    /// Version string.
    pub version: String,
    /// Free-form metadata; `placement` is read by this crate.
    #[serde(default)]
    pub metadata: Value,
}

/// Errors from the upstream rule-set store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    /// No rule-set with this version exists.
    #[error("rule-set version `{0}` not found")]
    NotFound(String),
    /// The store could not be reached or failed.
    #[error("rule-set store unavailable: {0}")]
    Unavailable(String),
}

/// Upstream rule-set store.
///
/// Implementations may block; the cache calls them at most once per version
/// on success.
pub trait RuleSetProvider: Send + Sync {
    /// Fetch a rule-set by version.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError`] if the version is unknown or the store fails.
    fn require_rule_set_by_version(&self, version: &str) -> Result<RuleSetDetail, RuleSetError>;
}

/// Provider backed by an in-memory map. Useful for hosts that preload
/// rule-sets and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSets {
    sets: HashMap<String, RuleSetDetail>,
}

impl StaticRuleSets {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule-set whose metadata carries the given placement rules.
    #[must_use]
    pub fn with_rules(mut self, version: &str, rules: PlacementRules) -> Self {
        let metadata = serde_json::json!({ "placement": rules });
        self.insert(RuleSetDetail {
            version: version.to_string(),
            metadata,
        });
        self
    }

    /// Add or replace a rule-set.
    pub fn insert(&mut self, detail: RuleSetDetail) {
        self.sets.insert(detail.version.clone(), detail);
    }
}

impl RuleSetProvider for StaticRuleSets {
    fn require_rule_set_by_version(&self, version: &str) -> Result<RuleSetDetail, RuleSetError> {
        self.sets
            .get(version)
            .cloned()
            .ok_or_else(|| RuleSetError::NotFound(version.to_string()))
    }
}

// =============================================================================
// Rule Cache
// =============================================================================

type Slot = Arc<Mutex<Option<Arc<PlacementRules>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memoized, single-flight rule lookup keyed by version string.
pub struct RuleCache {
    provider: Arc<dyn RuleSetProvider>,
    defaults: PlacementRules,
    slots: Mutex<HashMap<String, Slot>>,
    fetches: AtomicU64,
}

impl fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCache")
            .field("defaults", &self.defaults)
            .field("cached_versions", &self.cached_versions())
            .field("fetches", &self.fetch_count())
            .finish_non_exhaustive()
    }
}

impl RuleCache {
    /// A cache in front of `provider`. `defaults` fill in missing rule fields.
    #[must_use]
    pub fn new(provider: Arc<dyn RuleSetProvider>, defaults: PlacementRules) -> Self {
        Self {
            provider,
            defaults,
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Rules for `version`, fetching on first use.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error on a miss. Nothing is cached then.
    pub fn get(&self, version: &str) -> Result<Arc<PlacementRules>, RuleSetError> {
        let slot = Arc::clone(lock(&self.slots).entry(version.to_string()).or_default());

        // Held across the fetch so concurrent misses wait for this one.
        let mut cached = lock(&slot);
        if let Some(rules) = cached.as_ref() {
            return Ok(Arc::clone(rules));
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let detail = self.provider.require_rule_set_by_version(version)?;
        let rules = Arc::new(PlacementRules::from_metadata(&detail.metadata, self.defaults));
        info!(
            version,
            adjacency = %rules.adjacency,
            allow_first_placement_anywhere = rules.allow_first_placement_anywhere,
            "cached placement rules"
        );
        *cached = Some(Arc::clone(&rules));
        Ok(rules)
    }

    /// Versions currently cached, sorted.
    #[must_use]
    pub fn cached_versions(&self) -> Vec<String> {
        let slots = lock(&self.slots);
        let mut versions: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| lock(slot).is_some())
            .map(|(version, _)| version.clone())
            .collect();
        versions.sort();
        versions
    }

    /// Number of upstream fetches attempted, successful or not.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}
