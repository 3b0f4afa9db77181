//! Priority descriptors and the total order over actions.
//!
//! Every action maps to a four-tuple
//! `(priority_tier, category_rank, initiative_rank, timestamp)`, compared
//! lexicographically, ascending. Lower sorts earlier and executes first.
//!
//! | variant          | tier       | category | initiative           |
//! |------------------|------------|----------|----------------------|
//! | NPC / scripted   | explicit   | 0        | unbounded            |
//! | tile placement   | unbounded  | 1        | negated initiative   |
//!
//! Because placements carry an unbounded tier, every event-like action in a
//! batch executes before every placement, whatever the tier values. Among
//! placements higher initiative goes first, then earlier submission.
//!
//! Fully equal descriptors compare `Equal`. Callers sort with a stable sort so
//! such ties keep arrival order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// A rank that is either a finite value or larger than every finite value.
///
/// The derived ordering places every `Finite` before `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rank<T> {
    /// A concrete rank.
    Finite(T),
    /// Sorts after every finite rank.
    Unbounded,
}

/// Event-like actions (NPC and scripted).
pub const EVENT_CATEGORY: u8 = 0;
/// Placement-like actions.
pub const PLACEMENT_CATEGORY: u8 = 1;

/// Deterministic ordering key of one action. Derived, never stored.
///
/// Field order is comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityDescriptor {
    /// Explicit tier for events; unbounded for placements.
    pub priority_tier: Rank<u32>,
    /// [`EVENT_CATEGORY`] or [`PLACEMENT_CATEGORY`].
    pub category_rank: u8,
    /// Negated initiative for placements; unbounded for events.
    pub initiative_rank: Rank<i128>,
    /// Submission time.
    pub timestamp: u64,
}

/// Compute the descriptor of an action.
#[must_use]
pub fn describe(action: &Action) -> PriorityDescriptor {
    match action {
        Action::TilePlacement(a) => PriorityDescriptor {
            priority_tier: Rank::Unbounded,
            category_rank: PLACEMENT_CATEGORY,
            initiative_rank: Rank::Finite(-i128::from(a.player_initiative)),
            timestamp: a.timestamp,
        },
        Action::NpcEvent(a) => PriorityDescriptor {
            priority_tier: Rank::Finite(a.priority_tier),
            category_rank: EVENT_CATEGORY,
            initiative_rank: Rank::Unbounded,
            timestamp: a.timestamp,
        },
        Action::ScriptedEvent(a) => PriorityDescriptor {
            priority_tier: Rank::Finite(a.priority_tier),
            category_rank: EVENT_CATEGORY,
            initiative_rank: Rank::Unbounded,
            timestamp: a.timestamp,
        },
    }
}

/// Compare two descriptors. `Less` means `a` executes first.
#[must_use]
pub fn compare(a: &PriorityDescriptor, b: &PriorityDescriptor) -> Ordering {
    a.cmp(b)
}

/// Compare two actions by their descriptors.
#[must_use]
pub fn compare_actions(a: &Action, b: &Action) -> Ordering {
    compare(&describe(a), &describe(b))
}

/// Sort actions into execution order.
///
/// Stable: actions with identical descriptors keep their relative order.
pub fn sort_actions(actions: &mut [Action]) {
    actions.sort_by_cached_key(describe);
}
