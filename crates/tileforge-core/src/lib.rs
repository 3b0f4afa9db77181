//! # Tileforge Core
//!
//! Authoritative action ordering and conflict resolution for a shared tile
//! board in a multiplayer session.
//!
//! Players, NPCs and scripted world events submit actions concurrently. This
//! crate imposes one deterministic order on them, validates each against the
//! current state, settles contention for board cells, mutates the state and
//! reports exactly one outcome per action. Same starting state plus same
//! action set gives the same resolutions and the same final board.
//!
//! ## Architecture
//!
//! - **Action model** ([`action`]): tagged action variants and the structural
//!   validator for raw input.
//! - **Priority** ([`priority`]): the descriptor tuple and total order.
//! - **Placement rules** ([`rules`], [`placement`]): adjacency modes, the
//!   single-flight rule cache and the rule evaluator.
//! - **Scheduler** ([`scheduler`]): per-tick batching in total order.
//! - **Engine** ([`engine`]): the only writer of [`SessionState`].
//!
//! The board itself lives in the [`tilegrid`] crate.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use tileforge_core::{
//!     PlacementRules, ResolutionEngine, SessionState, StaticRuleSets, TickScheduler,
//! };
//! use tileforge_core::ids::{InstanceId, PlayerId};
//! use tileforge_core::session::Player;
//! use tilegrid::Board;
//!
//! let provider = StaticRuleSets::new().with_rules("v1", PlacementRules::default());
//! let engine = ResolutionEngine::new(Arc::new(provider));
//! let mut session = SessionState::new(InstanceId::new("room"), "v1", Board::new(8, 8).unwrap());
//! session.insert_player(Player::new(PlayerId::new("alice"), 3));
//!
//! let mut scheduler = TickScheduler::new();
//! let raw = serde_json::json!({
//!     "type": "tile_placement",
//!     "id": "r1",
//!     "instanceId": "room",
//!     "timestamp": 1,
//!     "playerId": "alice",
//!     "playerInitiative": 3,
//!     "position": {"x": 4, "y": 4},
//!     "tileType": 2
//! });
//! assert!(scheduler.submit_raw(&[raw])[0].is_ok());
//!
//! let resolutions = scheduler.run_all(&engine, &mut session);
//! assert!(resolutions[0].is_applied());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod clock;
pub mod config;
pub mod engine;
pub mod ids;
pub mod placement;
pub mod priority;
pub mod resolution;
pub mod rules;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod tests;

pub use action::{Action, ActionKind, ActionParseError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, SchedulerConfig};
pub use engine::ResolutionEngine;
pub use placement::{Issue, IssueCode, ReportMode};
pub use priority::{compare, describe, PriorityDescriptor, Rank};
pub use resolution::{ErrorCode, Rejected, RejectionReason, Resolution};
pub use rules::{
    Adjacency, PlacementRules, RuleCache, RuleSetError, RuleSetProvider, StaticRuleSets,
};
pub use scheduler::{Batch, TickScheduler};
pub use session::SessionState;
