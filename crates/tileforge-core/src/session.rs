//! Session state handed to the resolution engine.
//!
//! The surrounding room/session host owns a [`SessionState`] and passes it by
//! `&mut` into [`ResolutionEngine::handle`](crate::engine::ResolutionEngine::handle).
//! Player and NPC maps are `BTreeMap`s so every iteration (hashing,
//! snapshots) is deterministic.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tilegrid::{hash::hash_board_into, Board, Position};

use crate::ids::{InstanceId, NpcId, PlayerId};

/// Lifecycle state of a session. Only `Active` accepts actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not started.
    Pending,
    /// Accepting actions.
    Active,
    /// Temporarily halted by the host.
    Paused,
    /// Finished; never accepts actions again.
    Terminated,
}

/// Connection state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// May act.
    Active,
    /// Connected but idle or spectating.
    Idle,
    /// Dropped, possibly inside a reconnection grace period.
    Disconnected,
    /// Left the session.
    Left,
}

/// A human player as far as ordering and placement are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Player identity.
    pub player_id: PlayerId,
    /// Connection state.
    pub status: PlayerStatus,
    /// Initiative as recorded by the session.
    pub initiative: i64,
    /// Tick of the last applied placement.
    pub last_action_tick: Option<u64>,
    /// Cell of the last applied placement.
    pub last_placement: Option<Position>,
}

impl Player {
    /// An active player who has not acted yet.
    #[must_use]
    pub fn new(player_id: PlayerId, initiative: i64) -> Self {
        Self {
            player_id,
            status: PlayerStatus::Active,
            initiative,
            last_action_tick: None,
            last_placement: None,
        }
    }

    /// Returns true if the player may act.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }
}

/// A non-player entity. Created lazily on first reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    /// NPC identity.
    pub npc_id: NpcId,
    /// Tier of the most recent event.
    pub priority_tier: u32,
    /// Tick of the most recent event.
    pub current_tick: u64,
    /// Merged event payload, stringified.
    pub metadata: BTreeMap<String, String>,
}

impl Npc {
    /// A fresh NPC with empty metadata.
    #[must_use]
    pub fn new(npc_id: NpcId, priority_tier: u32, current_tick: u64) -> Self {
        Self {
            npc_id,
            priority_tier,
            current_tick,
            metadata: BTreeMap::new(),
        }
    }
}

/// Everything the engine reads and writes for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Session identity.
    pub instance_id: InstanceId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Highest tick applied so far. Never decreases.
    pub tick: u64,
    /// Rule-set version governing placements in this session.
    pub rule_set_version: String,
    /// Players by id.
    pub players: BTreeMap<PlayerId, Player>,
    /// NPCs by id.
    pub npcs: BTreeMap<NpcId, Npc>,
    /// The authoritative board.
    pub board: Board,
}

impl SessionState {
    /// An active session at tick 0 with no players or NPCs.
    #[must_use]
    pub fn new(instance_id: InstanceId, rule_set_version: &str, board: Board) -> Self {
        Self {
            instance_id,
            status: SessionStatus::Active,
            tick: 0,
            rule_set_version: rule_set_version.to_string(),
            players: BTreeMap::new(),
            npcs: BTreeMap::new(),
            board,
        }
    }

    /// Add or replace a player.
    pub fn insert_player(&mut self, player: Player) {
        self.players.insert(player.player_id.clone(), player);
    }

    /// Returns true if the session accepts actions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Raise the session tick to `tick` if it is ahead. Never lowers it.
    pub fn advance_tick(&mut self, tick: u64) {
        self.tick = self.tick.max(tick);
    }

    /// Deterministic hash over tick, board, players and NPCs.
    ///
    /// Two sessions that processed the same actions in the same order from the
    /// same starting state hash identically.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.instance_id.hash(&mut hasher);
        self.tick.hash(&mut hasher);
        hash_board_into(&self.board, &mut hasher);
        for player in self.players.values() {
            player.hash(&mut hasher);
        }
        for npc in self.npcs.values() {
            npc.hash(&mut hasher);
        }
        hasher.finish()
    }
}
