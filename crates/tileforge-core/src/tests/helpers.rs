//! Test helper functions for building actions, sessions and engines.
//!
//! Action builders derive the action id from the actor and timestamp
//! (`"alice@3"`), which keeps assertions on resolution order readable.

use std::sync::Arc;

use serde_json::{json, Value};
use tilegrid::{Board, Position};

use crate::action::{Action, NpcEvent, ScriptedEvent, TilePlacement};
use crate::clock::ManualClock;
use crate::engine::ResolutionEngine;
use crate::ids::{ActionId, InstanceId, NpcId, PlayerId, ScriptId, TriggerId};
use crate::resolution::{RejectionReason, Resolution};
use crate::rules::{PlacementRules, StaticRuleSets};
use crate::session::{Player, SessionState};

/// Session every helper-built action targets.
pub const INSTANCE: &str = "room-1";
/// Rule-set version every helper-built session runs.
pub const RULES_VERSION: &str = "v1";
/// Reading of the clock handed to helper-built engines.
pub const CLOCK_START: u64 = 1_700_000_000_000;

// =============================================================================
// Actions
// =============================================================================

/// A tile placement by `player` at `(x, y)`, effective at `timestamp`.
pub fn placement(
    player: &str,
    initiative: i64,
    (x, y): (u32, u32),
    tile_type: u32,
    timestamp: u64,
) -> Action {
    Action::TilePlacement(TilePlacement {
        id: ActionId::new(&format!("{player}@{timestamp}")),
        instance_id: InstanceId::new(INSTANCE),
        timestamp,
        requested_tick: None,
        metadata: None,
        player_id: PlayerId::new(player),
        player_initiative: initiative,
        position: Position::new(x, y),
        tile_type,
        orientation: None,
        client_request_id: None,
        last_action_tick: None,
    })
}

/// An NPC event from `npc` with the given tier.
pub fn npc_event(npc: &str, tier: u32, timestamp: u64) -> Action {
    Action::NpcEvent(NpcEvent {
        id: ActionId::new(&format!("{npc}@{timestamp}")),
        instance_id: InstanceId::new(INSTANCE),
        timestamp,
        requested_tick: None,
        metadata: None,
        npc_id: NpcId::new(npc),
        priority_tier: tier,
        event_type: "move".to_string(),
        data: None,
    })
}

/// A scripted event from `script` with the given tier.
pub fn scripted_event(script: &str, tier: u32, timestamp: u64) -> Action {
    Action::ScriptedEvent(ScriptedEvent {
        id: ActionId::new(&format!("{script}@{timestamp}")),
        instance_id: InstanceId::new(INSTANCE),
        timestamp,
        requested_tick: None,
        metadata: None,
        script_id: ScriptId::new(script),
        trigger_id: TriggerId::new("on-enter"),
        priority_tier: tier,
        event_type: "weather".to_string(),
        data: None,
    })
}

/// Raw wire form of a placement at `(0, 0)`.
pub fn raw_placement(player: &str, initiative: i64, timestamp: u64) -> Value {
    json!({
        "type": "tile_placement",
        "id": format!("{player}@{timestamp}"),
        "instanceId": INSTANCE,
        "timestamp": timestamp,
        "playerId": player,
        "playerInitiative": initiative,
        "position": {"x": 0, "y": 0},
        "tileType": 1
    })
}

/// `action` retargeted at another session.
pub fn in_instance(mut action: Action, instance: &str) -> Action {
    let id = InstanceId::new(instance);
    match &mut action {
        Action::TilePlacement(a) => a.instance_id = id,
        Action::NpcEvent(a) => a.instance_id = id,
        Action::ScriptedEvent(a) => a.instance_id = id,
    }
    action
}

/// `action` with an explicit requested tick.
pub fn at_tick(mut action: Action, tick: u64) -> Action {
    match &mut action {
        Action::TilePlacement(a) => a.requested_tick = Some(tick),
        Action::NpcEvent(a) => a.requested_tick = Some(tick),
        Action::ScriptedEvent(a) => a.requested_tick = Some(tick),
    }
    action
}

// =============================================================================
// Sessions and engines
// =============================================================================

/// An active session on a `width` x `height` board with the given players.
pub fn session(width: u32, height: u32, players: &[(&str, i64)]) -> SessionState {
    let board = Board::new(width, height).expect("valid board dimensions");
    let mut session = SessionState::new(InstanceId::new(INSTANCE), RULES_VERSION, board);
    for (id, initiative) in players {
        session.insert_player(Player::new(PlayerId::new(id), *initiative));
    }
    session
}

/// An engine serving `rules` under [`RULES_VERSION`], with a fixed clock.
pub fn engine(rules: PlacementRules) -> ResolutionEngine {
    let provider = StaticRuleSets::new().with_rules(RULES_VERSION, rules);
    ResolutionEngine::new(Arc::new(provider)).with_clock(Arc::new(ManualClock::new(CLOCK_START)))
}

/// An engine with default rules (orthogonal, bootstrap allowed).
pub fn default_engine() -> ResolutionEngine {
    engine(PlacementRules::default())
}

// =============================================================================
// Assertions
// =============================================================================

/// Ids of the resolved actions, in resolution order.
pub fn resolved_ids(resolutions: &[Resolution]) -> Vec<String> {
    resolutions
        .iter()
        .map(|r| r.action().id().as_str().to_string())
        .collect()
}

/// Panics unless `resolution` is a rejection with `reason`.
pub fn assert_rejected(resolution: &Resolution, reason: RejectionReason) {
    assert_eq!(
        resolution.reason(),
        Some(reason),
        "expected {reason} rejection, got {resolution:?}"
    );
}

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
