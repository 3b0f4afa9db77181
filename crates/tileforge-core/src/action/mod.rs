//! Action model.
//!
//! An [`Action`] is an immutable request to change world state. Three
//! variants exist, discriminated on the wire by the `type` field:
//!
//! - [`TilePlacement`] (`"tile_placement"`): a human player puts a tile on
//!   the board.
//! - [`NpcEvent`] (`"npc_event"`): something happened on behalf of a
//!   non-player entity.
//! - [`ScriptedEvent`] (`"scriptedEvent"`): a world script fired.
//!
//! Untrusted input is turned into an `Action` by [`parse()`], which rejects
//! anything that does not match one variant shape exactly.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tileforge_core::action::{self, Action};
//!
//! let raw = json!({
//!     "type": "npc_event",
//!     "id": "req-1",
//!     "instanceId": "room-7",
//!     "timestamp": 120,
//!     "npcId": "goblin",
//!     "priorityTier": 2,
//!     "eventType": "spawn"
//! });
//!
//! let action = action::parse(&raw).unwrap();
//! assert!(action.is_npc_event());
//! assert_eq!(action.effective_tick(), 120);
//! ```

mod parse;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tilegrid::Position;

use crate::ids::{ActionId, InstanceId, NpcId, PlayerId, ScriptId, TriggerId};

pub use parse::{
    is_action, parse, parse_str, parse_with_tag_limit, ActionParseError, MAX_METADATA_TAGS,
};

// =============================================================================
// Metadata
// =============================================================================

/// A single metadata tag value. Only scalars are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Boolean tag.
    Bool(bool),
    /// Numeric tag.
    Number(serde_json::Number),
    /// String tag.
    Text(String),
}

/// Optional submitter metadata attached to any action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionMetadata {
    /// De-duplication key, echoed on the resolution for idempotent delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Client-side submission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<u64>,
    /// Small bag of scalar tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, TagValue>,
}

// =============================================================================
// Variants
// =============================================================================

/// Facing of a placed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Default facing.
    North,
    /// Rotated a quarter turn clockwise.
    East,
    /// Rotated half a turn.
    South,
    /// Rotated a quarter turn counter-clockwise.
    West,
}

/// A human player placing a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TilePlacement {
    /// Opaque request id.
    pub id: ActionId,
    /// Session this action targets.
    pub instance_id: InstanceId,
    /// Submission time.
    pub timestamp: u64,
    /// Tick the submitter intended this to apply at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_tick: Option<u64>,
    /// Optional submitter metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionMetadata>,
    /// Acting player.
    pub player_id: PlayerId,
    /// Player initiative, higher goes first among placements.
    pub player_initiative: i64,
    /// Target cell.
    pub position: Position,
    /// Tile type to place.
    pub tile_type: u32,
    /// Facing of the tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    /// Client-side idempotency key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    /// Last tick the client believes this player acted at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_tick: Option<u64>,
}

/// An event issued on behalf of a non-player entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NpcEvent {
    /// Opaque request id.
    pub id: ActionId,
    /// Session this action targets.
    pub instance_id: InstanceId,
    /// Submission time.
    pub timestamp: u64,
    /// Tick the submitter intended this to apply at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_tick: Option<u64>,
    /// Optional submitter metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionMetadata>,
    /// Acting NPC.
    pub npc_id: NpcId,
    /// Explicit urgency, lower is more urgent.
    pub priority_tier: u32,
    /// Event name.
    pub event_type: String,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An event issued by world scripting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptedEvent {
    /// Opaque request id.
    pub id: ActionId,
    /// Session this action targets.
    pub instance_id: InstanceId,
    /// Submission time.
    pub timestamp: u64,
    /// Tick the submitter intended this to apply at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_tick: Option<u64>,
    /// Optional submitter metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionMetadata>,
    /// Script that fired.
    pub script_id: ScriptId,
    /// Trigger that fired the script.
    pub trigger_id: TriggerId,
    /// Explicit urgency, lower is more urgent.
    pub priority_tier: u32,
    /// Event name.
    pub event_type: String,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// =============================================================================
// Action
// =============================================================================

/// Discriminant of an [`Action`], for logging and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// [`TilePlacement`]
    TilePlacement,
    /// [`NpcEvent`]
    NpcEvent,
    /// [`ScriptedEvent`]
    ScriptedEvent,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TilePlacement => write!(f, "tile_placement"),
            Self::NpcEvent => write!(f, "npc_event"),
            Self::ScriptedEvent => write!(f, "scriptedEvent"),
        }
    }
}

/// A request to change world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// A player tile placement.
    #[serde(rename = "tile_placement")]
    TilePlacement(TilePlacement),
    /// An NPC event.
    #[serde(rename = "npc_event")]
    NpcEvent(NpcEvent),
    /// A scripted world event.
    #[serde(rename = "scriptedEvent")]
    ScriptedEvent(ScriptedEvent),
}

impl Action {
    /// Returns the variant discriminant.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::TilePlacement(_) => ActionKind::TilePlacement,
            Self::NpcEvent(_) => ActionKind::NpcEvent,
            Self::ScriptedEvent(_) => ActionKind::ScriptedEvent,
        }
    }

    /// Opaque request id.
    #[must_use]
    pub fn id(&self) -> &ActionId {
        match self {
            Self::TilePlacement(a) => &a.id,
            Self::NpcEvent(a) => &a.id,
            Self::ScriptedEvent(a) => &a.id,
        }
    }

    /// Session this action targets.
    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        match self {
            Self::TilePlacement(a) => &a.instance_id,
            Self::NpcEvent(a) => &a.instance_id,
            Self::ScriptedEvent(a) => &a.instance_id,
        }
    }

    /// Submission time.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::TilePlacement(a) => a.timestamp,
            Self::NpcEvent(a) => a.timestamp,
            Self::ScriptedEvent(a) => a.timestamp,
        }
    }

    /// Tick the submitter asked for, if any.
    #[must_use]
    pub fn requested_tick(&self) -> Option<u64> {
        match self {
            Self::TilePlacement(a) => a.requested_tick,
            Self::NpcEvent(a) => a.requested_tick,
            Self::ScriptedEvent(a) => a.requested_tick,
        }
    }

    /// Submitter metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&ActionMetadata> {
        match self {
            Self::TilePlacement(a) => a.metadata.as_ref(),
            Self::NpcEvent(a) => a.metadata.as_ref(),
            Self::ScriptedEvent(a) => a.metadata.as_ref(),
        }
    }

    /// The tick this action applies at: `requested_tick`, else `timestamp`.
    ///
    /// Used both as ordering input and to stamp the resulting mutations.
    #[must_use]
    pub fn effective_tick(&self) -> u64 {
        self.requested_tick().unwrap_or_else(|| self.timestamp())
    }

    /// Key collaborators use for idempotent delivery.
    ///
    /// The metadata de-duplication key wins over a placement's
    /// `clientRequestId`.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.request_id.as_deref())
            .or_else(|| {
                self.as_tile_placement()
                    .and_then(|p| p.client_request_id.as_deref())
            })
    }

    /// Returns true for tile placements.
    #[must_use]
    pub fn is_tile_placement(&self) -> bool {
        matches!(self, Self::TilePlacement(_))
    }

    /// Returns true for NPC events.
    #[must_use]
    pub fn is_npc_event(&self) -> bool {
        matches!(self, Self::NpcEvent(_))
    }

    /// Returns true for scripted events.
    #[must_use]
    pub fn is_scripted_event(&self) -> bool {
        matches!(self, Self::ScriptedEvent(_))
    }

    /// Narrow to a tile placement.
    #[must_use]
    pub fn as_tile_placement(&self) -> Option<&TilePlacement> {
        match self {
            Self::TilePlacement(a) => Some(a),
            _ => None,
        }
    }

    /// Narrow to an NPC event.
    #[must_use]
    pub fn as_npc_event(&self) -> Option<&NpcEvent> {
        match self {
            Self::NpcEvent(a) => Some(a),
            _ => None,
        }
    }

    /// Narrow to a scripted event.
    #[must_use]
    pub fn as_scripted_event(&self) -> Option<&ScriptedEvent> {
        match self {
            Self::ScriptedEvent(a) => Some(a),
            _ => None,
        }
    }
}

impl From<TilePlacement> for Action {
    fn from(a: TilePlacement) -> Self {
        Self::TilePlacement(a)
    }
}

impl From<NpcEvent> for Action {
    fn from(a: NpcEvent) -> Self {
        Self::NpcEvent(a)
    }
}

impl From<ScriptedEvent> for Action {
    fn from(a: ScriptedEvent) -> Self {
        Self::ScriptedEvent(a)
    }
}
