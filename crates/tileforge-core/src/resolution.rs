//! Resolution records and the rejection error catalog.
//!
//! Exactly one [`Resolution`] is produced per action handed to the engine.
//! The engine does not store them; they are hand-off data for collaborators
//! that broadcast, persist and meter.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tilegrid::Position;

use crate::action::{Action, Orientation};
use crate::ids::{InstanceId, NpcId, PlayerId, ScriptId, TriggerId};
use crate::placement::Issue;
use crate::session::{PlayerStatus, SessionStatus};

// =============================================================================
// Effects
// =============================================================================

/// A tile written to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilePlacementEffect {
    /// Player who placed the tile.
    pub player_id: PlayerId,
    /// Cell written.
    pub position: Position,
    /// Tile placed.
    pub tile_type: u32,
    /// Tile type before the write, `None` if the cell was empty.
    pub previous_tile_type: Option<u32>,
    /// Facing of the tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    /// Tick stamped on the cell.
    pub tick: u64,
}

/// An NPC updated by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcEventEffect {
    /// Affected NPC.
    pub npc_id: NpcId,
    /// Event name.
    pub event_type: String,
    /// Tier now recorded on the NPC.
    pub priority_tier: u32,
    /// Event payload as submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Tick the event applied at.
    pub tick: u64,
}

/// A scripted event accepted for downstream systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedEventEffect {
    /// Script that fired.
    pub script_id: ScriptId,
    /// Trigger that fired it.
    pub trigger_id: TriggerId,
    /// Event name.
    pub event_type: String,
    /// Tier of the event.
    pub priority_tier: u32,
    /// Event payload as submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Tick the event applied at.
    pub tick: u64,
}

/// Minimal state delta implied by an applied action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// See [`TilePlacementEffect`].
    TilePlacement(TilePlacementEffect),
    /// See [`NpcEventEffect`].
    NpcEvent(NpcEventEffect),
    /// See [`ScriptedEventEffect`].
    ScriptedEvent(ScriptedEventEffect),
}

// =============================================================================
// Rejection taxonomy
// =============================================================================

/// Why an action was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionReason {
    /// Invalid for the current state, but not a resource conflict.
    Validation,
    /// The target cell is already claimed.
    Conflict,
    /// Session-level condition: wrong instance or session not active.
    State,
    /// Internal failure, not expected in normal operation.
    Unknown,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::State => write!(f, "state"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Coarse grouping of [`ErrorCode`]s for the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The player asked for something the game does not allow.
    Gameplay,
    /// The session or connection is not in a state to accept the action.
    Session,
    /// Something inside the server failed.
    Infrastructure,
}

/// Stable application error catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Acting player is not part of the session.
    PlayerNotFound,
    /// Acting player is not active.
    PlayerInactive,
    /// Placement breaks bounds or adjacency rules.
    InvalidTilePlacement,
    /// Player already acted at or after this tick.
    StaleAction,
    /// Another action claimed the cell first.
    PrecedenceConflict,
    /// Action addressed to a different session.
    CrossInstanceAction,
    /// Session is not accepting actions.
    SessionNotActive,
    /// Unexpected internal failure.
    InternalError,
    /// Placement rules could not be loaded.
    RuleSetUnavailable,
}

impl ErrorCode {
    /// Numeric code for the wire catalog.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::PlayerNotFound => 2001,
            Self::PlayerInactive => 2002,
            Self::InvalidTilePlacement => 3001,
            Self::StaleAction => 3002,
            Self::PrecedenceConflict => 3009,
            Self::CrossInstanceAction => 4001,
            Self::SessionNotActive => 4002,
            Self::InternalError => 5000,
            Self::RuleSetUnavailable => 5001,
        }
    }

    /// Category for the wire catalog.
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::PlayerNotFound
            | Self::InvalidTilePlacement
            | Self::StaleAction
            | Self::PrecedenceConflict => ErrorCategory::Gameplay,
            Self::PlayerInactive | Self::CrossInstanceAction | Self::SessionNotActive => {
                ErrorCategory::Session
            }
            Self::InternalError | Self::RuleSetUnavailable => ErrorCategory::Infrastructure,
        }
    }

    /// Whether resubmitting against fresh state may succeed.
    #[must_use]
    pub fn retryable(self) -> bool {
        matches!(
            self,
            Self::StaleAction | Self::PrecedenceConflict | Self::RuleSetUnavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self, self.code())
    }
}

/// Application error attached to a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionError {
    /// Catalog entry.
    pub code: ErrorCode,
    /// Numeric form of `code`.
    pub numeric_code: u16,
    /// Category of `code`.
    pub category: ErrorCategory,
    /// Whether a resubmission may succeed.
    pub retryable: bool,
    /// Human-readable explanation.
    pub message: String,
}

impl RejectionError {
    /// Build from a catalog entry and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            numeric_code: code.code(),
            category: code.category(),
            retryable: code.retryable(),
            message: message.into(),
        }
    }
}

/// Structured context for a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RejectionDetails {
    /// The cell was claimed first.
    #[serde(rename_all = "camelCase")]
    Conflict {
        /// Contested cell.
        position: Position,
        /// Player holding the cell.
        occupant_player_id: Option<PlayerId>,
        /// Tick the occupant wrote the cell.
        occupant_tick: Option<u64>,
    },
    /// Placement issues found by the evaluator.
    #[serde(rename_all = "camelCase")]
    Issues {
        /// Issues in check order.
        issues: Vec<Issue>,
    },
    /// Action addressed to a different session.
    #[serde(rename_all = "camelCase")]
    InstanceMismatch {
        /// Session that received it.
        expected: InstanceId,
        /// Session the action named.
        received: InstanceId,
    },
    /// Session not accepting actions.
    #[serde(rename_all = "camelCase")]
    SessionStatus {
        /// Current status.
        status: SessionStatus,
    },
    /// Player not allowed to act.
    #[serde(rename_all = "camelCase")]
    PlayerStatus {
        /// Current status.
        status: PlayerStatus,
    },
}

// =============================================================================
// Resolution
// =============================================================================

/// The action was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applied {
    /// The action as received.
    pub action: Action,
    /// Session it applied to.
    pub instance_id: InstanceId,
    /// Effective tick.
    pub tick: u64,
    /// Resulting state deltas, currently exactly one.
    pub effects: Vec<Effect>,
    /// De-duplication key echoed from the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Wall-clock time of resolution.
    pub resolved_at: u64,
}

/// The action was rejected. Terminal; nothing is retried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejected {
    /// The action as received.
    pub action: Action,
    /// Session that received it.
    pub instance_id: InstanceId,
    /// Taxonomy bucket.
    pub reason: RejectionReason,
    /// Catalog error.
    pub error: RejectionError,
    /// Structured context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RejectionDetails>,
    /// De-duplication key echoed from the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Wall-clock time of resolution.
    pub resolved_at: u64,
}

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    /// See [`Applied`].
    Applied(Applied),
    /// See [`Rejected`].
    Rejected(Rejected),
}

impl Resolution {
    /// The action this resolves.
    #[must_use]
    pub fn action(&self) -> &Action {
        match self {
            Self::Applied(a) => &a.action,
            Self::Rejected(r) => &r.action,
        }
    }

    /// Returns true if applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Narrow to [`Applied`].
    #[must_use]
    pub fn as_applied(&self) -> Option<&Applied> {
        match self {
            Self::Applied(a) => Some(a),
            Self::Rejected(_) => None,
        }
    }

    /// Narrow to [`Rejected`].
    #[must_use]
    pub fn as_rejected(&self) -> Option<&Rejected> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }

    /// Rejection reason, `None` if applied.
    #[must_use]
    pub fn reason(&self) -> Option<RejectionReason> {
        self.as_rejected().map(|r| r.reason)
    }

    /// Echoed de-duplication key.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Applied(a) => a.request_id.as_deref(),
            Self::Rejected(r) => r.request_id.as_deref(),
        }
    }

    /// Wall-clock time of resolution.
    #[must_use]
    pub fn resolved_at(&self) -> u64 {
        match self {
            Self::Applied(a) => a.resolved_at,
            Self::Rejected(r) => r.resolved_at,
        }
    }
}
