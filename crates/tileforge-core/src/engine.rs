//! The resolution engine: sole writer of session state.
//!
//! [`ResolutionEngine::handle`] takes one action through instance and
//! liveness checks, dispatches on its variant, mutates the session and returns
//! exactly one [`Resolution`]. It never returns an error and never panics on
//! bad input: failures inside dispatch become `unknown` rejections so one
//! broken action cannot stall the rest of a batch.
//!
//! # Concurrency
//!
//! `handle` takes `&mut SessionState`, so the borrow checker enforces a single
//! writer per session. The engine itself is `Send + Sync` and may be shared
//! between sessions; its only shared state is the rule cache.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tileforge_core::action::{Action, TilePlacement};
//! use tileforge_core::engine::ResolutionEngine;
//! use tileforge_core::ids::{ActionId, InstanceId, PlayerId};
//! use tileforge_core::rules::{PlacementRules, StaticRuleSets};
//! use tileforge_core::session::{Player, SessionState};
//! use tilegrid::{Board, Position};
//!
//! let rules = StaticRuleSets::new().with_rules("v1", PlacementRules::default());
//! let engine = ResolutionEngine::new(Arc::new(rules));
//!
//! let mut session = SessionState::new(InstanceId::new("room"), "v1", Board::new(5, 5).unwrap());
//! session.insert_player(Player::new(PlayerId::new("alice"), 10));
//!
//! let action = Action::from(TilePlacement {
//!     id: ActionId::new("r1"),
//!     instance_id: InstanceId::new("room"),
//!     timestamp: 1,
//!     requested_tick: None,
//!     metadata: None,
//!     player_id: PlayerId::new("alice"),
//!     player_initiative: 10,
//!     position: Position::new(2, 2),
//!     tile_type: 1,
//!     orientation: None,
//!     client_request_id: None,
//!     last_action_tick: None,
//! });
//!
//! let resolution = engine.handle(&action, &mut session);
//! assert!(resolution.is_applied());
//! assert_eq!(session.tick, 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tilegrid::Cell;
use tracing::{debug, error, instrument, warn};

use crate::action::{Action, NpcEvent, ScriptedEvent, TilePlacement};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::placement::{
    self, find_conflict, Issue, IssueCode, IssueDetails, PlacementCandidate, PlacementContext,
    ReportMode,
};
use crate::resolution::{
    Applied, Effect, ErrorCode, NpcEventEffect, Rejected, RejectionDetails, RejectionError,
    RejectionReason, Resolution, ScriptedEventEffect, TilePlacementEffect,
};
use crate::rules::{RuleCache, RuleSetProvider};
use crate::session::{Npc, SessionState};

/// Metadata key recording the last event type an NPC received.
pub const NPC_LAST_EVENT_KEY: &str = "lastEventType";
/// Metadata key for a non-object NPC payload.
pub const NPC_DATA_KEY: &str = "data";

/// A rejection before it is stamped with time and request id.
#[derive(Debug)]
struct Rejection {
    reason: RejectionReason,
    error: RejectionError,
    details: Option<RejectionDetails>,
}

impl Rejection {
    fn new(reason: RejectionReason, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            reason,
            error: RejectionError::new(code, message),
            details: None,
        }
    }

    fn with_details(mut self, details: RejectionDetails) -> Self {
        self.details = Some(details);
        self
    }
}

/// Orchestrates validation, conflict detection, mutation and reporting.
pub struct ResolutionEngine {
    rules: RuleCache,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl ResolutionEngine {
    /// An engine with default configuration and the system clock.
    #[must_use]
    pub fn new(provider: Arc<dyn RuleSetProvider>) -> Self {
        Self::with_config(provider, EngineConfig::default())
    }

    /// An engine with explicit configuration and the system clock.
    #[must_use]
    pub fn with_config(provider: Arc<dyn RuleSetProvider>, config: EngineConfig) -> Self {
        Self {
            rules: RuleCache::new(provider, config.default_placement_rules),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for `resolved_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The rule cache, for introspection.
    #[must_use]
    pub fn rule_cache(&self) -> &RuleCache {
        &self.rules
    }

    /// Resolve one action against the session.
    ///
    /// Always returns a resolution. Rejections leave the session untouched.
    #[instrument(
        level = "debug",
        skip_all,
        fields(action_id = %action.id(), kind = %action.kind(), tick = action.effective_tick())
    )]
    pub fn handle(&self, action: &Action, session: &mut SessionState) -> Resolution {
        let outcome = self.dispatch(action, session);
        let resolved_at = self.clock.now();
        let request_id = action.request_id().map(str::to_string);

        match outcome {
            Ok(effect) => {
                debug!(session_tick = session.tick, "applied");
                Resolution::Applied(Applied {
                    action: action.clone(),
                    instance_id: session.instance_id.clone(),
                    tick: action.effective_tick(),
                    effects: vec![effect],
                    request_id,
                    resolved_at,
                })
            }
            Err(rejection) => {
                log_rejection(&rejection);
                Resolution::Rejected(Rejected {
                    action: action.clone(),
                    instance_id: session.instance_id.clone(),
                    reason: rejection.reason,
                    error: rejection.error,
                    details: rejection.details,
                    request_id,
                    resolved_at,
                })
            }
        }
    }

    fn dispatch(&self, action: &Action, session: &mut SessionState) -> Result<Effect, Rejection> {
        if action.instance_id() != &session.instance_id {
            return Err(Rejection::new(
                RejectionReason::State,
                ErrorCode::CrossInstanceAction,
                format!(
                    "action targets session {}, received by {}",
                    action.instance_id(),
                    session.instance_id
                ),
            )
            .with_details(RejectionDetails::InstanceMismatch {
                expected: session.instance_id.clone(),
                received: action.instance_id().clone(),
            }));
        }
        if !session.is_active() {
            return Err(Rejection::new(
                RejectionReason::State,
                ErrorCode::SessionNotActive,
                format!("session {} is not active", session.instance_id),
            )
            .with_details(RejectionDetails::SessionStatus {
                status: session.status,
            }));
        }

        match action {
            Action::TilePlacement(placement) => self.apply_tile_placement(placement, session),
            Action::NpcEvent(event) => Ok(apply_npc_event(event, session)),
            Action::ScriptedEvent(event) => Ok(apply_scripted_event(event, session)),
        }
    }

    fn apply_tile_placement(
        &self,
        action: &TilePlacement,
        session: &mut SessionState,
    ) -> Result<Effect, Rejection> {
        let tick = action.requested_tick.unwrap_or(action.timestamp);

        let player = session.players.get(&action.player_id).ok_or_else(|| {
            Rejection::new(
                RejectionReason::Validation,
                ErrorCode::PlayerNotFound,
                format!("player {} is not in this session", action.player_id),
            )
        })?;
        if !player.is_active() {
            return Err(Rejection::new(
                RejectionReason::State,
                ErrorCode::PlayerInactive,
                format!("player {} is not active", action.player_id),
            )
            .with_details(RejectionDetails::PlayerStatus {
                status: player.status,
            }));
        }

        let rules = self.rules.get(&session.rule_set_version).map_err(|e| {
            Rejection::new(
                RejectionReason::Unknown,
                ErrorCode::RuleSetUnavailable,
                e.to_string(),
            )
        })?;

        let candidate = PlacementCandidate {
            position: action.position,
            tile_type: action.tile_type,
        };
        let ctx = PlacementContext {
            board: &session.board,
            current_tick: tick,
            player_id: &action.player_id,
            initiative: player.initiative,
            last_action_tick: player.last_action_tick,
            last_placement: player.last_placement,
            rules: &rules,
        };
        placement::validate(&candidate, &ctx, ReportMode::FailFast)
            .map_err(|issues| rejection_for_issues(action, issues))?;

        let previous_tile_type = session
            .board
            .get_cell(action.position)
            .and_then(Cell::effective_tile_type);
        session
            .board
            .apply_tile_placement(action.position, action.tile_type, tick, action.player_id.clone())
            .map_err(|e| {
                Rejection::new(RejectionReason::Unknown, ErrorCode::InternalError, e.to_string())
            })?;

        if let Some(player) = session.players.get_mut(&action.player_id) {
            player.last_action_tick = Some(tick);
            player.last_placement = Some(action.position);
        }
        session.advance_tick(tick);

        Ok(Effect::TilePlacement(TilePlacementEffect {
            player_id: action.player_id.clone(),
            position: action.position,
            tile_type: action.tile_type,
            previous_tile_type,
            orientation: action.orientation,
            tick,
        }))
    }
}

fn rejection_for_issues(action: &TilePlacement, issues: Vec<Issue>) -> Rejection {
    if let Some(conflict) = find_conflict(&issues) {
        let (occupant_player_id, occupant_tick) = match &conflict.details {
            IssueDetails::Occupied {
                occupant_player_id,
                occupant_tick,
            } => (occupant_player_id.clone(), *occupant_tick),
            _ => (None, None),
        };
        return Rejection::new(
            RejectionReason::Conflict,
            ErrorCode::PrecedenceConflict,
            conflict.message.clone(),
        )
        .with_details(RejectionDetails::Conflict {
            position: action.position,
            occupant_player_id,
            occupant_tick,
        });
    }

    let code = if issues.iter().all(|i| i.code == IssueCode::StaleTick) {
        ErrorCode::StaleAction
    } else {
        ErrorCode::InvalidTilePlacement
    };
    let message = issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Rejection::new(RejectionReason::Validation, code, message)
        .with_details(RejectionDetails::Issues { issues })
}

fn apply_npc_event(event: &NpcEvent, session: &mut SessionState) -> Effect {
    let tick = event.requested_tick.unwrap_or(event.timestamp);
    let npc = session
        .npcs
        .entry(event.npc_id.clone())
        .or_insert_with(|| Npc::new(event.npc_id.clone(), event.priority_tier, tick));
    npc.priority_tier = event.priority_tier;
    npc.current_tick = tick;
    merge_event_data(&mut npc.metadata, &event.event_type, event.data.as_ref());
    session.advance_tick(tick);

    Effect::NpcEvent(NpcEventEffect {
        npc_id: event.npc_id.clone(),
        event_type: event.event_type.clone(),
        priority_tier: event.priority_tier,
        data: event.data.clone(),
        tick,
    })
}

fn apply_scripted_event(event: &ScriptedEvent, session: &mut SessionState) -> Effect {
    let tick = event.requested_tick.unwrap_or(event.timestamp);
    session.advance_tick(tick);

    Effect::ScriptedEvent(ScriptedEventEffect {
        script_id: event.script_id.clone(),
        trigger_id: event.trigger_id.clone(),
        event_type: event.event_type.clone(),
        priority_tier: event.priority_tier,
        data: event.data.clone(),
        tick,
    })
}

/// Merge an NPC event payload into the NPC's string metadata.
///
/// Object payloads merge key by key; any other non-null payload is stored
/// under [`NPC_DATA_KEY`]. The event type is always recorded under
/// [`NPC_LAST_EVENT_KEY`].
pub fn merge_event_data(
    metadata: &mut BTreeMap<String, String>,
    event_type: &str,
    data: Option<&Value>,
) {
    metadata.insert(NPC_LAST_EVENT_KEY.to_string(), event_type.to_string());
    match data {
        None | Some(Value::Null) => {}
        Some(Value::Object(fields)) => {
            for (key, value) in fields {
                metadata.insert(key.clone(), stringify_value(value));
            }
        }
        Some(other) => {
            metadata.insert(NPC_DATA_KEY.to_string(), stringify_value(other));
        }
    }
}

/// Render a payload value as a metadata string.
///
/// Strings are stored as-is, other scalars in their JSON spelling, arrays
/// and objects as compact JSON.
#[must_use]
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

fn log_rejection(rejection: &Rejection) {
    let code = rejection.error.code;
    let detail = rejection.error.message.as_str();
    match rejection.reason {
        // Expected traffic under contention.
        RejectionReason::Conflict => debug!(%code, detail, "conflict"),
        RejectionReason::Validation | RejectionReason::State => {
            warn!(reason = %rejection.reason, %code, detail, "rejected");
        }
        RejectionReason::Unknown => error!(%code, detail, "internal failure"),
    }
}
