//! Placement rule evaluation.
//!
//! [`validate`] checks one candidate placement against the current board and
//! the acting player's history. It is a pure function over immutable views.
//!
//! Checks run in this order:
//!
//! 1. **Bounds**: the position lies on the board.
//! 2. **Occupancy**: the target cell is empty. A failure here carries the
//!    occupant's id and tick and is the only issue the engine routes to the
//!    conflict path.
//! 3. **Adjacency**: per [`Adjacency`], with the bootstrap exception.
//! 4. **Rate**: the action's tick is later than the player's last action.
//!
//! In [`ReportMode::FailFast`] the first issue is returned alone. In
//! [`ReportMode::Full`] every applicable check runs; occupancy and adjacency
//! are skipped for an out-of-bounds position since there is no cell to
//! inspect.

use std::fmt;

use serde::{Deserialize, Serialize};
use tilegrid::{Board, Position};

use crate::ids::PlayerId;
use crate::rules::{Adjacency, PlacementRules};

/// Machine-readable issue kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Position outside the board.
    OutOfBounds,
    /// Target cell already holds a tile.
    PositionOccupied,
    /// Adjacency rule not met.
    AdjacencyRequired,
    /// Player already acted at or after this tick.
    StaleTick,
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "OUT_OF_BOUNDS"),
            Self::PositionOccupied => write!(f, "POSITION_OCCUPIED"),
            Self::AdjacencyRequired => write!(f, "ADJACENCY_REQUIRED"),
            Self::StaleTick => write!(f, "STALE_TICK"),
        }
    }
}

/// Structured context for an [`Issue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IssueDetails {
    /// Board dimensions the position fell outside of.
    #[serde(rename_all = "camelCase")]
    Bounds {
        /// Board width.
        width: u32,
        /// Board height.
        height: u32,
    },
    /// Who holds the cell.
    #[serde(rename_all = "camelCase")]
    Occupied {
        /// Last writer of the cell.
        occupant_player_id: Option<PlayerId>,
        /// Tick of the last write.
        occupant_tick: Option<u64>,
    },
    /// Which adjacency rule failed.
    #[serde(rename_all = "camelCase")]
    Adjacency {
        /// Active mode.
        adjacency: Adjacency,
        /// Cell the placement had to touch, for `none` mode.
        anchor: Option<Position>,
    },
    /// Tick comparison that failed.
    #[serde(rename_all = "camelCase")]
    Stale {
        /// Tick of this action.
        requested_tick: u64,
        /// Tick the player last acted at.
        last_action_tick: u64,
    },
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue kind.
    pub code: IssueCode,
    /// Human-readable explanation.
    pub message: String,
    /// Structured context.
    pub details: IssueDetails,
}

/// How many issues to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Stop at the first issue.
    #[default]
    FailFast,
    /// Run every applicable check.
    Full,
}

/// The placement being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementCandidate {
    /// Target cell.
    pub position: Position,
    /// Tile to place.
    pub tile_type: u32,
}

/// Everything [`validate`] reads.
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext<'a> {
    /// Current board.
    pub board: &'a Board,
    /// Effective tick of the action under evaluation.
    pub current_tick: u64,
    /// Acting player.
    pub player_id: &'a PlayerId,
    /// Acting player's recorded initiative.
    pub initiative: i64,
    /// Tick the player last acted at.
    pub last_action_tick: Option<u64>,
    /// Cell of the player's last placement.
    pub last_placement: Option<Position>,
    /// Active rules.
    pub rules: &'a PlacementRules,
}

/// Evaluate a placement.
///
/// # Errors
///
/// Returns the issues found, never empty.
pub fn validate(
    candidate: &PlacementCandidate,
    ctx: &PlacementContext<'_>,
    mode: ReportMode,
) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    let position = candidate.position;

    match ctx.board.get_cell(position) {
        None => issues.push(Issue {
            code: IssueCode::OutOfBounds,
            message: format!(
                "position {position} is outside the {}x{} board",
                ctx.board.width(),
                ctx.board.height()
            ),
            details: IssueDetails::Bounds {
                width: ctx.board.width(),
                height: ctx.board.height(),
            },
        }),
        Some(cell) => {
            if cell.has_tile {
                issues.push(Issue {
                    code: IssueCode::PositionOccupied,
                    message: format!("position {position} is already occupied"),
                    details: IssueDetails::Occupied {
                        occupant_player_id: cell.last_updated_by.clone(),
                        occupant_tick: cell.last_updated_tick,
                    },
                });
            }
            if mode == ReportMode::FailFast && !issues.is_empty() {
                return Err(issues);
            }
            if let Some(issue) = check_adjacency(position, ctx) {
                issues.push(issue);
            }
        }
    }
    if mode == ReportMode::FailFast && !issues.is_empty() {
        return Err(issues);
    }

    if let Some(last) = ctx.last_action_tick {
        if ctx.current_tick <= last {
            issues.push(Issue {
                code: IssueCode::StaleTick,
                message: format!(
                    "player {} already acted at tick {last}, not after {}",
                    ctx.player_id, ctx.current_tick
                ),
                details: IssueDetails::Stale {
                    requested_tick: ctx.current_tick,
                    last_action_tick: last,
                },
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_adjacency(position: Position, ctx: &PlacementContext<'_>) -> Option<Issue> {
    let rules = ctx.rules;
    match rules.adjacency {
        Adjacency::Any => None,
        Adjacency::Orthogonal => {
            let bootstrap =
                rules.allow_first_placement_anywhere && ctx.board.occupied_count() == 0;
            if bootstrap || ctx.board.has_occupied_neighbor(position) {
                None
            } else {
                Some(Issue {
                    code: IssueCode::AdjacencyRequired,
                    message: format!("position {position} has no occupied orthogonal neighbor"),
                    details: IssueDetails::Adjacency {
                        adjacency: Adjacency::Orthogonal,
                        anchor: None,
                    },
                })
            }
        }
        Adjacency::None => match ctx.last_placement {
            Some(anchor) if position.is_orthogonally_adjacent(anchor) => None,
            None if rules.allow_first_placement_anywhere => None,
            anchor => Some(Issue {
                code: IssueCode::AdjacencyRequired,
                message: match anchor {
                    Some(anchor) => format!(
                        "position {position} is not next to the player's last placement {anchor}"
                    ),
                    None => "first placement must follow the board's bootstrap rule".to_string(),
                },
                details: IssueDetails::Adjacency {
                    adjacency: Adjacency::None,
                    anchor,
                },
            }),
        },
    }
}

/// The occupancy issue among `issues`, if any.
#[must_use]
pub fn find_conflict(issues: &[Issue]) -> Option<&Issue> {
    issues
        .iter()
        .find(|issue| issue.code == IssueCode::PositionOccupied)
}
