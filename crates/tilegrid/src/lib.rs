//! # Tilegrid
//!
//! Fixed-size rectangular tile board used as the authoritative shared state of
//! a multiplayer session.
//!
//! The board is a plain data container: it stores which cells hold a tile,
//! the tile type, and who last wrote each cell at which tick. It performs no
//! legality checks. Exactly one mutating primitive exists,
//! [`Board::apply_tile_placement`], so every write to the board is a single
//! auditable call site.
//!
//! ## Quick Start
//!
//! ```
//! use tilegrid::{Board, PlayerId, Position};
//!
//! let mut board = Board::new(5, 5)?;
//! board.apply_tile_placement(Position::new(2, 2), 1, 1, PlayerId::new("alice"))?;
//!
//! let cell = board.get_cell(Position::new(2, 2)).unwrap();
//! assert!(cell.has_tile);
//! assert_eq!(cell.effective_tile_type(), Some(1));
//! assert_eq!(board.occupied_count(), 1);
//! # Ok::<(), tilegrid::GridError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod board;
pub mod cell;
pub mod hash;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use board::{Board, BoardSnapshot, GridError};
pub use cell::Cell;
pub use hash::hash_board;

/// A cell address on the board.
///
/// `x` grows to the right and `y` grows downward. Both are non-negative by
/// construction; whether a position lies inside a given board is answered by
/// [`Board::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl Position {
    /// Create a position from column and row.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal neighbors, in north/east/south/west order.
    ///
    /// Neighbors that would fall below zero are skipped. Neighbors past the
    /// far edge of a board are still yielded; filter with [`Board::contains`].
    pub fn orthogonal_neighbors(self) -> impl Iterator<Item = Position> {
        let Self { x, y } = self;
        [
            y.checked_sub(1).map(|y| Position::new(x, y)),
            x.checked_add(1).map(|x| Position::new(x, y)),
            y.checked_add(1).map(|y| Position::new(x, y)),
            x.checked_sub(1).map(|x| Position::new(x, y)),
        ]
        .into_iter()
        .flatten()
    }

    /// Returns true if `other` shares an edge with this position.
    ///
    /// Diagonal neighbors are not adjacent.
    #[must_use]
    pub fn is_orthogonally_adjacent(self, other: Position) -> bool {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Identifier of a human player.
///
/// Recorded on each cell as the provenance of its last write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Creates a new `PlayerId` from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Returns the player ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
