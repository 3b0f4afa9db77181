//! The board grid.
//!
//! Cells are stored in a single row-major `Vec`, so iteration order is fixed
//! and identical on every host. That order is what snapshots, replication and
//! [`hash_board`](crate::hash_board) rely on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Cell, PlayerId, Position};

/// Errors raised by board construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Width or height was zero.
    #[error("board dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// `width * height` does not fit in memory addressing.
    #[error("board dimensions {width}x{height} overflow the cell index")]
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// A position outside the board was written.
    #[error("position {position} is outside the {width}x{height} board")]
    OutOfBounds {
        /// The offending position.
        position: Position,
        /// Board width.
        width: u32,
        /// Board height.
        height: u32,
    },
    /// A snapshot's cell list does not match its dimensions.
    #[error("snapshot holds {actual} cells, expected {expected}")]
    SnapshotSize {
        /// `width * height` of the snapshot.
        expected: usize,
        /// Number of cells present.
        actual: usize,
    },
}

/// Fixed-size rectangular grid of [`Cell`]s.
///
/// # Ownership
///
/// Only the resolution layer holds a `&mut Board`. Everything else reads it
/// through `&Board`, which is the immutable view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    /// Number of cells with `has_tile` set, kept in sync by the one mutator.
    occupied: usize,
}

impl Board {
    /// Create an empty board.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyDimensions`] if either dimension is zero and
    /// [`GridError::TooLarge`] if the cell count overflows `usize`.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        let len = Self::cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![Cell::default(); len],
            occupied: 0,
        })
    }

    fn cell_count(width: u32, height: u32) -> Result<usize, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        (width as usize)
            .checked_mul(height as usize)
            .ok_or(GridError::TooLarge { width, height })
    }

    /// Board width in cells.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Board height in cells.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if `position` lies within `[0, width) x [0, height)`.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.contains(position)
            .then(|| position.y as usize * self.width as usize + position.x as usize)
    }

    /// Returns the cell at `position`, or `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, position: Position) -> Option<&Cell> {
        self.index(position).map(|i| &self.cells[i])
    }

    /// Number of cells currently holding a tile.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    /// In-bounds orthogonal neighbors of `position`.
    pub fn neighbors(&self, position: Position) -> impl Iterator<Item = Position> + '_ {
        position
            .orthogonal_neighbors()
            .filter(move |p| self.contains(*p))
    }

    /// Returns true if any in-bounds orthogonal neighbor holds a tile.
    #[must_use]
    pub fn has_occupied_neighbor(&self, position: Position) -> bool {
        self.neighbors(position)
            .filter_map(|p| self.get_cell(p))
            .any(|cell| cell.has_tile)
    }

    /// All cells with their positions, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (Position, &Cell)> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().map(move |(i, cell)| {
            // Both quotient and remainder are bounded by u32 dimensions.
            #[allow(clippy::cast_possible_truncation)]
            let position = Position::new((i % width) as u32, (i / width) as u32);
            (position, cell)
        })
    }

    /// Overwrite the cell at `position` with a tile.
    ///
    /// No legality checks happen here. The caller is expected to have run
    /// placement validation against this same board immediately before.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if `position` is outside the board.
    /// The board is left untouched in that case.
    pub fn apply_tile_placement(
        &mut self,
        position: Position,
        tile_type: u32,
        tick: u64,
        player_id: PlayerId,
    ) -> Result<(), GridError> {
        let index = self.index(position).ok_or(GridError::OutOfBounds {
            position,
            width: self.width,
            height: self.height,
        })?;
        let cell = &mut self.cells[index];
        if !cell.has_tile {
            self.occupied += 1;
        }
        *cell = Cell {
            has_tile: true,
            tile_type,
            last_updated_by: Some(player_id),
            last_updated_tick: Some(tick),
        };
        Ok(())
    }

    /// Copy the board into a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            width: self.width,
            height: self.height,
            cells: self.cells.clone(),
        }
    }

    /// Rebuild a board from a snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot dimensions are invalid or its cell list length
    /// does not equal `width * height`.
    pub fn from_snapshot(snapshot: BoardSnapshot) -> Result<Self, GridError> {
        let expected = Self::cell_count(snapshot.width, snapshot.height)?;
        if snapshot.cells.len() != expected {
            return Err(GridError::SnapshotSize {
                expected,
                actual: snapshot.cells.len(),
            });
        }
        let occupied = snapshot.cells.iter().filter(|c| c.has_tile).count();
        Ok(Self {
            width: snapshot.width,
            height: snapshot.height,
            cells: snapshot.cells,
            occupied,
        })
    }
}

/// Row-major copy of a board for replication to clients and replay storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Board width in cells.
    pub width: u32,
    /// Board height in cells.
    pub height: u32,
    /// Cells in row-major order.
    pub cells: Vec<Cell>,
}
