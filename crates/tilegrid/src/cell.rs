//! Board cell contents and provenance.

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// One cell of the board.
///
/// `tile_type` is only meaningful while `has_tile` is set; use
/// [`Cell::effective_tile_type`] to read it without checking both fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Whether a tile occupies this cell.
    pub has_tile: bool,
    /// The tile type, valid only when `has_tile` is true.
    pub tile_type: u32,
    /// The player who last wrote this cell.
    pub last_updated_by: Option<PlayerId>,
    /// The tick of the last write to this cell.
    pub last_updated_tick: Option<u64>,
}

impl Cell {
    /// Returns the tile type, or `None` for an empty cell.
    #[must_use]
    pub fn effective_tile_type(&self) -> Option<u32> {
        self.has_tile.then_some(self.tile_type)
    }

    /// Returns true if no tile occupies this cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_tile
    }
}
