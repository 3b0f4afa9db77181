//! Board hashing for determinism verification.
//!
//! Two boards that received the same placements in the same order hash
//! identically. Replays compare these hashes instead of full snapshots.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::Board;

/// Compute a deterministic hash of board state.
///
/// Covers the dimensions and every cell (occupancy, tile type, provenance)
/// in row-major order.
#[must_use]
pub fn hash_board(board: &Board) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_board_into(board, &mut hasher);
    hasher.finish()
}

/// Feed board state into an existing hasher.
///
/// Used by callers that hash the board as one part of a larger state.
pub fn hash_board_into<H: Hasher>(board: &Board, hasher: &mut H) {
    board.width().hash(hasher);
    board.height().hash(hasher);
    for (_, cell) in board.cells() {
        cell.hash(hasher);
    }
}
