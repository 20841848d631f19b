//! Core types for the chess engine.
//!
//! This module provides unified types that integrate seamlessly with:
//! - `chess` crate (move generation)
//! - `nnue` crate (evaluation)
//!
//! # Design Principles
//! - Re-export chess crate types as the canonical source for board/move types
//! - Provide conversion traits to bridge with nnue types
//! - Define engine-specific types (Score, Depth, etc.) optimized for search

mod score;
mod depth;
mod convert;

// Re-export our custom types
pub use score::{Score, SCORE_INFINITY, SCORE_MATE, SCORE_DRAW, SCORE_NONE};
pub use depth::{Depth, Ply, MAX_DEPTH, MAX_PLY};
pub use convert::ToNnue;

// Re-export chess crate types as canonical types
// This gives us a single source of truth and avoids confusion
pub use chess::{
    Board,
    ChessMove as Move,
    Square,
    Piece,
    Color,
    BitBoard,
    File,
    Rank,
    CastleRights,
    MoveGen,
    BoardStatus,
    ALL_SQUARES,
    EMPTY,
};

/// Type alias for the legal-move iterator handed out by the `chess` crate.
pub type MoveList = chess::MoveGen;

/// Fixed-capacity, non-allocating move buffer used by the move picker.
/// 218 is the highest known legal move count for a reachable chess position;
/// ordinary positions (usually under 40 moves) never spill to the heap.
pub type MoveVec = smallvec::SmallVec<[Move; 218]>;

/// Zobrist hash type (used for transposition table)
pub type Hash = u64;

/// Node count type
pub type NodeCount = u64;

/// Centipawn value type (for piece values, etc.)
pub type Value = i32;

// Piece values in centipawns (standard values)
pub const PAWN_VALUE: Value = 100;
pub const KNIGHT_VALUE: Value = 320;
pub const BISHOP_VALUE: Value = 330;
pub const ROOK_VALUE: Value = 500;
pub const QUEEN_VALUE: Value = 900;
pub const KING_VALUE: Value = 20000; // Arbitrary large value

/// Get the material value of a piece in centipawns
#[inline]
pub const fn piece_value(piece: Piece) -> Value {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => KING_VALUE,
    }
}

/// Whether `color` has any piece other than pawns and king — used to gate
/// null-move pruning, which is unsound in pure king-and-pawn ("zugzwang")
/// positions.
#[inline]
pub fn has_non_pawn_material(board: &Board, color: Color) -> bool {
    let side = board.color_combined(color);
    let pawns_and_king = board.pieces(Piece::Pawn) | board.pieces(Piece::King);
    (*side & !pawns_and_king) != EMPTY
}

/// Whether a move is a capture: the destination square is occupied, or it is
/// an en-passant capture (destination empty but matches the board's ep
/// target and the moving piece is a pawn leaving its file).
#[inline]
pub fn is_capture(board: &Board, m: Move) -> bool {
    board.piece_on(m.get_dest()).is_some() || is_en_passant(board, m)
}

#[inline]
pub fn is_en_passant(board: &Board, m: Move) -> bool {
    board.piece_on(m.get_source()) == Some(Piece::Pawn)
        && board.en_passant() == Some(m.get_dest())
        && m.get_source().get_file() != m.get_dest().get_file()
}

#[inline]
pub fn is_promotion(m: Move) -> bool {
    m.get_promotion().is_some()
}
