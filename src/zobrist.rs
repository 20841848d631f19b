//! Zobrist key tables (C9).
//!
//! A fixed, deterministic table of 64-bit keys generated once at process
//! start: 12×64 piece-square keys, 4 castling-right keys, 8 en-passant file
//! keys, and 1 side-to-move key. The position hash is the XOR of the keys
//! for everything currently true about a position. Keyed from a fixed seed
//! (not `rand`) so the hash space is reproducible across builds and runs —
//! unlike the opening book's Polyglot keying (`book::zobrist`), which must
//! match a published external format instead.

use crate::types::{CastleRights, Color, Piece, Square};
use once_cell::sync::Lazy;

pub static KEYS: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::generate);

const SEED: u64 = 0x9E3779B97F4A7C15;

/// xorshift-style splitmix64 stream; deterministic, no external RNG crate
/// needed for a table that must stay identical across builds.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

pub struct ZobristKeys {
    /// Indexed `[color_index][piece_index][square_index]`.
    piece_square: [[[u64; 64]; 6]; 2],
    /// 0 = White kingside, 1 = White queenside, 2 = Black kingside, 3 = Black queenside.
    castling: [u64; 4],
    /// Indexed by file (0-7).
    en_passant: [u64; 8],
    side_to_move: u64,
}

impl ZobristKeys {
    fn generate() -> Self {
        let mut rng = SplitMix64(SEED);
        let mut piece_square = [[[0u64; 64]; 6]; 2];
        for color in piece_square.iter_mut() {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.next();
                }
            }
        }
        let mut castling = [0u64; 4];
        for k in castling.iter_mut() {
            *k = rng.next();
        }
        let mut en_passant = [0u64; 8];
        for k in en_passant.iter_mut() {
            *k = rng.next();
        }
        let side_to_move = rng.next();
        ZobristKeys {
            piece_square,
            castling,
            en_passant,
            side_to_move,
        }
    }

    #[inline]
    pub fn piece_square_key(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.piece_square[color.to_index()][piece.to_index()][sq.to_index()]
    }

    #[inline]
    pub fn castle_key(&self, color: Color, kingside: bool) -> u64 {
        let base = if color == Color::White { 0 } else { 2 };
        self.castling[base + if kingside { 0 } else { 1 }]
    }

    #[inline]
    pub fn ep_key(&self, file_index: usize) -> u64 {
        self.en_passant[file_index]
    }

    #[inline]
    pub fn side_key(&self) -> u64 {
        self.side_to_move
    }
}

/// Decompose a `CastleRights` value into (has_kingside, has_queenside).
#[inline]
pub fn castle_bits(cr: CastleRights) -> (bool, bool) {
    match cr {
        CastleRights::NoRights => (false, false),
        CastleRights::KingSide => (true, false),
        CastleRights::QueenSide => (false, true),
        CastleRights::Both => (true, true),
    }
}

/// Full scratch recomputation of a position's hash, independent of any
/// incremental bookkeeping. Used to validate the incremental hash in debug
/// builds and in tests (`incremental_hash == scratch_recompute()`).
pub fn compute_hash(board: &chess::Board) -> u64 {
    let mut hash = 0u64;
    for sq in chess::ALL_SQUARES {
        if let Some(piece) = board.piece_on(sq) {
            let color = board.color_on(sq).expect("occupied square has a color");
            hash ^= KEYS.piece_square_key(color, piece, sq);
        }
    }
    for &color in &[Color::White, Color::Black] {
        let (ks, qs) = castle_bits(board.castle_rights(color));
        if ks {
            hash ^= KEYS.castle_key(color, true);
        }
        if qs {
            hash ^= KEYS.castle_key(color, false);
        }
    }
    if let Some(ep) = board.en_passant() {
        hash ^= KEYS.ep_key(ep.get_file().to_index());
    }
    if board.side_to_move() == Color::Black {
        hash ^= KEYS.side_key();
    }
    hash
}

/// Scratch recomputation of the pawn-only hash (used by pawn-structure eval
/// caching, not currently consulted by the core search loop but kept
/// alongside the full hash, for pawn-structure cache lookups).
pub fn compute_pawn_hash(board: &chess::Board) -> u64 {
    let mut hash = 0u64;
    let pawns = board.pieces(Piece::Pawn);
    for sq in *pawns {
        let color = board.color_on(sq).expect("occupied square has a color");
        hash ^= KEYS.piece_square_key(color, Piece::Pawn, sq);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Board;

    #[test]
    fn starting_position_hash_is_deterministic() {
        let a = compute_hash(&Board::default());
        let b = compute_hash(&Board::default());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_positions_hash_differently() {
        let start = Board::default();
        let after_e4 = start.make_move_new(
            chess::ChessMove::new(chess::Square::E2, chess::Square::E4, None),
        );
        assert_ne!(compute_hash(&start), compute_hash(&after_e4));
    }

    #[test]
    fn side_key_is_well_defined_and_nonzero() {
        // The side-to-move key must actually participate in the hash, or
        // mirrored positions with the wrong side to move would collide.
        assert_ne!(KEYS.side_key(), 0);
    }

    #[test]
    fn pawn_hash_ignores_non_pawn_pieces() {
        let start = Board::default();
        let after_nf3 = start.make_move_new(
            chess::ChessMove::new(chess::Square::G1, chess::Square::F3, None),
        );
        // Knight move touches no pawns, so the pawn-only hash is unchanged.
        assert_eq!(compute_pawn_hash(&start), compute_pawn_hash(&after_nf3));
    }
}
