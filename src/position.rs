//! `Position`: a search-mutable wrapper around the immutable `chess::Board`
//! (C9's incremental hash maintenance, plus the per-ply state stack from the
//! the move-generation data model).
//!
//! `chess::Board` is `Copy` and has no make/unmake pair — `make_move_new`
//! returns a fresh value. Rather than fight that, `Position` keeps a stack of
//! `StateRecord`s: "make" pushes the current board/hash and computes the
//! child's hash by diffing against the board before the move (XOR only the
//! squares that changed), "unmake" pops back to the parent. See DESIGN.md,
//! Open Question (a).

use crate::types::{Board, CastleRights, Color, Move, Piece, Score, Square};
use crate::zobrist::{self, KEYS};

/// One frame per ply of search recursion: the
/// board reached at this ply, the move that reached it, pruning/extension
/// bookkeeping (excluded move, move count), and a static-eval cache.
#[derive(Clone)]
pub struct StateRecord {
    pub board: Board,
    pub hash: u64,
    pub pawn_hash: u64,
    pub halfmove_clock: u32,
    /// The move that reached this ply, or `None` for the root frame or a
    /// null-move frame.
    pub mv: Option<Move>,
    pub moved_piece: Option<Piece>,
    pub captured_piece: Option<Piece>,
    pub is_null: bool,
    pub static_eval: Option<Score>,
    pub excluded_move: Option<Move>,
    pub move_count: u32,
    pub tt_hit: bool,
}

impl StateRecord {
    fn root(board: Board, halfmove_clock: u32) -> Self {
        StateRecord {
            hash: zobrist::compute_hash(&board),
            pawn_hash: zobrist::compute_pawn_hash(&board),
            board,
            halfmove_clock,
            mv: None,
            moved_piece: None,
            captured_piece: None,
            is_null: false,
            static_eval: None,
            excluded_move: None,
            move_count: 0,
            tt_hit: false,
        }
    }
}

pub struct Position {
    stack: Vec<StateRecord>,
    /// Hashes of positions seen before the current search started (game
    /// history from `position ... moves ...`), oldest first. Used together
    /// with `stack` for repetition detection against positions outside the
    /// search tree.
    root_history: Vec<u64>,
}

impl Position {
    pub fn new(board: Board) -> Self {
        Position {
            stack: vec![StateRecord::root(board, 0)],
            root_history: Vec::new(),
        }
    }

    /// Record game history (hashes of all positions since the last
    /// irreversible move, inclusive of the current one) for threefold
    /// repetition detection that reaches outside the search tree, and seed
    /// the root's halfmove clock with the real count of reversible plies
    /// played before this search started (otherwise `is_repetition`'s scan
    /// into `root_history` never has anything to reach: a freshly built
    /// `Position` always starts its own clock at 0).
    pub fn set_root_history(&mut self, history: Vec<u64>, halfmove_clock: u32) {
        self.root_history = history;
        self.current_mut().halfmove_clock = halfmove_clock;
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.current().board
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.current().hash
    }

    #[inline]
    pub fn pawn_hash(&self) -> u64 {
        self.current().pawn_hash
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board().side_to_move()
    }

    #[inline]
    pub fn ply(&self) -> usize {
        self.stack.len() - 1
    }

    #[inline]
    fn current(&self) -> &StateRecord {
        self.stack.last().expect("root frame always present")
    }

    #[inline]
    fn current_mut(&mut self) -> &mut StateRecord {
        self.stack.last_mut().expect("root frame always present")
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        *self.board().checkers() != chess::EMPTY
    }

    /// Whether playing `mv` from the current position would leave the
    /// opponent in check, without mutating the position — used by the
    /// search to decide whether a move is tactical enough to exempt from
    /// reductions and pruning.
    #[inline]
    pub fn gives_check(&self, mv: Move) -> bool {
        *self.board().make_move_new(mv).checkers() != chess::EMPTY
    }

    #[inline]
    pub fn has_non_pawn_material(&self) -> bool {
        crate::types::has_non_pawn_material(self.board(), self.side_to_move())
    }

    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.current().halfmove_clock >= 100
    }

    pub fn set_static_eval(&mut self, score: Score) {
        self.current_mut().static_eval = Some(score);
    }

    pub fn static_eval(&self) -> Option<Score> {
        self.current().static_eval
    }

    /// Static eval `offset` plies back (for the "improving" flag: ply vs. ply-2).
    pub fn static_eval_at(&self, offset: usize) -> Option<Score> {
        let idx = self.stack.len().checked_sub(1 + offset)?;
        self.stack[idx].static_eval
    }

    pub fn set_excluded_move(&mut self, mv: Option<Move>) {
        self.current_mut().excluded_move = mv;
    }

    pub fn excluded_move(&self) -> Option<Move> {
        self.current().excluded_move
    }

    pub fn set_move_count(&mut self, n: u32) {
        self.current_mut().move_count = n;
    }

    pub fn set_tt_hit(&mut self, hit: bool) {
        self.current_mut().tt_hit = hit;
    }

    /// `(moved_piece, to_square)` reached `offset` plies back — the key used
    /// to index continuation history tables at ply-offsets {1,2,3,5,7}.
    pub fn continuation_key_at(&self, offset: usize) -> Option<(Piece, Square)> {
        let idx = self.stack.len().checked_sub(1 + offset)?;
        let rec = &self.stack[idx];
        if rec.is_null {
            return None;
        }
        let piece = rec.moved_piece?;
        let sq = rec.mv?.get_dest();
        Some((piece, sq))
    }

    /// The move that reached the previous ply (used for countermove lookup).
    pub fn previous_move(&self) -> Option<Move> {
        self.continuation_key_raw_move(1)
    }

    fn continuation_key_raw_move(&self, offset: usize) -> Option<Move> {
        let idx = self.stack.len().checked_sub(1 + offset)?;
        self.stack[idx].mv
    }

    /// Whether the previous ply was also a null move (null moves may not be
    /// chained back-to-back).
    pub fn last_move_was_null(&self) -> bool {
        self.stack.len() >= 2 && self.stack[self.stack.len() - 2].is_null
    }

    /// Twofold repetition inside the current search window, or threefold
    /// against game history before the search started. Stops scanning past
    /// the most recent irreversible move (capture or pawn push), since no
    /// position before that can recur.
    pub fn is_repetition(&self) -> bool {
        let current_hash = self.hash();
        let clock = self.current().halfmove_clock as usize;

        let mut occurrences_in_search = 0usize;
        let search_depth = self.stack.len().saturating_sub(1);
        let scan_back = clock.min(search_depth);
        for i in 1..=scan_back {
            let idx = self.stack.len() - 1 - i;
            if self.stack[idx].hash == current_hash {
                occurrences_in_search += 1;
                // Twofold inside the search tree is treated as a draw
                // immediately — no need to find a third occurrence, since
                // the search itself would otherwise loop forever down a
                // repeating line.
                return true;
            }
        }

        // Account for repetitions reaching back into pre-search game history.
        let remaining = clock.saturating_sub(scan_back);
        if remaining > 0 && !self.root_history.is_empty() {
            let hist_len = self.root_history.len();
            let take = remaining.min(hist_len);
            let mut total = occurrences_in_search;
            for i in 0..take {
                let idx = hist_len - 1 - i;
                if self.root_history[idx] == current_hash {
                    total += 1;
                }
            }
            if total >= 1 {
                return true;
            }
        }
        false
    }

    pub fn make_move(&mut self, mv: Move) {
        let before = self.current().board;
        let moving_color = before.side_to_move();
        let moving_piece = before
            .piece_on(mv.get_source())
            .expect("move source must be occupied");
        let is_ep = crate::types::is_en_passant(&before, mv);
        let captured_piece = if is_ep {
            Some(Piece::Pawn)
        } else {
            before.piece_on(mv.get_dest())
        };

        let mut hash = self.current().hash;
        let mut pawn_hash = self.current().pawn_hash;

        // Remove the mover from its origin square.
        hash ^= KEYS.piece_square_key(moving_color, moving_piece, mv.get_source());
        if moving_piece == Piece::Pawn {
            pawn_hash ^= KEYS.piece_square_key(moving_color, Piece::Pawn, mv.get_source());
        }

        // Remove a captured piece, if any (accounting for en passant, whose
        // captured pawn does not sit on the destination square).
        if let Some(cap) = captured_piece {
            let cap_color = !moving_color;
            let cap_sq = if is_ep {
                ep_captured_square(mv.get_dest(), moving_color)
            } else {
                mv.get_dest()
            };
            hash ^= KEYS.piece_square_key(cap_color, cap, cap_sq);
            if cap == Piece::Pawn {
                pawn_hash ^= KEYS.piece_square_key(cap_color, Piece::Pawn, cap_sq);
            }
        }

        // Place the mover (or its promoted form) on the destination square.
        let final_piece = mv.get_promotion().unwrap_or(moving_piece);
        hash ^= KEYS.piece_square_key(moving_color, final_piece, mv.get_dest());
        if final_piece == Piece::Pawn {
            pawn_hash ^= KEYS.piece_square_key(moving_color, Piece::Pawn, mv.get_dest());
        }
        // A pawn that promotes stops being a pawn; if it had been counted in
        // the pawn hash at its origin we already removed it above, and it is
        // never added back since `final_piece != Pawn` in that branch.

        // Castling moves the rook too.
        if moving_piece == Piece::King {
            if let Some((rook_from, rook_to)) = castling_rook_squares(mv) {
                hash ^= KEYS.piece_square_key(moving_color, Piece::Rook, rook_from);
                hash ^= KEYS.piece_square_key(moving_color, Piece::Rook, rook_to);
            }
        }

        // Castling-rights changes.
        for &color in &[Color::White, Color::Black] {
            let (ks_before, qs_before) = zobrist::castle_bits(before.castle_rights(color));
            // `before` already reflects rights as of the position we're
            // leaving; the new board computed by `make_move_new` reflects
            // rights after. We need the post-move board to compare, so defer
            // this below once `after` is known.
            let _ = (ks_before, qs_before, color);
        }

        let after = before.make_move_new(mv);

        for &color in &[Color::White, Color::Black] {
            let (ks_before, qs_before) = zobrist::castle_bits(before.castle_rights(color));
            let (ks_after, qs_after) = zobrist::castle_bits(after.castle_rights(color));
            if ks_before != ks_after {
                hash ^= KEYS.castle_key(color, true);
            }
            if qs_before != qs_after {
                hash ^= KEYS.castle_key(color, false);
            }
        }

        // En-passant file key: out with the old, in with the new.
        if let Some(ep) = before.en_passant() {
            hash ^= KEYS.ep_key(ep.get_file().to_index());
        }
        if let Some(ep) = after.en_passant() {
            hash ^= KEYS.ep_key(ep.get_file().to_index());
        }

        hash ^= KEYS.side_key();

        let halfmove_clock = if moving_piece == Piece::Pawn || captured_piece.is_some() {
            0
        } else {
            self.current().halfmove_clock + 1
        };

        self.stack.push(StateRecord {
            board: after,
            hash,
            pawn_hash,
            halfmove_clock,
            mv: Some(mv),
            moved_piece: Some(moving_piece),
            captured_piece,
            is_null: false,
            static_eval: None,
            excluded_move: None,
            move_count: 0,
            tt_hit: false,
        });
    }

    pub fn unmake_move(&mut self) {
        debug_assert!(self.stack.len() > 1, "cannot unmake the root frame");
        self.stack.pop();
    }

    /// Make a null move: side to move passes, en passant is cleared. Must
    /// not be called while in check (the caller gates this, matching the
    /// null-move precondition).
    pub fn make_null_move(&mut self) {
        let before = self.current().board;
        let after = before
            .null_move()
            .expect("null move requires side to move not be in check");

        let mut hash = self.current().hash;
        if let Some(ep) = before.en_passant() {
            hash ^= KEYS.ep_key(ep.get_file().to_index());
        }
        hash ^= KEYS.side_key();

        self.stack.push(StateRecord {
            board: after,
            hash,
            pawn_hash: self.current().pawn_hash,
            halfmove_clock: self.current().halfmove_clock + 1,
            mv: None,
            moved_piece: None,
            captured_piece: None,
            is_null: true,
            static_eval: None,
            excluded_move: None,
            move_count: 0,
            tt_hit: false,
        });
    }

    pub fn unmake_null_move(&mut self) {
        debug_assert!(self.stack.len() > 1, "cannot unmake the root frame");
        debug_assert!(self.current().is_null, "unmake_null_move on a non-null frame");
        self.stack.pop();
    }

    /// Count leaf nodes `depth` plies from the current position (perft):
    /// exercises move generation, make/unmake, and hash maintenance all at
    /// once, since an incorrect one of the three throws the leaf count off
    /// from the published reference values. Bulk-counts at depth 1 rather
    /// than making and immediately unmaking every leaf move.
    pub fn perft(&mut self, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves: Vec<Move> = chess::MoveGen::new_legal(self.board()).collect();
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for mv in moves {
            self.make_move(mv);
            nodes += self.perft(depth - 1);
            self.unmake_move();
        }
        nodes
    }

    /// Per-root-move perft breakdown, for tracking down which branch a
    /// movegen bug is hiding in (`go perft N` in UCI, or standalone
    /// debugging).
    pub fn divide(&mut self, depth: u32) -> Vec<(Move, u64)> {
        let moves: Vec<Move> = chess::MoveGen::new_legal(self.board()).collect();
        moves
            .into_iter()
            .map(|mv| {
                self.make_move(mv);
                let count = self.perft(depth.saturating_sub(1));
                self.unmake_move();
                (mv, count)
            })
            .collect()
    }

    /// Debug-only invariant check: recompute the hash from scratch and
    /// compare against the incrementally maintained one.
    #[cfg(debug_assertions)]
    pub fn assert_hash_consistent(&self) {
        let recomputed = zobrist::compute_hash(self.board());
        debug_assert_eq!(
            self.hash(),
            recomputed,
            "incremental hash diverged from scratch recompute"
        );
    }
}

fn ep_captured_square(dest: Square, moving_color: Color) -> Square {
    use chess::{Rank, Square as Sq};
    let rank = if moving_color == Color::White {
        Rank::Fifth
    } else {
        Rank::Fourth
    };
    Sq::make_square(rank, dest.get_file())
}

/// Detects a castling move by the king-moving-two-files convention and
/// returns the rook's `(from, to)` squares if so.
fn castling_rook_squares(mv: Move) -> Option<(Square, Square)> {
    use chess::{File, Square as Sq};
    let from = mv.get_source();
    let to = mv.get_dest();
    if from.get_file() != File::E {
        return None;
    }
    let rank = from.get_rank();
    if to.get_file() == File::G {
        Some((Sq::make_square(rank, File::H), Sq::make_square(rank, File::F)))
    } else if to.get_file() == File::C {
        Some((Sq::make_square(rank, File::A), Sq::make_square(rank, File::D)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{Board, ChessMove, Square};

    #[test]
    fn make_unmake_restores_hash() {
        let mut pos = Position::new(Board::default());
        let before_hash = pos.hash();
        let mv = ChessMove::new(Square::E2, Square::E4, None);
        pos.make_move(mv);
        assert_ne!(pos.hash(), before_hash);
        pos.unmake_move();
        assert_eq!(pos.hash(), before_hash);
        assert_eq!(pos.hash(), zobrist::compute_hash(&Board::default()));
    }

    #[test]
    fn incremental_hash_matches_scratch_recompute() {
        let mut pos = Position::new(Board::default());
        for (from, to) in [
            (Square::E2, Square::E4),
            (Square::E7, Square::E5),
            (Square::G1, Square::F3),
            (Square::B8, Square::C6),
        ] {
            pos.make_move(ChessMove::new(from, to, None));
        }
        assert_eq!(pos.hash(), zobrist::compute_hash(pos.board()));
    }

    #[test]
    fn null_move_flips_side_and_is_reversible() {
        let mut pos = Position::new(Board::default());
        let before = pos.hash();
        let before_side = pos.side_to_move();
        pos.make_null_move();
        assert_ne!(pos.side_to_move(), before_side);
        pos.unmake_null_move();
        assert_eq!(pos.hash(), before);
    }

    #[test]
    fn fifty_move_clock_resets_on_capture() {
        // Scholar's-mate-adjacent sequence with a capture partway through.
        let mut pos = Position::new(Board::default());
        pos.make_move(ChessMove::new(Square::E2, Square::E4, None));
        pos.make_move(ChessMove::new(Square::D7, Square::D5, None));
        assert_eq!(pos.current().halfmove_clock, 0); // pawn moves reset it
        pos.make_move(ChessMove::new(Square::E4, Square::D5, None)); // capture
        assert_eq!(pos.current().halfmove_clock, 0);
    }

    #[test]
    fn no_repetition_at_start() {
        let pos = Position::new(Board::default());
        assert!(!pos.is_repetition());
    }

    #[test]
    fn game_history_repetition_is_detected_after_root_history_seeded() {
        // Knight shuffle (Nf3 Nf6 Ng1 Ng8) returns to the starting position,
        // exactly as UCI's `position startpos moves g1f3 g8f6 f3g1 f6g8`
        // would replay it before a search begins. `root_history` carries
        // these pre-search hashes and the clock must be seeded with the
        // real reversible-ply count, or the scan into `root_history` never
        // reaches far enough back to see it.
        let start = Board::default();
        let after_nf3 = start.make_move_new(ChessMove::new(Square::G1, Square::F3, None));
        let after_nf6 = after_nf3.make_move_new(ChessMove::new(Square::G8, Square::F6, None));
        let after_ng1 = after_nf6.make_move_new(ChessMove::new(Square::F3, Square::G1, None));
        let after_ng8 = after_ng1.make_move_new(ChessMove::new(Square::F6, Square::G8, None));

        let history = vec![
            zobrist::compute_hash(&start),
            zobrist::compute_hash(&after_nf3),
            zobrist::compute_hash(&after_nf6),
            zobrist::compute_hash(&after_ng1),
            zobrist::compute_hash(&after_ng8),
        ];

        let mut pos = Position::new(after_ng8);
        pos.set_root_history(history, 4);
        assert!(pos.is_repetition());
    }

    #[test]
    fn game_history_without_repetition_is_not_flagged() {
        let start = Board::default();
        let after_e4 = start.make_move_new(ChessMove::new(Square::E2, Square::E4, None));
        let history = vec![
            zobrist::compute_hash(&start),
            zobrist::compute_hash(&after_e4),
        ];
        let mut pos = Position::new(after_e4);
        pos.set_root_history(history, 0); // the pawn move reset the clock
        assert!(!pos.is_repetition());
    }

    #[test]
    fn perft_matches_published_counts_from_start_position() {
        let mut pos = Position::new(Board::default());
        assert_eq!(pos.perft(1), 20);
        assert_eq!(pos.perft(2), 400);
        assert_eq!(pos.perft(3), 8_902);
        assert_eq!(pos.perft(4), 197_281);
    }

    #[test]
    fn perft_matches_published_counts_from_kiwipete() {
        // The "Kiwipete" position, a standard perft stress test covering
        // castling, en passant, and promotions in one position.
        let board: Board =
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
                .parse()
                .unwrap();
        let mut pos = Position::new(board);
        assert_eq!(pos.perft(1), 48);
        assert_eq!(pos.perft(2), 2_039);
        assert_eq!(pos.perft(3), 97_862);
    }
}
