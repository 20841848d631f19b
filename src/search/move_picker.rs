//! Staged move generation and ordering (C3).
//!
//! Replaces the single-pass `order_moves`/`order_captures` helpers that
//! used to live in `ordering.rs` with a staged picker: the TT move is tried
//! before anything else is even generated, captures are tried in
//! SEE/history order ahead of quiets, and quiets are tried in history order
//! ahead of the captures SEE judged bad. Scoring happens once, eagerly, in
//! the constructor — the board and history tables are only borrowed for
//! that instant, so nothing here outlives the call and holds the search
//! stack's mutable structures borrowed while the caller recurses.

use crate::search::countermove::CounterMoveTable;
use crate::search::history::{ButterflyHistory, CaptureHistory, ContinuationHistory};
use crate::search::killers::KillerTable;
use crate::search::see;
use crate::types::{is_capture, is_promotion, Board, Move, MoveGen, MoveVec, Piece, Ply};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    TranspositionMove,
    GoodCapture,
    Refutation,
    Quiet,
    BadCapture,
    Evasion,
    Probcut,
    QCapture,
    Done,
}

#[derive(Clone, Copy)]
struct ScoredMove {
    mv: Move,
    score: i32,
}

/// `partial_insertion_sort`: sorts the prefix of `moves` whose score is at
/// least `limit` into descending order; anything below `limit` is left in
/// whatever order it ended up in. Picking incrementally from the front
/// therefore yields strictly descending scores until the caller runs out of
/// moves worth bothering to sort.
fn partial_insertion_sort(moves: &mut [ScoredMove], limit: i32) {
    for i in 1..moves.len() {
        if moves[i].score >= limit {
            let tmp = moves[i];
            let mut j = i;
            while j > 0 && moves[j - 1].score < tmp.score {
                moves[j] = moves[j - 1];
                j -= 1;
            }
            moves[j] = tmp;
        }
    }
}

/// Continuation history lookups for the moves 1, 2, 3, 5 and 7 plies back,
/// passed in by the caller since only the search stack knows them. Borrowed
/// only for the scoring pass inside the constructor.
#[derive(Clone, Copy, Default)]
pub struct ContinuationContext<'a> {
    pub ply_minus_1: Option<(&'a ContinuationHistory, Piece, usize)>,
    pub ply_minus_2: Option<(&'a ContinuationHistory, Piece, usize)>,
    pub ply_minus_3: Option<(&'a ContinuationHistory, Piece, usize)>,
    pub ply_minus_5: Option<(&'a ContinuationHistory, Piece, usize)>,
    pub ply_minus_7: Option<(&'a ContinuationHistory, Piece, usize)>,
}

fn score_capture(board: &Board, capture_history: &CaptureHistory, m: Move) -> i32 {
    let attacker = board.piece_on(m.get_source()).unwrap_or(Piece::Pawn);
    let to = m.get_dest().to_index();
    let captured = board.piece_on(m.get_dest()).unwrap_or(Piece::Pawn);
    let promo_bonus = if is_promotion(m) { 20_000 } else { 0 };
    capture_history.get(attacker, to, captured) + promo_bonus
}

fn score_quiet(
    board: &Board,
    history: &ButterflyHistory,
    continuation: &ContinuationContext,
    m: Move,
) -> i32 {
    let color = board.side_to_move();
    let mut score = history.get(color, m);
    let piece = board.piece_on(m.get_source()).unwrap_or(Piece::Pawn);
    let to = m.get_dest().to_index();
    // Weighted 2*CH1 + CH2 + CH3 + CH5 + CH7: countering the opponent's last
    // move counts double, the rest count once.
    if let Some((ch, prev_piece, prev_to)) = continuation.ply_minus_1 {
        score += 2 * ch.table(prev_piece, prev_to).get(piece, to);
    }
    if let Some((ch, prev_piece, prev_to)) = continuation.ply_minus_2 {
        score += ch.table(prev_piece, prev_to).get(piece, to);
    }
    if let Some((ch, prev_piece, prev_to)) = continuation.ply_minus_3 {
        score += ch.table(prev_piece, prev_to).get(piece, to);
    }
    if let Some((ch, prev_piece, prev_to)) = continuation.ply_minus_5 {
        score += ch.table(prev_piece, prev_to).get(piece, to);
    }
    if let Some((ch, prev_piece, prev_to)) = continuation.ply_minus_7 {
        score += ch.table(prev_piece, prev_to).get(piece, to);
    }
    score
}

pub struct MovePicker {
    board: Board,
    tt_move: Option<Move>,
    killers: [Option<Move>; 2],
    countermove: Option<Move>,

    stage: Stage,
    captures: Vec<ScoredMove>,
    quiets: Vec<ScoredMove>,
    bad_captures: Vec<ScoredMove>,
    cursor: usize,
    refutation_idx: usize,
}

impl MovePicker {
    pub fn new_main(
        board: &Board,
        tt_move: Option<Move>,
        ply: Ply,
        killer_table: &KillerTable,
        countermove_table: &CounterMoveTable,
        previous_move: Option<Move>,
        history: &ButterflyHistory,
        capture_history: &CaptureHistory,
        continuation: ContinuationContext,
    ) -> Self {
        let tt_move = tt_move.filter(|m| board.legal(*m));
        let countermove = previous_move.and_then(|m| countermove_table.get(m));
        let killers = killer_table.get(ply);

        let mut captures = Vec::new();
        let mut quiets = Vec::new();
        for m in MoveGen::new_legal(board) {
            if Some(m) == tt_move {
                continue;
            }
            if is_capture(board, m) {
                captures.push(ScoredMove {
                    mv: m,
                    score: score_capture(board, capture_history, m),
                });
                continue;
            }
            if killers.contains(&Some(m)) || Some(m) == countermove {
                continue;
            }
            quiets.push(ScoredMove {
                mv: m,
                score: score_quiet(board, history, &continuation, m),
            });
        }
        captures.sort_by(|a, b| b.score.cmp(&a.score));
        quiets.sort_by(|a, b| b.score.cmp(&a.score));

        Self {
            board: *board,
            tt_move,
            killers,
            countermove,
            stage: Stage::TranspositionMove,
            captures,
            quiets,
            bad_captures: Vec::new(),
            cursor: 0,
            refutation_idx: 0,
        }
    }

    pub fn new_evasion(
        board: &Board,
        tt_move: Option<Move>,
        history: &ButterflyHistory,
        capture_history: &CaptureHistory,
    ) -> Self {
        let tt_move = tt_move.filter(|m| board.legal(*m));
        let continuation = ContinuationContext::default();
        let mut captures = Vec::new();
        for m in MoveGen::new_legal(board) {
            if Some(m) == tt_move {
                continue;
            }
            let score = if is_capture(board, m) {
                score_capture(board, capture_history, m) + 1_000_000
            } else {
                score_quiet(board, history, &continuation, m)
            };
            captures.push(ScoredMove { mv: m, score });
        }
        captures.sort_by(|a, b| b.score.cmp(&a.score));

        Self {
            board: *board,
            tt_move,
            killers: [None, None],
            countermove: None,
            stage: Stage::TranspositionMove,
            captures,
            quiets: Vec::new(),
            bad_captures: Vec::new(),
            cursor: 0,
            refutation_idx: 0,
        }
    }

    pub fn new_quiescence(board: &Board, tt_move: Option<Move>, capture_history: &CaptureHistory) -> Self {
        let tt_move = tt_move.filter(|m| board.legal(*m) && is_capture(board, *m));
        let mut captures = Vec::new();
        for m in MoveGen::new_legal(board) {
            if Some(m) == tt_move || !is_capture(board, m) {
                continue;
            }
            captures.push(ScoredMove {
                mv: m,
                score: score_capture(board, capture_history, m),
            });
        }
        captures.sort_by(|a, b| b.score.cmp(&a.score));

        Self {
            board: *board,
            tt_move,
            killers: [None, None],
            countermove: None,
            stage: Stage::TranspositionMove,
            captures,
            quiets: Vec::new(),
            bad_captures: Vec::new(),
            cursor: 0,
            refutation_idx: 0,
        }
    }

    pub fn new_probcut(
        board: &Board,
        tt_move: Option<Move>,
        threshold: i32,
        capture_history: &CaptureHistory,
    ) -> Self {
        let tt_move = tt_move.filter(|m| board.legal(*m) && is_capture(board, *m));
        let mut captures = Vec::new();
        for m in MoveGen::new_legal(board) {
            if Some(m) == tt_move || !is_capture(board, m) || see::see(board, m) < threshold {
                continue;
            }
            captures.push(ScoredMove {
                mv: m,
                score: score_capture(board, capture_history, m),
            });
        }
        captures.sort_by(|a, b| b.score.cmp(&a.score));

        Self {
            board: *board,
            tt_move,
            killers: [None, None],
            countermove: None,
            stage: Stage::TranspositionMove,
            captures,
            quiets: Vec::new(),
            bad_captures: Vec::new(),
            cursor: 0,
            refutation_idx: 0,
        }
    }

    fn next_from(list: &mut Vec<ScoredMove>, cursor: &mut usize) -> Option<Move> {
        if *cursor >= list.len() {
            return None;
        }
        partial_insertion_sort(&mut list[*cursor..], i32::MIN);
        let mv = list[*cursor].mv;
        *cursor += 1;
        Some(mv)
    }

    /// Return the next move to try, or `None` once every stage is exhausted.
    pub fn next(&mut self) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TranspositionMove => {
                    self.stage = Stage::GoodCapture;
                    if let Some(m) = self.tt_move {
                        return Some(m);
                    }
                }
                Stage::GoodCapture => {
                    while self.cursor < self.captures.len() {
                        let entry = self.captures[self.cursor];
                        self.cursor += 1;
                        if see::is_good_capture(&self.board, entry.mv) {
                            return Some(entry.mv);
                        }
                        self.bad_captures.push(entry);
                    }
                    self.stage = Stage::Refutation;
                    self.refutation_idx = 0;
                }
                Stage::Refutation => {
                    let candidates = [self.killers[0], self.killers[1], self.countermove];
                    while self.refutation_idx < candidates.len() {
                        let cand = candidates[self.refutation_idx];
                        self.refutation_idx += 1;
                        if let Some(m) = cand {
                            if Some(m) != self.tt_move
                                && self.board.legal(m)
                                && !is_capture(&self.board, m)
                            {
                                return Some(m);
                            }
                        }
                    }
                    self.stage = Stage::Quiet;
                    self.cursor = 0;
                }
                Stage::Quiet => {
                    if let Some(m) = Self::next_from(&mut self.quiets, &mut self.cursor) {
                        return Some(m);
                    }
                    self.stage = Stage::BadCapture;
                    self.cursor = 0;
                }
                Stage::BadCapture => {
                    if let Some(m) = Self::next_from(&mut self.bad_captures, &mut self.cursor) {
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Evasion => {
                    if let Some(m) = Self::next_from(&mut self.captures, &mut self.cursor) {
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Probcut => {
                    if let Some(m) = Self::next_from(&mut self.captures, &mut self.cursor) {
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }
                Stage::QCapture => {
                    if let Some(m) = Self::next_from(&mut self.captures, &mut self.cursor) {
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    /// Collect every remaining move into a plain buffer; used by callers
    /// (perft, root move enumeration) that want the full legal move set
    /// rather than staged consumption.
    pub fn collect_remaining(mut self) -> MoveVec {
        let mut out = MoveVec::new();
        while let Some(m) = self.next() {
            out.push(m);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::countermove::CounterMoveTable;
    use crate::search::killers::KillerTable;

    #[test]
    fn tt_move_comes_first() {
        let board = Board::default();
        let tt_mv = Move::new(chess::Square::E2, chess::Square::E4, None);
        let history = ButterflyHistory::new();
        let cap_history = CaptureHistory::new();
        let killers = KillerTable::new();
        let counters = CounterMoveTable::new();

        let mut picker = MovePicker::new_main(
            &board,
            Some(tt_mv),
            Ply::ZERO,
            &killers,
            &counters,
            None,
            &history,
            &cap_history,
            ContinuationContext::default(),
        );
        assert_eq!(picker.next(), Some(tt_mv));
    }

    #[test]
    fn main_picker_eventually_exhausts_all_legal_moves() {
        let board = Board::default();
        let history = ButterflyHistory::new();
        let cap_history = CaptureHistory::new();
        let killers = KillerTable::new();
        let counters = CounterMoveTable::new();

        let picker = MovePicker::new_main(
            &board,
            None,
            Ply::ZERO,
            &killers,
            &counters,
            None,
            &history,
            &cap_history,
            ContinuationContext::default(),
        );
        let moves = picker.collect_remaining();
        assert_eq!(moves.len(), MoveGen::new_legal(&board).len());
    }

    #[test]
    fn quiescence_picker_only_yields_captures() {
        // Reached via 1.e4 d5: several captures are available here.
        let board = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2"
            .parse::<Board>()
            .unwrap();
        let cap_history = CaptureHistory::new();
        let mut picker = MovePicker::new_quiescence(&board, None, &cap_history);
        while let Some(m) = picker.next() {
            assert!(is_capture(&board, m));
        }
    }

    #[test]
    fn en_passant_capture_is_generated_in_every_capture_stage() {
        // 1.e4 a6 2.e5 d5: white's e5 pawn may capture d5 en passant onto d6,
        // a destination square that is itself empty.
        let board: Board = "rnbqkbnr/1ppppppp/p7/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3"
            .parse()
            .unwrap();
        let ep_move = Move::new(chess::Square::E5, chess::Square::D6, None);
        assert!(is_capture(&board, ep_move));

        let cap_history = CaptureHistory::new();
        let quiescence_moves =
            MovePicker::new_quiescence(&board, None, &cap_history).collect_remaining();
        assert!(quiescence_moves.contains(&ep_move));

        let history = ButterflyHistory::new();
        let killers = KillerTable::new();
        let counters = CounterMoveTable::new();
        let main_moves = MovePicker::new_main(
            &board,
            None,
            Ply::ZERO,
            &killers,
            &counters,
            None,
            &history,
            &cap_history,
            ContinuationContext::default(),
        )
        .collect_remaining();
        assert!(main_moves.contains(&ep_move));
    }
}
