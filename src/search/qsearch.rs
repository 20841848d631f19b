//! Quiescence search (C4): search captures (and, in check, every evasion)
//! until the position is "quiet", so the main search never stops mid-
//! exchange and misjudges a position where material is about to change
//! hands.
//!
//! Generic over `NodeType` purely so PV bookkeeping compiles away to
//! nothing off the principal variation, matching the rest of the search.

use super::history::CaptureHistory;
use super::move_picker::MovePicker;
use super::node_types::NodeType;
use super::tt::BoundType;
use super::SharedState;
use crate::eval;
use crate::position::Position;
use crate::types::{is_capture, is_promotion, Depth, Piece, Ply, Score, MAX_PLY};

/// Max additional plies quiescence will dive past the main search's nominal
/// depth 0 (tracked by the `qply` counter threaded through every recursive
/// call, starting at 0 on entry from the main search) before giving up and
/// returning the stand-pat score outright.
const QS_MAX_ADDITIONAL_PLY: i32 = 32;

pub struct QSearchResult {
    pub score: Score,
    pub best_move: Option<crate::types::Move>,
}

pub fn quiescence<NT: NodeType>(
    shared: &SharedState,
    capture_history: &CaptureHistory,
    pos: &mut Position,
    ply: Ply,
    mut alpha: Score,
    beta: Score,
    qply: i32,
) -> QSearchResult {
    shared.note_node();

    if ply.raw() >= MAX_PLY - 1 || qply >= QS_MAX_ADDITIONAL_PLY {
        return QSearchResult {
            score: eval::evaluate(pos.board()),
            best_move: None,
        };
    }

    let hash = pos.hash();
    let in_check = pos.in_check();
    let orig_alpha = alpha;

    let tt_entry = shared.tt.probe(hash);
    let tt_move = tt_entry.and_then(|e| e.best_move());
    if let Some(entry) = tt_entry {
        let tt_score = entry.score().from_tt(ply.raw());
        match entry.bound() {
            BoundType::Exact => {
                return QSearchResult {
                    score: tt_score,
                    best_move: tt_move,
                };
            }
            BoundType::LowerBound if tt_score >= beta => {
                return QSearchResult {
                    score: tt_score,
                    best_move: tt_move,
                };
            }
            BoundType::UpperBound if tt_score <= alpha => {
                return QSearchResult {
                    score: tt_score,
                    best_move: tt_move,
                };
            }
            _ => {}
        }
    }

    let stand_pat = if in_check {
        // No stand-pat while in check: every evasion must be tried, since a
        // king in check cannot simply decline to move.
        Score::mated_in(ply.raw())
    } else {
        eval::evaluate(pos.board())
    };

    if !in_check {
        if stand_pat >= beta {
            if tt_entry.is_none() {
                shared
                    .tt
                    .store(hash, None, stand_pat.to_tt(ply.raw()), stand_pat, Depth::QS, BoundType::LowerBound);
            }
            return QSearchResult {
                score: stand_pat,
                best_move: None,
            };
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
    }

    const DELTA_MARGIN: i32 = 975; // queen value + buffer
    const DELTA_SAFETY: i32 = 100;

    let mut picker = if in_check {
        MovePicker::new_evasion(pos.board(), tt_move, &EMPTY_HISTORY, capture_history)
    } else {
        MovePicker::new_quiescence(pos.board(), tt_move, capture_history)
    };

    let mut best_score = stand_pat;
    let mut best_move = None;
    let mut legal_moves = 0;

    while let Some(m) = picker.next() {
        legal_moves += 1;

        if !in_check {
            let captured_value = pos
                .board()
                .piece_on(m.get_dest())
                .map(crate::types::piece_value)
                .unwrap_or(0);

            if !is_promotion(m) && stand_pat.raw() + captured_value + DELTA_SAFETY < alpha.raw() {
                continue;
            }
            if stand_pat.raw() + DELTA_MARGIN < alpha.raw() && !is_capture(pos.board(), m) {
                continue;
            }
            if !super::see::see_ge(pos.board(), m, 0) {
                continue;
            }
        }

        pos.make_move(m);
        let child = quiescence::<NT::Next>(
            shared,
            capture_history,
            pos,
            ply.next(),
            -beta,
            -alpha,
            qply + 1,
        );
        pos.unmake_move();

        let score = -child.score;
        if score > best_score {
            best_score = score;
            best_move = Some(m);
            if score > alpha {
                alpha = score;
                if score >= beta {
                    break;
                }
            }
        }
    }

    if in_check && legal_moves == 0 {
        return QSearchResult {
            score: Score::mated_in(ply.raw()),
            best_move: None,
        };
    }

    let bound = if best_score >= beta {
        BoundType::LowerBound
    } else if best_score > orig_alpha {
        BoundType::Exact
    } else {
        BoundType::UpperBound
    };
    shared.tt.store(
        hash,
        best_move,
        best_score.to_tt(ply.raw()),
        stand_pat,
        Depth::QS,
        bound,
    );

    QSearchResult {
        score: best_score,
        best_move,
    }
}

use crate::search::history::ButterflyHistory;
use once_cell::sync::Lazy;
static EMPTY_HISTORY: Lazy<ButterflyHistory> = Lazy::new(ButterflyHistory::new);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::node_types::OffPV;
    use chess::Board;

    fn shared_for_test() -> SharedState {
        SharedState::new(1)
    }

    #[test]
    fn quiet_starting_position_returns_stand_pat() {
        let shared = shared_for_test();
        let cap_history = CaptureHistory::new();
        let mut pos = Position::new(Board::default());
        let result = quiescence::<OffPV>(
            &shared,
            &cap_history,
            &mut pos,
            Ply::ZERO,
            Score::neg_infinity(),
            Score::infinity(),
            0,
        );
        assert!(result.score.raw().abs() < 50);
    }

    #[test]
    fn hanging_queen_capture_is_found() {
        let shared = shared_for_test();
        let cap_history = CaptureHistory::new();
        // Black queen hangs on d5 to White's queen on d1.
        let board: Board = "rnb1kbnr/ppp1pppp/8/3q4/8/8/PPPPQPPP/RNB1KBNR w KQkq - 2 3"
            .parse()
            .unwrap();
        let mut pos = Position::new(board);
        let result = quiescence::<OffPV>(
            &shared,
            &cap_history,
            &mut pos,
            Ply::ZERO,
            Score::neg_infinity(),
            Score::infinity(),
            0,
        );
        assert!(result.score.raw() > 500);
    }

    #[test]
    fn qply_cap_returns_stand_pat_without_recursing() {
        let shared = shared_for_test();
        let cap_history = CaptureHistory::new();
        // Same hanging-queen position as above, but entered at the recursion
        // cap: the capture must not be searched, so the score is the stand-pat
        // (material-down) evaluation rather than the queen-win score.
        let board: Board = "rnb1kbnr/ppp1pppp/8/3q4/8/8/PPPPQPPP/RNB1KBNR w KQkq - 2 3"
            .parse()
            .unwrap();
        let mut pos = Position::new(board);
        let result = quiescence::<OffPV>(
            &shared,
            &cap_history,
            &mut pos,
            Ply::ZERO,
            Score::neg_infinity(),
            Score::infinity(),
            QS_MAX_ADDITIONAL_PLY,
        );
        assert!(result.best_move.is_none());
        assert_eq!(result.score, eval::evaluate(pos.board()));
    }
}
