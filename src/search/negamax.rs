//! Negamax main search (C5): alpha-beta with the full pruning and
//! reduction suite described for the main search component — mate-distance
//! pruning, reverse futility / static null-move pruning, null-move pruning,
//! ProbCut, razoring, late move reductions, late move pruning, history and
//! SEE pruning, futility pruning, singular extensions, and principal
//! variation search. Generic over `NodeType` so `Root`/`OnPV`/`OffPV` nodes
//! compile to specialized code instead of branching on a runtime flag.

use super::move_picker::{ContinuationContext, MovePicker};
use super::node_types::NodeType;
use super::qsearch;
use super::threads::Worker;
use super::tt::BoundType;
use crate::eval;
use crate::position::Position;
use crate::types::{is_capture, is_promotion, Depth, Move, Piece, Ply, Score};

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub score: Score,
    pub pv: Vec<Move>,
}

impl SearchResult {
    fn leaf(score: Score) -> Self {
        Self {
            best_move: None,
            score,
            pv: Vec::new(),
        }
    }
}

const NULL_MOVE_MIN_DEPTH: i32 = 3;
const RFP_MAX_DEPTH: i32 = 7;
const RFP_MARGIN_PER_PLY: i32 = 75;
const RAZOR_MAX_DEPTH: i32 = 3;
const PROBCUT_MARGIN: i32 = 100;
const PROBCUT_MIN_DEPTH: i32 = 5;
const IID_MIN_DEPTH: i32 = 6;
const LMR_MIN_DEPTH: i32 = 3;
const LMR_MIN_MOVE_INDEX: usize = 2;
const FUTILITY_MARGIN_PER_PLY: i32 = 150;
const SINGULAR_MIN_DEPTH: i32 = 8;

/// Top-level entry point used by the iterative deepening driver. `ROOT`
/// is carried by `NT` so the root's extra bookkeeping (root move list,
/// excluded-move singular search) is compiled in only for the root node.
pub fn search<NT: NodeType>(
    worker: &mut Worker,
    pos: &mut Position,
    depth: Depth,
    ply: Ply,
    mut alpha: Score,
    mut beta: Score,
    allow_null: bool,
) -> SearchResult {
    worker.inc_node();
    worker.update_seldepth(ply);

    if depth.is_qs() {
        let qresult = qsearch::quiescence::<super::node_types::OffPV>(
            &worker.shared,
            &worker.capture_history,
            pos,
            ply,
            alpha,
            beta,
            0,
        );
        return SearchResult {
            best_move: qresult.best_move,
            score: qresult.score,
            pv: qresult.best_move.map(|m| vec![m]).unwrap_or_default(),
        };
    }

    if !NT::ROOT {
        if pos.is_repetition() || pos.is_fifty_move_draw() {
            return SearchResult::leaf(Score::draw());
        }

        // Mate distance pruning: no line through this node can beat a mate
        // already found closer to the root, nor lose slower than one.
        let mate_alpha = Score::mated_in(ply.raw()).max(alpha);
        let mate_beta = Score::mate_in(ply.raw() + 1).min(beta);
        if mate_alpha >= mate_beta {
            return SearchResult::leaf(mate_alpha);
        }
        alpha = mate_alpha;
        beta = mate_beta;
    }

    let hash = pos.hash();
    let in_check = pos.in_check();
    let orig_alpha = alpha;

    let mut tt_move: Option<Move> = None;
    if let Some(entry) = worker.shared.tt.probe(hash) {
        tt_move = entry.best_move();
        if !NT::PV && entry.depth() >= depth {
            let tt_score = entry.score().from_tt(ply.raw());
            match entry.bound() {
                BoundType::Exact => return SearchResult {
                    best_move: tt_move,
                    score: tt_score,
                    pv: tt_move.map(|m| vec![m]).unwrap_or_default(),
                },
                BoundType::LowerBound if tt_score >= beta => {
                    return SearchResult {
                        best_move: tt_move,
                        score: tt_score,
                        pv: tt_move.map(|m| vec![m]).unwrap_or_default(),
                    }
                }
                BoundType::UpperBound if tt_score <= alpha => {
                    return SearchResult {
                        best_move: tt_move,
                        score: tt_score,
                        pv: tt_move.map(|m| vec![m]).unwrap_or_default(),
                    }
                }
                _ => {}
            }
        }
    }

    if worker.should_stop() {
        return SearchResult::leaf(Score::draw());
    }

    let static_eval = if in_check {
        None
    } else {
        Some(eval::evaluate(pos.board()))
    };
    pos.set_static_eval(static_eval.unwrap_or(Score::draw()));

    // === Reverse futility / static null-move pruning ===
    if !NT::PV && !in_check && depth.raw() <= RFP_MAX_DEPTH {
        if let Some(eval) = static_eval {
            let margin = Score::cp(RFP_MARGIN_PER_PLY * depth.raw());
            if eval - margin >= beta && !beta.is_mate_score() {
                return SearchResult::leaf(eval - margin);
            }
        }
    }

    // === Null-move pruning ===
    if !NT::PV
        && allow_null
        && !in_check
        && depth.raw() >= NULL_MOVE_MIN_DEPTH
        && static_eval.map_or(false, |e| e >= beta)
        && pos.has_non_pawn_material()
    {
        let r = if depth.raw() > 6 { 5 } else { 4 };
        pos.make_null_move();
        let null_result = search::<super::node_types::OffPV>(
            worker,
            pos,
            Depth::new((depth.raw() - 1 - r).max(0)),
            ply.next(),
            -beta,
            -beta + Score::cp(1),
            false,
        );
        pos.unmake_null_move();

        if -null_result.score >= beta && !beta.is_mate_score() {
            return SearchResult::leaf(beta);
        }
    }

    // === ProbCut ===
    if !NT::PV
        && !in_check
        && depth.raw() >= PROBCUT_MIN_DEPTH
        && !beta.is_mate_score()
    {
        let probe_beta = beta + Score::cp(PROBCUT_MARGIN);
        let see_threshold = probe_beta.raw() - static_eval.unwrap_or(Score::draw()).raw();

        let mut picker = MovePicker::new_probcut(pos.board(), tt_move, see_threshold, &worker.capture_history);
        while let Some(m) = picker.next() {
            pos.make_move(m);
            let qresult = qsearch::quiescence::<super::node_types::OffPV>(
                &worker.shared,
                &worker.capture_history,
                pos,
                ply.next(),
                -probe_beta,
                -probe_beta + Score::cp(1),
                0,
            );
            let mut score = -qresult.score;
            if score >= probe_beta {
                let deep = search::<super::node_types::OffPV>(
                    worker,
                    pos,
                    Depth::new(depth.raw() - 4),
                    ply.next(),
                    -probe_beta,
                    -probe_beta + Score::cp(1),
                    true,
                );
                score = -deep.score;
            }
            pos.unmake_move();
            if score >= probe_beta {
                return SearchResult::leaf(score);
            }
        }
    }

    // === Internal iterative deepening ===
    if tt_move.is_none() && NT::PV && depth.raw() >= IID_MIN_DEPTH {
        let iid_result = search::<NT>(
            worker,
            pos,
            Depth::new(depth.raw() - 2),
            ply,
            alpha,
            beta,
            allow_null,
        );
        tt_move = iid_result.best_move;
    }

    // === Razoring ===
    if !NT::PV && !in_check && depth.raw() <= RAZOR_MAX_DEPTH {
        if let Some(eval) = static_eval {
            let threshold = alpha - Score::cp(200 + depth.raw() * 60);
            if eval < threshold {
                let qresult = qsearch::quiescence::<super::node_types::OffPV>(
                    &worker.shared,
                    &worker.capture_history,
                    pos,
                    ply,
                    alpha,
                    beta,
                    0,
                );
                if qresult.score < alpha {
                    return SearchResult {
                        best_move: qresult.best_move,
                        score: qresult.score,
                        pv: Vec::new(),
                    };
                }
            }
        }
    }

    let continuation = build_continuation_context(worker, pos);
    let mut picker = MovePicker::new_main(
        pos.board(),
        tt_move,
        ply,
        &worker.killers,
        &worker.countermoves,
        pos.previous_move(),
        &worker.history,
        &worker.capture_history,
        continuation,
    );

    let color = pos.side_to_move();
    let mut best_move = None;
    let mut best_score = Score::neg_infinity();
    let mut pv = Vec::new();
    let mut move_index = 0usize;
    let mut searched_quiets: Vec<Move> = Vec::with_capacity(32);
    let mut legal_moves = 0usize;

    while let Some(m) = picker.next() {
        if NT::ROOT && worker.is_excluded_root_move(m) {
            continue;
        }
        legal_moves += 1;

        let is_cap = is_capture(pos.board(), m);
        let is_quiet = !is_cap && !is_promotion(m);
        let gives_check = pos.gives_check(m);
        let is_killer = worker.killers.is_killer(ply, m);

        let extension = if in_check { 1 } else { 0 };

        // Singular extension: if the TT move is the only move that doesn't
        // immediately lose, extend it a ply rather than risk a tactic the
        // reduced search below would miss.
        if pos.excluded_move() == Some(m) {
            move_index += 1;
            continue;
        }

        let mut singular_extension = 0;
        if depth.raw() >= SINGULAR_MIN_DEPTH && Some(m) == tt_move && !NT::ROOT {
            if let Some(entry) = worker.shared.tt.probe(hash) {
                if entry.depth().raw() >= depth.raw() - 3 && entry.bound() != BoundType::UpperBound
                {
                    let singular_beta = entry.score().from_tt(ply.raw()).raw() - 2 * depth.raw();
                    pos.set_excluded_move(Some(m));
                    let verify = search::<super::node_types::OffPV>(
                        worker,
                        pos,
                        Depth::new((depth.raw() - 1) / 2),
                        ply,
                        Score::cp(singular_beta - 1),
                        Score::cp(singular_beta),
                        false,
                    );
                    pos.set_excluded_move(None);
                    if verify.score.raw() < singular_beta {
                        singular_extension = 1;
                    }
                }
            }
        }

        if !NT::PV
            && !in_check
            && !gives_check
            && is_quiet
            && move_index > 0
        {
            // History pruning: quiet moves with a long record of failing at
            // shallow depth are cut without a search.
            if depth.raw() < 4 && worker.history.get(color, m) < -3000 * depth.raw() {
                move_index += 1;
                continue;
            }
            // SEE pruning: don't bother with quiets that hang material.
            if depth.raw() <= 4 && !super::see::see_ge(pos.board(), m, -50) {
                move_index += 1;
                continue;
            }
            // Futility pruning.
            if let Some(eval) = static_eval {
                let margin = FUTILITY_MARGIN_PER_PLY * depth.raw();
                if eval.raw() + margin < alpha.raw() {
                    searched_quiets.push(m);
                    move_index += 1;
                    continue;
                }
            }
            // Late move pruning: past a move-count threshold at shallow
            // depth, remaining quiets are assumed too unlikely to matter.
            let lmp_threshold = 3 + depth.raw() * depth.raw();
            if move_index as i32 >= lmp_threshold {
                move_index += 1;
                continue;
            }
        }

        pos.make_move(m);
        worker.shared.tt.prefetch(pos.hash());

        let mut reduced = false;
        let search_depth = if move_index >= LMR_MIN_MOVE_INDEX
            && depth.raw() >= LMR_MIN_DEPTH
            && is_quiet
            && !in_check
            && !gives_check
            && !is_killer
        {
            let d = (depth.raw() as f32).ln();
            let idx = ((move_index + 1) as f32).ln();
            let reduction = ((d * idx) / 1.9) as i32;
            let reduction = reduction.clamp(1, depth.raw() - 2);
            reduced = true;
            Depth::new((depth.raw() - 1 - reduction + extension + singular_extension).max(1))
        } else {
            Depth::new((depth.raw() - 1 + extension + singular_extension).max(0))
        };

        let mut score;
        let mut child_pv;

        if move_index == 0 {
            let result = search::<NT::Next>(worker, pos, search_depth, ply.next(), -beta, -alpha, true);
            score = -result.score;
            child_pv = result.pv;
        } else {
            let result = search::<super::node_types::OffPV>(
                worker,
                pos,
                search_depth,
                ply.next(),
                -alpha - Score::cp(1),
                -alpha,
                true,
            );
            score = -result.score;
            child_pv = result.pv;

            if reduced && score > alpha && !worker.should_stop() {
                let full_depth =
                    Depth::new((depth.raw() - 1 + extension + singular_extension).max(0));
                let re_result = search::<super::node_types::OffPV>(
                    worker,
                    pos,
                    full_depth,
                    ply.next(),
                    -alpha - Score::cp(1),
                    -alpha,
                    true,
                );
                score = -re_result.score;
                child_pv = re_result.pv;
            }

            if NT::PV && score > alpha && score < beta && !worker.should_stop() {
                let full_depth =
                    Depth::new((depth.raw() - 1 + extension + singular_extension).max(0));
                let pv_result = search::<NT::Next>(worker, pos, full_depth, ply.next(), -beta, -alpha, true);
                score = -pv_result.score;
                child_pv = pv_result.pv;
            }
        }

        pos.unmake_move();

        if worker.should_stop() {
            return SearchResult::leaf(Score::draw());
        }

        if score > best_score {
            best_score = score;
            best_move = Some(m);
            pv.clear();
            pv.push(m);
            pv.extend(child_pv);

            if score > alpha {
                alpha = score;
                if score >= beta {
                    if is_quiet {
                        let bonus = super::history::history_bonus(depth.raw());
                        worker.killers.store(ply, m);
                        worker.history.update(color, m, bonus);
                        for &quiet in &searched_quiets {
                            worker.history.update(color, quiet, -bonus);
                        }
                        if let Some(pm) = pos.previous_move() {
                            worker.countermoves.store(pm, m);
                        }
                        worker.killers.clear_children(ply);

                        let moved_piece =
                            pos.board().piece_on(m.get_source()).unwrap_or(Piece::Pawn);
                        let to = m.get_dest().to_index();
                        for offset in [1usize, 2, 3, 5, 7] {
                            if let Some((prev_piece, prev_sq)) = pos.continuation_key_at(offset) {
                                let table = worker
                                    .continuation_history
                                    .table_mut(prev_piece, prev_sq.to_index());
                                table.update(moved_piece, to, bonus);
                                for &quiet in &searched_quiets {
                                    let q_piece = pos
                                        .board()
                                        .piece_on(quiet.get_source())
                                        .unwrap_or(Piece::Pawn);
                                    let q_to = quiet.get_dest().to_index();
                                    table.update(q_piece, q_to, -bonus);
                                }
                            }
                        }
                    }
                    break;
                }
            }
        }

        if is_quiet {
            searched_quiets.push(m);
        }
        move_index += 1;
    }

    if legal_moves == 0 {
        let score = if in_check {
            Score::mated_in(ply.raw())
        } else {
            Score::draw()
        };
        return SearchResult::leaf(score);
    }

    if !worker.should_stop() {
        let bound = if best_score >= beta {
            BoundType::LowerBound
        } else if best_score > orig_alpha {
            BoundType::Exact
        } else {
            BoundType::UpperBound
        };
        worker.shared.tt.store(
            hash,
            best_move,
            best_score.to_tt(ply.raw()),
            static_eval.unwrap_or(best_score),
            depth,
            bound,
        );
    }

    SearchResult {
        best_move,
        score: best_score,
        pv,
    }
}

fn build_continuation_context<'a>(worker: &'a Worker, pos: &Position) -> ContinuationContext<'a> {
    let mut ctx = ContinuationContext::default();
    if let Some((piece, sq)) = pos.continuation_key_at(1) {
        ctx.ply_minus_1 = Some((&worker.continuation_history, piece, sq.to_index()));
    }
    if let Some((piece, sq)) = pos.continuation_key_at(2) {
        ctx.ply_minus_2 = Some((&worker.continuation_history, piece, sq.to_index()));
    }
    if let Some((piece, sq)) = pos.continuation_key_at(3) {
        ctx.ply_minus_3 = Some((&worker.continuation_history, piece, sq.to_index()));
    }
    if let Some((piece, sq)) = pos.continuation_key_at(5) {
        ctx.ply_minus_5 = Some((&worker.continuation_history, piece, sq.to_index()));
    }
    if let Some((piece, sq)) = pos.continuation_key_at(7) {
        ctx.ply_minus_7 = Some((&worker.continuation_history, piece, sq.to_index()));
    }
    ctx
}
