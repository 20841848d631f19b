//! Iterative deepening driver (C6): the depth loop each worker runs on its
//! own, with aspiration windows narrowing the alpha-beta bounds around the
//! previous iteration's score once the search is deep enough for that score
//! to be a trustworthy center point.
//!
//! The re-search rule on a fail-high preserves a quirk of the
//! window-widening scheme: depth is decremented by one on every fail-high
//! re-search rather than only once, so a position that keeps failing high
//! can walk itself down several plies before settling. See DESIGN.md
//! Open Question (c).

use super::negamax::{self, SearchResult};
use super::node_types::Root;
use super::threads::{SearchStats, Worker};
use crate::position::Position;
use crate::types::{Depth, Move, Ply, Score};
use std::sync::atomic::Ordering;
use std::time::Instant;

/// Depth at which aspiration windows kick in; shallower iterations search
/// the full `[-inf, +inf]` window since there's no reliable previous score
/// to center on yet.
const ASPIRATION_MIN_DEPTH: i32 = 5;

/// Initial aspiration half-width formula's constant term: the window is
/// `18 + prev_score^2 / 10000` centipawns either side of the previous
/// iteration's score.
const ASPIRATION_BASE: i32 = 18;

pub struct IterationOutcome {
    pub result: SearchResult,
    pub stats: SearchStats,
}

/// Drive one worker's complete iterative-deepening search of `pos` from
/// depth 1 up to `max_depth`, stopping early once `worker.should_stop()`
/// (time/node limit, or a UCI `stop`) observes true. `on_iteration` is
/// called once per completed depth so the caller (the main worker) can
/// emit a UCI `info` line; non-main workers pass a no-op.
pub fn iterative_deepening(
    worker: &mut Worker,
    pos: &mut Position,
    max_depth: Depth,
    root_moves: Vec<Move>,
    start: Instant,
    mut on_iteration: impl FnMut(&SearchStats, &SearchResult),
) -> IterationOutcome {
    iterative_deepening_timed(worker, pos, max_depth, root_moves, start, None, on_iteration)
}

/// As [`iterative_deepening`], but additionally honours a soft deadline
/// once elapsed time passes `soft_deadline_ms`, the
/// loop breaks before starting the next depth rather than waiting for the
/// hard deadline to cut an in-progress one off. `None` disables this check
/// (helper workers in the Lazy SMP pool run to the hard stop only).
pub fn iterative_deepening_timed(
    worker: &mut Worker,
    pos: &mut Position,
    max_depth: Depth,
    root_moves: Vec<Move>,
    start: Instant,
    soft_deadline_ms: Option<u64>,
    mut on_iteration: impl FnMut(&SearchStats, &SearchResult),
) -> IterationOutcome {
    worker.begin_search(root_moves);

    let mut best = SearchResult::default();
    let mut best_depth = Depth::ZERO;
    let mut prev_score = Score::draw();

    let mut d = 1;
    while d <= max_depth.raw() {
        if worker.should_stop() {
            break;
        }

        let mut depth = Depth::new(d);
        let mut delta = ASPIRATION_BASE + prev_score.raw() * prev_score.raw() / 10_000;
        let (mut alpha, mut beta) = if d < ASPIRATION_MIN_DEPTH {
            (Score::neg_infinity(), Score::infinity())
        } else {
            (prev_score - Score::cp(delta), prev_score + Score::cp(delta))
        };

        let result = loop {
            let r = negamax::search::<Root>(worker, pos, depth, Ply::ZERO, alpha, beta, false);

            if worker.should_stop() {
                break r;
            }
            if d >= ASPIRATION_MIN_DEPTH && r.score <= alpha {
                alpha = r.score - Score::cp(delta);
                delta *= 2;
                continue;
            }
            if d >= ASPIRATION_MIN_DEPTH && r.score >= beta {
                beta = r.score + Score::cp(delta);
                delta *= 2;
                depth = Depth::new((depth.raw() - 1).max(1));
                continue;
            }
            break r;
        };

        // A stopped iteration with no move at all contributes nothing; an
        // iteration that found at least a move before being cut off is
        // still worth keeping (it's simply not improved upon further).
        if worker.should_stop() && result.best_move.is_none() && best.best_move.is_none() {
            break;
        }
        if result.best_move.is_some() || !worker.should_stop() {
            best = result;
            best_depth = Depth::new(d);
            prev_score = best.score;
        }

        let stats = SearchStats {
            nodes: worker.shared.nodes.load(Ordering::Relaxed),
            depth: best_depth,
            seldepth: worker.seldepth(),
            time_ms: start.elapsed().as_millis() as u64,
            hashfull: worker.shared.tt.hashfull(),
        };
        on_iteration(&stats, &best);

        if worker.should_stop() {
            break;
        }
        if let Some(soft) = soft_deadline_ms {
            if stats.time_ms >= soft {
                break;
            }
        }
        d += 1;
    }

    let stats = SearchStats {
        nodes: worker.shared.nodes.load(Ordering::Relaxed),
        depth: best_depth,
        seldepth: worker.seldepth(),
        time_ms: start.elapsed().as_millis() as u64,
        hashfull: worker.shared.tt.hashfull(),
    };
    IterationOutcome { result: best, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SharedState;
    use chess::Board;
    use std::sync::Arc;

    #[test]
    fn finds_a_move_at_low_depth() {
        let shared = Arc::new(SharedState::new(1));
        let mut worker = Worker::new(0, shared);
        let mut pos = Position::new(Board::default());
        let outcome = iterative_deepening(
            &mut worker,
            &mut pos,
            Depth::new(3),
            Vec::new(),
            Instant::now(),
            |_, _| {},
        );
        assert!(outcome.result.best_move.is_some());
        assert_eq!(outcome.stats.depth.raw(), 3);
    }

    #[test]
    fn stop_flag_halts_before_reaching_max_depth() {
        let shared = Arc::new(SharedState::new(1));
        shared.stop.store(true, Ordering::Relaxed);
        let mut worker = Worker::new(0, shared);
        let mut pos = Position::new(Board::default());
        let outcome = iterative_deepening(
            &mut worker,
            &mut pos,
            Depth::new(10),
            Vec::new(),
            Instant::now(),
            |_, _| {},
        );
        assert!(outcome.stats.depth.raw() < 10);
    }
}
