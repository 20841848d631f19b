//! Lazy SMP thread pool (C7): N worker threads searching the same root
//! position independently, sharing one transposition table and one stop
//! flag, diverging only through per-thread history differences and races
//! in the TT rather than explicit work partitioning.
//!
//! Helper workers (every worker but the one driving the call into
//! [`ThreadPool::search`]) are genuine persistent OS threads parked on a
//! mutex+condvar idle loop, woken with a job and returning to idle when
//! done. The worker that calls `search` plays the role of "main" directly
//! on the calling thread (rather than via a fourth parked thread) so it can
//! drive its own iterative deepening loop and invoke `on_iteration` with an
//! ordinary borrowing closure; see DESIGN.md.

use super::history::{ButterflyHistory, CaptureHistory, ContinuationHistory};
use super::countermove::CounterMoveTable;
use super::iterative::{self, IterationOutcome};
use super::killers::KillerTable;
use super::limits::{SearchLimits, TimeManager};
pub use super::negamax::SearchResult;
use super::SharedState;
use crate::position::Position;
use crate::types::{Board, Depth, Move, NodeCount, Ply, Score};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;

/// Per-search statistics reported to the UCI front end: the final depth
/// reached, selective depth, total (pool-wide) node count, and elapsed time.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub nodes: NodeCount,
    pub depth: Depth,
    pub seldepth: Ply,
    pub time_ms: u64,
    /// Per-mille occupancy of the shared TT at current generation, sampled
    /// once per completed iteration so the UCI `info` line can report
    /// `hashfull` without the front end needing its own handle on the
    /// transposition table.
    pub hashfull: u32,
}

impl SearchStats {
    pub fn nps(&self) -> u64 {
        if self.time_ms > 0 {
            self.nodes * 1000 / self.time_ms
        } else {
            0
        }
    }
}

/// A completed search result as reported to the UCI front end.
#[derive(Debug, Clone, Default)]
pub struct SearcherResult {
    pub best_move: Option<Move>,
    pub score: Score,
    pub pv: Vec<Move>,
    pub stats: SearchStats,
}

/// Everything a Lazy SMP worker owns privately: move-ordering
/// tables and the root-move restriction. Only `shared` is, well, shared.
pub struct Worker {
    pub id: usize,
    pub shared: Arc<SharedState>,
    pub killers: KillerTable,
    pub countermoves: CounterMoveTable,
    pub history: ButterflyHistory,
    pub capture_history: CaptureHistory,
    pub continuation_history: ContinuationHistory,
    seldepth: Ply,
    root_moves: Vec<Move>,
}

impl Worker {
    pub(crate) fn new(id: usize, shared: Arc<SharedState>) -> Self {
        Self {
            id,
            shared,
            killers: KillerTable::new(),
            countermoves: CounterMoveTable::new(),
            history: ButterflyHistory::new(),
            capture_history: CaptureHistory::new(),
            continuation_history: ContinuationHistory::new(),
            seldepth: Ply::ZERO,
            root_moves: Vec::new(),
        }
    }

    #[inline]
    pub fn inc_node(&mut self) {
        self.shared.note_node();
    }

    #[inline]
    pub fn update_seldepth(&mut self, ply: Ply) {
        if ply.raw() > self.seldepth.raw() {
            self.seldepth = ply;
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.shared.should_stop()
    }

    #[inline]
    pub fn seldepth(&self) -> Ply {
        self.seldepth
    }

    /// Whether `m` is excluded by a UCI `searchmoves` restriction at the
    /// root. An empty restriction list excludes nothing.
    #[inline]
    pub fn is_excluded_root_move(&self, m: Move) -> bool {
        !self.root_moves.is_empty() && !self.root_moves.contains(&m)
    }

    /// Reset per-search state (killers, countermoves, seldepth, root move
    /// restriction) at the start of a new `go`. History/capture-history/
    /// continuation-history persist across searches within a game; they're
    /// only cleared on `ucinewgame` via [`Worker::clear_tables`].
    pub(crate) fn begin_search(&mut self, root_moves: Vec<Move>) {
        self.killers.clear();
        self.countermoves.clear();
        self.seldepth = Ply::ZERO;
        self.root_moves = root_moves;
    }

    /// Wipe every accumulated move-ordering table (UCI `ucinewgame`). The
    /// shared TT is cleared separately by the pool.
    pub fn clear_tables(&mut self) {
        self.killers.clear();
        self.countermoves.clear();
        self.history.clear();
        self.capture_history.clear();
        self.continuation_history.clear();
    }
}

/// A job handed to a parked helper thread: the root position (already
/// carrying repetition history) and the nominal depth limit.
struct Job {
    root: Position,
    max_depth: Depth,
}

enum SlotState {
    Idle(Option<IterationOutcome>),
    Job(Job),
    /// A job has been taken off the slot and is being searched; distinct
    /// from `Idle` so a waiter polling for completion doesn't mistake "job
    /// just picked up" for "search finished".
    Running,
    Exit,
}

struct Slot {
    state: Mutex<SlotState>,
    cv: Condvar,
}

fn helper_loop(mut worker: Worker, slot: Arc<Slot>) {
    loop {
        let job = {
            let mut guard = slot.state.lock().unwrap();
            loop {
                match &*guard {
                    SlotState::Job(_) | SlotState::Exit => break,
                    SlotState::Idle(_) | SlotState::Running => {
                        guard = slot.cv.wait(guard).unwrap();
                    }
                }
            }
            std::mem::replace(&mut *guard, SlotState::Running)
        };

        let mut job = match job {
            SlotState::Job(job) => job,
            SlotState::Exit => break,
            SlotState::Idle(_) | SlotState::Running => unreachable!("woke with nothing to do"),
        };

        let outcome = iterative::iterative_deepening(
            &mut worker,
            &mut job.root,
            job.max_depth,
            Vec::new(),
            Instant::now(),
            |_, _| {},
        );

        let mut guard = slot.state.lock().unwrap();
        *guard = SlotState::Idle(Some(outcome));
        drop(guard);
        slot.cv.notify_all();
    }
}

/// The Lazy SMP thread pool: one persistent idle-loop helper thread per
/// worker beyond the first, a transposition table shared by all of them,
/// and the single atomic stop flag every worker and the UCI front end
/// observe through [`SharedState`].
pub struct ThreadPool {
    shared: Arc<SharedState>,
    helpers: Vec<(Arc<Slot>, thread::JoinHandle<()>)>,
    main_worker: Mutex<Worker>,
    num_threads: usize,
}

impl ThreadPool {
    pub fn new(num_threads: usize, hash_mb: usize) -> Self {
        let shared = Arc::new(SharedState::new(hash_mb));
        let main_worker = Mutex::new(Worker::new(0, Arc::clone(&shared)));
        let mut pool = Self {
            shared,
            helpers: Vec::new(),
            main_worker,
            num_threads: 1,
        };
        pool.set_threads(num_threads.max(1));
        pool
    }

    /// Re-create the helper thread roster (UCI `setoption Threads`). The
    /// main worker (id 0) is untouched so its history survives the resize.
    pub fn set_threads(&mut self, n: usize) {
        let n = n.max(1);
        self.shutdown_helpers();
        for id in 1..n {
            let slot = Arc::new(Slot {
                state: Mutex::new(SlotState::Idle(None)),
                cv: Condvar::new(),
            });
            let worker = Worker::new(id, Arc::clone(&self.shared));
            let slot_for_thread = Arc::clone(&slot);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || helper_loop(worker, slot_for_thread))
                .expect("failed to spawn search worker thread");
            self.helpers.push((slot, handle));
        }
        self.num_threads = n;
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Resize the shared transposition table (UCI `setoption Hash`).
    /// The TT has no exclusive-access accessor reachable through the
    /// `Arc` every worker holds, so a resize rebuilds `SharedState`
    /// wholesale; this is a rare admin operation restricted to between
    /// searches anyway.
    pub fn resize_hash(&mut self, hash_mb: usize) {
        let n = self.num_threads;
        self.shutdown_helpers();
        self.shared = Arc::new(SharedState::new(hash_mb));
        self.main_worker = Mutex::new(Worker::new(0, Arc::clone(&self.shared)));
        self.set_threads(n);
    }

    /// Reset everything that should not survive a `ucinewgame`: the TT
    /// contents and every worker's move-ordering tables.
    pub fn new_game(&mut self) {
        self.shared.tt.clear();
        self.main_worker.lock().unwrap().clear_tables();
        // Helper threads own their `Worker` locally; recreate them so
        // their tables start fresh too.
        self.set_threads(self.num_threads);
    }

    /// UCI `ClearHash` button: wipe just the TT, leaving move-ordering
    /// history untouched (unlike the fuller reset `new_game` does).
    pub fn clear_hash(&self) {
        self.shared.tt.clear();
    }

    /// Request that any in-progress search stop as soon as a worker next
    /// polls the shared flag (UCI `stop`).
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }

    pub fn hashfull_permille(&self) -> u32 {
        self.shared.tt.hashfull()
    }

    /// Park each helper thread's exit request behind its own "wait until
    /// idle" so a thread mid-search never has its `Exit` command clobbered
    /// by the `Idle(Some(outcome))` it writes when that search finishes.
    fn shutdown_helpers(&mut self) {
        for (slot, _) in &self.helpers {
            let mut guard = slot.state.lock().unwrap();
            guard = self.cv_wait_until_idle(slot, guard);
            *guard = SlotState::Exit;
            drop(guard);
            slot.cv.notify_all();
        }
        for (_, handle) in self.helpers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Run a complete search to a best move. Blocks the calling thread,
    /// which drives the main worker's own iterative deepening loop
    /// (it alone emits info lines) while every helper
    /// thread searches the same root independently in the background.
    /// Returns once every worker has returned from its final iteration,
    /// picking the deepest-completed result in a tie-break (main wins
    /// ties).
    pub fn search(
        &self,
        root: Board,
        history: Vec<u64>,
        halfmove_clock: u32,
        limits: SearchLimits,
        root_moves: Vec<Move>,
        on_iteration: impl FnMut(&SearchStats, &SearchResult),
    ) -> SearcherResult {
        let side = root.side_to_move();
        let time_manager = TimeManager::from_limits(&limits, side);
        let hard_ms = if time_manager.is_infinite() {
            None
        } else {
            Some(time_manager.hard_deadline_ms())
        };
        self.shared.begin_search(limits.nodes, hard_ms);
        self.shared.tt.new_search();

        let max_depth = limits.depth.unwrap_or(Depth::MAX);
        let start = Instant::now();

        for (slot, _) in &self.helpers {
            let mut root_pos = Position::new(root);
            root_pos.set_root_history(history.clone(), halfmove_clock);
            let mut guard = slot.state.lock().unwrap();
            *guard = SlotState::Job(Job {
                root: root_pos,
                max_depth,
            });
            drop(guard);
            slot.cv.notify_all();
        }

        let soft_ms = if time_manager.is_infinite() {
            None
        } else {
            Some(time_manager.soft_deadline_ms())
        };

        let mut main_pos = Position::new(root);
        main_pos.set_root_history(history, halfmove_clock);
        let mut main_worker = self.main_worker.lock().unwrap();
        let main_outcome = iterative::iterative_deepening_timed(
            &mut main_worker,
            &mut main_pos,
            max_depth,
            root_moves,
            start,
            soft_ms,
            on_iteration,
        );
        drop(main_worker);

        // Let the soft-deadline/mate-found exit of the main thread pull
        // every helper out of its own loop too, then collect them.
        self.shared.stop.store(true, Ordering::Relaxed);

        let mut best = main_outcome;
        for (slot, _) in &self.helpers {
            let mut guard = slot.state.lock().unwrap();
            guard = self
                .cv_wait_until_idle(slot, guard);
            if let SlotState::Idle(Some(outcome)) = std::mem::replace(&mut *guard, SlotState::Idle(None)) {
                if outcome.stats.depth.raw() > best.stats.depth.raw() {
                    best = outcome;
                }
            }
        }

        SearcherResult {
            best_move: best.result.best_move,
            score: best.result.score,
            pv: best.result.pv,
            stats: best.stats,
        }
    }

    fn cv_wait_until_idle<'a>(
        &self,
        slot: &'a Slot,
        mut guard: std::sync::MutexGuard<'a, SlotState>,
    ) -> std::sync::MutexGuard<'a, SlotState> {
        loop {
            match &*guard {
                SlotState::Idle(_) => return guard,
                _ => guard = slot.cv.wait(guard).unwrap(),
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        self.shutdown_helpers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Board;

    #[test]
    fn single_threaded_search_finds_a_move() {
        let pool = ThreadPool::new(1, 1);
        let limits = SearchLimits::depth(4);
        let result = pool.search(Board::default(), vec![crate::zobrist::compute_hash(&Board::default())], 0, limits, Vec::new(), |_, _| {});
        assert!(result.best_move.is_some());
    }

    #[test]
    fn multi_threaded_search_finds_a_move() {
        let pool = ThreadPool::new(3, 1);
        let limits = SearchLimits::depth(4);
        let result = pool.search(Board::default(), vec![crate::zobrist::compute_hash(&Board::default())], 0, limits, Vec::new(), |_, _| {});
        assert!(result.best_move.is_some());
        assert_eq!(pool.num_threads(), 3);
    }

    #[test]
    fn stop_request_cuts_a_long_search_short() {
        let pool = ThreadPool::new(1, 1);
        pool.request_stop();
        let limits = SearchLimits::depth(64);
        let result = pool.search(Board::default(), vec![crate::zobrist::compute_hash(&Board::default())], 0, limits, Vec::new(), |_, _| {});
        // Stopped before the first iteration even completes; no move is
        // guaranteed, but the call must still return promptly.
        let _ = result;
    }
}
