//! Search module (C1-C8): transposition table, move ordering, quiescence,
//! negamax, iterative deepening, and the Lazy SMP thread pool that drives
//! them.

pub mod countermove;
pub mod history;
pub mod iterative;
pub mod killers;
pub mod limits;
pub mod move_picker;
pub mod negamax;
pub mod node_types;
pub mod qsearch;
pub mod see;
pub mod threads;
pub mod tt;

pub use limits::{SearchLimits, TimeManager};
pub use negamax::SearchResult;
pub use threads::{SearchStats, SearcherResult, ThreadPool, Worker};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tt::TranspositionTable;

/// State shared, read and written concurrently, by every Lazy SMP worker:
/// the transposition table, the aggregate node counter, and the single stop
/// flag every worker and the UCI front end both observe.
///
/// Time and node limits are polled from here too (every `NODE_POLL_MASK + 1`
/// nodes, per `Worker::inc_node`) rather than threaded through every search
/// call, so C4/C5 only ever need a `&SharedState` and `should_stop()`.
pub struct SharedState {
    pub tt: TranspositionTable,
    pub nodes: AtomicU64,
    pub stop: Arc<AtomicBool>,
    /// Node budget for the current search; `u64::MAX` means unlimited.
    nodes_limit: AtomicU64,
    /// Hard deadline (ms since `start`) for the current search;
    /// `u64::MAX` means unlimited.
    hard_deadline_ms: AtomicU64,
    start: Mutex<Instant>,
}

/// Poll the clock/node-limit only every this-many-plus-one nodes, so the
/// `Instant::now()`/atomic-load cost doesn't show up in perft-speed profiles.
const NODE_POLL_MASK: u64 = 2047;

impl SharedState {
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(hash_mb),
            nodes: AtomicU64::new(0),
            stop: Arc::new(AtomicBool::new(false)),
            nodes_limit: AtomicU64::new(u64::MAX),
            hard_deadline_ms: AtomicU64::new(u64::MAX),
            start: Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Reset node counter/clock and install this search's limits. Called
    /// once by the thread pool before workers are spawned.
    pub fn begin_search(&self, nodes_limit: Option<u64>, hard_deadline_ms: Option<u64>) {
        self.nodes.store(0, Ordering::Relaxed);
        self.stop.store(false, Ordering::Relaxed);
        self.nodes_limit
            .store(nodes_limit.unwrap_or(u64::MAX), Ordering::Relaxed);
        self.hard_deadline_ms
            .store(hard_deadline_ms.unwrap_or(u64::MAX), Ordering::Relaxed);
        *self.start.lock().unwrap() = Instant::now();
    }

    /// Milliseconds elapsed since `begin_search`.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.lock().unwrap().elapsed().as_millis() as u64
    }

    /// Called by a worker after every node. Cheap in the common case (one
    /// relaxed fetch-add); every `NODE_POLL_MASK + 1`th call also checks the
    /// node and time limits, setting `stop` the first time either is
    /// exceeded.
    #[inline]
    pub fn note_node(&self) {
        let n = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;
        if n & NODE_POLL_MASK != 0 {
            return;
        }
        if n >= self.nodes_limit.load(Ordering::Relaxed) {
            self.stop.store(true, Ordering::Relaxed);
            return;
        }
        let deadline = self.hard_deadline_ms.load(Ordering::Relaxed);
        if deadline != u64::MAX && self.elapsed_ms() >= deadline {
            self.stop.store(true, Ordering::Relaxed);
        }
    }
}

/// Default transposition table size (MiB) until a UCI `setoption Hash` sets
/// otherwise — matches the `Hash` option default advertised over UCI.
const DEFAULT_HASH_MB: usize = 256;

/// The engine surface the UCI front end drives: a position to search, a
/// Lazy SMP thread pool sized and hashed by UCI options, and the
/// currently-installed NNUE model (kept here too, alongside the global
/// slot in `eval`, purely so `uci::handler` has something to report/
/// preserve across `ucinewgame` without re-opening the network file).
pub struct Searcher {
    pool: ThreadPool,
    board: crate::types::Board,
    history: Vec<u64>,
    /// Reversible half-moves played before this search starts (the FEN/UCI
    /// "moves" fifty-move counter), seeding `Position`'s own clock so
    /// repetition detection can reach back into `history`.
    halfmove_clock: u32,
    pub nnue: Option<crate::eval::nnue::Model>,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher {
    pub fn new() -> Self {
        let board = crate::types::Board::default();
        Self {
            pool: ThreadPool::new(1, DEFAULT_HASH_MB),
            board,
            history: vec![crate::zobrist::compute_hash(&board)],
            halfmove_clock: 0,
            nnue: None,
        }
    }

    /// Install (or clear) the NNUE network, updating both the searcher's
    /// own handle and the process-wide slot `eval::evaluate` reads from.
    pub fn set_nnue(&mut self, model: Option<crate::eval::nnue::Model>) {
        crate::eval::set_model(model.clone());
        self.nnue = model;
    }

    pub fn set_threads(&mut self, n: usize) {
        self.pool.set_threads(n);
    }

    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    /// UCI `setoption name Hash value <MiB>`.
    pub fn resize_hash(&mut self, hash_mb: usize) {
        self.pool.resize_hash(hash_mb);
    }

    /// UCI `ucinewgame`: wipe the TT and every worker's move-ordering
    /// tables.
    pub fn new_game(&mut self) {
        self.pool.new_game();
    }

    /// UCI `ClearHash` button: wipe just the TT.
    pub fn clear_hash(&self) {
        self.pool.clear_hash();
    }

    pub fn hashfull_permille(&self) -> u32 {
        self.pool.hashfull_permille()
    }

    pub fn set_position(&mut self, board: crate::types::Board) {
        self.board = board;
        self.history = vec![crate::zobrist::compute_hash(&board)];
        self.halfmove_clock = 0;
    }

    pub fn set_position_with_history(
        &mut self,
        board: crate::types::Board,
        history: Vec<u64>,
        halfmove_clock: u32,
    ) {
        self.board = board;
        self.history = history;
        self.halfmove_clock = halfmove_clock;
    }

    pub fn stop(&self) {
        self.pool.request_stop();
    }

    /// Run a complete `go` search over the position installed by
    /// `set_position`/`set_position_with_history`, respecting `limits` and
    /// the optional root-move restriction from UCI `searchmoves`.
    /// `on_iteration` is invoked once per completed depth,
    /// so the front end can emit one `info` line per iteration rather than
    /// only a single line after the whole search returns.
    pub fn search(
        &self,
        limits: SearchLimits,
        root_moves: Vec<crate::types::Move>,
        on_iteration: impl FnMut(&SearchStats, &SearchResult),
    ) -> SearcherResult {
        self.pool.search(
            self.board,
            self.history.clone(),
            self.halfmove_clock,
            limits,
            root_moves,
            on_iteration,
        )
    }
}
