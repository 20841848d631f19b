//! UCI command handler and main loop.

use super::parser::{parse_command, UciCommand};
use super::{parse_move, format_move, SearchParams, ENGINE_NAME, ENGINE_AUTHOR};
use crate::types::{is_capture, Board, Move, Piece};
use crate::search::{Searcher, SearchLimits};
use crate::eval::nnue;
use crate::book::PolyglotBook;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

/// UCI protocol handler
pub struct UciHandler {
    /// Current board position
    board: Board,
    /// Search engine
    searcher: Searcher,
    /// Opening book
    book: Option<PolyglotBook>,
    /// Use opening book
    use_own_book: bool,
    /// Path to opening book file
    book_path: String,
    /// Debug mode enabled
    debug: bool,
    /// Should the engine quit
    quit: bool,
    /// Move overhead in milliseconds (safety buffer for time control)
    move_overhead: u64,
    /// UCI `MultiPV`: number of root lines tracked. Accepted and reported,
    /// but the single-PV negamax in `search::negamax` only ever reports
    /// line 1; multi-line root search isn't implemented.
    multipv: u32,
    /// UCI `SyzygyPath`: tablebase directory. Stored so a GUI configuring
    /// it doesn't get a protocol error; `tablebase::NullTablebase` never
    /// reads it (see `tablebase.rs`).
    syzygy_path: String,
    /// UCI `SyzygyProbeDepth`.
    syzygy_probe_depth: u32,
}

impl Default for UciHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl UciHandler {
    pub fn new() -> Self {
        let mut searcher = Searcher::new();
        
        // Attempt to load NNUE model (look next to executable first, then current dir)
        let exe_dir_path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("network.nnue")));
        
        let nnue_path = if let Some(ref p) = exe_dir_path {
            if p.exists() {
                println!("info string Found NNUE next to exe: {:?}", p);
                p.clone()
            } else {
                println!("info string NNUE not at exe path: {:?}", p);
                std::path::PathBuf::from("network.nnue")
            }
        } else {
            println!("info string Could not determine exe path");
            std::path::PathBuf::from("network.nnue")
        };
        
        match nnue::load_model(nnue_path.to_str().unwrap_or("network.nnue")) {
            Ok(model) => {
                println!("info string NNUE loaded: {}", model.desc);
                searcher.set_nnue(Some(model));
            },
            Err(e) => {
                let err = crate::error::EngineError::NnueLoad {
                    path: nnue_path.display().to_string(),
                    reason: e.to_string(),
                };
                log::warn!("{}", err);
                println!("info string Using material eval");
            }
        }

        // Attempt to load opening book (look next to executable first, then current dir)
        let book_filename = "Human.bin";
        let exe_dir_book = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join(book_filename)));
        
        let book_path = if let Some(ref p) = exe_dir_book {
            if p.exists() {
                println!("info string Found book next to exe: {:?}", p);
                p.to_string_lossy().to_string()
            } else {
                println!("info string Book not at exe path: {:?}, trying current dir", p);
                std::path::PathBuf::from(book_filename).to_string_lossy().to_string()
            }
        } else {
            println!("info string Could not determine exe path for book");
            book_filename.to_string()
        };

        let book = match PolyglotBook::load(&book_path) {
            Ok(b) => {
                println!("info string Opening book loaded: {} ({} entries)", b.desc, b.len());
                Some(b)
            }
            Err(e) => {
                let err = crate::error::EngineError::BookLoad {
                    path: book_path.clone(),
                    reason: e.to_string(),
                };
                log::warn!("{}", err);
                None
            }
        };

        Self {
            board: Board::default(),
            searcher,
            book,
            use_own_book: true, // Enable book by default
            book_path,
            debug: false,
            quit: false,
            move_overhead: 10, // Default 10ms
            multipv: 1,
            syzygy_path: String::new(),
            syzygy_probe_depth: 1,
        }
    }

    /// Apply startup `--hash`/`--threads` CLI flags before the UCI loop
    /// begins, so a GUI that never sends `setoption` still gets a
    /// non-default configuration the user asked for on the command line.
    pub fn configure_startup(&mut self, hash_mb: usize, threads: usize) {
        if hash_mb != 256 {
            self.searcher.resize_hash(hash_mb.clamp(16, 33_554_432));
        }
        if threads != 1 {
            self.searcher.set_threads(threads.clamp(1, 1024));
        }
    }

    /// Run the UCI main loop (blocking)
    pub fn run(&mut self) {
        let stdin = io::stdin();
        let reader = stdin.lock();

        for line in reader.lines() {
            match line {
                Ok(input) => {
                    if self.debug {
                        eprintln!("< {}", input);
                    }
                    self.handle_input(&input);
                    if self.quit {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }

    /// Handle a single UCI command
    pub fn handle_input(&mut self, input: &str) {
        let cmd = parse_command(input);
        self.handle_command(cmd);
    }

    fn handle_command(&mut self, cmd: UciCommand) {
        match cmd {
            UciCommand::Uci => self.cmd_uci(),
            UciCommand::Debug(on) => self.cmd_debug(on),
            UciCommand::IsReady => self.cmd_isready(),
            UciCommand::SetOption { name, value } => self.cmd_setoption(&name, value.as_deref()),
            UciCommand::Register => {} // Ignore registration
            UciCommand::UciNewGame => self.cmd_ucinewgame(),
            UciCommand::Position { fen, moves } => self.cmd_position(fen.as_deref(), &moves),
            UciCommand::Go(params) => self.cmd_go(params),
            UciCommand::Stop => self.cmd_stop(),
            UciCommand::PonderHit => self.cmd_ponderhit(),
            UciCommand::Quit => self.cmd_quit(),
            UciCommand::Display => self.cmd_display(),
            UciCommand::Unknown(s) => {
                if self.debug {
                    eprintln!("Unknown command: {}", s);
                }
            }
        }
    }

    /// Send output to GUI
    fn send(&self, msg: &str) {
        println!("{}", msg);
        io::stdout().flush().ok();
    }

    // === UCI Commands ===

    fn cmd_uci(&self) {
        self.send(&format!("id name {}", ENGINE_NAME));
        self.send(&format!("id author {}", ENGINE_AUTHOR));
        
        // Send options (ranges/defaults as given)
        self.send("option name Hash type spin default 256 min 16 max 33554432");
        self.send("option name Threads type spin default 1 min 1 max 1024");
        self.send("option name OwnBook type check default true");
        self.send("option name ClearHash type button");
        self.send("option name MultiPV type spin default 1 min 1 max 256");
        self.send("option name SyzygyPath type string default <empty>");
        self.send("option name SyzygyProbeDepth type spin default 1 min 0 max 64");
        self.send("option name MoveOverhead type spin default 10 min 0 max 5000");
        self.send("option name BookPath type string default Human.bin");

        self.send("uciok");
    }

    fn cmd_debug(&mut self, on: bool) {
        self.debug = on;
    }

    fn cmd_isready(&self) {
        self.send("readyok");
    }

    fn cmd_setoption(&mut self, name: &str, value: Option<&str>) {
        match name.to_lowercase().as_str() {
            "hash" => {
                if let Some(v) = value {
                    if let Ok(mb) = v.parse::<usize>() {
                        self.searcher.resize_hash(mb.clamp(16, 33_554_432));
                    }
                }
            }
            "threads" => {
                if let Some(v) = value {
                    if let Ok(n) = v.parse::<usize>() {
                        self.searcher.set_threads(n.clamp(1, 1024));
                    }
                }
            }
            "clearhash" => {
                // Button option: no value, fires on the setoption itself.
                self.searcher.clear_hash();
            }
            "multipv" => {
                if let Some(v) = value {
                    if let Ok(n) = v.parse::<u32>() {
                        self.multipv = n.clamp(1, 256);
                    }
                }
            }
            "syzygypath" => {
                self.syzygy_path = value.unwrap_or("").to_string();
            }
            "syzygyprobedepth" => {
                if let Some(v) = value {
                    if let Ok(d) = v.parse::<u32>() {
                        self.syzygy_probe_depth = d.clamp(0, 64);
                    }
                }
            }
            "moveoverhead" => {
                if let Some(v) = value {
                    if let Ok(ms) = v.parse::<u64>() {
                        self.move_overhead = ms.min(5000);
                    }
                }
            }
            "ownbook" => {
                if let Some(v) = value {
                    self.use_own_book = v.to_lowercase() == "true";
                    if self.debug {
                        eprintln!("OwnBook set to: {}", self.use_own_book);
                    }
                }
            }
            "bookpath" => {
                if let Some(v) = value {
                    self.book_path = v.to_string();
                    // Try to load the new book
                    match PolyglotBook::load(&self.book_path) {
                        Ok(b) => {
                            println!("info string Opening book loaded: {} ({} entries)", b.desc, b.len());
                            self.book = Some(b);
                        }
                        Err(e) => {
                            let err = crate::error::EngineError::BookLoad {
                                path: self.book_path.clone(),
                                reason: e.to_string(),
                            };
                            log::warn!("{}", err);
                            self.book = None;
                        }
                    }
                }
            }
            _ => {
                if self.debug {
                    eprintln!("Unknown option: {}", name);
                }
            }
        }
    }

    fn cmd_ucinewgame(&mut self) {
        // Clears the TT contents and every worker's move-ordering tables
        // without discarding the Hash/Threads sizing or the loaded NNUE
        // network a prior `setoption` installed.
        self.board = Board::default();
        self.searcher.new_game();
    }

    fn cmd_position(&mut self, fen: Option<&str>, moves: &[String]) {
        // Set up the position
        self.board = match fen {
            Some(f) => Board::from_str(f).unwrap_or_default(),
            None => Board::default(),
        };

        // Track position hashes for repetition detection, using the engine's
        // own Zobrist scheme so these compare equal to `Position::hash()`
        // (the `chess` crate's built-in hash is a different namespace).
        let mut history: Vec<u64> = Vec::with_capacity(moves.len() + 1);
        history.push(crate::zobrist::compute_hash(&self.board));

        // Reversible half-moves since the last pawn push or capture, so the
        // search's own clock (seeded from this) can reach back into
        // `history` for repetitions that happened before this search began.
        let mut halfmove_clock: u32 = 0;

        // Apply moves
        for move_str in moves {
            if let Some(m) = parse_move(&self.board, move_str) {
                let is_pawn_move = self.board.piece_on(m.get_source()) == Some(Piece::Pawn);
                let is_cap = is_capture(&self.board, m);
                self.board = self.board.make_move_new(m);
                history.push(crate::zobrist::compute_hash(&self.board));
                halfmove_clock = if is_pawn_move || is_cap {
                    0
                } else {
                    halfmove_clock + 1
                };
            } else if self.debug {
                eprintln!("Invalid move: {}", move_str);
            }
        }

        // Store history in searcher for repetition detection
        self.searcher
            .set_position_with_history(self.board, history, halfmove_clock);
    }

    fn cmd_go(&mut self, params: SearchParams) {
        // Try opening book first (unless infinite or analysis mode)
        if self.use_own_book && !params.infinite && params.searchmoves.is_empty() {
            if let Some(ref book) = self.book {
                if let Some(book_move) = book.probe_move(&self.board) {
                    self.send(&format!("info string book move"));
                    self.send(&format!("bestmove {}", format_move(book_move)));
                    return;
                }
            }
        }

        // Set up search limits with move overhead. The position (and its
        // repetition history) was already installed by `cmd_position`;
        // re-setting it here would lose that history and break repetition
        // detection.
        let limits = SearchLimits::from_params(&params)
            .with_move_overhead(self.move_overhead);

        // Resolve `searchmoves` against the current board, if given.
        let root_moves: Vec<Move> = params
            .searchmoves
            .iter()
            .filter_map(|s| parse_move(&self.board, s))
            .collect();

        // One `info` line per completed depth, emitted from inside the
        // search loop rather than only once at the end.
        let result = self.searcher.search(limits, root_moves, |stats, result| {
            let pv_str: String = result
                .pv
                .iter()
                .map(|m| format_move(*m))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "info score {} depth {} seldepth {} nodes {} nps {} hashfull {} time {} pv {}",
                result.score,
                stats.depth.raw(),
                stats.seldepth.raw(),
                stats.nodes,
                stats.nps(),
                stats.hashfull,
                stats.time_ms,
                pv_str
            );
            io::stdout().flush().ok();
        });

        // Send best move
        match result.best_move {
            Some(m) => self.send(&format!("bestmove {}", format_move(m))),
            None => self.send("bestmove 0000"),
        }
    }

    fn cmd_stop(&mut self) {
        self.searcher.stop();
    }

    fn cmd_ponderhit(&mut self) {
        // TODO: Switch from pondering to normal search
    }

    fn cmd_quit(&mut self) {
        self.quit = true;
    }

    fn cmd_display(&self) {
        // Non-standard debug command to display the board
        eprintln!("{}", self.board);
        eprintln!("FEN: {}", self.board);
        eprintln!("Side to move: {:?}", self.board.side_to_move());
    }
}
