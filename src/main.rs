//! UCI front end entry point. Parses a small set of startup flags, then
//! hands control to [`zugzug::uci::UciHandler`] for the rest of the
//! engine's lifetime — everything past this point is driven by stdin/
//! stdout lines.

use clap::Parser;
use zugzug::uci::UciHandler;

/// `zugzug` — UCI chess engine.
///
/// With no arguments, starts the UCI protocol loop on stdin/stdout, which
/// is how every UCI-speaking GUI drives the engine. `--perft` is a
/// standalone debug entry point bypassing UCI entirely, for validating
/// move generation against the published perft corpus.
#[derive(Parser, Debug)]
#[command(name = "zugzug", about = "A UCI chess engine core")]
struct Cli {
    /// Run `perft` to this depth from the given FEN (or the start
    /// position) and print the leaf count, instead of entering the UCI
    /// loop.
    #[arg(long)]
    perft: Option<u32>,

    /// FEN to use with `--perft`. Defaults to the start position.
    #[arg(long)]
    fen: Option<String>,

    /// Starting hash table size in MiB, before any UCI `setoption Hash`.
    #[arg(long, default_value_t = 256)]
    hash: usize,

    /// Starting thread count, before any UCI `setoption Threads`.
    #[arg(long, default_value_t = 1)]
    threads: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .init();

    let cli = Cli::parse();

    if let Some(depth) = cli.perft {
        run_perft(depth, cli.fen.as_deref());
        return;
    }

    log::info!(
        "zugzug starting: hash={} MiB, threads={}",
        cli.hash,
        cli.threads
    );

    let mut handler = UciHandler::new();
    handler.configure_startup(cli.hash, cli.threads);
    handler.run();
}

fn run_perft(depth: u32, fen: Option<&str>) {
    use std::str::FromStr;
    use zugzug::position::Position;
    use zugzug::types::Board;

    let board = match fen {
        Some(f) => Board::from_str(f).unwrap_or_else(|_| {
            eprintln!("info string invalid FEN, using start position");
            Board::default()
        }),
        None => Board::default(),
    };

    let mut pos = Position::new(board);
    for (mv, count) in pos.divide(depth) {
        println!("{}: {}", zugzug::uci::format_move(mv), count);
    }
    let mut pos = Position::new(board);
    let total = pos.perft(depth);
    println!("Nodes searched: {}", total);
}
