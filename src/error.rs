//! Crate-wide error type.
//!
//! The search itself never returns a `Result` — its only failure mode is
//! the stop sentinel, which is not an error (see `search::mod`). `EngineError`
//! covers the fallible operations that sit at the edges: parsing input from
//! a GUI, and loading optional resources (book, NNUE network) from disk.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("failed to allocate {requested_mb} MiB transposition table")]
    TtAllocation { requested_mb: usize },

    #[error("failed to load opening book from {path}: {reason}")]
    BookLoad { path: String, reason: String },

    #[error("failed to load NNUE network from {path}: {reason}")]
    NnueLoad { path: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
