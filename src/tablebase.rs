//! Endgame tablebase probing boundary (C12).
//!
//! The core depends on this trait only, never a concrete Syzygy prober:
//! linking one in means vendoring or binding an external C library, which
//! is outside this crate's dependency stack. [`NullTablebase`] is the only
//! implementation shipped — a real prober could sit behind the same trait
//! without any change to the search that calls it.

use crate::types::Board;

/// Win/draw/loss classification for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wdl {
    Win,
    Draw,
    Loss,
}

pub trait ProbeTablebase: Send + Sync {
    /// Probe for `board`'s tablebase outcome. `None` covers every kind of
    /// miss: no prober configured, the position isn't covered, or (as here)
    /// there is simply no prober behind the trait at all.
    fn probe_wdl(&self, board: &Board) -> Option<Wdl>;
}

/// Always misses. `SyzygyPath`/`SyzygyProbeDepth` (see `uci::handler`) are
/// still accepted and stored so a GUI configuring them doesn't get a
/// protocol error, but nothing reads the path.
pub struct NullTablebase;

impl ProbeTablebase for NullTablebase {
    fn probe_wdl(&self, _board: &Board) -> Option<Wdl> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Board;

    #[test]
    fn null_tablebase_always_misses() {
        assert_eq!(NullTablebase.probe_wdl(&Board::default()), None);
    }
}
