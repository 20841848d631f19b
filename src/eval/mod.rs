//! Static evaluation seam: the core treats evaluation as a pure
//! function `eval(position) -> centipawn score from side-to-move
//! perspective`. Two backends implement that function — `hce` (tapered
//! piece-square/material/pawn-structure evaluation, always available) and
//! `nnue` (an externally loaded network) — selected process-wide by
//! `set_model`. Selection is global rather than threaded through every
//! search call because every caller already committed to the narrow
//! `evaluate(&Board) -> Score` signature; see DESIGN.md.

pub mod hce;
pub mod nnue;

use crate::types::{Board, Score};
use once_cell::sync::Lazy;
use std::sync::RwLock;

static MODEL: Lazy<RwLock<Option<nnue::Model>>> = Lazy::new(|| RwLock::new(None));

/// Install (or clear, with `None`) the NNUE network used by `evaluate`.
/// Called once from UCI `setoption` handling or startup; cheap to call
/// per-search too since it's just a pointer swap behind a lock.
pub fn set_model(model: Option<nnue::Model>) {
    *MODEL.write().unwrap() = model;
}

pub fn has_model() -> bool {
    MODEL.read().unwrap().is_some()
}

/// Evaluate the position from the side-to-move's perspective, in
/// centipawns. Uses the installed NNUE network if present, falling back to
/// the hand-crafted evaluation otherwise.
pub fn evaluate(board: &Board) -> Score {
    let guard = MODEL.read().unwrap();
    match guard.as_ref() {
        Some(model) => nnue::evaluate_with_model(model, board),
        None => hce::evaluate(board),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_roughly_equal() {
        let board = Board::default();
        let score = evaluate(&board);
        assert!(score.raw().abs() < 50);
    }

    #[test]
    fn material_advantage_is_detected() {
        let board: Board = "rnb1kbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();
        let score = evaluate(&board);
        assert!(score.raw() > 800);
    }
}
