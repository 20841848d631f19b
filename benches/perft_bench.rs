//! Perft throughput benchmark: exercises move generation, make/unmake, and
//! incremental hash maintenance together, the same invariant the perft
//! tests in `position.rs` check for correctness.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use zugzug::position::Position;
use zugzug::types::Board;

fn bench_perft_depth_4(c: &mut Criterion) {
    let mut pos = Position::new(Board::default());
    c.bench_function("perft startpos depth 4", |b| {
        b.iter(|| black_box(pos.perft(4)))
    });
}

fn bench_perft_depth_5(c: &mut Criterion) {
    let mut pos = Position::new(Board::default());
    c.bench_function("perft startpos depth 5", |b| {
        b.iter(|| black_box(pos.perft(5)))
    });
}

fn bench_perft_kiwipete_depth_4(c: &mut Criterion) {
    let board: Board = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
        .parse()
        .unwrap();
    let mut pos = Position::new(board);
    c.bench_function("perft kiwipete depth 4", |b| {
        b.iter(|| black_box(pos.perft(4)))
    });
}

criterion_group!(
    benches,
    bench_perft_depth_4,
    bench_perft_depth_5,
    bench_perft_kiwipete_depth_4
);
criterion_main!(benches);
