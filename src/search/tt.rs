//! Transposition Table (C1): a lock-free, fixed-size, bucketed cache of
//! search results shared by every Lazy SMP worker.
//!
//! Each entry is 16 bytes (two `AtomicU64` words) so it can carry a static
//! eval alongside the score. Entries are grouped
//! into 3-way buckets; `probe`/`store` take `&self` so every worker can hit
//! the table concurrently without a lock. Racing writes can tear a single
//! entry across its two words — correctness depends only on the 16-bit key
//! fragment filtering out the resulting inconsistent reads (a benign miss),
//! never on an entry being internally self-consistent.

use crate::types::{Depth, Hash, Move, Score};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

pub const BUCKET_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BoundType {
    None = 0,
    Exact = 1,
    LowerBound = 2,
    UpperBound = 3,
}

impl From<u8> for BoundType {
    fn from(v: u8) -> Self {
        match v & 0x03 {
            1 => BoundType::Exact,
            2 => BoundType::LowerBound,
            3 => BoundType::UpperBound,
            _ => BoundType::None,
        }
    }
}

/// A decoded TT entry. `to_words`/`from_words` convert to/from the packed
/// atomic representation actually stored in the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TTEntry {
    key: u16,
    best_move: u16,
    score: i16,
    static_eval: i16,
    depth: i8,
    bound_and_age: u8,
}

impl TTEntry {
    pub fn new(
        hash: Hash,
        best_move: Option<Move>,
        score: Score,
        static_eval: Score,
        depth: Depth,
        bound: BoundType,
        generation: u8,
    ) -> Self {
        Self {
            key: (hash >> 48) as u16,
            best_move: encode_move(best_move),
            score: score.raw().clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            static_eval: static_eval.raw().clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            depth: depth.raw().clamp(i8::MIN as i32, i8::MAX as i32) as i8,
            bound_and_age: (bound as u8) | ((generation & 0x3F) << 2),
        }
    }

    #[inline]
    fn to_words(self) -> (u64, u64) {
        let w0 = ((self.key as u64) << 48)
            | ((self.best_move as u64) << 32)
            | (((self.score as u16) as u64) << 16)
            | ((self.static_eval as u16) as u64);
        let w1 = ((self.depth as u8 as u64) << 8) | (self.bound_and_age as u64);
        (w0, w1)
    }

    #[inline]
    fn from_words(w0: u64, w1: u64) -> Self {
        Self {
            key: (w0 >> 48) as u16,
            best_move: (w0 >> 32) as u16,
            score: (w0 >> 16) as i16,
            static_eval: w0 as i16,
            depth: (w1 >> 8) as i8,
            bound_and_age: w1 as u8,
        }
    }

    #[inline]
    pub fn matches(&self, hash: Hash) -> bool {
        self.key == (hash >> 48) as u16
    }

    #[inline]
    pub fn bound(&self) -> BoundType {
        BoundType::from(self.bound_and_age)
    }

    #[inline]
    pub fn generation(&self) -> u8 {
        self.bound_and_age >> 2
    }

    #[inline]
    pub fn score(&self) -> Score {
        Score::cp(self.score as i32)
    }

    #[inline]
    pub fn static_eval(&self) -> Score {
        Score::cp(self.static_eval as i32)
    }

    #[inline]
    pub fn depth(&self) -> Depth {
        Depth::new(self.depth as i32)
    }

    #[inline]
    pub fn best_move(&self) -> Option<Move> {
        decode_move(self.best_move)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bound() == BoundType::None
    }
}

fn encode_move(m: Option<Move>) -> u16 {
    match m {
        Some(mv) => {
            let from = mv.get_source().to_index() as u16;
            let to = mv.get_dest().to_index() as u16;
            let promo = match mv.get_promotion() {
                Some(chess::Piece::Knight) => 1,
                Some(chess::Piece::Bishop) => 2,
                Some(chess::Piece::Rook) => 3,
                Some(chess::Piece::Queen) => 4,
                _ => 0,
            };
            from | (to << 6) | (promo << 12)
        }
        None => 0,
    }
}

fn decode_move(encoded: u16) -> Option<Move> {
    if encoded == 0 {
        return None;
    }
    let from_idx = (encoded & 0x3F) as u8;
    let to_idx = ((encoded >> 6) & 0x3F) as u8;
    let promo_bits = (encoded >> 12) & 0x0F;

    // SAFETY: both indices are masked to 0..=63 above.
    let from = unsafe { chess::Square::new(from_idx) };
    let to = unsafe { chess::Square::new(to_idx) };

    let promo = match promo_bits {
        1 => Some(chess::Piece::Knight),
        2 => Some(chess::Piece::Bishop),
        3 => Some(chess::Piece::Rook),
        4 => Some(chess::Piece::Queen),
        _ => None,
    };
    Some(Move::new(from, to, promo))
}

struct AtomicSlot {
    w0: AtomicU64,
    w1: AtomicU64,
}

impl AtomicSlot {
    fn empty() -> Self {
        AtomicSlot {
            w0: AtomicU64::new(0),
            w1: AtomicU64::new(0),
        }
    }

    #[inline]
    fn load(&self) -> TTEntry {
        TTEntry::from_words(
            self.w0.load(Ordering::Relaxed),
            self.w1.load(Ordering::Relaxed),
        )
    }

    #[inline]
    fn store(&self, entry: TTEntry) {
        let (w0, w1) = entry.to_words();
        self.w0.store(w0, Ordering::Relaxed);
        self.w1.store(w1, Ordering::Relaxed);
    }
}

/// Rolling generation distance used to break replacement ties in favour of
/// entries from the current search over stale ones.
const GEN_CYCLE: u8 = 64;
const GEN_MASK: u8 = 0x3F;

pub struct TranspositionTable {
    slots: Vec<AtomicSlot>,
    num_buckets: usize,
    generation: AtomicU8,
    size_mb: usize,
}

unsafe impl Send for TranspositionTable {}
unsafe impl Sync for TranspositionTable {}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let bytes = size_mb.max(1) * 1024 * 1024;
        let num_buckets = (bytes / (BUCKET_SIZE * 16))
            .next_power_of_two()
            .max(1024);
        let slots = (0..num_buckets * BUCKET_SIZE)
            .map(|_| AtomicSlot::empty())
            .collect();
        Self {
            slots,
            num_buckets,
            generation: AtomicU8::new(0),
            size_mb,
        }
    }

    pub fn resize(&mut self, size_mb: usize) {
        *self = Self::new(size_mb);
    }

    pub fn size_mb(&self) -> usize {
        self.size_mb
    }

    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Bump the generation counter; call once at the start of each `go`.
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn bucket_index(&self, hash: Hash) -> usize {
        (hash as usize) & (self.num_buckets - 1)
    }

    #[inline]
    fn bucket(&self, hash: Hash) -> &[AtomicSlot] {
        let base = self.bucket_index(hash) * BUCKET_SIZE;
        &self.slots[base..base + BUCKET_SIZE]
    }

    pub fn probe(&self, hash: Hash) -> Option<TTEntry> {
        for slot in self.bucket(hash) {
            let entry = slot.load();
            if !entry.is_empty() && entry.matches(hash) {
                return Some(entry);
            }
        }
        None
    }

    /// Store a result, replacing the weakest entry in the bucket (by the
    /// depth-minus-age-penalty rule) unless the bucket already holds a
    /// better record for this exact key.
    pub fn store(
        &self,
        hash: Hash,
        mut best_move: Option<Move>,
        score: Score,
        static_eval: Score,
        depth: Depth,
        bound: BoundType,
    ) {
        let gen = self.generation();
        let bucket = self.bucket(hash);

        let mut victim_idx = 0usize;
        let mut victim_value = i32::MAX;
        for (i, slot) in bucket.iter().enumerate() {
            let entry = slot.load();
            if entry.is_empty() {
                victim_idx = i;
                victim_value = i32::MIN;
                break;
            }
            if entry.matches(hash) {
                // Never overwrite a matching entry's move with "no move"
                // when we already have one on file.
                if best_move.is_none() {
                    best_move = entry.best_move();
                }
                // Keep the existing record unless the new one is strictly
                // better: deeper, or EXACT (PV re-verification always wins).
                let keep_existing = bound != BoundType::Exact
                    && entry.depth().raw() > depth.raw() - 3
                    && entry.generation() == gen;
                if keep_existing {
                    return;
                }
                victim_idx = i;
                victim_value = i32::MIN;
                break;
            }
            let age_penalty = ((GEN_CYCLE.wrapping_add(gen).wrapping_sub(entry.generation())) & GEN_MASK) as i32;
            let value = entry.depth().raw() - age_penalty;
            if value < victim_value {
                victim_value = value;
                victim_idx = i;
            }
        }

        let entry = TTEntry::new(hash, best_move, score, static_eval, depth, bound, gen);
        bucket[victim_idx].store(entry);
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            slot.w0.store(0, Ordering::Relaxed);
            slot.w1.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Per-mille occupancy of current-generation entries, sampled over the
    /// first 1000 entries (or all of them, if the table is smaller).
    pub fn hashfull(&self) -> u32 {
        let gen = self.generation();
        let sample_size = self.slots.len().min(1000);
        let used = self.slots[..sample_size]
            .iter()
            .filter(|s| {
                let e = s.load();
                !e.is_empty() && e.generation() == gen
            })
            .count();
        ((used * 1000) / sample_size.max(1)) as u32
    }

    #[inline]
    pub fn prefetch(&self, _hash: Hash) {
        // No platform-specific prefetch intrinsic is used; kept as a named
        // no-op so call sites have an obvious home for a future
        // target-specific implementation.
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_store_roundtrip() {
        let tt = TranspositionTable::new(1);
        let hash: Hash = 0x123456789ABCDEF0;
        assert!(tt.probe(hash).is_none());

        tt.store(
            hash,
            None,
            Score::cp(100),
            Score::cp(50),
            Depth::new(5),
            BoundType::Exact,
        );

        let entry = tt.probe(hash).expect("entry should exist");
        assert_eq!(entry.score().raw(), 100);
        assert_eq!(entry.static_eval().raw(), 50);
        assert_eq!(entry.depth().raw(), 5);
        assert_eq!(entry.bound(), BoundType::Exact);
    }

    #[test]
    fn move_encoding_roundtrip() {
        let mv = Move::new(chess::Square::E2, chess::Square::E4, None);
        let encoded = encode_move(Some(mv));
        let decoded = decode_move(encoded).unwrap();
        assert_eq!(mv.get_source(), decoded.get_source());
        assert_eq!(mv.get_dest(), decoded.get_dest());
    }

    #[test]
    fn promotion_move_encoding_roundtrip() {
        let mv = Move::new(chess::Square::E7, chess::Square::E8, Some(chess::Piece::Queen));
        let decoded = decode_move(encode_move(Some(mv))).unwrap();
        assert_eq!(decoded.get_promotion(), Some(chess::Piece::Queen));
    }

    #[test]
    fn deeper_exact_entry_overwrites_shallower_one() {
        let tt = TranspositionTable::new(1);
        let hash: Hash = 0xAAAA_BBBB_CCCC_DDDD;
        tt.store(hash, None, Score::cp(10), Score::cp(0), Depth::new(2), BoundType::UpperBound);
        tt.store(hash, None, Score::cp(20), Score::cp(0), Depth::new(8), BoundType::Exact);
        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth().raw(), 8);
        assert_eq!(entry.bound(), BoundType::Exact);
    }

    #[test]
    fn clear_empties_every_bucket() {
        let tt = TranspositionTable::new(1);
        let hash: Hash = 0x1;
        tt.store(hash, None, Score::cp(1), Score::cp(1), Depth::new(1), BoundType::Exact);
        tt.clear();
        assert!(tt.probe(hash).is_none());
    }
}
