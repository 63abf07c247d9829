//! Transposition table entry
//!
//! TTEntry: compact 10-byte entry, one relaxed atomic per field
//! TTData: the decoded copy handed to the search

use super::bucket::ExtraBit;
use super::params::ReplacementParams;
use super::{GENERATION_CYCLE, GENERATION_MASK};
use crate::types::{
    Bound, DEPTH_ENTRY_OFFSET, Depth, MAX_STORABLE_DEPTH, MIN_STORABLE_DEPTH, Move, Value,
    is_storable_depth,
};
use std::sync::atomic::{AtomicI16, AtomicU8, AtomicU16, Ordering};

/// Transposition table entry (10 bytes)
///
/// ```text
/// key        16 bit
/// depth       8 bit
/// generation  5 bit
/// pv node     1 bit
/// bound type  2 bit
/// move       16 bit
/// value      16 bit
/// evaluation 16 bit
/// ```
///
/// Fields are laid out in the order `probe` touches them. The auxiliary
/// flag does not live here; it belongs to the owning [`Bucket`](super::Bucket).
#[derive(Default)]
#[repr(C)]
pub struct TTEntry {
    /// Low 16 bits of the position key
    key16: AtomicU16,
    /// Depth minus `DEPTH_ENTRY_OFFSET`; zero means empty
    depth8: AtomicU8,
    /// generation(5bit) | pv(1bit) | bound(2bit)
    gen_bound8: AtomicU8,
    move16: AtomicU16,
    value16: AtomicI16,
    eval16: AtomicI16,
}

const _: () = assert!(std::mem::size_of::<TTEntry>() == 10);

impl TTEntry {
    /// New empty entry
    #[inline]
    pub const fn new() -> Self {
        Self {
            key16: AtomicU16::new(0),
            depth8: AtomicU8::new(0),
            gen_bound8: AtomicU8::new(0),
            move16: AtomicU16::new(0),
            value16: AtomicI16::new(0),
            eval16: AtomicI16::new(0),
        }
    }

    /// Whether the entry holds data
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.depth8.load(Ordering::Relaxed) != 0
    }

    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16.load(Ordering::Relaxed)
    }

    /// Stored depth with the bias removed
    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth8() as Depth + DEPTH_ENTRY_OFFSET
    }

    /// Raw biased depth byte
    #[inline]
    pub fn depth8(&self) -> u8 {
        self.depth8.load(Ordering::Relaxed)
    }

    /// Raw generation/PV/bound byte
    #[inline]
    pub fn gen_bound8(&self) -> u8 {
        self.gen_bound8.load(Ordering::Relaxed)
    }

    /// Decode the entry
    ///
    /// `cut_flag` is the auxiliary bit read from the owning bucket.
    pub fn read(&self, cut_flag: bool) -> TTData {
        let gen_bound8 = self.gen_bound8();
        TTData {
            mv: Move::from_u16(self.move16.load(Ordering::Relaxed)),
            value: Value::from(self.value16.load(Ordering::Relaxed)),
            eval: Value::from(self.eval16.load(Ordering::Relaxed)),
            depth: self.depth(),
            bound: Bound::from_bits(gen_bound8),
            is_pv: (gen_bound8 & 0x4) != 0,
            cut_flag,
        }
    }

    /// Store a search result, possibly overwriting another position
    ///
    /// The update is neither atomic as a whole nor ordered with respect to
    /// other threads. `extra` is this entry's bit in the bucket's shared word.
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key16: u16,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        cut_flag: bool,
        generation8: u8,
        extra: ExtraBit<'_>,
        params: &ReplacementParams,
    ) {
        debug_assert_eq!(generation8 & !GENERATION_MASK, 0, "generation has low bits set");
        debug_assert!(is_storable_depth(depth), "depth {depth} outside storable range");

        let stored_key16 = self.key16();

        // 新しい手がない場合は古い手を保持
        if !mv.is_none() || key16 != stored_key16 {
            self.move16.store(mv.to_u16(), Ordering::Relaxed);
        }

        let stored_depth8 = self.depth8() as i32;
        let d8 = depth.clamp(MIN_STORABLE_DEPTH, MAX_STORABLE_DEPTH) - DEPTH_ENTRY_OFFSET;

        // Overwrite less valuable entries (cheapest checks first):
        // - exact bound
        // - different key
        // - deeper search, PV nodes favoured
        // - stale entry
        if bound == Bound::Exact
            || key16 != stored_key16
            || (d8 + 2 * is_pv as i32) as i64 > stored_depth8 as i64 - params.depth_slack as i64
            || self.relative_age(generation8) != 0
        {
            debug_assert!(value.fits_i16(), "value {} does not fit i16", value.raw());
            debug_assert!(eval.fits_i16(), "eval {} does not fit i16", eval.raw());

            self.key16.store(key16, Ordering::Relaxed);
            self.depth8.store(d8 as u8, Ordering::Relaxed);
            self.gen_bound8
                .store(generation8 | ((is_pv as u8) << 2) | bound as u8, Ordering::Relaxed);
            self.value16.store(value.raw() as i16, Ordering::Relaxed);
            self.eval16.store(eval.raw() as i16, Ordering::Relaxed);
            extra.set(cut_flag);
        } else if stored_depth8 > 1
            && stored_depth8 + DEPTH_ENTRY_OFFSET >= params.decay_threshold
            && Bound::from_bits(self.gen_bound8()) != Bound::Exact
        {
            // Deep non-exact entries that resisted the write lose a little confidence
            self.depth8.store((stored_depth8 - 1) as u8, Ordering::Relaxed);
        }
    }

    /// Relative age (0 = current generation)
    ///
    /// Correct across the 8-bit wraparound; the PV/bound bits never borrow
    /// into the generation bits.
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        let age = GENERATION_CYCLE + generation8 as u16 - self.gen_bound8() as u16;
        (age & GENERATION_MASK as u16) as u8
    }
}

/// Data read from the table
///
/// A copy, possibly torn by a concurrent write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TTData {
    /// Best move
    pub mv: Move,
    /// Search value
    pub value: Value,
    /// Static evaluation
    pub eval: Value,
    /// Search depth
    pub depth: Depth,
    /// Bound kind
    pub bound: Bound,
    /// Whether the node was on the PV
    pub is_pv: bool,
    /// Auxiliary flag kept in the bucket's extra bits
    pub cut_flag: bool,
}

impl TTData {
    /// Empty data
    pub const EMPTY: Self = Self {
        mv: Move::NONE,
        value: Value::NONE,
        eval: Value::NONE,
        depth: DEPTH_ENTRY_OFFSET,
        bound: Bound::None,
        is_pv: false,
        cut_flag: false,
    };
}

impl Default for TTData {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::Bucket;
    use crate::tt::GENERATION_DELTA;

    const P: ReplacementParams = ReplacementParams::DEFAULT;

    #[allow(clippy::too_many_arguments)]
    fn save(
        bucket: &Bucket,
        key16: u16,
        value: i32,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        generation8: u8,
    ) {
        bucket.entries()[0].save(
            key16,
            Value::new(value),
            is_pv,
            bound,
            depth,
            mv,
            Value::ZERO,
            false,
            generation8,
            bucket.extra_bit(0),
            &P,
        );
    }

    #[test]
    fn test_tt_entry_new() {
        let entry = TTEntry::new();
        assert!(!entry.is_occupied());
        assert_eq!(entry.key16(), 0);
        assert_eq!(entry.depth(), DEPTH_ENTRY_OFFSET);
    }

    #[test]
    fn test_tt_entry_save_and_read() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        let mv = Move::from_u16(0x1C2D);

        entry.save(
            0x1234,
            Value::new(100),
            true,
            Bound::Exact,
            10,
            mv,
            Value::new(-50),
            true,
            GENERATION_DELTA,
            bucket.extra_bit(0),
            &P,
        );

        assert!(entry.is_occupied());
        assert_eq!(entry.key16(), 0x1234);

        let data = entry.read(bucket.extra_bit(0).get());
        assert_eq!(data.mv, mv);
        assert_eq!(data.value.raw(), 100);
        assert_eq!(data.eval.raw(), -50);
        assert_eq!(data.depth, 10);
        assert_eq!(data.bound, Bound::Exact);
        assert!(data.is_pv);
        assert!(data.cut_flag);
    }

    #[test]
    fn test_generation_does_not_touch_low_bits() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        let gen8 = GENERATION_DELTA * 31; // 0xF8
        save(&bucket, 1, 0, true, Bound::Upper, 4, Move::NONE, gen8);
        assert_eq!(entry.gen_bound8(), 0xF8 | 0x4 | Bound::Upper as u8);
        let data = entry.read(false);
        assert!(data.is_pv);
        assert_eq!(data.bound, Bound::Upper);
        assert_eq!(entry.relative_age(gen8), 0);
    }

    #[test]
    fn test_tt_entry_relative_age() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        save(&bucket, 0, 0, false, Bound::Lower, 10, Move::NONE, 8);

        // 同じ世代では0
        assert_eq!(entry.relative_age(8), 0);

        // 世代が進むと8刻みでageが増える（GENERATION_DELTA = 8）
        assert_eq!(entry.relative_age(16), 8);
        assert_eq!(entry.relative_age(8u8.wrapping_add(GENERATION_DELTA * 31)), 0xF8);
        assert_eq!(entry.relative_age(8u8.wrapping_add(GENERATION_DELTA.wrapping_mul(32))), 0);
    }

    #[test]
    fn test_relative_age_across_wraparound() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        let written = 0xF0;
        save(&bucket, 0, 0, true, Bound::Exact, 3, Move::NONE, written);
        let next = written.wrapping_add(GENERATION_DELTA); // 0xF8
        let wrapped = next.wrapping_add(GENERATION_DELTA); // 0x00
        assert_eq!(entry.relative_age(next), 8);
        assert_eq!(entry.relative_age(wrapped), 16);
        assert_eq!(entry.relative_age(wrapped.wrapping_add(GENERATION_DELTA)), 24);
    }

    #[test]
    fn test_move_retention() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        let mv = Move::from_u16(0x0ABC);
        save(&bucket, 0x42, 10, false, Bound::Lower, 6, mv, 0);

        // 同一キー・手なしの書き込みでは古い手を保持
        save(&bucket, 0x42, 20, false, Bound::Lower, 12, Move::NONE, 0);
        assert_eq!(entry.read(false).mv, mv);
        assert_eq!(entry.read(false).value.raw(), 20);

        // 異なるキーなら手なしでも上書き
        save(&bucket, 0x43, 30, false, Bound::Lower, 12, Move::NONE, 0);
        assert_eq!(entry.read(false).mv, Move::NONE);
    }

    #[test]
    fn test_tt_entry_decay_non_exact() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        let key = 0x1234u16;

        // 深いLower境界を保存
        save(&bucket, key, 0, false, Bound::Lower, 8, Move::NONE, 0);
        let depth_before = entry.depth8();

        // 同一世代・同一キー・浅いLowerを保存すると深さが1減衰する
        save(&bucket, key, 77, false, Bound::Lower, 1, Move::NONE, 0);
        assert_eq!(entry.depth8(), depth_before - 1);
        assert_eq!(entry.read(false).value.raw(), 0);
    }

    #[test]
    fn test_no_decay_below_threshold_or_for_exact() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];

        // Stored depth 4 is below the threshold of 5
        save(&bucket, 7, 0, false, Bound::Upper, 4, Move::NONE, 0);
        save(&bucket, 7, 0, false, Bound::Upper, -2, Move::NONE, 0);
        assert_eq!(entry.depth(), 4);

        // Exact entries never decay
        save(&bucket, 8, 0, false, Bound::Exact, 20, Move::NONE, 0);
        save(&bucket, 8, 0, false, Bound::Lower, 1, Move::NONE, 0);
        assert_eq!(entry.depth(), 20);
        assert_eq!(entry.read(false).bound, Bound::Exact);
    }

    #[test]
    fn test_depth_slack_boundary() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        save(&bucket, 9, 1, false, Bound::Lower, 10, Move::NONE, 0);

        // d8 + 0 > stored - 4  <=>  depth > 6
        save(&bucket, 9, 2, false, Bound::Lower, 6, Move::NONE, 0);
        assert_eq!(entry.read(false).value.raw(), 1);
        assert_eq!(entry.depth(), 9); // decayed

        // stored is now 9: depth 6 > 5 overwrites
        save(&bucket, 9, 3, false, Bound::Lower, 6, Move::NONE, 0);
        assert_eq!(entry.read(false).value.raw(), 3);
        assert_eq!(entry.depth(), 6);

        // PV adds two plies of credit: depth 5 over a stored 10 only overwrites as PV
        save(&bucket, 9, 4, false, Bound::Lower, 10, Move::NONE, 0);
        save(&bucket, 9, 5, true, Bound::Lower, 5, Move::NONE, 0);
        assert_eq!(entry.read(false).value.raw(), 5);
    }

    #[test]
    fn test_depth_range_boundaries() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];

        save(&bucket, 1, 0, false, Bound::Exact, MIN_STORABLE_DEPTH, Move::NONE, 0);
        assert!(entry.is_occupied());
        assert_eq!(entry.depth8(), 1);
        assert_eq!(entry.depth(), MIN_STORABLE_DEPTH);

        save(&bucket, 1, 0, false, Bound::Exact, MAX_STORABLE_DEPTH, Move::NONE, 0);
        assert_eq!(entry.depth8(), u8::MAX);
        assert_eq!(entry.read(false).depth, MAX_STORABLE_DEPTH);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_out_of_range_depth_is_clamped() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];

        save(&bucket, 1, 0, false, Bound::Exact, 300, Move::NONE, 0);
        assert_eq!(entry.depth8(), u8::MAX);
        assert_eq!(entry.depth(), MAX_STORABLE_DEPTH);

        // 下限未満でも空きエントリ扱いにならない
        save(&bucket, 1, 0, false, Bound::Exact, -10, Move::NONE, 0);
        assert!(entry.is_occupied());
        assert_eq!(entry.depth8(), 1);
        assert_eq!(entry.depth(), MIN_STORABLE_DEPTH);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "outside storable range")]
    fn test_out_of_range_depth_asserts_in_debug() {
        let bucket = Bucket::new();
        save(&bucket, 1, 0, false, Bound::Exact, 300, Move::NONE, 0);
    }

    #[test]
    fn test_extreme_depth_slack_does_not_overflow() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        let write = |depth: Depth, value: i32, params: &ReplacementParams| {
            entry.save(
                0x55,
                Value::new(value),
                false,
                Bound::Lower,
                depth,
                Move::NONE,
                Value::ZERO,
                false,
                0,
                bucket.extra_bit(0),
                params,
            );
        };
        write(10, 1, &P);

        // Huge negative slack: no depth ever clears the bar, so the entry decays
        let strict = ReplacementParams {
            depth_slack: i32::MIN,
            ..P
        };
        write(MAX_STORABLE_DEPTH, 2, &strict);
        assert_eq!(entry.read(false).value.raw(), 1);
        assert_eq!(entry.depth(), 9);

        // Huge positive slack: every write overwrites
        let lax = ReplacementParams {
            depth_slack: i32::MAX,
            ..P
        };
        write(MIN_STORABLE_DEPTH, 3, &lax);
        assert_eq!(entry.read(false).value.raw(), 3);
        assert_eq!(entry.depth(), MIN_STORABLE_DEPTH);
    }

    #[test]
    fn test_value_extremes_survive_packing() {
        let bucket = Bucket::new();
        let entry = &bucket.entries()[0];
        for v in [i16::MIN as i32, -1, 0, 1, Value::NONE.raw(), i16::MAX as i32] {
            entry.save(
                0x77,
                Value::new(v),
                false,
                Bound::Exact,
                3,
                Move::NONE,
                Value::new(-v.clamp(-i16::MAX as i32, i16::MAX as i32)),
                false,
                0,
                bucket.extra_bit(0),
                &P,
            );
            let data = entry.read(false);
            assert_eq!(data.value.raw(), v);
            assert_eq!(data.eval.raw(), -v.clamp(-i16::MAX as i32, i16::MAX as i32));
        }
    }

    #[test]
    fn test_tt_data_empty() {
        let data = TTData::EMPTY;
        assert_eq!(data.mv, Move::NONE);
        assert_eq!(data.bound, Bound::None);
        assert_eq!(data.depth, DEPTH_ENTRY_OFFSET);
        assert!(!data.is_pv);
        assert!(!data.cut_flag);
        assert_eq!(TTData::default(), data);
    }
}
