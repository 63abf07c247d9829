//! Bucket: the unit of locality
//!
//! A bucket is one 32-byte cache line holding `ENTRY_COUNT` entries and a
//! 16-bit side-channel whose bit *i* is the auxiliary flag of entry *i*.

use super::ENTRY_COUNT;
use super::entry::{TTData, TTEntry};
use std::sync::atomic::{AtomicU16, Ordering};

/// Bucket structure
/// Entries sharing one hash index: 10 bytes × 3 + 2 bytes extra = 32 bytes
#[repr(C, align(32))]
pub struct Bucket {
    entries: [TTEntry; ENTRY_COUNT],
    /// One auxiliary bit per entry (bit i = entry i); upper bits unused
    extra: AtomicU16,
}

// バケットは32バイト（キャッシュライン半分）であることを保証
const _: () = assert!(std::mem::size_of::<Bucket>() == 32);
const _: () = assert!(ENTRY_COUNT <= u16::BITS as usize);

impl Bucket {
    /// New empty bucket
    pub const fn new() -> Self {
        Self {
            entries: [const { TTEntry::new() }; ENTRY_COUNT],
            extra: AtomicU16::new(0),
        }
    }

    #[inline]
    pub fn entries(&self) -> &[TTEntry; ENTRY_COUNT] {
        &self.entries
    }

    /// Auxiliary bit of entry `index`
    #[inline]
    pub fn extra_bit(&self, index: usize) -> ExtraBit<'_> {
        debug_assert!(index < ENTRY_COUNT);
        ExtraBit {
            word: &self.extra,
            index,
        }
    }

    /// `(bucket, index)` handle to one slot
    #[inline]
    pub fn slot(&self, index: usize) -> EntrySlot<'_> {
        debug_assert!(index < ENTRY_COUNT);
        EntrySlot {
            bucket: self,
            index,
        }
    }

    /// Raw extra word
    #[inline]
    pub fn extra(&self) -> u16 {
        self.extra.load(Ordering::Relaxed)
    }

    /// Number of occupied entries
    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|e| e.is_occupied()).count()
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}

/// Accessor for one entry's bit in a bucket's shared extra word
///
/// The bit is owned by the bucket, not by the entry. Setting it is a relaxed
/// load followed by a relaxed store of the whole word, so a concurrent update
/// of a neighbouring bit in the same bucket can be lost.
#[derive(Clone, Copy)]
pub struct ExtraBit<'a> {
    word: &'a AtomicU16,
    index: usize,
}

impl ExtraBit<'_> {
    #[inline]
    pub fn get(&self) -> bool {
        (self.word.load(Ordering::Relaxed) >> self.index) & 1 != 0
    }

    #[inline]
    pub fn set(&self, flag: bool) {
        let mask = 1u16 << self.index;
        let word = self.word.load(Ordering::Relaxed);
        let word = if flag { word | mask } else { word & !mask };
        self.word.store(word, Ordering::Relaxed);
    }
}

/// One entry slot, addressed as `(bucket, index)`
#[derive(Clone, Copy)]
pub struct EntrySlot<'a> {
    bucket: &'a Bucket,
    index: usize,
}

impl<'a> EntrySlot<'a> {
    #[inline]
    pub fn bucket(&self) -> &'a Bucket {
        self.bucket
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn entry(&self) -> &'a TTEntry {
        &self.bucket.entries[self.index]
    }

    #[inline]
    pub fn extra_bit(&self) -> ExtraBit<'a> {
        self.bucket.extra_bit(self.index)
    }

    /// Decode the entry together with its auxiliary bit
    #[inline]
    pub fn read(&self) -> TTData {
        self.entry().read(self.extra_bit().get())
    }
}
