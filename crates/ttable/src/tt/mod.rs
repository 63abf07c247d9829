//! Transposition table module
//!
//! Shared cache of search results (Transposition Table).
//!
//! - `TTEntry`: one packed entry (10 bytes, 16-bit key)
//! - `Bucket`: group of entries sharing one 32-byte cache line
//! - `TranspositionTable`: the table itself
//! - generation (age) management
//! - prefetch
//!
//! # Layout
//!
//! The bucket index is taken from the high bits of the 64-bit key product
//! (see [`bucket_index`]) and the low 16 bits are compared inside the bucket.
//! 10-byte entries × 3 + a 2-byte shared word = 32 bytes per bucket. The
//! shared word carries one auxiliary bit per entry.
//!
//! # Race contract
//!
//! No locks, no read-modify-write atomics and no fences guard the entries.
//! Every field is a `Relaxed` atomic of its own width, which lowers to plain
//! loads and stores but keeps the program free of undefined behaviour. A
//! snapshot returned by `probe` is therefore a best-effort copy: fields may
//! come from different writers, and two writers on the same slot may leave a
//! mix of both. Callers treat snapshot contents as hints.

mod alloc;
mod bucket;
mod entry;
mod index;
mod params;
mod table;

pub use bucket::{Bucket, EntrySlot, ExtraBit};
pub use entry::{TTData, TTEntry};
pub use index::{bucket_index, mul_hi64};
pub use params::ReplacementParams;
pub use table::{ProbeResult, TTWriter, TranspositionTable};

/// Entries per bucket: 10 bytes × 3 + 2 bytes of extra bits = 32 bytes
pub const ENTRY_COUNT: usize = 3;

/// Generation constants
///
/// The generation occupies the top 5 bits of `gen_bound8`; the low 3 bits
/// hold the PV flag and the bound, and are never touched by generation
/// arithmetic.
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
pub const GENERATION_MASK: u8 = 0xF8; // (0xFF << GENERATION_BITS) as u8

/// Number of leading buckets sampled by `hashfull`
pub const HASHFULL_SAMPLE: usize = 1000;
