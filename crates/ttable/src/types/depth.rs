//! Search depth and its biased byte encoding
//!
//! The table stores `depth - DEPTH_ENTRY_OFFSET` in one byte. Zero is the
//! occupancy sentinel, so the storable range is
//! `DEPTH_ENTRY_OFFSET + 1 ..= DEPTH_ENTRY_OFFSET + 255`, which leaves room
//! for the negative depths of quiescence search.

/// Search depth in plies
pub type Depth = i32;

/// Quiescence search
pub const DEPTH_QS: Depth = 0;
/// Entry written without a search (e.g. just the static eval)
pub const DEPTH_UNSEARCHED: Depth = -2;
/// Bias of the stored depth byte; also what an empty entry decodes to
pub const DEPTH_ENTRY_OFFSET: Depth = -3;

/// Smallest depth the table can store
pub const MIN_STORABLE_DEPTH: Depth = DEPTH_ENTRY_OFFSET + 1;
/// Largest depth the table can store
pub const MAX_STORABLE_DEPTH: Depth = DEPTH_ENTRY_OFFSET + u8::MAX as Depth;

/// Whether `depth` can be written without clamping
#[inline]
pub const fn is_storable_depth(depth: Depth) -> bool {
    depth >= MIN_STORABLE_DEPTH && depth <= MAX_STORABLE_DEPTH
}
