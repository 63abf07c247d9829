//! Value types stored in the transposition table
//!
//! These are the small, copyable types a search hands to the table. They are
//! deliberately thin: the table only needs to pack and unpack them.

mod bound;
mod depth;
mod moves;
mod value;

pub use bound::Bound;
pub use depth::{
    DEPTH_ENTRY_OFFSET, DEPTH_QS, DEPTH_UNSEARCHED, Depth, MAX_STORABLE_DEPTH, MIN_STORABLE_DEPTH,
    is_storable_depth,
};
pub use moves::Move;
pub use value::Value;
