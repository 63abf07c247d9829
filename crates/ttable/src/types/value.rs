//! Search value (`Value`)
//!
//! The table stores values as `i16`; everything the search produces must fit
//! that range. `Value::NONE` marks "no value" and is what an empty snapshot
//! reports.

/// Search or evaluation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// Zero
    pub const ZERO: Value = Value(0);
    /// Draw
    pub const DRAW: Value = Value(0);
    /// Mate (largest winning score)
    pub const MATE: Value = Value(32000);
    /// Infinity
    pub const INFINITE: Value = Value(32001);
    /// No value
    pub const NONE: Value = Value(32002);

    /// Construct from a raw score
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// Raw score
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether the value survives the `i16` packing unchanged
    #[inline]
    pub const fn fits_i16(self) -> bool {
        self.0 >= i16::MIN as i32 && self.0 <= i16::MAX as i32
    }
}

impl From<i16> for Value {
    #[inline]
    fn from(v: i16) -> Self {
        Value(v as i32)
    }
}
