//! 16-bit move encoding as stored in the table
//!
//! The table does not interpret moves. The search decides what the 16 bits
//! mean; the only reserved pattern is zero, `Move::NONE`.

/// Best or refutation move (16-bit form)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// No move
    pub const NONE: Move = Move(0);

    #[inline]
    pub const fn from_u16(raw: u16) -> Move {
        Move(raw)
    }

    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}
