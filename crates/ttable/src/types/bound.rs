//! Bound kind of a stored value

/// How a stored value relates to the true search result
///
/// The discriminants are the 2-bit field stored in `gen_bound8`.
/// `Exact` is `Upper | Lower`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Bound {
    #[default]
    None = 0,
    /// Fail-low: the value is an upper bound
    Upper = 1,
    /// Fail-high: the value is a lower bound
    Lower = 2,
    /// PV node: the value is exact
    Exact = 3,
}

impl Bound {
    /// Decode the low two bits of a packed byte
    #[inline]
    pub const fn from_bits(bits: u8) -> Bound {
        match bits & 0x3 {
            0 => Bound::None,
            1 => Bound::Upper,
            2 => Bound::Lower,
            _ => Bound::Exact,
        }
    }

    /// Whether the value can be used as a lower bound
    #[inline]
    pub const fn is_lower(self) -> bool {
        (self as u8) & (Bound::Lower as u8) != 0
    }

    /// Whether the value can be used as an upper bound
    #[inline]
    pub const fn is_upper(self) -> bool {
        (self as u8) & (Bound::Upper as u8) != 0
    }
}
