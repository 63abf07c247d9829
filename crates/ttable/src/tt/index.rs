//! Key to bucket addressing

/// High 64 bits of the 128-bit product `a * b`
#[inline]
pub const fn mul_hi64(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) >> 64) as u64
}

/// Map a key onto `0..bucket_count`
///
/// `key * bucket_count / 2^64` spreads a uniform key over any bucket count,
/// power of two or not, without a division on the hot path.
#[inline]
pub fn bucket_index(key: u64, bucket_count: usize) -> usize {
    mul_hi64(key, bucket_count as u64) as usize
}
