//! Shared constants and small conversions used across the kernels

/// Bytes per bucket window of the duplicate estimator.
pub const CACHE_LINE_BYTES: usize = 128;
/// Buckets in the duplicate-rate histogram.
pub const HISTOGRAM_BUCKETS: usize = 256;
/// Digit width of one radix pass.
pub const RADIX_BITS: u32 = 8;
pub const RADIX_BUCKETS: usize = 1 << RADIX_BITS;
pub const RADIX_MASK: usize = RADIX_BUCKETS - 1;
/// Slices at least this long use rayon's sort under the automatic strategy.
pub const PARALLEL_SORT_MIN_LEN: usize = 1 << 18;

/// Convert i64 to usize, asserting non-negativity.
#[inline]
#[must_use]
pub fn i64_to_usize(x: i64) -> usize {
    debug_assert!(x >= 0);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    {
        x as usize
    }
}

#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss, reason = "ratios only need a few significant digits")]
pub fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
