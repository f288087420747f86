//! Element types accepted by the scatter kernels and their widened accumulators

use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicI64};

use half::{bf16, f16};
use wide::{f32x4, f64x4};

use crate::atomic::{AtomicBf16, AtomicCell, AtomicF16, AtomicF32, AtomicF64};

/// How an element type combines, which decides the paths it may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Rounding depends on summation order; eligible for the quantized path.
    Float,
    /// Wrapping addition; exact under any order.
    Integer,
    /// Logical OR; exact under any order.
    Logical,
}

impl ElementKind {
    /// Kinds whose combine is associative, so the fast paths are already reproducible.
    #[inline]
    #[must_use]
    pub const fn is_exact(self) -> bool {
        !matches!(self, Self::Float)
    }
}

/// The type a run of update rows is summed in before a single write to the output.
pub trait Accumulate: Copy + Send + Sync + Debug + PartialEq + 'static {
    const ZERO: Self;

    fn combine(self, other: Self) -> Self;

    /// Lossless for floats; used for reference magnitudes and quantization.
    fn to_f64(self) -> f64;

    /// `dst[k] = dst[k].combine(src[k])` over the common prefix.
    #[inline]
    fn combine_slice(dst: &mut [Self], src: &[Self]) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = d.combine(s);
        }
    }
}

impl Accumulate for f32 {
    const ZERO: Self = 0.0;

    #[inline]
    fn combine(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    // Lane-wise adds round exactly like the scalar loop, so results do not
    // depend on whether the SIMD body or the tail handled an element.
    fn combine_slice(dst: &mut [Self], src: &[Self]) {
        let n = dst.len().min(src.len());
        let limit4 = n & !3;
        let mut k = 0usize;
        while k < limit4 {
            let a = f32x4::from([dst[k], dst[k + 1], dst[k + 2], dst[k + 3]]);
            let b = f32x4::from([src[k], src[k + 1], src[k + 2], src[k + 3]]);
            dst[k..k + 4].copy_from_slice(&(a + b).to_array());
            k += 4;
        }
        while k < n {
            dst[k] += src[k];
            k += 1;
        }
    }
}

impl Accumulate for f64 {
    const ZERO: Self = 0.0;

    #[inline]
    fn combine(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    fn combine_slice(dst: &mut [Self], src: &[Self]) {
        let n = dst.len().min(src.len());
        let limit4 = n & !3;
        let mut k = 0usize;
        while k < limit4 {
            let a = f64x4::from([dst[k], dst[k + 1], dst[k + 2], dst[k + 3]]);
            let b = f64x4::from([src[k], src[k + 1], src[k + 2], src[k + 3]]);
            dst[k..k + 4].copy_from_slice(&(a + b).to_array());
            k += 4;
        }
        while k < n {
            dst[k] += src[k];
            k += 1;
        }
    }
}

impl Accumulate for i64 {
    const ZERO: Self = 0;

    #[inline]
    fn combine(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    #[inline]
    #[allow(clippy::cast_precision_loss, reason = "diagnostic only for integer kinds")]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Accumulate for bool {
    const ZERO: Self = false;

    #[inline]
    fn combine(self, other: Self) -> Self {
        self | other
    }

    #[inline]
    fn to_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }
}

/// A value type that can be scattered into an output tensor.
pub trait Element: Copy + Send + Sync + Debug + PartialEq + 'static {
    type Acc: Accumulate;
    type Cell: AtomicCell<Self>;

    const KIND: ElementKind;
    const NAME: &'static str;
    /// Adds at storage precision round differently from adds in `Acc`, so
    /// rows must never be combined one by one into the output.
    const WIDENED: bool = false;

    fn widen(self) -> Self::Acc;

    /// Single rounding back to storage precision.
    fn narrow(acc: Self::Acc) -> Self;

    /// Conversion used when writing a dequantized total.
    fn from_f64(value: f64) -> Self;
}

macro_rules! float_element {
    ($t:ty, $acc:ty, $cell:ty, $name:literal, $widened:literal, $widen:expr, $narrow:expr, $from:expr) => {
        impl Element for $t {
            type Acc = $acc;
            type Cell = $cell;

            const KIND: ElementKind = ElementKind::Float;
            const NAME: &'static str = $name;
            const WIDENED: bool = $widened;

            #[inline]
            fn widen(self) -> $acc {
                $widen(self)
            }
            #[inline]
            fn narrow(acc: $acc) -> Self {
                $narrow(acc)
            }
            #[inline]
            fn from_f64(value: f64) -> Self {
                $from(value)
            }
        }
    };
}

#[allow(clippy::cast_possible_truncation, reason = "round-to-nearest is the intended narrowing")]
fn f64_to_f32(v: f64) -> f32 {
    v as f32
}

float_element!(f32, f32, AtomicF32, "float32", false, |v| v, |a| a, f64_to_f32);
float_element!(f64, f64, AtomicF64, "float64", false, |v| v, |a| a, |v| v);
float_element!(f16, f32, AtomicF16, "float16", true, f16::to_f32, f16::from_f32, f16::from_f64);
float_element!(bf16, f32, AtomicBf16, "bfloat16", true, bf16::to_f32, bf16::from_f32, bf16::from_f64);

impl Element for i32 {
    type Acc = i64;
    type Cell = AtomicI32;

    const KIND: ElementKind = ElementKind::Integer;
    const NAME: &'static str = "int32";

    #[inline]
    fn widen(self) -> i64 {
        i64::from(self)
    }
    #[inline]
    #[allow(clippy::cast_possible_truncation, reason = "two's-complement wrap matches wrapping atomics")]
    fn narrow(acc: i64) -> Self {
        acc as i32
    }
    #[inline]
    #[allow(clippy::cast_possible_truncation, reason = "saturating float-to-int cast")]
    fn from_f64(value: f64) -> Self {
        value as i32
    }
}

impl Element for i64 {
    type Acc = i64;
    type Cell = AtomicI64;

    const KIND: ElementKind = ElementKind::Integer;
    const NAME: &'static str = "int64";

    #[inline]
    fn widen(self) -> i64 {
        self
    }
    #[inline]
    fn narrow(acc: i64) -> Self {
        acc
    }
    #[inline]
    #[allow(clippy::cast_possible_truncation, reason = "saturating float-to-int cast")]
    fn from_f64(value: f64) -> Self {
        value as i64
    }
}

impl Element for bool {
    type Acc = bool;
    type Cell = AtomicBool;

    const KIND: ElementKind = ElementKind::Logical;
    const NAME: &'static str = "bool";

    #[inline]
    fn widen(self) -> bool {
        self
    }
    #[inline]
    fn narrow(acc: bool) -> Self {
        acc
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value != 0.0
    }
}

/// Integer types accepted as index coordinates.
pub trait IndexElement: Copy + Send + Sync + Debug + 'static {
    fn to_i64(self) -> i64;
}

impl IndexElement for i32 {
    #[inline]
    fn to_i64(self) -> i64 {
        i64::from(self)
    }
}

impl IndexElement for i64 {
    #[inline]
    fn to_i64(self) -> i64 {
        self
    }
}
