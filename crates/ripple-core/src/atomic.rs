//! Atomic cells for every element type the kernels write concurrently.
//
// Floats have no native atomic add, so the float cells run a compare-exchange
// loop over the bit pattern. Integer and boolean cells forward to std.

use core::sync::atomic::{
    AtomicBool, AtomicI32, AtomicI64, AtomicU16, AtomicU32, AtomicU64, Ordering,
};

use core::fmt::Debug;

use half::{bf16, f16};

/// A shared cell that supports the read-modify-write operations of the scatter stages.
///
/// `fetch_add` and `fetch_max` return the previous value. For `bool`, both are a logical OR.
pub trait AtomicCell<T>: Debug + Send + Sync + Sized {
    fn new(value: T) -> Self;
    fn load(&self) -> T;
    fn store(&self, value: T);
    fn fetch_add(&self, value: T) -> T;
    fn fetch_max(&self, value: T) -> T;
    fn exchange(&self, value: T) -> T;
    fn into_inner(self) -> T;
}

macro_rules! float_cell {
    ($(#[$meta:meta])* $name:ident, $float:ty, $bits:ty) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        #[repr(transparent)]
        pub struct $name($bits);

        impl $name {
            /// Apply `f` until the CAS lands; `None` leaves the cell unchanged.
            #[inline]
            fn update(&self, mut f: impl FnMut($float) -> Option<$float>) -> $float {
                let mut cur = self.0.load(Ordering::Relaxed);
                loop {
                    let old = <$float>::from_bits(cur);
                    let Some(next) = f(old) else {
                        return old;
                    };
                    match self.0.compare_exchange_weak(
                        cur,
                        next.to_bits(),
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => return old,
                        Err(actual) => cur = actual,
                    }
                }
            }
        }

        impl AtomicCell<$float> for $name {
            #[inline]
            fn new(value: $float) -> Self {
                Self(<$bits>::new(value.to_bits()))
            }
            #[inline]
            fn load(&self) -> $float {
                <$float>::from_bits(self.0.load(Ordering::Acquire))
            }
            #[inline]
            fn store(&self, value: $float) {
                self.0.store(value.to_bits(), Ordering::Release);
            }
            #[inline]
            fn fetch_add(&self, value: $float) -> $float {
                self.update(|old| Some(old + value))
            }
            #[inline]
            fn fetch_max(&self, value: $float) -> $float {
                self.update(|old| (value > old).then_some(value))
            }
            #[inline]
            fn exchange(&self, value: $float) -> $float {
                <$float>::from_bits(self.0.swap(value.to_bits(), Ordering::AcqRel))
            }
            #[inline]
            fn into_inner(self) -> $float {
                <$float>::from_bits(self.0.into_inner())
            }
        }
    };
}

float_cell!(
    /// `f32` stored as its bit pattern.
    AtomicF32, f32, AtomicU32
);
float_cell!(
    /// `f64` stored as its bit pattern.
    AtomicF64, f64, AtomicU64
);
float_cell!(
    /// Half-precision cell; each add rounds through `f32` once.
    AtomicF16, f16, AtomicU16
);
float_cell!(AtomicBf16, bf16, AtomicU16);

macro_rules! int_cell {
    ($atomic:ty, $int:ty) => {
        impl AtomicCell<$int> for $atomic {
            #[inline]
            fn new(value: $int) -> Self {
                <$atomic>::new(value)
            }
            #[inline]
            fn load(&self) -> $int {
                <$atomic>::load(self, Ordering::Acquire)
            }
            #[inline]
            fn store(&self, value: $int) {
                <$atomic>::store(self, value, Ordering::Release);
            }
            /// Wrapping, as std atomics are.
            #[inline]
            fn fetch_add(&self, value: $int) -> $int {
                <$atomic>::fetch_add(self, value, Ordering::AcqRel)
            }
            #[inline]
            fn fetch_max(&self, value: $int) -> $int {
                <$atomic>::fetch_max(self, value, Ordering::AcqRel)
            }
            #[inline]
            fn exchange(&self, value: $int) -> $int {
                <$atomic>::swap(self, value, Ordering::AcqRel)
            }
            #[inline]
            fn into_inner(self) -> $int {
                <$atomic>::into_inner(self)
            }
        }
    };
}

int_cell!(AtomicI32, i32);
int_cell!(AtomicI64, i64);
int_cell!(AtomicU32, u32);

impl AtomicCell<bool> for AtomicBool {
    #[inline]
    fn new(value: bool) -> Self {
        Self::new(value)
    }
    #[inline]
    fn load(&self) -> bool {
        Self::load(self, Ordering::Acquire)
    }
    #[inline]
    fn store(&self, value: bool) {
        Self::store(self, value, Ordering::Release);
    }
    #[inline]
    fn fetch_add(&self, value: bool) -> bool {
        self.fetch_or(value, Ordering::AcqRel)
    }
    #[inline]
    fn fetch_max(&self, value: bool) -> bool {
        self.fetch_or(value, Ordering::AcqRel)
    }
    #[inline]
    fn exchange(&self, value: bool) -> bool {
        self.swap(value, Ordering::AcqRel)
    }
    #[inline]
    fn into_inner(self) -> bool {
        Self::into_inner(self)
    }
}
