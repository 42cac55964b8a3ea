//! Element types supported by the benchmark kernels.

use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Mul, Sub};

use bytemuck::Pod;

/// Floating-point element type of a stream.
///
/// Precision is fixed per stream instance through this type parameter;
/// there is no runtime switch between single and double precision.
pub trait StreamScalar:
    Pod
    + Default
    + Debug
    + Display
    + PartialOrd
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + AddAssign
    + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Machine epsilon.
    const EPSILON: Self;
    /// Relative tolerance accepted for `dot` against a reference sum.
    const DOT_TOLERANCE: f64;
    /// Human-readable precision name ("float" / "double").
    const PRECISION: &'static str;
    /// C type name used when generating device kernels.
    const C_TYPE: &'static str;

    /// Convert from f64 (rounding for single precision).
    fn from_f64(value: f64) -> Self;

    /// Widen to f64.
    fn to_f64(self) -> f64;

    /// Absolute value.
    fn abs(self) -> Self;

    /// Size of one element in bytes.
    #[inline]
    fn size_bytes() -> usize {
        std::mem::size_of::<Self>()
    }
}

impl StreamScalar for f32 {
    const ZERO: Self = 0.0;
    const EPSILON: Self = f32::EPSILON;
    const DOT_TOLERANCE: f64 = 1.0e-6;
    const PRECISION: &'static str = "float";
    const C_TYPE: &'static str = "float";

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn abs(self) -> Self {
        f32::abs(self)
    }
}

impl StreamScalar for f64 {
    const ZERO: Self = 0.0;
    const EPSILON: Self = f64::EPSILON;
    const DOT_TOLERANCE: f64 = 1.0e-12;
    const PRECISION: &'static str = "double";
    const C_TYPE: &'static str = "double";

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_names() {
        assert_eq!(<f32 as StreamScalar>::PRECISION, "float");
        assert_eq!(<f64 as StreamScalar>::PRECISION, "double");
        assert_eq!(f32::size_bytes(), 4);
        assert_eq!(f64::size_bytes(), 8);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(<f32 as StreamScalar>::from_f64(0.5), 0.5f32);
        assert_eq!(StreamScalar::to_f64(0.25f32), 0.25f64);
        assert_eq!(StreamScalar::abs(-2.0f64), 2.0);
    }
}
