//! The benchmark stream: three device arrays and the kernels over them.

use crate::device::{Backend, DeviceInfo};
use crate::error::{Result, StreamError};
use crate::scalar::StreamScalar;

/// Default multiplier for mul, triad and nstream.
pub const DEFAULT_SCALAR: f64 = 0.4;

/// Per-stream configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig<T: StreamScalar> {
    /// Multiplier shared by mul, triad and nstream.
    pub scalar: T,
}

impl<T: StreamScalar> StreamConfig<T> {
    /// Configuration with the given scalar.
    pub fn with_scalar(scalar: T) -> Self {
        Self { scalar }
    }
}

impl<T: StreamScalar> Default for StreamConfig<T> {
    fn default() -> Self {
        Self {
            scalar: T::from_f64(DEFAULT_SCALAR),
        }
    }
}

/// Device-resident arrays `a`, `b`, `c` and the kernels operating on them.
///
/// Every method is synchronous: it returns once the device work has
/// completed and any launch or execution error has been checked. Methods
/// take `&mut self`, so no two kernels can be in flight on one stream.
///
/// A [`StreamError::Runtime`] fault poisons the stream; afterwards every
/// method fails without touching the device.
pub trait Stream<T: StreamScalar>: Send {
    /// Backend executing this stream.
    fn backend(&self) -> Backend;

    /// Device the arrays live on.
    fn device_info(&self) -> &DeviceInfo;

    /// Element count of each array.
    fn array_size(&self) -> usize;

    /// Multiplier used by mul, triad and nstream.
    fn scalar(&self) -> T;

    /// `a[i] = init_a; b[i] = init_b; c[i] = init_c`.
    fn init_arrays(&mut self, init_a: T, init_b: T, init_c: T) -> Result<()>;

    /// Upload host data into `a`, `b` and `c`.
    fn write_arrays(&mut self, a: &[T], b: &[T], c: &[T]) -> Result<()>;

    /// Synchronize, then copy `a`, `b` and `c` into host slices.
    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()>;

    /// `c[i] = a[i]`.
    fn copy(&mut self) -> Result<()>;

    /// `b[i] = scalar * c[i]`.
    fn mul(&mut self) -> Result<()>;

    /// `c[i] = a[i] + b[i]`.
    fn add(&mut self) -> Result<()>;

    /// `a[i] = b[i] + scalar * c[i]`.
    fn triad(&mut self) -> Result<()>;

    /// `a[i] += b[i] + scalar * c[i]`.
    fn nstream(&mut self) -> Result<()>;

    /// `sum(a[i] * b[i])` via block tree reduction and a host-side final sum.
    fn dot(&mut self) -> Result<T>;
}

/// Check that every host slice has exactly `expected` elements.
pub fn check_host_lengths(expected: usize, lengths: [usize; 3]) -> Result<()> {
    for actual in lengths {
        if actual != expected {
            return Err(StreamError::LengthMismatch { expected, actual });
        }
    }
    Ok(())
}

/// Tracks whether a stream has observed a fatal runtime fault.
#[derive(Debug, Default)]
pub struct FaultLatch {
    fault: Option<StreamError>,
}

impl FaultLatch {
    /// Fail if a previous call faulted.
    pub fn check(&self) -> Result<()> {
        match &self.fault {
            Some(fault) => Err(StreamError::runtime(
                "stream use after fault",
                format!("device context is no longer trusted ({})", fault),
            )),
            None => Ok(()),
        }
    }

    /// Pass `result` through, latching the first fatal error.
    pub fn observe<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            if e.is_fatal() && self.fault.is_none() {
                tracing::error!("Stream faulted: {}", e);
                self.fault = Some(e.clone());
            }
        }
        result
    }

    /// Whether a fault has been latched.
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scalar() {
        assert_eq!(StreamConfig::<f64>::default().scalar, 0.4);
        assert_eq!(StreamConfig::<f32>::default().scalar, 0.4f32);
        assert_eq!(StreamConfig::with_scalar(3.0f64).scalar, 3.0);
    }

    #[test]
    fn test_check_host_lengths() {
        assert!(check_host_lengths(8, [8, 8, 8]).is_ok());
        assert_eq!(
            check_host_lengths(8, [8, 7, 8]),
            Err(StreamError::LengthMismatch {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn test_fault_latch() {
        let mut latch = FaultLatch::default();
        assert!(latch.check().is_ok());

        // Non-fatal errors pass through without latching.
        let r: Result<()> = latch.observe(Err(StreamError::LengthMismatch {
            expected: 1,
            actual: 2,
        }));
        assert!(r.is_err());
        assert!(!latch.is_faulted());

        let r: Result<()> = latch.observe(Err(StreamError::runtime("launch", "lost")));
        assert!(r.is_err());
        assert!(latch.is_faulted());

        let err = latch.check().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("lost"));
    }
}
