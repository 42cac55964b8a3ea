//! CUDA Backend for RingStream
//!
//! Runs the stream kernels on an NVIDIA GPU through cudarc. Kernels are
//! generated as CUDA C for the stream's element type and compiled with NVRTC
//! when the stream is constructed. The dot kernel's block partials are
//! written to mapped pinned host memory and summed on the host after a
//! stream synchronization.
//!
//! # Requirements
//!
//! - The `cuda` cargo feature
//! - An NVIDIA driver and the NVRTC library at runtime
//!
//! Without the feature, [`CudaPlatform::new`] fails with
//! `StreamError::BackendUnavailable`.
//!
//! # Example
//!
//! ```ignore
//! use ringstream_core::prelude::*;
//! use ringstream_cuda::{CudaPlatform, CudaStream};
//!
//! let platform = CudaPlatform::new()?;
//! let mut stream = CudaStream::<f32>::new(&platform, 1 << 25, 0, StreamConfig::default())?;
//! stream.init_arrays(0.1, 0.2, 0.0)?;
//! let sum = stream.dot()?;
//! ```

#![warn(missing_docs)]

#[cfg(feature = "cuda")]
mod device;
#[cfg(feature = "cuda")]
mod mapped;
mod scalar;
pub mod source;
#[cfg(feature = "cuda")]
mod stream;

#[cfg(feature = "cuda")]
pub use device::CudaPlatform;
#[cfg(feature = "cuda")]
pub use mapped::MappedBuffer;
pub use scalar::CudaScalar;
#[cfg(feature = "cuda")]
pub use stream::CudaStream;

// Placeholder implementations when CUDA is not available
#[cfg(not(feature = "cuda"))]
mod stub {
    use std::convert::Infallible;
    use std::marker::PhantomData;

    use ringstream_core::device::{Backend, DeviceInfo, DeviceQuery};
    use ringstream_core::error::{Result, StreamError};
    use ringstream_core::stream::{Stream, StreamConfig};

    use crate::scalar::CudaScalar;

    fn unavailable() -> StreamError {
        StreamError::BackendUnavailable("CUDA feature not enabled".to_string())
    }

    /// Stub CUDA platform when the CUDA feature is disabled; cannot be created.
    pub struct CudaPlatform {
        never: Infallible,
    }

    impl CudaPlatform {
        /// Always fails: CUDA is not compiled in.
        pub fn new() -> Result<Self> {
            Err(unavailable())
        }
    }

    impl DeviceQuery for CudaPlatform {
        fn backend(&self) -> Backend {
            Backend::Cuda
        }

        fn device_count(&self) -> Result<usize> {
            match self.never {}
        }

        fn device_info(&self, _index: usize) -> Result<DeviceInfo> {
            match self.never {}
        }

        fn select_device(&self, _index: usize) -> Result<()> {
            match self.never {}
        }
    }

    /// Stub CUDA stream when the CUDA feature is disabled; cannot be created.
    pub struct CudaStream<T: CudaScalar> {
        never: Infallible,
        _marker: PhantomData<T>,
    }

    impl<T: CudaScalar> CudaStream<T> {
        /// Always fails: CUDA is not compiled in.
        pub fn new(
            _platform: &CudaPlatform,
            _array_size: usize,
            _device_index: usize,
            _config: StreamConfig<T>,
        ) -> Result<Self> {
            Err(unavailable())
        }
    }

    impl<T: CudaScalar> Stream<T> for CudaStream<T> {
        fn backend(&self) -> Backend {
            Backend::Cuda
        }

        fn device_info(&self) -> &DeviceInfo {
            match self.never {}
        }

        fn array_size(&self) -> usize {
            match self.never {}
        }

        fn scalar(&self) -> T {
            match self.never {}
        }

        fn init_arrays(&mut self, _a: T, _b: T, _c: T) -> Result<()> {
            match self.never {}
        }

        fn write_arrays(&mut self, _a: &[T], _b: &[T], _c: &[T]) -> Result<()> {
            match self.never {}
        }

        fn read_arrays(&mut self, _a: &mut [T], _b: &mut [T], _c: &mut [T]) -> Result<()> {
            match self.never {}
        }

        fn copy(&mut self) -> Result<()> {
            match self.never {}
        }

        fn mul(&mut self) -> Result<()> {
            match self.never {}
        }

        fn add(&mut self) -> Result<()> {
            match self.never {}
        }

        fn triad(&mut self) -> Result<()> {
            match self.never {}
        }

        fn nstream(&mut self) -> Result<()> {
            match self.never {}
        }

        fn dot(&mut self) -> Result<T> {
            match self.never {}
        }
    }
}

#[cfg(not(feature = "cuda"))]
pub use stub::{CudaPlatform, CudaStream};

/// Check if CUDA is available at runtime.
///
/// This function returns false if:
/// - the `cuda` feature is not enabled
/// - the CUDA driver library is not installed
/// - no CUDA devices are present
pub fn is_cuda_available() -> bool {
    cuda_device_count() > 0
}

/// Number of CUDA devices, or 0 when CUDA is unavailable.
pub fn cuda_device_count() -> usize {
    #[cfg(feature = "cuda")]
    {
        // cudarc panics if the driver library is not found
        std::panic::catch_unwind(|| {
            cudarc::driver::CudaContext::device_count().unwrap_or(0).max(0) as usize
        })
        .unwrap_or(0)
    }
    #[cfg(not(feature = "cuda"))]
    {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_stub_is_unavailable() {
        use ringstream_core::error::StreamError;

        assert!(!is_cuda_available());
        assert_eq!(cuda_device_count(), 0);
        assert!(matches!(
            CudaPlatform::new(),
            Err(StreamError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_availability_consistent() {
        assert_eq!(is_cuda_available(), cuda_device_count() > 0);
    }
}
