//! Element types that can live in CUDA device memory.

use ringstream_core::scalar::StreamScalar;

/// A [`StreamScalar`] that can be passed to and allocated on a CUDA device.
#[cfg(feature = "cuda")]
pub trait CudaScalar:
    StreamScalar + cudarc::driver::DeviceRepr + cudarc::driver::ValidAsZeroBits
{
}

/// A [`StreamScalar`] that can be passed to and allocated on a CUDA device.
#[cfg(not(feature = "cuda"))]
pub trait CudaScalar: StreamScalar {}

impl CudaScalar for f32 {}
impl CudaScalar for f64 {}
