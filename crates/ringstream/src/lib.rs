//! # RingStream
//!
//! Memory-bandwidth microbenchmark for data-parallel devices.
//!
//! RingStream measures sustained throughput of the classic STREAM kernels
//! (copy, mul, add, triad, nstream) and a dot product computed by block tree
//! reduction, over three device-resident arrays.
//!
//! ## Quick Start
//!
//! ```
//! use ringstream::prelude::*;
//!
//! let mut stream = StreamBuilder::new()
//!     .backend(Backend::Cpu)
//!     .array_size(4096)
//!     .build::<f64>()
//!     .unwrap();
//!
//! stream.init_arrays(1.0, 2.0, 0.0).unwrap();
//! assert_eq!(stream.dot().unwrap(), 8192.0);
//! ```
//!
//! ## Backends
//!
//! - **CPU** - emulated block-parallel device (always available)
//! - **CUDA** - NVIDIA GPUs (requires the `cuda` feature)
//!
//! ```toml
//! [dependencies]
//! ringstream = { version = "0.1", features = ["cuda"] }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(hidden_glob_reexports)]

pub mod runner;

pub use ringstream_core::*;

pub use ringstream_cpu::{CpuDeviceConfig, CpuPlatform, CpuStream};
pub use ringstream_cuda::{CudaPlatform, CudaScalar, CudaStream};

use ringstream_core::device::{Backend, DeviceInfo, DeviceQuery};
use ringstream_core::error::{Result, StreamError};
use ringstream_core::stream::{Stream, StreamConfig, DEFAULT_SCALAR};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::runner::{run_benchmark, BenchReport, KernelStats};
    pub use crate::{CpuDeviceConfig, CudaScalar, StreamBuilder};
    pub use ringstream_core::prelude::*;
}

/// Builder for a [`Stream`] on the selected backend and device.
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    backend: Backend,
    device: usize,
    array_size: usize,
    scalar: f64,
    cpu_devices: Vec<CpuDeviceConfig>,
}

impl StreamBuilder {
    /// Builder with the default array size, scalar and backend.
    pub fn new() -> Self {
        Self {
            backend: Backend::Auto,
            device: 0,
            array_size: config::DEFAULT_ARRAY_SIZE,
            scalar: DEFAULT_SCALAR,
            cpu_devices: vec![CpuDeviceConfig::default()],
        }
    }

    /// Builder taking backend, device, size and scalar from a run configuration.
    pub fn from_config(config: &config::BenchConfig) -> Self {
        Self::new()
            .backend(config.backend)
            .device(config.device)
            .array_size(config.array_size)
            .scalar(config.scalar)
    }

    /// Set the backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the device index.
    pub fn device(mut self, index: usize) -> Self {
        self.device = index;
        self
    }

    /// Set the element count of each array.
    pub fn array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    /// Set the multiplier used by mul, triad and nstream.
    pub fn scalar(mut self, scalar: f64) -> Self {
        self.scalar = scalar;
        self
    }

    /// Set the virtual devices of the CPU backend.
    pub fn cpu_devices(mut self, devices: Vec<CpuDeviceConfig>) -> Self {
        self.cpu_devices = devices;
        self
    }

    /// Build the stream.
    pub fn build<T: CudaScalar>(&self) -> Result<Box<dyn Stream<T>>> {
        let config = StreamConfig::with_scalar(T::from_f64(self.scalar));
        match self.backend {
            Backend::Auto => self.build_auto(config),
            Backend::Cpu => self.build_cpu(config),
            Backend::Cuda => self.build_cuda(config),
        }
    }

    fn build_cpu<T: CudaScalar>(&self, config: StreamConfig<T>) -> Result<Box<dyn Stream<T>>> {
        let platform = CpuPlatform::with_devices(self.cpu_devices.clone())?;
        Ok(Box::new(CpuStream::new(
            &platform,
            self.array_size,
            self.device,
            config,
        )?))
    }

    fn build_cuda<T: CudaScalar>(&self, config: StreamConfig<T>) -> Result<Box<dyn Stream<T>>> {
        let platform = CudaPlatform::new()?;
        Ok(Box::new(CudaStream::new(
            &platform,
            self.array_size,
            self.device,
            config,
        )?))
    }

    /// Auto-select the best available backend.
    fn build_auto<T: CudaScalar>(&self, config: StreamConfig<T>) -> Result<Box<dyn Stream<T>>> {
        if ringstream_cuda::is_cuda_available() {
            tracing::info!("Auto-selected CUDA backend");
            return self.build_cuda(config);
        }

        tracing::info!("Auto-selected CPU backend (no GPU available)");
        self.build_cpu(config)
    }
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve [`Backend::Auto`] to the backend a build would use.
pub fn resolve_backend(backend: Backend) -> Backend {
    match backend {
        Backend::Auto if availability::cuda() => Backend::Cuda,
        Backend::Auto => Backend::Cpu,
        other => other,
    }
}

/// Device query for `backend`.
pub fn device_query(backend: Backend) -> Result<Box<dyn DeviceQuery>> {
    match resolve_backend(backend) {
        Backend::Cuda => Ok(Box::new(CudaPlatform::new()?)),
        Backend::Cpu => Ok(Box::new(CpuPlatform::new()?)),
        Backend::Auto => Err(StreamError::BackendUnavailable(
            "no backend resolved".to_string(),
        )),
    }
}

/// Every device of `backend`, in index order.
pub fn list_devices(backend: Backend) -> Result<Vec<DeviceInfo>> {
    device_query(backend)?.list_devices()
}

/// Check availability of backends at runtime.
pub mod availability {
    /// Check if CUDA is available.
    pub fn cuda() -> bool {
        ringstream_cuda::is_cuda_available()
    }

    /// Get list of available backends.
    pub fn available_backends() -> Vec<super::Backend> {
        let mut backends = vec![super::Backend::Cpu];

        if cuda() {
            backends.push(super::Backend::Cuda);
        }

        backends
    }
}
