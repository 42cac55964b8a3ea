//! CPU Backend for RingStream
//!
//! An emulated block-parallel device. Each virtual device owns a rayon
//! thread pool standing in for its compute units and an allocation ledger
//! enforcing its reported memory capacity, so construction, capacity checks
//! and the block tree reduction behave as they do on a GPU.
//!
//! # Example
//!
//! ```
//! use ringstream_core::prelude::*;
//! use ringstream_cpu::{CpuPlatform, CpuStream};
//!
//! let platform = CpuPlatform::new().unwrap();
//! let mut stream = CpuStream::<f64>::new(&platform, 4096, 0, StreamConfig::default()).unwrap();
//! stream.init_arrays(1.0, 2.0, 0.0).unwrap();
//! assert_eq!(stream.dot().unwrap(), 8192.0);
//! ```

#![warn(missing_docs)]

pub mod block;
mod device;
pub mod kernels;
mod stream;

pub use device::{CpuDevice, CpuDeviceConfig, CpuPlatform, DeviceBuffer, DEFAULT_DEVICE_MEMORY};
pub use stream::CpuStream;
