//! # RingStream Core
//!
//! Core traits and types for the RingStream memory-bandwidth benchmark.
//!
//! A [`Stream`](stream::Stream) owns three equal-length device arrays and
//! runs the classic bandwidth kernels over them (copy, mul, add, triad,
//! nstream) plus a dot product computed by block tree reduction. Backends
//! (CPU, CUDA) implement the trait; this crate holds what they share:
//!
//! - [`StreamError`](error::StreamError) - construction and runtime errors
//! - [`StreamScalar`](scalar::StreamScalar) - `f32` / `f64` element types
//! - [`LaunchGeometry`](types::LaunchGeometry) - block size and reduction grid
//! - [`DeviceQuery`](device::DeviceQuery) - device enumeration and selection
//! - [`HostVisibleBuffer`](memory::HostVisibleBuffer) - reduction partial sums
//! - [`BenchConfig`](config::BenchConfig) - run configuration
//! - [`check_solution`](verify::check_solution) - result verification

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod device;
pub mod error;
pub mod kernel;
pub mod memory;
pub mod scalar;
pub mod stream;
pub mod types;
pub mod verify;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BenchConfig, BenchMode, InitValues, OutputConfig, OutputFormat, Precision,
    };
    pub use crate::device::{Backend, DeviceInfo, DeviceQuery};
    pub use crate::error::{Result, StreamError};
    pub use crate::kernel::Kernel;
    pub use crate::memory::HostVisibleBuffer;
    pub use crate::scalar::StreamScalar;
    pub use crate::stream::{Stream, StreamConfig};
    pub use crate::types::{LaunchGeometry, BLOCK_SIZE};
    pub use crate::verify::{check_solution, GoldValues, VerificationReport};
}
