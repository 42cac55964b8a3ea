//! Launch geometry shared by all backends.

use crate::error::{Result, StreamError};
use crate::scalar::StreamScalar;

/// Fixed number of lanes per thread block.
pub const BLOCK_SIZE: usize = 1024;

/// Bytes each lane of the dot kernel reads per array in one pass.
///
/// Four dwords per lane: 4 elements of `f32`, 2 elements of `f64`.
pub const DOT_READ_BYTES_PER_LANE: usize = 16;

/// Number of elements each dot-kernel lane covers per array.
pub fn dot_elements_per_lane<T: StreamScalar>() -> usize {
    (DOT_READ_BYTES_PER_LANE / T::size_bytes()).max(1)
}

/// Check that `array_size` is a positive multiple of [`BLOCK_SIZE`].
pub fn validate_array_size(array_size: usize) -> Result<()> {
    if array_size == 0 || array_size % BLOCK_SIZE != 0 {
        return Err(StreamError::Configuration {
            array_size,
            block_size: BLOCK_SIZE,
        });
    }
    Ok(())
}

/// Bytes of device memory needed for the three arrays.
pub fn required_device_bytes<T: StreamScalar>(array_size: usize) -> usize {
    array_size
        .saturating_mul(T::size_bytes())
        .saturating_mul(3)
}

/// One-dimensional grid/block shape of a kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    /// Number of blocks in the grid.
    pub grid_dim: usize,
    /// Lanes per block.
    pub block_dim: usize,
}

impl LaunchGeometry {
    /// One lane per element.
    pub fn elementwise(array_size: usize) -> Self {
        Self {
            grid_dim: array_size / BLOCK_SIZE,
            block_dim: BLOCK_SIZE,
        }
    }

    /// Reduction geometry: `ceil(array_size / (BLOCK_SIZE * elements_per_lane))` blocks.
    pub fn dot<T: StreamScalar>(array_size: usize) -> Self {
        let per_block = BLOCK_SIZE * dot_elements_per_lane::<T>();
        Self {
            grid_dim: array_size.div_ceil(per_block),
            block_dim: BLOCK_SIZE,
        }
    }

    /// Total lanes in the grid, which is also the grid-stride step.
    #[inline]
    pub fn total_lanes(&self) -> usize {
        self.grid_dim * self.block_dim
    }
}
