//! Benchmark stream on a CPU device.

use std::sync::Arc;

use tracing::{debug, info, trace};

use ringstream_core::device::{Backend, DeviceInfo, DeviceQuery};
use ringstream_core::error::{Result, StreamError};
use ringstream_core::memory::HostVisibleBuffer;
use ringstream_core::scalar::StreamScalar;
use ringstream_core::stream::{check_host_lengths, FaultLatch, Stream, StreamConfig};
use ringstream_core::types::{required_device_bytes, validate_array_size, LaunchGeometry};

use crate::device::{CpuDevice, CpuPlatform, DeviceBuffer};
use crate::kernels;

/// Three arrays resident on a [`CpuDevice`] plus the reduction partials.
pub struct CpuStream<T: StreamScalar> {
    device: Arc<CpuDevice>,
    info: DeviceInfo,
    array_size: usize,
    scalar: T,
    geometry: LaunchGeometry,
    dot_geometry: LaunchGeometry,
    a: DeviceBuffer<T>,
    b: DeviceBuffer<T>,
    c: DeviceBuffer<T>,
    sums: HostVisibleBuffer<T>,
    latch: FaultLatch,
}

impl<T: StreamScalar> CpuStream<T> {
    /// Allocate a stream of `array_size` elements on device `device_index`.
    ///
    /// Size, device index and capacity are checked in that order before
    /// anything is allocated.
    pub fn new(
        platform: &CpuPlatform,
        array_size: usize,
        device_index: usize,
        config: StreamConfig<T>,
    ) -> Result<Self> {
        validate_array_size(array_size)?;
        platform.check_index(device_index)?;
        platform.select_device(device_index)?;

        let device = platform.device(device_index)?;
        let info = device.info();
        info!("Using CPU device {}", info.name);
        info!("Driver: {}", info.driver);

        let required = required_device_bytes::<T>(array_size);
        if required > info.total_memory {
            return Err(StreamError::Capacity {
                required,
                available: info.total_memory,
            });
        }

        let dot_geometry = LaunchGeometry::dot::<T>(array_size);
        let sums = HostVisibleBuffer::new(dot_geometry.grid_dim)?;
        let a = device.alloc(array_size)?;
        let b = device.alloc(array_size)?;
        let c = device.alloc(array_size)?;

        debug!(
            "Allocated {} x {} {} elements ({} bytes) and {} reduction slots",
            3,
            array_size,
            T::PRECISION,
            required,
            sums.len()
        );

        Ok(Self {
            device,
            info,
            array_size,
            scalar: config.scalar,
            geometry: LaunchGeometry::elementwise(array_size),
            dot_geometry,
            a,
            b,
            c,
            sums,
            latch: FaultLatch::default(),
        })
    }

    /// Device the arrays live on.
    pub fn device(&self) -> &Arc<CpuDevice> {
        &self.device
    }

    /// Grid used by the dot kernel.
    pub fn dot_geometry(&self) -> LaunchGeometry {
        self.dot_geometry
    }

    /// Whether a runtime fault has poisoned this stream.
    pub fn is_faulted(&self) -> bool {
        self.latch.is_faulted()
    }

    fn launch<F>(&mut self, kernel: &str, geometry: LaunchGeometry, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self, LaunchGeometry) + Send,
    {
        self.latch.check()?;
        trace!(
            "{} <<<{}, {}>>> on device {}",
            kernel,
            geometry.grid_dim,
            geometry.block_dim,
            self.info.index
        );
        let device = Arc::clone(&self.device);
        let result = device
            .launch(kernel, || body(self, geometry))
            .and_then(|()| device.synchronize());
        self.latch.observe(result)
    }

    #[cfg(test)]
    pub(crate) fn poison(&mut self, reason: &str) {
        let _ = self
            .latch
            .observe::<()>(Err(StreamError::runtime("test fault", reason)));
    }
}

impl<T: StreamScalar> Stream<T> for CpuStream<T> {
    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn array_size(&self) -> usize {
        self.array_size
    }

    fn scalar(&self) -> T {
        self.scalar
    }

    fn init_arrays(&mut self, init_a: T, init_b: T, init_c: T) -> Result<()> {
        self.launch("init", self.geometry, |s, geometry| {
            let bd = geometry.block_dim;
            kernels::init(
                s.a.as_mut_slice(),
                s.b.as_mut_slice(),
                s.c.as_mut_slice(),
                (init_a, init_b, init_c),
                bd,
            )
        })
    }

    fn write_arrays(&mut self, a: &[T], b: &[T], c: &[T]) -> Result<()> {
        self.latch.check()?;
        check_host_lengths(self.array_size, [a.len(), b.len(), c.len()])?;
        self.launch("write_arrays", self.geometry, |s, _| {
            s.a.as_mut_slice().copy_from_slice(a);
            s.b.as_mut_slice().copy_from_slice(b);
            s.c.as_mut_slice().copy_from_slice(c);
        })
    }

    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()> {
        self.latch.check()?;
        check_host_lengths(self.array_size, [a.len(), b.len(), c.len()])?;
        let synced = self.device.synchronize();
        self.latch.observe(synced)?;
        a.copy_from_slice(self.a.as_slice());
        b.copy_from_slice(self.b.as_slice());
        c.copy_from_slice(self.c.as_slice());
        Ok(())
    }

    fn copy(&mut self) -> Result<()> {
        self.launch("copy", self.geometry, |s, geometry| {
            let bd = geometry.block_dim;
            kernels::copy(s.a.as_slice(), s.c.as_mut_slice(), bd)
        })
    }

    fn mul(&mut self) -> Result<()> {
        self.launch("mul", self.geometry, |s, geometry| {
            let bd = geometry.block_dim;
            kernels::mul(s.b.as_mut_slice(), s.c.as_slice(), s.scalar, bd)
        })
    }

    fn add(&mut self) -> Result<()> {
        self.launch("add", self.geometry, |s, geometry| {
            let bd = geometry.block_dim;
            kernels::add(s.a.as_slice(), s.b.as_slice(), s.c.as_mut_slice(), bd)
        })
    }

    fn triad(&mut self) -> Result<()> {
        self.launch("triad", self.geometry, |s, geometry| {
            let bd = geometry.block_dim;
            kernels::triad(s.a.as_mut_slice(), s.b.as_slice(), s.c.as_slice(), s.scalar, bd)
        })
    }

    fn nstream(&mut self) -> Result<()> {
        self.launch("nstream", self.geometry, |s, geometry| {
            let bd = geometry.block_dim;
            kernels::nstream(s.a.as_mut_slice(), s.b.as_slice(), s.c.as_slice(), s.scalar, bd)
        })
    }

    fn dot(&mut self) -> Result<T> {
        self.launch("dot", self.dot_geometry, |s, geometry| {
            kernels::dot(s.a.as_slice(), s.b.as_slice(), s.sums.as_mut_slice(), geometry)
        })?;
        Ok(self.sums.host_sum())
    }
}

impl<T: StreamScalar> Drop for CpuStream<T> {
    fn drop(&mut self) {
        debug!(
            "Releasing stream on CPU device {} ({} elements)",
            self.info.index, self.array_size
        );
    }
}
