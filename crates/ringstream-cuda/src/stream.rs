//! Benchmark stream on a CUDA device.

use std::sync::Arc;

use cudarc::driver::{
    CudaContext, CudaFunction, CudaSlice, CudaStream as DriverStream, DriverError, LaunchConfig,
    PushKernelArg,
};
use cudarc::nvrtc::compile_ptx;
use tracing::{debug, info, trace};

use ringstream_core::device::{Backend, DeviceInfo, DeviceQuery};
use ringstream_core::error::{Result, StreamError};
use ringstream_core::stream::{check_host_lengths, FaultLatch, Stream, StreamConfig};
use ringstream_core::types::{required_device_bytes, validate_array_size, LaunchGeometry};

use crate::device::CudaPlatform;
use crate::mapped::MappedBuffer;
use crate::scalar::CudaScalar;
use crate::source::{kernel_source, KERNEL_NAMES};

struct Kernels {
    init: CudaFunction,
    copy: CudaFunction,
    mul: CudaFunction,
    add: CudaFunction,
    triad: CudaFunction,
    nstream: CudaFunction,
    dot: CudaFunction,
}

impl Kernels {
    fn load<T: CudaScalar>(ctx: &Arc<CudaContext>) -> Result<Self> {
        let ptx = compile_ptx(kernel_source::<T>())
            .map_err(|e| StreamError::runtime("NVRTC compilation", e))?;
        let module = ctx
            .load_module(ptx)
            .map_err(|e| StreamError::runtime("cuModuleLoadData", e))?;
        let load = |name: &str| {
            module
                .load_function(name)
                .map_err(|e| StreamError::runtime(format!("load {}", name), e))
        };

        let [init, copy, mul, add, triad, nstream, dot] = KERNEL_NAMES.map(load);

        Ok(Self {
            init: init?,
            copy: copy?,
            mul: mul?,
            add: add?,
            triad: triad?,
            nstream: nstream?,
            dot: dot?,
        })
    }
}

fn launch_config(geometry: LaunchGeometry) -> LaunchConfig {
    LaunchConfig {
        grid_dim: (geometry.grid_dim as u32, 1, 1),
        block_dim: (geometry.block_dim as u32, 1, 1),
        shared_mem_bytes: 0,
    }
}

/// Three arrays resident on a CUDA device plus the mapped reduction partials.
pub struct CudaStream<T: CudaScalar> {
    info: DeviceInfo,
    array_size: usize,
    scalar: T,
    geometry: LaunchGeometry,
    dot_geometry: LaunchGeometry,
    kernels: Kernels,
    a: CudaSlice<T>,
    b: CudaSlice<T>,
    c: CudaSlice<T>,
    sums: MappedBuffer<T>,
    stream: Arc<DriverStream>,
    latch: FaultLatch,
}

impl<T: CudaScalar> CudaStream<T> {
    /// Allocate a stream of `array_size` elements on device `device_index`.
    ///
    /// Size, device index and capacity are checked in that order before
    /// anything is allocated.
    pub fn new(
        platform: &CudaPlatform,
        array_size: usize,
        device_index: usize,
        config: StreamConfig<T>,
    ) -> Result<Self> {
        validate_array_size(array_size)?;
        platform.check_index(device_index)?;
        platform.select_device(device_index)?;

        let info = platform.device_info(device_index)?;
        info!("Using CUDA device {}", info.name);
        info!("Driver: {}", info.driver);

        let required = required_device_bytes::<T>(array_size);
        if required > info.total_memory {
            return Err(StreamError::Capacity {
                required,
                available: info.total_memory,
            });
        }

        let ctx = platform.active_context()?;
        let stream = ctx.default_stream();
        let kernels = Kernels::load::<T>(&ctx)?;

        let dot_geometry = LaunchGeometry::dot::<T>(array_size);
        let sums = MappedBuffer::new(&ctx, dot_geometry.grid_dim)?;
        let alloc = || {
            stream
                .alloc_zeros::<T>(array_size)
                .map_err(|e| StreamError::runtime("cuMemAlloc", e))
        };
        let a = alloc()?;
        let b = alloc()?;
        let c = alloc()?;

        debug!(
            "Allocated 3 x {} {} elements ({} bytes) and {} mapped reduction slots",
            array_size,
            T::PRECISION,
            required,
            sums.len()
        );

        Ok(Self {
            info,
            array_size,
            scalar: config.scalar,
            geometry: LaunchGeometry::elementwise(array_size),
            dot_geometry,
            kernels,
            a,
            b,
            c,
            sums,
            stream,
            latch: FaultLatch::default(),
        })
    }

    fn synchronize(&self) -> Result<()> {
        self.stream
            .synchronize()
            .map_err(|e| StreamError::runtime("cuStreamSynchronize", e))
    }

    /// Check the launch result, then wait for the kernel and surface any
    /// execution error.
    fn finish(
        &mut self,
        kernel: &str,
        launched: std::result::Result<(), DriverError>,
    ) -> Result<()> {
        let result = launched
            .map_err(|e| StreamError::runtime(format!("launch {}", kernel), e))
            .and_then(|()| self.synchronize());
        self.latch.observe(result)
    }
}

impl<T: CudaScalar> Stream<T> for CudaStream<T> {
    fn backend(&self) -> Backend {
        Backend::Cuda
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
        self.latch.check()?;
        trace!("init <<<{}, {}>>>", self.geometry.grid_dim, self.geometry.block_dim);
        // SAFETY: arguments match init_kernel's signature; the grid covers
        // exactly array_size lanes.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.init)
                .arg(&mut self.a)
                .arg(&mut self.b)
                .arg(&mut self.c)
                .arg(&init_a)
                .arg(&init_b)
                .arg(&init_c)
                .launch(launch_config(self.geometry))
                .map(|_| ())
        };
        self.finish("init", launched)
    }

    fn write_arrays(&mut self, a: &[T], b: &[T], c: &[T]) -> Result<()> {
        self.latch.check()?;
        check_host_lengths(self.array_size, [a.len(), b.len(), c.len()])?;
        let result = (|| {
            self.stream.memcpy_htod(a, &mut self.a)?;
            self.stream.memcpy_htod(b, &mut self.b)?;
            self.stream.memcpy_htod(c, &mut self.c)?;
            self.stream.synchronize()
        })()
        .map_err(|e| StreamError::runtime("cuMemcpyHtoD", e));
        self.latch.observe(result)
    }

    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()> {
        self.latch.check()?;
        check_host_lengths(self.array_size, [a.len(), b.len(), c.len()])?;
        let result = self.synchronize().and_then(|()| {
            (|| {
                self.stream.memcpy_dtoh(&self.a, a)?;
                self.stream.memcpy_dtoh(&self.b, b)?;
                self.stream.memcpy_dtoh(&self.c, c)?;
                self.stream.synchronize()
            })()
            .map_err(|e| StreamError::runtime("cuMemcpyDtoH", e))
        });
        self.latch.observe(result)
    }

    fn copy(&mut self) -> Result<()> {
        self.latch.check()?;
        trace!("copy <<<{}, {}>>>", self.geometry.grid_dim, self.geometry.block_dim);
        // SAFETY: arguments match copy_kernel's signature.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.copy)
                .arg(&self.a)
                .arg(&mut self.c)
                .launch(launch_config(self.geometry))
                .map(|_| ())
        };
        self.finish("copy", launched)
    }

    fn mul(&mut self) -> Result<()> {
        self.latch.check()?;
        trace!("mul <<<{}, {}>>>", self.geometry.grid_dim, self.geometry.block_dim);
        // SAFETY: arguments match mul_kernel's signature.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.mul)
                .arg(&mut self.b)
                .arg(&self.c)
                .arg(&self.scalar)
                .launch(launch_config(self.geometry))
                .map(|_| ())
        };
        self.finish("mul", launched)
    }

    fn add(&mut self) -> Result<()> {
        self.latch.check()?;
        trace!("add <<<{}, {}>>>", self.geometry.grid_dim, self.geometry.block_dim);
        // SAFETY: arguments match add_kernel's signature.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.add)
                .arg(&self.a)
                .arg(&self.b)
                .arg(&mut self.c)
                .launch(launch_config(self.geometry))
                .map(|_| ())
        };
        self.finish("add", launched)
    }

    fn triad(&mut self) -> Result<()> {
        self.latch.check()?;
        trace!("triad <<<{}, {}>>>", self.geometry.grid_dim, self.geometry.block_dim);
        // SAFETY: arguments match triad_kernel's signature.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.triad)
                .arg(&mut self.a)
                .arg(&self.b)
                .arg(&self.c)
                .arg(&self.scalar)
                .launch(launch_config(self.geometry))
                .map(|_| ())
        };
        self.finish("triad", launched)
    }

    fn nstream(&mut self) -> Result<()> {
        self.latch.check()?;
        trace!("nstream <<<{}, {}>>>", self.geometry.grid_dim, self.geometry.block_dim);
        // SAFETY: arguments match nstream_kernel's signature.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.nstream)
                .arg(&mut self.a)
                .arg(&self.b)
                .arg(&self.c)
                .arg(&self.scalar)
                .launch(launch_config(self.geometry))
                .map(|_| ())
        };
        self.finish("nstream", launched)
    }

    fn dot(&mut self) -> Result<T> {
        self.latch.check()?;
        trace!(
            "dot <<<{}, {}>>>",
            self.dot_geometry.grid_dim,
            self.dot_geometry.block_dim
        );
        let sums_ptr = self.sums.device_ptr();
        let array_size = self.array_size;
        // SAFETY: arguments match dot_kernel's signature; sums has one slot
        // per block of the launch grid.
        let launched = unsafe {
            self.stream
                .launch_builder(&self.kernels.dot)
                .arg(&self.a)
                .arg(&self.b)
                .arg(&sums_ptr)
                .arg(&array_size)
                .launch(launch_config(self.dot_geometry))
                .map(|_| ())
        };
        self.finish("dot", launched)?;
        Ok(self.sums.host_sum())
    }
}

impl<T: CudaScalar> Drop for CudaStream<T> {
    fn drop(&mut self) {
        debug!(
            "Releasing stream on CUDA device {} ({} elements)",
            self.info.index, self.array_size
        );
    }
}
