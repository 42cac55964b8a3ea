//! CPU device emulation.
//!
//! Each virtual device owns a rayon thread pool that plays the role of the
//! device's compute units, and an allocation ledger that enforces the
//! device's reported memory capacity.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace};

use ringstream_core::device::{Backend, DeviceInfo, DeviceQuery};
use ringstream_core::error::{Result, StreamError};
use ringstream_core::scalar::StreamScalar;

/// Memory capacity reported by a CPU device unless configured otherwise.
pub const DEFAULT_DEVICE_MEMORY: usize = 16 * 1024 * 1024 * 1024;

/// Configuration of one virtual CPU device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuDeviceConfig {
    /// Device name.
    pub name: String,
    /// Reported global memory in bytes.
    pub total_memory: usize,
    /// Worker threads (compute units).
    pub threads: usize,
}

impl Default for CpuDeviceConfig {
    fn default() -> Self {
        Self {
            name: "Host CPU".to_string(),
            total_memory: DEFAULT_DEVICE_MEMORY,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl CpuDeviceConfig {
    /// Set the device name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reported memory capacity.
    pub fn with_total_memory(mut self, bytes: usize) -> Self {
        self.total_memory = bytes;
        self
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }
}

/// A virtual block-parallel device backed by a host thread pool.
pub struct CpuDevice {
    index: usize,
    config: CpuDeviceConfig,
    pool: rayon::ThreadPool,
    /// Bytes currently reserved by live buffers.
    allocated: AtomicUsize,
    /// Number of live buffers.
    live_buffers: AtomicUsize,
    /// Kernel launches issued.
    launches: AtomicU64,
}

impl CpuDevice {
    fn new(index: usize, config: CpuDeviceConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(move |worker| format!("ringstream-cpu{}-{}", index, worker))
            .build()
            .map_err(|e| StreamError::runtime("create device thread pool", e))?;

        debug!(
            "Created CPU device {} '{}' ({} threads, {} bytes)",
            index, config.name, config.threads, config.total_memory
        );

        Ok(Self {
            index,
            config,
            pool,
            allocated: AtomicUsize::new(0),
            live_buffers: AtomicUsize::new(0),
            launches: AtomicU64::new(0),
        })
    }

    /// Device ordinal.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Device configuration.
    pub fn config(&self) -> &CpuDeviceConfig {
        &self.config
    }

    /// Static device properties.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            index: self.index,
            name: self.config.name.clone(),
            driver: format!(
                "ringstream-cpu {} ({} threads)",
                env!("CARGO_PKG_VERSION"),
                self.pool.current_num_threads()
            ),
            total_memory: self.config.total_memory,
        }
    }

    /// Bytes held by live buffers.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Acquire)
    }

    /// Kernel launches issued so far.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Allocate a zeroed buffer of `len` elements in device memory.
    pub fn alloc<T: StreamScalar>(self: &Arc<Self>, len: usize) -> Result<DeviceBuffer<T>> {
        let bytes = len.saturating_mul(T::size_bytes());
        let capacity = self.config.total_memory;

        self.allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= capacity)
            })
            .map_err(|used| {
                StreamError::runtime(
                    "device allocation",
                    format!(
                        "out of device memory: requested {} bytes, {} of {} in use",
                        bytes, used, capacity
                    ),
                )
            })?;

        let mut data = Vec::new();
        if let Err(e) = data.try_reserve_exact(len) {
            self.allocated.fetch_sub(bytes, Ordering::AcqRel);
            return Err(StreamError::runtime("device allocation", e));
        }
        data.resize(len, T::ZERO);

        self.live_buffers.fetch_add(1, Ordering::AcqRel);
        trace!("Allocated {} bytes on CPU device {}", bytes, self.index);

        Ok(DeviceBuffer {
            data,
            bytes,
            device: Arc::clone(self),
        })
    }

    fn release(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes, Ordering::AcqRel);
        self.live_buffers.fetch_sub(1, Ordering::AcqRel);
        trace!("Released {} bytes on CPU device {}", bytes, self.index);
    }

    /// Run one kernel launch on the device's workers and wait for it.
    ///
    /// A panic inside the kernel is reported as a runtime fault.
    pub fn launch<R, F>(&self, kernel: &str, body: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.launches.fetch_add(1, Ordering::Relaxed);
        trace!("Launching '{}' on CPU device {}", kernel, self.index);

        catch_unwind(AssertUnwindSafe(|| self.pool.install(body))).map_err(|payload| {
            StreamError::runtime(format!("launch {}", kernel), panic_message(&*payload))
        })
    }

    /// Device-wide barrier: all prior writes become visible to the host.
    pub fn synchronize(&self) -> Result<()> {
        // Launches are already complete when `launch` returns.
        fence(Ordering::SeqCst);
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}

/// Buffer in a CPU device's memory; released on drop.
pub struct DeviceBuffer<T: StreamScalar> {
    data: Vec<T>,
    bytes: usize,
    device: Arc<CpuDevice>,
}

impl<T: StreamScalar> DeviceBuffer<T> {
    /// Element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    /// Read-only view for kernels.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable view for kernels.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: StreamScalar> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.device.release(self.bytes);
    }
}

/// The set of virtual CPU devices.
pub struct CpuPlatform {
    devices: Vec<Arc<CpuDevice>>,
    active: RwLock<usize>,
}

impl CpuPlatform {
    /// Platform with one default device.
    pub fn new() -> Result<Self> {
        Self::with_devices(vec![CpuDeviceConfig::default()])
    }

    /// Platform with one device per configuration.
    pub fn with_devices(configs: Vec<CpuDeviceConfig>) -> Result<Self> {
        let devices = configs
            .into_iter()
            .enumerate()
            .map(|(index, config)| CpuDevice::new(index, config).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        info!("Initialized CPU platform with {} device(s)", devices.len());

        Ok(Self {
            devices,
            active: RwLock::new(0),
        })
    }

    /// Device at `index`.
    pub fn device(&self, index: usize) -> Result<Arc<CpuDevice>> {
        self.devices
            .get(index)
            .cloned()
            .ok_or(StreamError::Device {
                index,
                count: self.devices.len(),
            })
    }

    /// Index of the currently selected device.
    pub fn active_device(&self) -> usize {
        *self.active.read()
    }
}

impl DeviceQuery for CpuPlatform {
    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn device_count(&self) -> Result<usize> {
        Ok(self.devices.len())
    }

    fn device_info(&self, index: usize) -> Result<DeviceInfo> {
        Ok(self.device(index)?.info())
    }

    fn select_device(&self, index: usize) -> Result<()> {
        self.check_index(index)?;
        *self.active.write() = index;
        debug!("Selected CPU device {}", index);
        Ok(())
    }
}
