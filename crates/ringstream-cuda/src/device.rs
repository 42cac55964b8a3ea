//! CUDA device enumeration and selection.

use std::sync::Arc;

use cudarc::driver::{sys as cuda_sys, CudaContext};
use parking_lot::RwLock;
use tracing::debug;

use ringstream_core::device::{Backend, DeviceInfo, DeviceQuery};
use ringstream_core::error::{Result, StreamError};

/// The CUDA devices visible to the driver.
pub struct CudaPlatform {
    count: usize,
    active: RwLock<Option<Arc<CudaContext>>>,
}

impl CudaPlatform {
    /// Query the driver for its devices.
    pub fn new() -> Result<Self> {
        // cudarc panics if the driver library cannot be loaded
        let count = std::panic::catch_unwind(CudaContext::device_count)
            .map_err(|_| StreamError::BackendUnavailable("CUDA driver not found".to_string()))?
            .map_err(|e| StreamError::runtime("cuDeviceGetCount", e))?;

        Ok(Self {
            count: count.max(0) as usize,
            active: RwLock::new(None),
        })
    }

    /// Context of the currently selected device.
    pub fn active_context(&self) -> Result<Arc<CudaContext>> {
        self.active.read().clone().ok_or_else(|| {
            StreamError::runtime("active device", "no CUDA device has been selected")
        })
    }

    fn context(&self, index: usize) -> Result<Arc<CudaContext>> {
        self.check_index(index)?;
        CudaContext::new(index).map_err(|e| StreamError::runtime("cuCtxCreate", e))
    }
}

/// Driver version as `major.minor`.
fn driver_version() -> Result<String> {
    let mut version: std::ffi::c_int = 0;
    // SAFETY: out-pointer to a live local.
    let result = unsafe { cuda_sys::cuDriverGetVersion(&mut version) };
    if result != cuda_sys::CUresult::CUDA_SUCCESS {
        return Err(StreamError::runtime(
            "cuDriverGetVersion",
            format!("{:?}", result),
        ));
    }
    Ok(format!("{}.{}", version / 1000, (version % 1000) / 10))
}

impl DeviceQuery for CudaPlatform {
    fn backend(&self) -> Backend {
        Backend::Cuda
    }

    fn device_count(&self) -> Result<usize> {
        Ok(self.count)
    }

    fn device_info(&self, index: usize) -> Result<DeviceInfo> {
        let ctx = self.context(index)?;
        let name = ctx
            .name()
            .map_err(|e| StreamError::runtime("cuDeviceGetName", e))?;
        // SAFETY: the device handle comes from a live context.
        let total_memory = unsafe { cudarc::driver::result::device::total_mem(ctx.cu_device()) }
            .map_err(|e| StreamError::runtime("cuDeviceTotalMem", e))?;

        Ok(DeviceInfo {
            index,
            name,
            driver: driver_version()?,
            total_memory,
        })
    }

    fn select_device(&self, index: usize) -> Result<()> {
        let ctx = self.context(index)?;
        ctx.bind_to_thread()
            .map_err(|e| StreamError::runtime("cuCtxSetCurrent", e))?;
        *self.active.write() = Some(ctx);
        debug!("Selected CUDA device {}", index);
        Ok(())
    }
}
