//! Mapped pinned host memory for the dot kernel's block partials.
//!
//! ```text
//! host_ptr ──► [sums[0]] [sums[1]] ... [sums[n-1]] ◄── device_ptr
//! ```
//!
//! Blocks write their partial through `device_ptr`; the host reads through
//! `host_ptr` after the stream has been synchronized.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use cudarc::driver::{sys as cuda_sys, CudaContext};
use tracing::error;

use ringstream_core::error::{Result, StreamError};

use crate::scalar::CudaScalar;

/// Page-locked host buffer mapped into the device address space.
pub struct MappedBuffer<T: CudaScalar> {
    host_ptr: *mut T,
    device_ptr: u64,
    len: usize,
    ctx: Arc<CudaContext>,
    _marker: PhantomData<T>,
}

// SAFETY: the buffer owns its pinned allocation; device access is ordered by
// stream synchronization on the owning stream.
unsafe impl<T: CudaScalar> Send for MappedBuffer<T> {}

impl<T: CudaScalar> MappedBuffer<T> {
    /// Allocate `len` zeroed slots.
    pub fn new(ctx: &Arc<CudaContext>, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(StreamError::InvalidConfig(
                "Cannot allocate zero-sized reduction buffer".to_string(),
            ));
        }
        ctx.bind_to_thread()
            .map_err(|e| StreamError::runtime("cuCtxSetCurrent", e))?;

        let size_bytes = len * std::mem::size_of::<T>();
        let mut host_ptr: *mut c_void = ptr::null_mut();

        // SAFETY: out-pointer to a live local; the context is current.
        let result = unsafe {
            cuda_sys::cuMemHostAlloc(
                &mut host_ptr,
                size_bytes,
                cuda_sys::CU_MEMHOSTALLOC_DEVICEMAP | cuda_sys::CU_MEMHOSTALLOC_PORTABLE,
            )
        };
        if result != cuda_sys::CUresult::CUDA_SUCCESS {
            return Err(StreamError::runtime(
                "cuMemHostAlloc",
                format!("{:?} ({} bytes)", result, size_bytes),
            ));
        }

        let mut device_ptr: u64 = 0;
        // SAFETY: host_ptr was just returned by cuMemHostAlloc with DEVICEMAP.
        let result = unsafe { cuda_sys::cuMemHostGetDevicePointer_v2(&mut device_ptr, host_ptr, 0) };
        if result != cuda_sys::CUresult::CUDA_SUCCESS {
            // SAFETY: allocated above and not yet shared.
            unsafe {
                let _ = cuda_sys::cuMemFreeHost(host_ptr);
            }
            return Err(StreamError::runtime(
                "cuMemHostGetDevicePointer",
                format!("{:?}", result),
            ));
        }

        // SAFETY: the allocation is size_bytes long and exclusively ours.
        unsafe {
            ptr::write_bytes(host_ptr as *mut u8, 0, size_bytes);
        }

        Ok(Self {
            host_ptr: host_ptr as *mut T,
            device_ptr,
            len,
            ctx: Arc::clone(ctx),
            _marker: PhantomData,
        })
    }

    /// Device address to pass as the kernel's `T*` argument.
    #[inline]
    pub fn device_ptr(&self) -> u64 {
        self.device_ptr
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: zero-length buffers are rejected at allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequential sum of all slots. Call only after synchronizing the stream
    /// that wrote them.
    pub fn host_sum(&self) -> T {
        fence(Ordering::SeqCst);
        let mut sum = T::ZERO;
        for slot in 0..self.len {
            // SAFETY: slot < len; device writes completed before the fence.
            sum += unsafe { ptr::read_volatile(self.host_ptr.add(slot)) };
        }
        sum
    }
}

impl<T: CudaScalar> Drop for MappedBuffer<T> {
    fn drop(&mut self) {
        let _ = self.ctx.bind_to_thread();
        // SAFETY: allocated by cuMemHostAlloc in `new` and freed only here.
        let result = unsafe { cuda_sys::cuMemFreeHost(self.host_ptr as *mut c_void) };
        if result != cuda_sys::CUresult::CUDA_SUCCESS {
            error!("cuMemFreeHost failed: {:?}", result);
            std::process::abort();
        }
    }
}
