//! Host-visible memory for reduction partial sums.
//!
//! The reduction buffer is written by device blocks and read by the host.
//! Reads go through [`HostVisibleBuffer::synchronized`], which issues an
//! acquire fence so every block's write is visible before the host sums.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

use crate::error::{Result, StreamError};
use crate::scalar::StreamScalar;

/// Zero-initialized host allocation shared with device blocks.
pub struct HostVisibleBuffer<T: StreamScalar> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
    _marker: PhantomData<T>,
}

impl<T: StreamScalar> HostVisibleBuffer<T> {
    /// Allocate `count` elements, all set to zero.
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(StreamError::InvalidConfig(
                "Cannot allocate zero-sized reduction buffer".to_string(),
            ));
        }

        let layout = Layout::array::<T>(count).map_err(|e| {
            StreamError::runtime("host-visible allocation", e)
        })?;

        // SAFETY: layout has non-zero size; `T: Pod` makes all-zero bytes a valid value.
        let raw = unsafe { alloc_zeroed(layout) } as *mut T;
        let ptr = NonNull::new(raw).ok_or_else(|| {
            StreamError::runtime(
                "host-visible allocation",
                format!("out of host memory ({} bytes)", layout.size()),
            )
        })?;

        Ok(Self {
            ptr,
            len: count,
            layout,
            _marker: PhantomData,
        })
    }

    /// Slice view without a visibility fence; for the writing side.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: ptr is valid for len initialized elements and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Slice view after an acquire fence; for the host after a device sync.
    pub fn synchronized(&self) -> &[T] {
        fence(Ordering::Acquire);
        // SAFETY: ptr is valid for len initialized elements.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Sequential host-side sum of all slots, in slot order.
    pub fn host_sum(&self) -> T {
        let mut sum = T::ZERO;
        for &partial in self.synchronized() {
            sum += partial;
        }
        sum
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: zero-length buffers are rejected at allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.layout.size()
    }
}

impl<T: StreamScalar> Drop for HostVisibleBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with exactly this layout.
        unsafe {
            dealloc(self.ptr.as_ptr() as *mut u8, self.layout);
        }
    }
}

// SAFETY: the buffer owns its allocation; T is plain data.
unsafe impl<T: StreamScalar> Send for HostVisibleBuffer<T> {}
unsafe impl<T: StreamScalar> Sync for HostVisibleBuffer<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_initialized() {
        let buffer = HostVisibleBuffer::<f64>::new(16).unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.size_bytes(), 128);
        assert!(buffer.synchronized().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zero_count_rejected() {
        assert!(HostVisibleBuffer::<f32>::new(0).is_err());
    }

    #[test]
    fn test_host_sum() {
        let mut buffer = HostVisibleBuffer::<f32>::new(4).unwrap();
        buffer.as_mut_slice().copy_from_slice(&[1.0, 2.0, 3.0, 4.5]);
        assert_eq!(buffer.host_sum(), 10.5);
    }
}
