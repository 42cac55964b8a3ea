//! Error types for RingStream.
//!
//! Construction failures (`Configuration`, `Device`, `Capacity`) are raised
//! before any device resource exists and can be reported cleanly by the
//! caller. `Runtime` faults come from the device runtime itself and are
//! fatal: a stream that observed one refuses all further work.

use thiserror::Error;

/// Result type alias for RingStream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors produced by streams, devices and configuration loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Array size is not a positive multiple of the block size.
    #[error("Array size must be a positive multiple of {block_size}, got {array_size}")]
    Configuration {
        /// Requested element count.
        array_size: usize,
        /// Fixed thread-block size.
        block_size: usize,
    },

    /// Device index out of range.
    #[error("Invalid device index {index}: {count} device(s) available")]
    Device {
        /// Requested device index.
        index: usize,
        /// Number of devices reported by the platform.
        count: usize,
    },

    /// Device memory too small for the three benchmark arrays.
    #[error("Device does not have enough memory for all 3 buffers: {required} bytes required, {available} available")]
    Capacity {
        /// Bytes required for `a`, `b` and `c`.
        required: usize,
        /// Global memory reported by the device.
        available: usize,
    },

    /// A device runtime call failed (allocation, launch, copy, free, sync).
    #[error("Device runtime fault during {operation}: {reason}")]
    Runtime {
        /// Runtime call that failed.
        operation: String,
        /// Reason reported by the runtime.
        reason: String,
    },

    /// Host buffer length does not match the stream's array size.
    #[error("Host buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Array size of the stream.
        expected: usize,
        /// Length of the supplied host slice.
        actual: usize,
    },

    /// Requested backend is not compiled in or has no usable device.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Invalid benchmark configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StreamError {
    /// Build a runtime fault for the named operation.
    pub fn runtime(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Runtime {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error leaves the device context untrustworthy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Runtime { .. })
    }

    /// Whether this error was raised while validating stream construction.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::Device { .. } | Self::Capacity { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let fault = StreamError::runtime("launch copy", "device lost");
        assert!(fault.is_fatal());
        assert!(!fault.is_construction_error());

        let config = StreamError::Configuration {
            array_size: 1000,
            block_size: 1024,
        };
        assert!(!config.is_fatal());
        assert!(config.is_construction_error());

        let capacity = StreamError::Capacity {
            required: 12,
            available: 8,
        };
        assert!(capacity.is_construction_error());
    }

    #[test]
    fn test_error_messages() {
        let err = StreamError::Configuration {
            array_size: 1000,
            block_size: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Array size must be a positive multiple of 1024, got 1000"
        );

        let err = StreamError::Device { index: 3, count: 1 };
        assert!(err.to_string().contains("Invalid device index 3"));

        let err = StreamError::runtime("synchronize", "timeout");
        assert_eq!(
            err.to_string(),
            "Device runtime fault during synchronize: timeout"
        );
    }
}
