//! Device query and selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Pick the best available backend (CUDA, then CPU).
    #[default]
    Auto,
    /// Emulated block-parallel device on the host CPU.
    Cpu,
    /// NVIDIA CUDA.
    Cuda,
}

impl Backend {
    /// Backend name as used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Cpu => "cpu",
            Backend::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Backend {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "cpu" | "host" => Ok(Backend::Cpu),
            "cuda" | "nvidia" => Ok(Backend::Cuda),
            other => Err(StreamError::InvalidConfig(format!(
                "Unknown backend '{}'. Valid options: auto, cpu, cuda",
                other
            ))),
        }
    }
}

/// Static properties of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device ordinal.
    pub index: usize,
    /// Device name.
    pub name: String,
    /// Driver version string.
    pub driver: String,
    /// Total global memory in bytes.
    pub total_memory: usize,
}

/// Device enumeration and selection, implemented by each backend.
pub trait DeviceQuery: Send + Sync {
    /// Backend this platform belongs to.
    fn backend(&self) -> Backend;

    /// Number of devices.
    fn device_count(&self) -> Result<usize>;

    /// Properties of the device at `index`.
    fn device_info(&self, index: usize) -> Result<DeviceInfo>;

    /// Make `index` the active device for subsequent allocations.
    fn select_device(&self, index: usize) -> Result<()>;

    /// Properties of every device; devices that fail to report are skipped.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let count = self.device_count()?;
        let mut devices = Vec::with_capacity(count);
        for index in 0..count {
            match self.device_info(index) {
                Ok(info) => devices.push(info),
                Err(e) => tracing::warn!("Failed to query device {}: {}", index, e),
            }
        }
        Ok(devices)
    }

    /// Fail with [`StreamError::Device`] unless `index` names a device.
    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.device_count()?;
        if index >= count {
            return Err(StreamError::Device { index, count });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPlatform(Vec<DeviceInfo>);

    impl DeviceQuery for FixedPlatform {
        fn backend(&self) -> Backend {
            Backend::Cpu
        }

        fn device_count(&self) -> Result<usize> {
            Ok(self.0.len())
        }

        fn device_info(&self, index: usize) -> Result<DeviceInfo> {
            self.check_index(index)?;
            Ok(self.0[index].clone())
        }

        fn select_device(&self, index: usize) -> Result<()> {
            self.check_index(index)
        }
    }

    fn info(index: usize) -> DeviceInfo {
        DeviceInfo {
            index,
            name: format!("dev{}", index),
            driver: "1".to_string(),
            total_memory: 1 << 20,
        }
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("CUDA".parse::<Backend>().unwrap(), Backend::Cuda);
        assert_eq!("cpu".parse::<Backend>().unwrap(), Backend::Cpu);
        assert_eq!("auto".parse::<Backend>().unwrap(), Backend::Auto);
        assert!("metal".parse::<Backend>().is_err());
        assert_eq!(Backend::Cuda.to_string(), "cuda");
    }

    #[test]
    fn test_check_index() {
        let platform = FixedPlatform(vec![info(0), info(1)]);
        assert!(platform.check_index(1).is_ok());
        assert_eq!(
            platform.check_index(2),
            Err(StreamError::Device { index: 2, count: 2 })
        );
    }

    #[test]
    fn test_list_devices() {
        let platform = FixedPlatform(vec![info(0), info(1)]);
        let devices = platform.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].name, "dev1");
    }
}
