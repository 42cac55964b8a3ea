//! Benchmark run configuration.
//!
//! A [`BenchConfig`] can be built in code with the `with_*` setters or
//! loaded from a TOML file; missing keys take the defaults below.
//!
//! ```toml
//! array_size = 33554432
//! num_times = 100
//! precision = "double"
//! mode = "all"
//! scalar = 0.4
//!
//! [init]
//! a = 0.1
//! b = 0.2
//! c = 0.0
//!
//! [output]
//! format = "table"
//! mibibytes = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::Backend;
use crate::error::{Result, StreamError};
use crate::stream::DEFAULT_SCALAR;
use crate::types::validate_array_size;

/// Default element count (2^25).
pub const DEFAULT_ARRAY_SIZE: usize = 33_554_432;

/// Default number of timed iterations.
pub const DEFAULT_NUM_TIMES: usize = 100;

/// Element precision of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// f32
    Float,
    /// f64
    #[default]
    Double,
}

/// Which kernels a run times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchMode {
    /// copy, mul, add, triad, dot.
    #[default]
    All,
    /// triad only.
    TriadOnly,
    /// nstream only.
    NstreamOnly,
}

/// Result output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned human-readable table.
    #[default]
    Table,
    /// Comma-separated values with a header row.
    Csv,
    /// JSON document.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(StreamError::InvalidConfig(format!(
                "Unknown format '{}'. Valid options: table, csv, json",
                s
            ))),
        }
    }
}

/// Initial array values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitValues {
    /// Initial value of `a`.
    pub a: f64,
    /// Initial value of `b`.
    pub b: f64,
    /// Initial value of `c`.
    pub c: f64,
}

impl Default for InitValues {
    fn default() -> Self {
        Self {
            a: 0.1,
            b: 0.2,
            c: 0.0,
        }
    }
}

/// Output options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format.
    pub format: OutputFormat,
    /// Report bandwidth in MiB/s (2^20) instead of MB/s (10^6).
    pub mibibytes: bool,
}

/// Complete configuration of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Elements per array.
    pub array_size: usize,
    /// Timed iterations per kernel (first one is warm-up).
    pub num_times: usize,
    /// Element precision.
    pub precision: Precision,
    /// Kernel selection.
    pub mode: BenchMode,
    /// Multiplier for mul, triad and nstream.
    pub scalar: f64,
    /// Device index.
    pub device: usize,
    /// Backend.
    pub backend: Backend,
    /// Initial values.
    pub init: InitValues,
    /// Output options.
    pub output: OutputConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            array_size: DEFAULT_ARRAY_SIZE,
            num_times: DEFAULT_NUM_TIMES,
            precision: Precision::default(),
            mode: BenchMode::default(),
            scalar: DEFAULT_SCALAR,
            device: 0,
            backend: Backend::default(),
            init: InitValues::default(),
            output: OutputConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StreamError::InvalidConfig(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StreamError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StreamError::InvalidConfig(e.to_string()))
    }

    /// Set the array size.
    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    /// Set the iteration count.
    pub fn with_num_times(mut self, num_times: usize) -> Self {
        self.num_times = num_times;
        self
    }

    /// Set the precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the kernel selection.
    pub fn with_mode(mut self, mode: BenchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the initial values.
    pub fn with_init(mut self, a: f64, b: f64, c: f64) -> Self {
        self.init = InitValues { a, b, c };
        self
    }

    /// Set the scalar.
    pub fn with_scalar(mut self, scalar: f64) -> Self {
        self.scalar = scalar;
        self
    }

    /// Set the device index.
    pub fn with_device(mut self, device: usize) -> Self {
        self.device = device;
        self
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output.format = format;
        self
    }

    /// Check the values a run depends on.
    pub fn validate(&self) -> Result<()> {
        validate_array_size(self.array_size)?;
        if self.num_times < 2 {
            return Err(StreamError::InvalidConfig(format!(
                "Number of times must be 2 or more, got {}",
                self.num_times
            )));
        }
        let values = [self.init.a, self.init.b, self.init.c, self.scalar];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(StreamError::InvalidConfig(
                "Initial values and scalar must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.array_size, 1 << 25);
        assert_eq!(config.num_times, 100);
        assert_eq!(config.precision, Precision::Double);
        assert_eq!(config.init, InitValues { a: 0.1, b: 0.2, c: 0.0 });
        assert_eq!(config.scalar, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = BenchConfig::from_toml_str(
            r#"
            array_size = 4096
            precision = "float"
            mode = "triad-only"

            [output]
            format = "csv"
            "#,
        )
        .unwrap();
        assert_eq!(config.array_size, 4096);
        assert_eq!(config.precision, Precision::Float);
        assert_eq!(config.mode, BenchMode::TriadOnly);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.num_times, DEFAULT_NUM_TIMES);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = BenchConfig::from_toml_str("arraysize = 4096").unwrap_err();
        assert!(matches!(err, StreamError::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let config = BenchConfig::new()
            .with_array_size(8192)
            .with_num_times(5)
            .with_backend(Backend::Cpu)
            .with_format(OutputFormat::Json);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = BenchConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate() {
        assert!(BenchConfig::new().with_num_times(1).validate().is_err());
        assert!(BenchConfig::new().with_array_size(1000).validate().is_err());
        assert!(BenchConfig::new()
            .with_scalar(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
