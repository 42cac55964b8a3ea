//! Benchmark runner: times each kernel over a run and verifies the result.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use ringstream_core::config::{BenchConfig, BenchMode};
use ringstream_core::device::{Backend, DeviceInfo};
use ringstream_core::error::{Result, StreamError};
use ringstream_core::kernel::Kernel;
use ringstream_core::scalar::StreamScalar;
use ringstream_core::stream::Stream;
use ringstream_core::verify::{check_solution, VerificationReport};

/// Unit bandwidth figures are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BandwidthUnit {
    /// 10^6 bytes.
    Megabytes,
    /// 2^20 bytes.
    Mebibytes,
}

impl BandwidthUnit {
    /// Unit for the `mibibytes` output flag.
    pub fn from_mibibytes(mibibytes: bool) -> Self {
        if mibibytes {
            Self::Mebibytes
        } else {
            Self::Megabytes
        }
    }

    /// Bytes per unit.
    pub fn bytes(&self) -> f64 {
        match self {
            Self::Megabytes => 1.0e6,
            Self::Mebibytes => 1_048_576.0,
        }
    }

    /// Short label, e.g. `MB`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Megabytes => "MB",
            Self::Mebibytes => "MiB",
        }
    }

    /// Rate column label, e.g. `MBytes/sec`.
    pub fn rate_label(&self) -> &'static str {
        match self {
            Self::Megabytes => "MBytes/sec",
            Self::Mebibytes => "MiBytes/sec",
        }
    }

    /// Size in this unit.
    pub fn scale(&self, bytes: usize) -> f64 {
        bytes as f64 / self.bytes()
    }
}

/// A timed transfer (init or readback) of all three arrays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferStats {
    /// Bytes moved.
    pub bytes: usize,
    /// Seconds taken.
    pub runtime: f64,
    /// Rate in the report's unit per second.
    pub bandwidth: f64,
}

impl TransferStats {
    fn new(bytes: usize, elapsed: Duration, unit: BandwidthUnit) -> Self {
        let runtime = elapsed.as_secs_f64();
        Self {
            bytes,
            runtime,
            bandwidth: rate(bytes, runtime, unit),
        }
    }
}

fn rate(bytes: usize, seconds: f64, unit: BandwidthUnit) -> f64 {
    if seconds > 0.0 {
        unit.scale(bytes) / seconds
    } else {
        f64::INFINITY
    }
}

/// Timing summary of one kernel over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KernelStats {
    /// Kernel.
    pub kernel: Kernel,
    /// Bytes moved per call.
    pub bytes: usize,
    /// Fastest call, seconds.
    pub min_runtime: f64,
    /// Slowest call, seconds.
    pub max_runtime: f64,
    /// Mean call time, seconds.
    pub avg_runtime: f64,
    /// Peak rate (bytes over the fastest call) in the report's unit per second.
    pub bandwidth: f64,
}

impl KernelStats {
    /// Summarize per-call samples. The first call is a warm-up and excluded
    /// unless it is the only sample.
    pub fn from_samples(
        kernel: Kernel,
        bytes: usize,
        samples: &[Duration],
        unit: BandwidthUnit,
    ) -> Option<Self> {
        let timed = match samples {
            [] => return None,
            [only] => std::slice::from_ref(only),
            [_, rest @ ..] => rest,
        };

        let secs = timed.iter().map(Duration::as_secs_f64);
        let min_runtime = secs.clone().fold(f64::INFINITY, f64::min);
        let max_runtime = secs.clone().fold(0.0, f64::max);
        let avg_runtime = secs.sum::<f64>() / timed.len() as f64;

        Some(Self {
            kernel,
            bytes,
            min_runtime,
            max_runtime,
            avg_runtime,
            bandwidth: rate(bytes, min_runtime, unit),
        })
    }
}

/// Everything measured in one run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    /// Backend that ran the stream.
    pub backend: Backend,
    /// Device the arrays lived on.
    pub device: DeviceInfo,
    /// `float` or `double`.
    pub precision: &'static str,
    /// Bytes per element.
    pub element_size: usize,
    /// Elements per array.
    pub array_size: usize,
    /// Iterations run.
    pub num_times: usize,
    /// Kernels run.
    pub mode: BenchMode,
    /// Unit of every bandwidth figure.
    pub unit: BandwidthUnit,
    /// Timed `init_arrays`.
    pub init: TransferStats,
    /// Timed `read_arrays` right after init.
    pub read: TransferStats,
    /// Per-kernel timing, in run order.
    pub kernels: Vec<KernelStats>,
    /// Comparison of the final arrays with replayed gold values.
    pub verification: VerificationReport,
}

impl BenchReport {
    /// Bytes held by one array.
    pub fn array_bytes(&self) -> usize {
        self.array_size * self.element_size
    }

    /// Bytes held by all three arrays.
    pub fn total_bytes(&self) -> usize {
        3 * self.array_bytes()
    }
}

/// Kernels timed in `mode`, in run order.
pub fn kernels_for(mode: BenchMode) -> &'static [Kernel] {
    match mode {
        BenchMode::All => &[Kernel::Copy, Kernel::Mul, Kernel::Add, Kernel::Triad, Kernel::Dot],
        BenchMode::TriadOnly => &[Kernel::Triad],
        BenchMode::NstreamOnly => &[Kernel::Nstream],
    }
}

/// Run one kernel; returns the dot result for [`Kernel::Dot`].
fn run_kernel<T: StreamScalar>(stream: &mut dyn Stream<T>, kernel: Kernel) -> Result<Option<T>> {
    match kernel {
        Kernel::Copy => stream.copy()?,
        Kernel::Mul => stream.mul()?,
        Kernel::Add => stream.add()?,
        Kernel::Triad => stream.triad()?,
        Kernel::Nstream => stream.nstream()?,
        Kernel::Dot => return stream.dot().map(Some),
    }
    Ok(None)
}

/// Initialize `stream`, time `config.num_times` iterations of the mode's
/// kernels, then read back and verify.
///
/// Any stream error aborts the run. Verification failures are recorded in
/// the report, not returned as errors.
pub fn run_benchmark<T: StreamScalar>(
    stream: &mut dyn Stream<T>,
    config: &BenchConfig,
) -> Result<BenchReport> {
    config.validate()?;
    if stream.array_size() != config.array_size {
        return Err(StreamError::InvalidConfig(format!(
            "Stream holds {} elements but the run is configured for {}",
            stream.array_size(),
            config.array_size
        )));
    }
    if stream.scalar() != T::from_f64(config.scalar) {
        return Err(StreamError::InvalidConfig(format!(
            "Stream multiplies by {} but the run is configured for {}",
            stream.scalar(),
            config.scalar
        )));
    }

    let n = config.array_size;
    let unit = BandwidthUnit::from_mibibytes(config.output.mibibytes);
    let transfer_bytes = 3 * n * T::size_bytes();

    let start = Instant::now();
    stream.init_arrays(
        T::from_f64(config.init.a),
        T::from_f64(config.init.b),
        T::from_f64(config.init.c),
    )?;
    let init = TransferStats::new(transfer_bytes, start.elapsed(), unit);

    let (mut a, mut b, mut c) = (vec![T::ZERO; n], vec![T::ZERO; n], vec![T::ZERO; n]);
    let start = Instant::now();
    stream.read_arrays(&mut a, &mut b, &mut c)?;
    let read = TransferStats::new(transfer_bytes, start.elapsed(), unit);

    let kernels = kernels_for(config.mode);
    info!(
        "Running {} {} times",
        kernels
            .iter()
            .map(Kernel::name)
            .collect::<Vec<_>>()
            .join(", "),
        config.num_times
    );

    let mut samples: Vec<Vec<Duration>> = vec![Vec::with_capacity(config.num_times); kernels.len()];
    let mut sum = None;
    for iteration in 0..config.num_times {
        for (&kernel, times) in kernels.iter().zip(samples.iter_mut()) {
            let start = Instant::now();
            if let Some(result) = run_kernel(stream, kernel)? {
                sum = Some(result);
            }
            times.push(start.elapsed());
        }
        debug!("Iteration {} complete", iteration);
    }

    stream.read_arrays(&mut a, &mut b, &mut c)?;
    let verification = check_solution(config, &a, &b, &c, sum);
    if !verification.passed() {
        for failure in verification.failures() {
            tracing::warn!("{}", failure);
        }
    }

    let kernels = kernels
        .iter()
        .zip(&samples)
        .filter_map(|(&kernel, times)| {
            KernelStats::from_samples(kernel, kernel.bytes_moved::<T>(n), times, unit)
        })
        .collect();

    Ok(BenchReport {
        backend: stream.backend(),
        device: stream.device_info().clone(),
        precision: T::PRECISION,
        element_size: T::size_bytes(),
        array_size: n,
        num_times: config.num_times,
        mode: config.mode,
        unit,
        init,
        read,
        kernels,
        verification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamBuilder;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_stats_exclude_first_iteration() {
        let samples = [ms(100), ms(2), ms(4), ms(3)];
        let stats =
            KernelStats::from_samples(Kernel::Copy, 2_000_000, &samples, BandwidthUnit::Megabytes)
                .unwrap();

        assert!((stats.min_runtime - 0.002).abs() < 1e-12);
        assert!((stats.max_runtime - 0.004).abs() < 1e-12);
        assert!((stats.avg_runtime - 0.003).abs() < 1e-12);
        // 2 MB over 2 ms
        assert!((stats.bandwidth - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats_single_sample() {
        let stats =
            KernelStats::from_samples(Kernel::Dot, 1 << 20, &[ms(1)], BandwidthUnit::Mebibytes)
                .unwrap();
        assert!((stats.bandwidth - 1000.0).abs() < 1e-6);
        assert!(KernelStats::from_samples(Kernel::Dot, 1, &[], BandwidthUnit::Megabytes).is_none());
    }

    #[test]
    fn test_units() {
        assert_eq!(BandwidthUnit::from_mibibytes(false).label(), "MB");
        assert_eq!(BandwidthUnit::from_mibibytes(true).rate_label(), "MiBytes/sec");
        assert_eq!(BandwidthUnit::Mebibytes.scale(3 << 20), 3.0);
    }

    fn run_cpu<T: crate::CudaScalar>(config: &BenchConfig) -> BenchReport {
        let mut stream = StreamBuilder::from_config(config).build::<T>().unwrap();
        run_benchmark(stream.as_mut(), config).unwrap()
    }

    #[test]
    fn test_run_all_kernels() {
        let config = BenchConfig::new()
            .with_backend(Backend::Cpu)
            .with_array_size(4096)
            .with_num_times(5);
        let report = run_cpu::<f64>(&config);

        let kernels: Vec<Kernel> = report.kernels.iter().map(|s| s.kernel).collect();
        assert_eq!(
            kernels,
            vec![Kernel::Copy, Kernel::Mul, Kernel::Add, Kernel::Triad, Kernel::Dot]
        );
        assert_eq!(report.precision, "double");
        assert_eq!(report.total_bytes(), 3 * 4096 * 8);
        assert_eq!(report.kernels[3].bytes, 3 * 4096 * 8);
        assert!(report.kernels.iter().all(|s| s.min_runtime <= s.avg_runtime));
        assert!(report.kernels.iter().all(|s| s.avg_runtime <= s.max_runtime));
        assert!(report.verification.passed(), "{:?}", report.verification.failures());
        assert!(report.verification.sum.is_some());
    }

    #[test]
    fn test_run_single_kernel_modes() {
        for mode in [BenchMode::TriadOnly, BenchMode::NstreamOnly] {
            let config = BenchConfig::new()
                .with_backend(Backend::Cpu)
                .with_array_size(2048)
                .with_num_times(3)
                .with_mode(mode);
            let report = run_cpu::<f32>(&config);
            assert_eq!(report.kernels.len(), 1);
            assert_eq!(report.kernels[0].kernel, kernels_for(mode)[0]);
            assert!(report.verification.passed(), "{:?}", report.verification.failures());
            assert!(report.verification.sum.is_none());
        }
    }

    #[test]
    fn test_run_rejects_bad_config() {
        let config = BenchConfig::new()
            .with_backend(Backend::Cpu)
            .with_array_size(2048);
        let mut stream = StreamBuilder::from_config(&config).build::<f64>().unwrap();

        let once = config.clone().with_num_times(1);
        assert!(matches!(
            run_benchmark(stream.as_mut(), &once),
            Err(StreamError::InvalidConfig(_))
        ));

        let other_size = config.with_array_size(4096);
        assert!(matches!(
            run_benchmark(stream.as_mut(), &other_size),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_run_rejects_scalar_mismatch() {
        let config = BenchConfig::new()
            .with_backend(Backend::Cpu)
            .with_array_size(2048)
            .with_num_times(2);
        let mut stream = StreamBuilder::from_config(&config)
            .scalar(2.0)
            .build::<f64>()
            .unwrap();

        assert!(matches!(
            run_benchmark(stream.as_mut(), &config),
            Err(StreamError::InvalidConfig(_))
        ));

        let matching = config.with_scalar(2.0);
        let report = run_benchmark(stream.as_mut(), &matching).unwrap();
        assert!(report.verification.passed(), "{:?}", report.verification.failures());
    }
}
