//! Solution checking after a benchmark run.
//!
//! Every element of an array holds the same value throughout a run, so the
//! expected ("gold") values are obtained by replaying the kernel sequence on
//! three scalars in the stream's precision.

use serde::Serialize;

use crate::config::{BenchConfig, BenchMode};
use crate::scalar::StreamScalar;
use crate::types::LaunchGeometry;

/// Expected array values after a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoldValues<T: StreamScalar> {
    /// Expected value of every `a[i]`.
    pub a: T,
    /// Expected value of every `b[i]`.
    pub b: T,
    /// Expected value of every `c[i]`.
    pub c: T,
    /// Expected dot product of the final `a` and `b`.
    pub sum: T,
}

impl<T: StreamScalar> GoldValues<T> {
    /// Replay `config.num_times` iterations of the selected kernels.
    pub fn replay(config: &BenchConfig) -> Self {
        let scalar = T::from_f64(config.scalar);
        let mut a = T::from_f64(config.init.a);
        let mut b = T::from_f64(config.init.b);
        let mut c = T::from_f64(config.init.c);

        for _ in 0..config.num_times {
            match config.mode {
                BenchMode::All => {
                    c = a;
                    b = scalar * c;
                    c = a + b;
                    a = b + scalar * c;
                }
                BenchMode::TriadOnly => {
                    a = b + scalar * c;
                }
                BenchMode::NstreamOnly => {
                    a += b + scalar * c;
                }
            }
        }

        let sum = a * b * T::from_f64(config.array_size as f64);
        Self { a, b, c, sum }
    }
}

/// Relative tolerance for a dot product over `array_size` elements.
///
/// The host adds one partial per reduction block sequentially, so the bound
/// grows with the block count.
pub fn dot_tolerance<T: StreamScalar>(array_size: usize) -> f64 {
    let partials = LaunchGeometry::dot::<T>(array_size).grid_dim.max(1) as f64;
    T::DOT_TOLERANCE.max(T::EPSILON.to_f64() * partials)
}

/// Outcome of comparing device results with gold values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    /// Average absolute error of `a`.
    pub err_a: f64,
    /// Average absolute error of `b`.
    pub err_b: f64,
    /// Average absolute error of `c`.
    pub err_c: f64,
    /// Relative error of the dot product, when dot was run.
    pub err_sum: Option<f64>,
    /// Threshold for the array errors.
    pub epsilon: f64,
    /// Threshold for the dot error.
    pub dot_tolerance: f64,
    /// Dot product reported by the device.
    pub sum: Option<f64>,
    /// Expected dot product.
    pub gold_sum: f64,
}

impl VerificationReport {
    /// Whether every check is within its threshold.
    pub fn passed(&self) -> bool {
        self.failures().is_empty()
    }

    /// Human-readable description of each failed check.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for (name, err) in [("a", self.err_a), ("b", self.err_b), ("c", self.err_c)] {
            if err.is_nan() || err > self.epsilon {
                failures.push(format!(
                    "Validation failed on {}[]. Average error {:e}",
                    name, err
                ));
            }
        }
        if let (Some(err), Some(sum)) = (self.err_sum, self.sum) {
            if err.is_nan() || err > self.dot_tolerance {
                failures.push(format!(
                    "Validation failed on sum. Error {:e}\nSum was {} but should be {}",
                    err, sum, self.gold_sum
                ));
            }
        }
        failures
    }
}

fn average_error<T: StreamScalar>(values: &[T], gold: T) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let gold = gold.to_f64();
    let total: f64 = values.iter().map(|v| (v.to_f64() - gold).abs()).sum();
    total / values.len() as f64
}

/// Compare final arrays (and the last dot result, if any) with gold values.
pub fn check_solution<T: StreamScalar>(
    config: &BenchConfig,
    a: &[T],
    b: &[T],
    c: &[T],
    sum: Option<T>,
) -> VerificationReport {
    let gold = GoldValues::<T>::replay(config);
    let gold_sum = gold.sum.to_f64();

    let err_sum = sum.map(|s| {
        let s = s.to_f64();
        if gold_sum == 0.0 {
            s.abs()
        } else {
            ((gold_sum - s) / gold_sum).abs()
        }
    });

    VerificationReport {
        err_a: average_error(a, gold.a),
        err_b: average_error(b, gold.b),
        err_c: average_error(c, gold.c),
        err_sum,
        epsilon: T::EPSILON.to_f64() * 100.0,
        dot_tolerance: dot_tolerance::<T>(config.array_size),
        sum: sum.map(StreamScalar::to_f64),
        gold_sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(mode: BenchMode) -> BenchConfig {
        BenchConfig::new()
            .with_array_size(1024)
            .with_num_times(1)
            .with_mode(mode)
    }

    #[test]
    fn test_gold_single_iteration() {
        let gold = GoldValues::<f64>::replay(&small_config(BenchMode::All));
        // c = 0.1; b = 0.04; c = 0.14; a = 0.04 + 0.4 * 0.14
        assert!((gold.c - 0.14).abs() < 1e-15);
        assert!((gold.b - 0.04).abs() < 1e-15);
        assert!((gold.a - 0.096).abs() < 1e-15);
        assert!((gold.sum - gold.a * gold.b * 1024.0).abs() < 1e-12);
    }

    #[test]
    fn test_gold_nstream() {
        let config = small_config(BenchMode::NstreamOnly).with_num_times(2);
        let gold = GoldValues::<f64>::replay(&config);
        // a += 0.2 + 0.4 * 0.0, twice
        assert!((gold.a - 0.5).abs() < 1e-15);
        assert_eq!(gold.b, 0.2);
        assert_eq!(gold.c, 0.0);
    }

    #[test]
    fn test_check_solution_passes_on_gold() {
        let config = small_config(BenchMode::All).with_num_times(10);
        let gold = GoldValues::<f32>::replay(&config);
        let a = vec![gold.a; 1024];
        let b = vec![gold.b; 1024];
        let c = vec![gold.c; 1024];

        let report = check_solution(&config, &a, &b, &c, Some(gold.sum));
        assert!(report.passed(), "{:?}", report.failures());
    }

    #[test]
    fn test_check_solution_reports_each_array() {
        let config = small_config(BenchMode::TriadOnly);
        let gold = GoldValues::<f64>::replay(&config);
        let a = vec![gold.a + 1.0; 1024];
        let b = vec![gold.b; 1024];
        let c = vec![gold.c; 1024];

        let report = check_solution(&config, &a, &b, &c, Some(gold.sum * 2.0));
        let failures = report.failures();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("a[]"));
        assert!(failures[1].contains("sum"));
    }

    #[test]
    fn test_dot_tolerance_scales_with_blocks() {
        assert_eq!(dot_tolerance::<f32>(4096), 1.0e-6);
        assert!(dot_tolerance::<f32>(1 << 25) > 1.0e-6);
        assert!(dot_tolerance::<f64>(1 << 20) < 1.0e-10);
    }
}
