//! Rendering of benchmark results.

use std::fmt::Write as _;

use ringstream::config::{BenchConfig, BenchMode, OutputFormat};
use ringstream::device::DeviceInfo;
use ringstream::runner::{kernels_for, BandwidthUnit, BenchReport};

use crate::error::CliResult;

/// CSV column header.
pub fn csv_header(unit: BandwidthUnit) -> String {
    let rate = match unit {
        BandwidthUnit::Megabytes => "max_mbytes_per_sec",
        BandwidthUnit::Mebibytes => "max_mibytes_per_sec",
    };
    format!(
        "function,num_times,n_elements,sizeof,{},min_runtime,max_runtime,avg_runtime",
        rate
    )
}

fn size_line(label: &str, bytes: usize, unit: BandwidthUnit) -> String {
    let giga = match unit {
        BandwidthUnit::Megabytes => 1.0e9,
        BandwidthUnit::Mebibytes => (1u64 << 30) as f64,
    };
    let giga_label = match unit {
        BandwidthUnit::Megabytes => "GB",
        BandwidthUnit::Mebibytes => "GiB",
    };
    format!(
        "{}: {:.1} {} (={:.1} {})",
        label,
        unit.scale(bytes),
        unit.label(),
        bytes as f64 / giga,
        giga_label
    )
}

/// Run description printed before a table-format run.
pub fn preamble(config: &BenchConfig, precision: &str, element_size: usize) -> String {
    let unit = BandwidthUnit::from_mibibytes(config.output.mibibytes);
    let array_bytes = config.array_size * element_size;

    let mut out = String::new();
    let _ = writeln!(out, "RingStream");
    let _ = writeln!(out, "Version: {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "Backend: {}", config.backend);
    match config.mode {
        BenchMode::All => {
            let _ = writeln!(out, "Running kernels {} times", config.num_times);
        }
        mode => {
            let _ = writeln!(
                out,
                "Running {} {} times",
                kernels_for(mode)[0],
                config.num_times
            );
        }
    }
    let _ = writeln!(out, "Number of elements: {}", config.array_size);
    let _ = writeln!(out, "Precision: {}", precision);
    let _ = writeln!(out, "{}", size_line("Array size", array_bytes, unit));
    let _ = writeln!(out, "{}", size_line("Total size", 3 * array_bytes, unit));
    out
}

/// Aligned human-readable table.
pub fn format_table(report: &BenchReport) -> String {
    let unit = report.unit;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Using device {}: {} ({})",
        report.device.index, report.device.name, report.device.driver
    );
    for (label, stats) in [("Init", &report.init), ("Read", &report.read)] {
        let _ = writeln!(
            out,
            "{}: {:.6} s (={:.1} {})",
            label,
            stats.runtime,
            stats.bandwidth,
            unit.rate_label()
        );
    }

    let _ = writeln!(
        out,
        "{:<12}{:<12}{:<12}{:<12}{:<12}",
        "Function",
        unit.rate_label(),
        "Min (sec)",
        "Max",
        "Average"
    );
    for stats in &report.kernels {
        let _ = writeln!(
            out,
            "{:<12}{:<12.3}{:<12.5}{:<12.5}{:<12.5}",
            stats.kernel.name(),
            stats.bandwidth,
            stats.min_runtime,
            stats.max_runtime,
            stats.avg_runtime
        );
    }
    out
}

/// CSV with a header row; one row per kernel.
pub fn format_csv(report: &BenchReport) -> String {
    let mut out = csv_header(report.unit);
    out.push('\n');
    for stats in &report.kernels {
        let _ = writeln!(
            out,
            "{},{},{},{},{:.3},{:.5},{:.5},{:.5}",
            stats.kernel.name(),
            report.num_times,
            report.array_size,
            report.element_size,
            stats.bandwidth,
            stats.min_runtime,
            stats.max_runtime,
            stats.avg_runtime
        );
    }
    out
}

/// Pretty-printed JSON document of the whole report.
pub fn format_json(report: &BenchReport) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render `report` in `format`.
pub fn render(report: &BenchReport, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Table => Ok(format_table(report)),
        OutputFormat::Csv => Ok(format_csv(report)),
        OutputFormat::Json => format_json(report),
    }
}

/// Device list for `--list`; `None` when there are no devices.
pub fn format_device_list(devices: &[DeviceInfo]) -> Option<String> {
    if devices.is_empty() {
        return None;
    }
    let mut out = String::from("Devices:\n");
    for device in devices {
        let _ = writeln!(out, "{}: {}", device.index, device.name);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringstream::prelude::*;

    fn report(config: &BenchConfig) -> BenchReport {
        let mut stream = StreamBuilder::from_config(config).build::<f64>().unwrap();
        run_benchmark(stream.as_mut(), config).unwrap()
    }

    fn small_config() -> BenchConfig {
        BenchConfig::new()
            .with_backend(Backend::Cpu)
            .with_array_size(2048)
            .with_num_times(3)
    }

    #[test]
    fn test_csv_layout() {
        let csv = format_csv(&report(&small_config()));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "function,num_times,n_elements,sizeof,max_mbytes_per_sec,min_runtime,max_runtime,avg_runtime"
        );
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("Copy,3,2048,8,"));
        assert!(lines[5].starts_with("Dot,3,2048,8,"));
        assert!(lines[1..].iter().all(|l| l.split(',').count() == 8));
    }

    #[test]
    fn test_csv_mibibytes_header() {
        assert!(csv_header(BandwidthUnit::Mebibytes).contains("max_mibytes_per_sec"));
    }

    #[test]
    fn test_table_layout() {
        let table = format_table(&report(&small_config().with_mode(BenchMode::TriadOnly)));
        assert!(table.contains("Function    MBytes/sec  Min (sec)   Max         Average"));
        assert!(table.lines().any(|l| l.starts_with("Triad       ")));
        assert!(table.contains("Init: "));
        assert!(table.contains("Read: "));
    }

    #[test]
    fn test_json_document() {
        let json = format_json(&report(&small_config())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kernels"].as_array().unwrap().len(), 5);
        assert_eq!(value["verification"]["err_a"], 0.0);
    }

    #[test]
    fn test_preamble() {
        let config = small_config();
        let text = preamble(&config, "double", 8);
        assert!(text.contains("Running kernels 3 times"));
        assert!(text.contains("Precision: double"));
        assert!(text.contains("Array size: 0.0 MB"));

        let text = preamble(&config.with_mode(BenchMode::NstreamOnly), "float", 4);
        assert!(text.contains("Running Nstream 3 times"));
    }

    #[test]
    fn test_device_list() {
        assert_eq!(format_device_list(&[]), None);
        let devices = vec![DeviceInfo {
            index: 0,
            name: "Host CPU".to_string(),
            driver: "test".to_string(),
            total_memory: 1,
        }];
        assert_eq!(
            format_device_list(&devices).unwrap(),
            "Devices:\n0: Host CPU\n"
        );
    }
}
