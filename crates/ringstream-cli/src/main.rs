//! RingStream CLI - memory-bandwidth benchmark for data-parallel devices.
//!
//! # Examples
//!
//! ```bash
//! # List devices of the best available backend
//! ringstream --list
//!
//! # Default run: 2^25 doubles, 100 iterations of copy, mul, add, triad, dot
//! ringstream
//!
//! # Single precision, triad only, CSV output
//! ringstream --float --triad-only --csv -s 16777216 -n 50
//!
//! # Take settings from a file, override the device
//! ringstream --config bench.toml --device 1
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod error;
mod output;

use error::CliResult;
use ringstream::prelude::*;

/// RingStream - sustained memory bandwidth of copy, mul, add, triad, nstream and dot
#[derive(Parser, Debug)]
#[command(name = "ringstream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// List available devices and exit
    #[arg(long)]
    list: bool,

    /// Select device at index
    #[arg(long)]
    device: Option<usize>,

    /// Use this many elements per array (a multiple of 1024)
    #[arg(short = 's', long = "arraysize")]
    array_size: Option<usize>,

    /// Run the test this many times (at least 2)
    #[arg(short = 'n', long = "numtimes")]
    num_times: Option<usize>,

    /// Use single precision floats
    #[arg(long)]
    float: bool,

    /// Only run triad
    #[arg(long, conflicts_with = "nstream_only")]
    triad_only: bool,

    /// Only run nstream
    #[arg(long)]
    nstream_only: bool,

    /// Output as CSV
    #[arg(long, conflicts_with = "format")]
    csv: bool,

    /// Output format (table, csv, json)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Use MiB=2^20 for bandwidth calculation (default MB=10^6)
    #[arg(long)]
    mibibytes: bool,

    /// Backend (auto, cpu, cuda)
    #[arg(long)]
    backend: Option<Backend>,

    /// Load settings from a TOML file; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and results
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Settings file (or defaults) with command-line overrides applied.
    fn bench_config(&self) -> CliResult<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };

        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(array_size) = self.array_size {
            config.array_size = array_size;
        }
        if let Some(num_times) = self.num_times {
            config.num_times = num_times;
        }
        if self.float {
            config.precision = Precision::Float;
        }
        if self.triad_only {
            config.mode = BenchMode::TriadOnly;
        }
        if self.nstream_only {
            config.mode = BenchMode::NstreamOnly;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.csv {
            config.output.format = OutputFormat::Csv;
        }
        if self.mibibytes {
            config.output.mibibytes = true;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }

        config.validate()?;
        Ok(config)
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn list_devices(backend: Backend) -> CliResult<()> {
    let devices = ringstream::list_devices(backend)?;
    match output::format_device_list(&devices) {
        Some(list) => print!("{}", list),
        None => eprintln!("No devices found."),
    }
    Ok(())
}

fn run<T: CudaScalar>(config: &BenchConfig) -> CliResult<()> {
    let format = config.output.format;
    if format == OutputFormat::Table {
        print!("{}", output::preamble(config, T::PRECISION, T::size_bytes()));
    }

    let mut stream = StreamBuilder::from_config(config).build::<T>()?;
    let report = run_benchmark(stream.as_mut(), config)?;

    for failure in report.verification.failures() {
        eprintln!("{} {}", "Warning:".yellow(), failure);
    }
    print!("{}", output::render(&report, format)?);
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn execute(cli: &Cli) -> CliResult<()> {
    let config = cli.bench_config()?;

    if cli.list {
        return list_devices(config.backend);
    }

    match config.precision {
        Precision::Float => run::<f32>(&config),
        Precision::Double => run::<f64>(&config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            tracing::error!("Fatal device fault: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
