//! Kernel Throughput Benchmarks
//!
//! Measures each stream kernel on the CPU backend with criterion's
//! throughput reporting, so results read as bytes/sec like the CLI's table.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ringstream::prelude::*;

const SIZES: [usize; 2] = [1 << 18, 1 << 22];

fn cpu_stream<T: CudaScalar>(array_size: usize) -> Box<dyn Stream<T>> {
    let mut stream = StreamBuilder::new()
        .backend(Backend::Cpu)
        .array_size(array_size)
        .build::<T>()
        .unwrap();
    stream
        .init_arrays(T::from_f64(0.1), T::from_f64(0.2), T::from_f64(0.0))
        .unwrap();
    stream
}

fn bench_kernels<T: CudaScalar>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("kernels_{}", T::PRECISION));
    group.sample_size(20);

    for &size in &SIZES {
        let mut stream = cpu_stream::<T>(size);

        for kernel in Kernel::ALL {
            group.throughput(Throughput::Bytes(kernel.bytes_moved::<T>(size) as u64));
            group.bench_with_input(BenchmarkId::new(kernel.name(), size), &kernel, |b, &kernel| {
                b.iter(|| match kernel {
                    Kernel::Copy => stream.copy().unwrap(),
                    Kernel::Mul => stream.mul().unwrap(),
                    Kernel::Add => stream.add().unwrap(),
                    Kernel::Triad => stream.triad().unwrap(),
                    Kernel::Nstream => stream.nstream().unwrap(),
                    Kernel::Dot => {
                        black_box(stream.dot().unwrap());
                    }
                });
            });
        }
    }

    group.finish();
}

/// Benchmark construction, which includes the capacity check and allocation.
fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group.sample_size(20);

    for &size in &SIZES {
        group.bench_with_input(BenchmarkId::new("cpu_f64", size), &size, |b, &size| {
            b.iter(|| black_box(cpu_stream::<f64>(size)));
        });
    }

    group.finish();
}

fn bench_kernels_f32(c: &mut Criterion) {
    bench_kernels::<f32>(c);
}

fn bench_kernels_f64(c: &mut Criterion) {
    bench_kernels::<f64>(c);
}

criterion_group!(benches, bench_kernels_f32, bench_kernels_f64, bench_construction);
criterion_main!(benches);
