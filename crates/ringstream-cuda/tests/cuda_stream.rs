//! CUDA stream tests.
//!
//! Run with: cargo test -p ringstream-cuda --features cuda
//! Each test returns early when no CUDA device is present.

#![cfg(feature = "cuda")]

use ringstream_core::prelude::*;
use ringstream_cuda::{is_cuda_available, CudaPlatform, CudaStream};

fn platform() -> Option<CudaPlatform> {
    if !is_cuda_available() {
        println!("No CUDA device available, skipping test");
        return None;
    }
    CudaPlatform::new().ok()
}

#[test]
fn test_device_query() {
    let Some(platform) = platform() else { return };
    let devices = platform.list_devices().unwrap();
    assert_eq!(devices.len(), platform.device_count().unwrap());
    assert!(devices[0].total_memory > 0);
    assert!(!devices[0].name.is_empty());
}

#[test]
fn test_scenario_dot_then_triad() {
    let Some(platform) = platform() else { return };
    let mut stream = CudaStream::<f64>::new(&platform, 4096, 0, StreamConfig::default()).unwrap();
    stream.init_arrays(1.0, 2.0, 0.0).unwrap();
    assert_eq!(stream.dot().unwrap(), 8192.0);

    stream.triad().unwrap();
    let (mut a, mut b, mut c) = (vec![0.0; 4096], vec![0.0; 4096], vec![0.0; 4096]);
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    assert!(a.iter().all(|&v| v == 2.0));
}

#[test]
fn test_elementwise_kernels() {
    let Some(platform) = platform() else { return };
    let n = 1 << 16;
    let mut stream = CudaStream::<f32>::new(&platform, n, 0, StreamConfig::with_scalar(0.5)).unwrap();
    stream.init_arrays(1.0, 2.0, 3.0).unwrap();
    stream.copy().unwrap(); // c = 1
    stream.mul().unwrap(); // b = 0.5
    stream.add().unwrap(); // c = 1.5
    stream.triad().unwrap(); // a = 0.5 + 0.75
    stream.nstream().unwrap(); // a += 0.5 + 0.75

    let (mut a, mut b, mut c) = (vec![0.0f32; n], vec![0.0f32; n], vec![0.0f32; n]);
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    assert!(a.iter().all(|&v| v == 2.5));
    assert!(b.iter().all(|&v| v == 0.5));
    assert!(c.iter().all(|&v| v == 1.5));
}

#[test]
fn test_construction_errors() {
    let Some(platform) = platform() else { return };
    let count = platform.device_count().unwrap();

    assert!(matches!(
        CudaStream::<f32>::new(&platform, 1000, 0, StreamConfig::default()),
        Err(StreamError::Configuration { .. })
    ));
    assert!(matches!(
        CudaStream::<f32>::new(&platform, 1024, count, StreamConfig::default()),
        Err(StreamError::Device { .. })
    ));
    assert!(matches!(
        CudaStream::<f64>::new(&platform, usize::MAX / 2048 * 1024, 0, StreamConfig::default()),
        Err(StreamError::Capacity { .. })
    ));
}
