//! Kernel bodies executed on the CPU device's workers.
//!
//! Elementwise kernels split the index space into `block_dim`-sized chunks,
//! one rayon task per block. Callers run these inside
//! [`CpuDevice::launch`](crate::device::CpuDevice::launch).

use rayon::prelude::*;

use ringstream_core::scalar::StreamScalar;
use ringstream_core::types::LaunchGeometry;

use crate::block::ThreadBlock;

/// `a[i] = va; b[i] = vb; c[i] = vc`
pub fn init<T: StreamScalar>(
    a: &mut [T],
    b: &mut [T],
    c: &mut [T],
    values: (T, T, T),
    block_dim: usize,
) {
    let (va, vb, vc) = values;
    a.par_chunks_mut(block_dim)
        .zip(b.par_chunks_mut(block_dim))
        .zip(c.par_chunks_mut(block_dim))
        .for_each(|((a, b), c)| {
            a.fill(va);
            b.fill(vb);
            c.fill(vc);
        });
}

/// `c[i] = a[i]`
pub fn copy<T: StreamScalar>(a: &[T], c: &mut [T], block_dim: usize) {
    c.par_chunks_mut(block_dim)
        .zip(a.par_chunks(block_dim))
        .for_each(|(c, a)| c.copy_from_slice(a));
}

/// `b[i] = scalar * c[i]`
pub fn mul<T: StreamScalar>(b: &mut [T], c: &[T], scalar: T, block_dim: usize) {
    b.par_chunks_mut(block_dim)
        .zip(c.par_chunks(block_dim))
        .for_each(|(b, c)| {
            for (b, &c) in b.iter_mut().zip(c) {
                *b = scalar * c;
            }
        });
}

/// `c[i] = a[i] + b[i]`
pub fn add<T: StreamScalar>(a: &[T], b: &[T], c: &mut [T], block_dim: usize) {
    c.par_chunks_mut(block_dim)
        .zip(a.par_chunks(block_dim))
        .zip(b.par_chunks(block_dim))
        .for_each(|((c, a), b)| {
            for ((c, &a), &b) in c.iter_mut().zip(a).zip(b) {
                *c = a + b;
            }
        });
}

/// `a[i] = b[i] + scalar * c[i]`
pub fn triad<T: StreamScalar>(a: &mut [T], b: &[T], c: &[T], scalar: T, block_dim: usize) {
    a.par_chunks_mut(block_dim)
        .zip(b.par_chunks(block_dim))
        .zip(c.par_chunks(block_dim))
        .for_each(|((a, b), c)| {
            for ((a, &b), &c) in a.iter_mut().zip(b).zip(c) {
                *a = b + scalar * c;
            }
        });
}

/// `a[i] += b[i] + scalar * c[i]`
pub fn nstream<T: StreamScalar>(a: &mut [T], b: &[T], c: &[T], scalar: T, block_dim: usize) {
    a.par_chunks_mut(block_dim)
        .zip(b.par_chunks(block_dim))
        .zip(c.par_chunks(block_dim))
        .for_each(|((a, b), c)| {
            for ((a, &b), &c) in a.iter_mut().zip(b).zip(c) {
                *a += b + scalar * c;
            }
        });
}

/// Device phase of the dot product: block `g` writes its partial to `sums[g]`.
///
/// Blocks run in any order; each owns exactly one output slot.
pub fn dot<T: StreamScalar>(a: &[T], b: &[T], sums: &mut [T], geometry: LaunchGeometry) {
    let stride = geometry.total_lanes();
    sums.par_iter_mut()
        .take(geometry.grid_dim)
        .enumerate()
        .for_each(|(block_id, partial)| {
            let mut block = ThreadBlock::new(block_id, geometry.block_dim);
            *partial = block.dot(a, b, stride);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const BD: usize = 4;

    #[test]
    fn test_elementwise_kernels() {
        let mut a = vec![0.0f64; 8];
        let mut b = vec![0.0f64; 8];
        let mut c = vec![0.0f64; 8];

        init(&mut a, &mut b, &mut c, (1.0, 2.0, 3.0), BD);
        assert!(a.iter().all(|&v| v == 1.0));
        assert!(b.iter().all(|&v| v == 2.0));
        assert!(c.iter().all(|&v| v == 3.0));

        copy(&a, &mut c, BD);
        assert!(c.iter().all(|&v| v == 1.0));

        mul(&mut b, &c, 0.5, BD);
        assert!(b.iter().all(|&v| v == 0.5));

        add(&a, &b, &mut c, BD);
        assert!(c.iter().all(|&v| v == 1.5));

        triad(&mut a, &b, &c, 2.0, BD);
        assert!(a.iter().all(|&v| v == 3.5));

        nstream(&mut a, &b, &c, 2.0, BD);
        assert!(a.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_dot_partials() {
        let a: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let b = vec![2.0f64; 16];
        let mut sums = vec![0.0f64; 2];
        let geometry = LaunchGeometry {
            grid_dim: 2,
            block_dim: BD,
        };

        dot(&a, &b, &mut sums, geometry);
        assert_eq!(sums, vec![2.0 * 44.0, 2.0 * 76.0]);
    }
}
