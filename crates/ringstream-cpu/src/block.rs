//! Thread-block emulation for kernels that need block-local shared memory.
//!
//! A block's lanes run on one host worker in lockstep: the code between two
//! barriers executes for every lane, then [`ThreadBlock::sync_threads`]
//! fences before the next region starts. This keeps the GPU semantics of
//! `__syncthreads()` (no lane observes a slot before every lane finished the
//! previous region) without one OS thread per lane.

use std::sync::atomic::{fence, Ordering};

use ringstream_core::scalar::StreamScalar;

/// One thread block with its shared-memory tile.
pub struct ThreadBlock<T: StreamScalar> {
    block_id: usize,
    shared: Vec<T>,
    barriers: usize,
}

impl<T: StreamScalar> ThreadBlock<T> {
    /// Block `block_id` with `block_dim` lanes; shared slots start at zero.
    pub fn new(block_id: usize, block_dim: usize) -> Self {
        debug_assert!(block_dim.is_power_of_two(), "block_dim must be a power of two");
        Self {
            block_id,
            shared: vec![T::ZERO; block_dim],
            barriers: 0,
        }
    }

    /// Block index within the grid.
    #[inline]
    pub fn block_id(&self) -> usize {
        self.block_id
    }

    /// Lanes per block.
    #[inline]
    pub fn block_dim(&self) -> usize {
        self.shared.len()
    }

    /// Barriers passed so far.
    pub fn barriers(&self) -> usize {
        self.barriers
    }

    /// Shared-memory slots.
    pub fn shared(&self) -> &[T] {
        &self.shared
    }

    /// Run one barrier-free region for every lane; lane `t` owns slot `t`.
    pub fn for_each_lane<F>(&mut self, mut body: F)
    where
        F: FnMut(usize, &mut T),
    {
        for (lane, slot) in self.shared.iter_mut().enumerate() {
            body(lane, slot);
        }
    }

    /// Block-wide barrier between regions.
    #[inline]
    pub fn sync_threads(&mut self) {
        fence(Ordering::SeqCst);
        self.barriers += 1;
    }

    /// Binary tree reduction over the shared slots; returns slot 0.
    ///
    /// Each round, lanes `[0, width/2)` add slot `lane + width/2` into their
    /// own slot, with a barrier before every round. A lane only ever writes
    /// its own slot, and reads a slot no active lane writes that round.
    pub fn tree_reduce(&mut self) -> T {
        let mut offset = self.block_dim() / 2;
        while offset > 0 {
            self.sync_threads();
            let (active, upper) = self.shared.split_at_mut(offset);
            for (slot, &partner) in active.iter_mut().zip(upper.iter()) {
                *slot += partner;
            }
            offset /= 2;
        }
        self.shared[0]
    }

    /// Grid-stride dot product of `a` and `b` for this block's lanes.
    ///
    /// Lane `t` accumulates indices `block_id * block_dim + t + k * stride`,
    /// then the block reduces its lane sums.
    pub fn dot(&mut self, a: &[T], b: &[T], stride: usize) -> T {
        let base = self.block_id * self.block_dim();
        let len = a.len().min(b.len());

        self.for_each_lane(|lane, acc| {
            *acc = T::ZERO;
            let mut i = base + lane;
            while i < len {
                *acc += a[i] * b[i];
                i += stride;
            }
        });

        self.tree_reduce()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_reduce_rounds() {
        let mut block = ThreadBlock::<f64>::new(0, 1024);
        block.for_each_lane(|lane, slot| *slot = lane as f64);

        let sum = block.tree_reduce();
        assert_eq!(sum, (0..1024).sum::<usize>() as f64);
        // log2(1024) halving rounds, one barrier each
        assert_eq!(block.barriers(), 10);
    }

    #[test]
    fn test_tree_reduce_order() {
        // Width 4: round 1 gives [s0+s2, s1+s3], round 2 adds those two.
        let mut block = ThreadBlock::<f32>::new(0, 4);
        block.for_each_lane(|lane, slot| *slot = [1.0, 10.0, 100.0, 1000.0][lane]);
        assert_eq!(block.tree_reduce(), 1111.0);
        assert_eq!(block.shared(), &[1111.0f32, 1010.0, 100.0, 1000.0]);
    }

    #[test]
    fn test_block_dot_grid_stride() {
        // Two blocks of 4 lanes over 16 elements: stride 8, two elements per lane.
        let a: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let b = vec![1.0f64; 16];

        let mut first = ThreadBlock::new(0, 4);
        let mut second = ThreadBlock::new(1, 4);
        let p0 = first.dot(&a, &b, 8);
        let p1 = second.dot(&a, &b, 8);

        // Block 0 covers 0..4 and 8..12; block 1 covers 4..8 and 12..16.
        assert_eq!(p0, (0 + 1 + 2 + 3 + 8 + 9 + 10 + 11) as f64);
        assert_eq!(p1, (4 + 5 + 6 + 7 + 12 + 13 + 14 + 15) as f64);
        assert_eq!(p0 + p1, 120.0);
    }

    #[test]
    fn test_block_beyond_array_is_zero() {
        let a = vec![1.0f32; 4];
        let mut block = ThreadBlock::new(3, 4);
        assert_eq!(block.dot(&a, &a, 16), 0.0);
    }
}
