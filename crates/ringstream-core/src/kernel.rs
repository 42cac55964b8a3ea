//! Catalogue of timed benchmark kernels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scalar::StreamScalar;

/// A timed kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// `c = a`
    Copy,
    /// `b = scalar * c`
    Mul,
    /// `c = a + b`
    Add,
    /// `a = b + scalar * c`
    Triad,
    /// `a += b + scalar * c`
    Nstream,
    /// `sum(a * b)`
    Dot,
}

impl Kernel {
    /// All kernels in reporting order.
    pub const ALL: [Kernel; 6] = [
        Kernel::Copy,
        Kernel::Mul,
        Kernel::Add,
        Kernel::Triad,
        Kernel::Dot,
        Kernel::Nstream,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Copy => "Copy",
            Kernel::Mul => "Mul",
            Kernel::Add => "Add",
            Kernel::Triad => "Triad",
            Kernel::Nstream => "Nstream",
            Kernel::Dot => "Dot",
        }
    }

    /// Number of array-sized streams moved through memory per call.
    pub fn arrays_moved(&self) -> usize {
        match self {
            Kernel::Copy | Kernel::Mul | Kernel::Dot => 2,
            Kernel::Add | Kernel::Triad => 3,
            Kernel::Nstream => 4,
        }
    }

    /// Bytes read plus written by one call over `array_size` elements.
    pub fn bytes_moved<T: StreamScalar>(&self, array_size: usize) -> usize {
        self.arrays_moved() * array_size * T::size_bytes()
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
