//! Workload kernels
//!
//! Five fixed-cost, deterministic compute routines. Problem sizes come from
//! [`ProblemSizes`] and never depend on measured timings, so the cost of a run
//! is fixed before it starts.

pub mod fractal;
pub mod lu;
pub mod matrix;
pub mod mixing;
pub mod rle;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use fractal::mandelbrot;
pub use lu::{lu_decompose, lu_kernel};
pub use matrix::matrix_multiply;
pub use mixing::{integer_mix, mix_bits};
pub use rle::{compression_kernel, run_length_encode};

/// Kernel identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    MatrixMultiply,
    IntegerMix,
    LuDecomposition,
    Compression,
    Mandelbrot,
}

impl Kernel {
    /// Kernels timed individually in the single-core loop, in run order.
    pub const SINGLE_CORE: [Kernel; 4] = [
        Kernel::MatrixMultiply,
        Kernel::IntegerMix,
        Kernel::LuDecomposition,
        Kernel::Compression,
    ];

    pub const ALL: [Kernel; 5] = [
        Kernel::MatrixMultiply,
        Kernel::IntegerMix,
        Kernel::LuDecomposition,
        Kernel::Compression,
        Kernel::Mandelbrot,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Kernel::MatrixMultiply => "matrix multiply",
            Kernel::IntegerMix => "integer mix",
            Kernel::LuDecomposition => "LU decomposition",
            Kernel::Compression => "compression",
            Kernel::Mandelbrot => "mandelbrot",
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scalar produced by one kernel invocation.
///
/// Only consumed by the optimization barrier, except for the LU flag which is
/// counted as a kernel failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelOutput {
    /// Top-left element of the matrix product
    Element(f32),
    /// Final mixing hash
    Hash(u32),
    /// Whether elimination finished without a singular pivot
    Factored(bool),
    /// Encoded length in bytes
    Encoded(usize),
    /// Total escape-time iterations over the grid
    Iterations(u64),
}

impl KernelOutput {
    pub fn is_failure(&self) -> bool {
        matches!(self, KernelOutput::Factored(false))
    }
}

/// Fixed problem sizes for every kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSizes {
    /// Square matrix dimension for the float kernel
    #[serde(default = "default_matrix")]
    pub matrix: usize,

    /// Number of chained mixing rounds
    #[serde(default = "default_integer_rounds")]
    pub integer_rounds: u32,

    /// Square matrix dimension for LU decomposition
    #[serde(default = "default_lu")]
    pub lu: usize,

    /// Input length for run-length compression, in bytes
    #[serde(default = "default_compression")]
    pub compression: usize,

    /// Fractal grid edge length in pixels
    #[serde(default = "default_fractal_size")]
    pub fractal_size: usize,

    /// Escape-time iteration cap per pixel
    #[serde(default = "default_fractal_iterations")]
    pub fractal_iterations: u32,
}

impl Default for ProblemSizes {
    fn default() -> Self {
        Self {
            matrix: default_matrix(),
            integer_rounds: default_integer_rounds(),
            lu: default_lu(),
            compression: default_compression(),
            fractal_size: default_fractal_size(),
            fractal_iterations: default_fractal_iterations(),
        }
    }
}

fn default_matrix() -> usize {
    300
}

fn default_integer_rounds() -> u32 {
    25_000_000
}

fn default_lu() -> usize {
    500
}

fn default_compression() -> usize {
    1_000_000
}

fn default_fractal_size() -> usize {
    400
}

fn default_fractal_iterations() -> u32 {
    4000
}

/// Something that can run a kernel by identity.
///
/// The orchestrator is generic over this so the timing and scoring path can be
/// driven by substitute kernels.
pub trait Workloads: Sync {
    fn run(&self, kernel: Kernel) -> KernelOutput;
}

impl<W: Workloads + ?Sized> Workloads for &W {
    fn run(&self, kernel: Kernel) -> KernelOutput {
        (**self).run(kernel)
    }
}

/// The real kernels at fixed sizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelSet {
    sizes: ProblemSizes,
}

impl KernelSet {
    pub fn new(sizes: ProblemSizes) -> Self {
        Self { sizes }
    }
}

impl Workloads for KernelSet {
    fn run(&self, kernel: Kernel) -> KernelOutput {
        let sizes = &self.sizes;
        match kernel {
            Kernel::MatrixMultiply => KernelOutput::Element(matrix_multiply(sizes.matrix)),
            Kernel::IntegerMix => KernelOutput::Hash(integer_mix(sizes.integer_rounds)),
            Kernel::LuDecomposition => KernelOutput::Factored(lu_kernel(sizes.lu)),
            Kernel::Compression => KernelOutput::Encoded(compression_kernel(sizes.compression)),
            Kernel::Mandelbrot => KernelOutput::Iterations(mandelbrot(
                sizes.fractal_size,
                sizes.fractal_iterations,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_sizes() -> ProblemSizes {
        ProblemSizes {
            matrix: 24,
            integer_rounds: 10_000,
            lu: 32,
            compression: 5_000,
            fractal_size: 32,
            fractal_iterations: 64,
        }
    }

    #[test]
    fn test_default_sizes() {
        let sizes = ProblemSizes::default();
        assert_eq!(sizes.matrix, 300);
        assert_eq!(sizes.integer_rounds, 25_000_000);
        assert_eq!(sizes.lu, 500);
        assert_eq!(sizes.compression, 1_000_000);
        assert_eq!(sizes.fractal_size, 400);
        assert_eq!(sizes.fractal_iterations, 4000);
    }

    #[test]
    fn kernel_set_is_deterministic() {
        let set = KernelSet::new(small_sizes());
        for kernel in Kernel::ALL {
            assert_eq!(set.run(kernel), set.run(kernel), "{kernel} changed between runs");
        }
    }

    #[test]
    fn kernel_set_dispatches_by_identity() {
        let set = KernelSet::new(small_sizes());
        assert!(matches!(set.run(Kernel::MatrixMultiply), KernelOutput::Element(_)));
        assert!(matches!(set.run(Kernel::IntegerMix), KernelOutput::Hash(_)));
        assert_eq!(set.run(Kernel::LuDecomposition), KernelOutput::Factored(true));
        assert_eq!(set.run(Kernel::Compression), KernelOutput::Encoded(1_000));
        assert!(matches!(set.run(Kernel::Mandelbrot), KernelOutput::Iterations(n) if n > 0));
    }

    #[test]
    fn only_singular_lu_counts_as_failure() {
        assert!(KernelOutput::Factored(false).is_failure());
        assert!(!KernelOutput::Factored(true).is_failure());
        assert!(!KernelOutput::Encoded(0).is_failure());
    }

    #[test]
    fn single_core_set_excludes_fractal() {
        assert!(!Kernel::SINGLE_CORE.contains(&Kernel::Mandelbrot));
        assert_eq!(Kernel::SINGLE_CORE.len(), 4);
    }
}
