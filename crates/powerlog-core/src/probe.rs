//! Embedded latency probe.
//!
//! The probe runs synchronously inside every tick as a load-under-test
//! metric: its wall-clock cost is part of the iteration duration and can by
//! itself cause a schedule overrun.

use std::hint::black_box;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default matrix dimension for [`MatrixProbe`].
pub const DEFAULT_MATRIX_SIZE: usize = 300;

/// Largest accepted matrix dimension (three 2048² `f64` buffers, ~100 MB).
pub const MAX_MATRIX_SIZE: usize = 2048;

/// A fixed-cost workload whose duration is reported each tick.
pub trait LatencyProbe {
    /// Run the workload once and return how long it took.
    fn measure(&mut self) -> Duration;
}

/// Dense `n×n` matrix multiplication on freshly generated inputs.
///
/// Only the multiply is timed; input generation happens before the clock
/// starts.
pub struct MatrixProbe {
    size: usize,
    rng: StdRng,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl MatrixProbe {
    pub fn new(size: usize) -> Self {
        Self::with_rng(size, StdRng::from_os_rng())
    }

    /// Deterministic inputs for reproducible comparisons.
    pub fn seeded(size: usize, seed: u64) -> Self {
        Self::with_rng(size, StdRng::seed_from_u64(seed))
    }

    /// Sizes above [`MAX_MATRIX_SIZE`] are clamped to it.
    fn with_rng(size: usize, rng: StdRng) -> Self {
        let size = size.min(MAX_MATRIX_SIZE);
        let n = size * size;
        Self {
            size,
            rng,
            a: vec![0.0; n],
            b: vec![0.0; n],
            c: vec![0.0; n],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn refill(&mut self) {
        for v in self.a.iter_mut().chain(self.b.iter_mut()) {
            *v = self.rng.random::<f64>();
        }
        self.c.fill(0.0);
    }
}

impl Default for MatrixProbe {
    fn default() -> Self {
        Self::new(DEFAULT_MATRIX_SIZE)
    }
}

impl LatencyProbe for MatrixProbe {
    fn measure(&mut self) -> Duration {
        self.refill();
        let start = Instant::now();
        matmul(&self.a, &self.b, &mut self.c, self.size);
        black_box(&self.c);
        start.elapsed()
    }
}

/// `c += a × b` for row-major `n×n` matrices (i-k-j order).
pub fn matmul(a: &[f64], b: &[f64], c: &mut [f64], n: usize) {
    for i in 0..n {
        let row = &mut c[i * n..(i + 1) * n];
        for k in 0..n {
            let aik = a[i * n + k];
            let b_row = &b[k * n..(k + 1) * n];
            for (cij, bkj) in row.iter_mut().zip(b_row) {
                *cij += aik * bkj;
            }
        }
    }
}

/// Reports a constant duration without doing any work.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub Duration);

impl LatencyProbe for FixedProbe {
    fn measure(&mut self) -> Duration {
        self.0
    }
}
