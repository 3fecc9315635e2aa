//! Injected randomness.
//!
//! Every stochastic branch in the controller and the pheromone field draws from a
//! single `RandomSource` owned by the simulation, so a seed reproduces a run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Uniform / Gaussian draw capability.
pub trait RandomSource {
    /// Uniform draw in `[low, high)`; returns `low` for an empty range.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// Zero-mean normal draw with standard deviation `sigma`.
    fn gaussian(&mut self, sigma: f64) -> f64;

    /// Unweighted coin flip.
    fn coin_flip(&mut self) -> bool {
        self.uniform(0.0, 1.0) < 0.5
    }
}

/// Seeded source backed by `StdRng`.
#[derive(Clone, Debug)]
pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        SimRng {
            inner: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SimRng {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if !(high > low) {
            return low;
        }
        self.inner.gen_range(low..high)
    }

    fn gaussian(&mut self, sigma: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.inner);
        z * sigma
    }
}
