//! # Random Number Streams
//!
//! A `Context` owns the root pseudorandom stream for a run. Parallel
//! regions obtain independent worker streams via [`Context::spawn`]; each
//! worker stream is seeded by a draw from the root, so a fixed seed and a
//! fixed sequence of spawn calls reproduce identical streams.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Owner of the root random stream and the verbosity flag for a run.
pub struct Context {
    rng: StdRng,
    verbose: bool,
}

impl Context {
    /// Create a context with a deterministically seeded root stream.
    pub fn new(seed: u64, verbose: bool) -> Self {
        Context {
            rng: StdRng::seed_from_u64(seed),
            verbose,
        }
    }

    /// Whether verbose progress reporting was requested.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Borrow the root stream.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Spawn `n` independent worker streams.
    ///
    /// Each stream is seeded by a fresh draw from the root stream. Workers
    /// own their stream for the duration of a parallel region; streams are
    /// never shared between workers.
    pub fn spawn(&mut self, n: usize) -> Vec<StdRng> {
        (0..n)
            .map(|_| StdRng::seed_from_u64(self.rng.random::<u64>()))
            .collect()
    }
}
