//! Parallel candidate scoring

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bsp::traits::BspOps;
use crate::float_types::Real;

/// Candidate lists shorter than this are scored on the calling thread.
const PARALLEL_THRESHOLD: usize = 16;

/// Scores split candidates on the rayon pool.
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBspOps;

#[cfg(feature = "parallel")]
impl ParallelBspOps {
    pub const fn new() -> Self {
        ParallelBspOps
    }
}

#[cfg(feature = "parallel")]
impl BspOps for ParallelBspOps {
    fn best_candidate(
        &self,
        candidates: &[usize],
        score: &(dyn Fn(usize) -> Real + Sync),
    ) -> Option<usize> {
        if candidates.len() < PARALLEL_THRESHOLD {
            return crate::bsp::serial::SerialBspOps.best_candidate(candidates, score);
        }
        candidates
            .par_iter()
            .enumerate()
            .map(|(i, &candidate)| (i, score(candidate)))
            .reduce_with(|a, b| {
                // lowest score, then lowest position
                if b.1 < a.1 || (b.1 == a.1 && b.0 < a.0) {
                    b
                } else {
                    a
                }
            })
            .map(|(i, _)| i)
    }
}
