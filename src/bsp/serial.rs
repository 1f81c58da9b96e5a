//! Serial candidate scoring

use crate::bsp::traits::BspOps;
use crate::float_types::Real;

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBspOps;

impl SerialBspOps {
    pub const fn new() -> Self {
        SerialBspOps
    }
}

impl BspOps for SerialBspOps {
    fn best_candidate(
        &self,
        candidates: &[usize],
        score: &(dyn Fn(usize) -> Real + Sync),
    ) -> Option<usize> {
        let mut best: Option<(usize, Real)> = None;
        for (i, &candidate) in candidates.iter().enumerate() {
            let s = score(candidate);
            if best.is_none_or(|(_, b)| s < b) {
                best = Some((i, s));
            }
        }
        best.map(|(i, _)| i)
    }
}
