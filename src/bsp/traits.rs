//! Traits for choosing splitting planes, with serial and parallel scoring

use crate::csg::Surface;
use crate::float_types::{Bounds, Real};
use crate::plane::{BACK, COPLANAR, FRONT, Plane, PlaneTable};

/// Evaluates split candidates; implemented serially and on the rayon pool.
pub trait BspOps: Sync {
    /// Index of the candidate with the lowest score. Ties go to the earlier
    /// candidate so results never depend on scheduling.
    fn best_candidate(
        &self,
        candidates: &[usize],
        score: &(dyn Fn(usize) -> Real + Sync),
    ) -> Option<usize>;
}

/// Trait for picking a splitting surface among the unsplit surfaces of a node
pub trait SplittingPlaneStrategy: Sync {
    /// Returns an index into `surfaces`, or `None` when the strategy has no
    /// opinion about any of the `candidates`.
    fn pick_splitting_surface(
        &self,
        ops: &dyn BspOps,
        planes: &PlaneTable,
        surfaces: &[Surface],
        candidates: &[usize],
        bounds: &Bounds,
        epsilon: Real,
    ) -> Option<usize>;
}

/// Side of `plane` a box lies on: FRONT, BACK or SPANNING.
pub fn classify_bounds(plane: &Plane, bounds: &Bounds, epsilon: Real) -> i8 {
    let center = bounds.center();
    let half = bounds.half_extents();
    let radius = half.x * plane.normal.x.abs()
        + half.y * plane.normal.y.abs()
        + half.z * plane.normal.z.abs();
    let d = plane.distance_to(&center);
    if d - radius > -epsilon && d > epsilon {
        FRONT
    } else if d + radius < epsilon && d < -epsilon {
        BACK
    } else {
        FRONT | BACK
    }
}

/// Cost heuristic trading split faces against balance.
pub struct BalancedSplittingStrategy {
    pub span_weight: Real,
    pub balance_weight: Real,
    /// Added to the score of planes that are not axis aligned
    pub nonaxial_penalty: Real,
}

impl Default for BalancedSplittingStrategy {
    fn default() -> Self {
        Self {
            span_weight: 8.0,
            balance_weight: 1.0,
            nonaxial_penalty: 4.0,
        }
    }
}

impl SplittingPlaneStrategy for BalancedSplittingStrategy {
    fn pick_splitting_surface(
        &self,
        ops: &dyn BspOps,
        planes: &PlaneTable,
        surfaces: &[Surface],
        candidates: &[usize],
        _bounds: &Bounds,
        epsilon: Real,
    ) -> Option<usize> {
        let score = |candidate: usize| {
            let split_surface = &surfaces[candidate];
            let plane = planes.canonical(split_surface.plane);
            let (mut front, mut back, mut spanning) = (0usize, 0usize, 0usize);

            for (i, surface) in surfaces.iter().enumerate() {
                if i == candidate {
                    continue;
                }
                match classify_bounds(&plane, &surface.bounds, epsilon) {
                    FRONT => front += surface.faces.len(),
                    BACK => back += surface.faces.len(),
                    _ => {
                        for face in &surface.faces {
                            match face.winding.classify(&plane, epsilon) {
                                COPLANAR => {},
                                FRONT => front += 1,
                                BACK => back += 1,
                                _ => spanning += 1,
                            }
                        }
                    },
                }
            }

            let mut score = self.span_weight * spanning as Real
                + self.balance_weight * (front as Real - back as Real).abs();
            if !plane.plane_type().is_axial() {
                score += self.nonaxial_penalty;
            }
            score
        };

        ops.best_candidate(candidates, &score)
            .map(|best| candidates[best])
    }
}

/// Splits a node near the middle of its largest axis, choosing among the
/// axial surface planes. Used on large nodes of the first tree so huge open
/// levels do not degenerate into deep chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidSplitStrategy;

impl SplittingPlaneStrategy for MidSplitStrategy {
    fn pick_splitting_surface(
        &self,
        ops: &dyn BspOps,
        planes: &PlaneTable,
        surfaces: &[Surface],
        candidates: &[usize],
        bounds: &Bounds,
        _epsilon: Real,
    ) -> Option<usize> {
        let extents = bounds.extents();
        let center = bounds.center();

        let score = |candidate: usize| {
            let plane = planes.canonical(surfaces[candidate].plane);
            let ty = plane.plane_type();
            if !ty.is_axial() {
                return Real::MAX;
            }
            let axis = ty.axis();
            let size = extents[axis].max(1.0);
            // prefer the long axis, then the plane closest to its middle
            let off_centre = (plane.dist - center[axis]).abs() / size;
            let axis_rank = extents.max() - extents[axis];
            axis_rank + off_centre
        };

        let best = ops.best_candidate(candidates, &score)?;
        (score(candidates[best]) < Real::MAX).then_some(candidates[best])
    }
}

/// Hint surfaces always split first.
pub fn hint_candidate(surfaces: &[Surface], candidates: &[usize]) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .find(|&i| surfaces[i].faces.iter().any(|f| f.flags.hint))
}
