//! Convex polygons lying on a plane.

use crate::float_types::{Bounds, EDGE_LENGTH, Real, empty_bounds};
use crate::plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
use nalgebra::{Point3, Vector3};

/// An ordered, closed loop of points. The loop is clockwise when seen from
/// the front of its plane, which makes `(p2 - p1) × (p0 - p1)` the plane normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Winding {
    pub points: Vec<Point3<Real>>,
}

impl Winding {
    pub const fn new(points: Vec<Point3<Real>>) -> Self {
        Winding { points }
    }

    /// A square of half-size `extent` lying on `plane`, centred on the point of
    /// the plane closest to the origin.
    pub fn from_plane(plane: &Plane, extent: Real) -> Self {
        let axis = plane.plane_type().axis();
        let up = if axis == 2 { Vector3::x() } else { Vector3::z() };

        let up = (up - plane.normal * up.dot(&plane.normal)).normalize();
        let right = up.cross(&plane.normal);

        let origin = Point3::from(plane.normal * plane.dist);
        let up = up * extent;
        let right = right * extent;

        Winding::new(vec![
            origin - right + up,
            origin + right + up,
            origin + right - up,
            origin - right - up,
        ])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over `(start, end)` pairs of every edge.
    pub fn edges(&self) -> impl Iterator<Item = (&Point3<Real>, &Point3<Real>)> {
        self.points
            .iter()
            .zip(self.points.iter().cycle().skip(1))
    }

    /// Newell normal of the loop (not normalized).
    pub fn normal(&self) -> Vector3<Real> {
        // loops are clockwise seen from the front, so accumulate reversed
        self.edges().fold(Vector3::zeros(), |acc, (a, b)| {
            acc + b.coords.cross(&a.coords)
        })
    }

    /// Plane through the winding, or `None` when degenerate.
    pub fn plane(&self) -> Option<Plane> {
        let normal = self.normal();
        if self.len() < 3 || normal.norm() < Real::EPSILON {
            return None;
        }
        let normal = normal.normalize();
        Some(Plane {
            normal,
            dist: normal.dot(&self.points[0].coords),
        })
    }

    pub fn area(&self) -> Real {
        self.normal().norm() * 0.5
    }

    pub fn center(&self) -> Point3<Real> {
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.len().max(1) as Real)
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = empty_bounds();
        for p in &self.points {
            bounds.take_point(*p);
        }
        bounds
    }

    /// Same loop, opposite facing.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Winding { points }
    }

    /// Fewer than three edges of a meaningful length.
    pub fn is_tiny(&self) -> bool {
        self.edges()
            .filter(|(a, b)| (*b - *a).norm() > EDGE_LENGTH)
            .take(3)
            .count()
            < 3
    }

    /// Largest absolute coordinate of any point.
    pub fn max_coord(&self) -> Real {
        self.points
            .iter()
            .flat_map(|p| p.coords.iter().copied())
            .fold(0.0, |acc, c| acc.max(c.abs()))
    }

    /// Classify the whole winding against `plane`.
    pub fn classify(&self, plane: &Plane, epsilon: Real) -> i8 {
        self.points
            .iter()
            .fold(COPLANAR, |acc, p| acc | plane.orient_point(p, epsilon))
    }

    /// Split by `plane` into front and back parts.
    ///
    /// Points within `epsilon` of the plane go to both sides. A winding lying
    /// on the plane goes to the side its own normal faces.
    pub fn split(&self, plane: &Plane, epsilon: Real) -> (Option<Winding>, Option<Winding>) {
        let dists: Vec<Real> = self.points.iter().map(|p| plane.distance_to(p)).collect();
        let sides: Vec<i8> = dists
            .iter()
            .map(|&d| {
                if d > epsilon {
                    FRONT
                } else if d < -epsilon {
                    BACK
                } else {
                    COPLANAR
                }
            })
            .collect();

        let kind = sides.iter().fold(COPLANAR, |acc, s| acc | s);
        match kind {
            COPLANAR => {
                return if self.normal().dot(&plane.normal) >= 0.0 {
                    (Some(self.clone()), None)
                } else {
                    (None, Some(self.clone()))
                };
            },
            FRONT => return (Some(self.clone()), None),
            BACK => return (None, Some(self.clone())),
            _ => debug_assert_eq!(kind, SPANNING),
        }

        let n = self.points.len();
        let mut front = Vec::with_capacity(n + 4);
        let mut back = Vec::with_capacity(n + 4);

        for i in 0..n {
            let p1 = self.points[i];
            match sides[i] {
                COPLANAR => {
                    front.push(p1);
                    back.push(p1);
                    continue;
                },
                FRONT => front.push(p1),
                _ => back.push(p1),
            }

            let j = (i + 1) % n;
            if sides[j] == COPLANAR || sides[j] == sides[i] {
                continue;
            }

            let p2 = self.points[j];
            let t = dists[i] / (dists[i] - dists[j]);
            let mut mid = p1 + (p2 - p1) * t;
            // keep axial splits exact
            for k in 0..3 {
                if plane.normal[k] == 1.0 {
                    mid[k] = plane.dist;
                } else if plane.normal[k] == -1.0 {
                    mid[k] = -plane.dist;
                }
            }
            front.push(mid);
            back.push(mid);
        }

        let front = (front.len() >= 3).then(|| Winding::new(front));
        let back = (back.len() >= 3).then(|| Winding::new(back));
        (front, back)
    }

    /// Keep only the part in front of `plane`. On-plane windings are kept
    /// when `keep_on` is set.
    pub fn clip(&self, plane: &Plane, epsilon: Real, keep_on: bool) -> Option<Winding> {
        match self.classify(plane, epsilon) {
            COPLANAR => keep_on.then(|| self.clone()),
            _ => self.split(plane, epsilon).0,
        }
    }

    /// Drop points closer than `epsilon` to the next one. Returns the
    /// dropped points.
    pub fn heal_degenerate_edges(&mut self, epsilon: Real) -> Vec<Point3<Real>> {
        let mut dropped = Vec::new();
        while self.points.len() >= 3 {
            let n = self.points.len();
            let short = (0..n).find(|&i| (self.points[(i + 1) % n] - self.points[i]).norm() < epsilon);
            match short {
                Some(i) => dropped.push(self.points.remove(i)),
                None => break,
            }
        }
        dropped
    }

    /// Every point lies behind or on the inward edge plane of every edge.
    /// Returns the first offending point and by how much it sticks out.
    pub fn convexity_error(&self, plane: &Plane, epsilon: Real) -> Option<(Point3<Real>, Real)> {
        let n = self.points.len();
        for (i, (a, b)) in self.edges().enumerate() {
            let edge = b - a;
            if edge.norm() < Real::EPSILON {
                continue;
            }
            let edge_normal = plane.normal.cross(&edge).normalize();
            let edge_dist = edge_normal.dot(&a.coords) + epsilon;
            for k in (0..n).filter(|&k| k != i) {
                let d = edge_normal.dot(&self.points[k].coords);
                if d > edge_dist {
                    return Some((self.points[k], d - edge_dist));
                }
            }
        }
        None
    }
}
