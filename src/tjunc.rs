//! T-junction repair.
//!
//! A vertex of one face lying inside an edge of another face leaves a crack
//! once both are rasterised. Every such vertex is inserted into the edge.
//! Inserted points are copies of existing vertices, so a second pass finds
//! them already present and changes nothing.

use crate::bsp::Tree;
use crate::csg::Face;
use crate::float_types::{EQUAL_EPSILON, Real};
use hashbrown::HashMap;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Distance from an edge within which a vertex counts as lying on it.
const T_EPSILON: Real = 0.01;

/// Grid cell size of the vertex lookup.
const CELL: Real = 64.0;

struct VertexGrid {
    points: Vec<Point3<Real>>,
    cells: HashMap<[i64; 3], Vec<usize>>,
}

fn cell_of(p: &Point3<Real>) -> [i64; 3] {
    [
        (p.x / CELL).floor() as i64,
        (p.y / CELL).floor() as i64,
        (p.z / CELL).floor() as i64,
    ]
}

impl VertexGrid {
    fn new(faces: &[Face]) -> Self {
        let mut grid = VertexGrid {
            points: Vec::new(),
            cells: HashMap::new(),
        };
        for p in faces.iter().flat_map(|f| f.winding.points.iter()) {
            grid.insert(*p);
        }
        grid
    }

    fn insert(&mut self, p: Point3<Real>) {
        let cell = cell_of(&p);
        let bucket = self.cells.entry(cell).or_default();
        if bucket
            .iter()
            .any(|&i| (self.points[i] - p).norm() <= EQUAL_EPSILON)
        {
            return;
        }
        bucket.push(self.points.len());
        self.points.push(p);
    }

    /// Points lying strictly inside the segment `a`-`b`, ordered from `a`.
    fn points_on_edge(&self, a: &Point3<Real>, b: &Point3<Real>) -> Vec<Point3<Real>> {
        let dir = b - a;
        let len = dir.norm();
        if len <= EQUAL_EPSILON {
            return Vec::new();
        }
        let dir = dir / len;

        let lo = cell_of(&Point3::from(a.coords.inf(&b.coords).add_scalar(-T_EPSILON)));
        let hi = cell_of(&Point3::from(a.coords.sup(&b.coords).add_scalar(T_EPSILON)));

        let mut found: Vec<(Real, Point3<Real>)> = Vec::new();
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    let Some(bucket) = self.cells.get(&[x, y, z]) else {
                        continue;
                    };
                    for &i in bucket {
                        let p = self.points[i];
                        let t = (p - a).dot(&dir);
                        if t <= EQUAL_EPSILON || t >= len - EQUAL_EPSILON {
                            continue;
                        }
                        let off_line = (p - (a + dir * t)).norm();
                        if off_line <= T_EPSILON {
                            found.push((t, p));
                        }
                    }
                }
            }
        }
        found.sort_by(|x, y| x.0.total_cmp(&y.0));
        found.dedup_by(|later, earlier| later.0 - earlier.0 <= EQUAL_EPSILON);
        found.into_iter().map(|(_, p)| p).collect()
    }
}

fn fix_face(grid: &VertexGrid, face: &Face) -> (Vec<Point3<Real>>, usize) {
    let mut points = Vec::with_capacity(face.winding.len());
    let mut added = 0;
    for (a, b) in face.winding.edges() {
        points.push(*a);
        let inner = grid.points_on_edge(a, b);
        added += inner.len();
        points.extend(inner);
    }
    (points, added)
}

/// Insert T-junction vertices into `faces`. Returns the number of points added.
pub fn fix_tjunctions(faces: &mut [Face]) -> usize {
    let grid = VertexGrid::new(faces);

    #[cfg(feature = "parallel")]
    let fixed: Vec<(Vec<Point3<Real>>, usize)> =
        faces.par_iter().map(|f| fix_face(&grid, f)).collect();
    #[cfg(not(feature = "parallel"))]
    let fixed: Vec<(Vec<Point3<Real>>, usize)> = faces.iter().map(|f| fix_face(&grid, f)).collect();

    let mut total = 0;
    for (face, (points, added)) in faces.iter_mut().zip(fixed) {
        if added > 0 {
            face.winding.points = points;
            total += added;
        }
    }
    total
}

/// Repair the visible faces of a model tree in place.
pub fn fix_tree_tjunctions(tree: &mut Tree, keep_skip: bool) -> usize {
    log::info!("---- TJunc ----");
    let mut faces: Vec<Face> = Vec::new();
    let mut slots: Vec<(usize, usize)> = Vec::new();
    for (n, node) in tree.nodes.iter().enumerate() {
        for (f, face) in node.faces.iter().enumerate() {
            if face.is_visible(keep_skip) {
                faces.push(face.clone());
                slots.push((n, f));
            }
        }
    }

    let added = fix_tjunctions(&mut faces);
    for ((n, f), face) in slots.into_iter().zip(faces) {
        tree.nodes[n].faces[f] = face;
    }
    log::info!("{added:8} edge points added");
    added
}
