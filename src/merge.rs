//! Texture-compatible face merging within a surface.

use crate::context::CompileContext;
use crate::csg::{Face, Surface};
use crate::float_types::{CONTINUOUS_EPSILON, EQUAL_EPSILON, Real};
use crate::winding::Winding;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

fn compatible(a: &Face, b: &Face) -> bool {
    a.plane == b.plane
        && a.texinfo == b.texinfo
        && a.contents == b.contents
        && a.flags == b.flags
        && a.lmshift == b.lmshift
}

fn same_point(a: &Point3<Real>, b: &Point3<Real>) -> bool {
    (a - b).iter().all(|c| c.abs() <= EQUAL_EPSILON)
}

/// Merge two faces sharing an edge into one convex face, if possible.
pub fn try_merge(f1: &Face, f2: &Face, normal: &Vector3<Real>) -> Option<Face> {
    if !compatible(f1, f2) {
        return None;
    }
    let a = &f1.winding.points;
    let b = &f2.winding.points;
    let (n1, n2) = (a.len(), b.len());

    // find the shared edge, running opposite ways
    let (i, j) = (0..n1).find_map(|i| {
        let p1 = &a[i];
        let p2 = &a[(i + 1) % n1];
        (0..n2)
            .find(|&j| same_point(&b[j], p2) && same_point(&b[(j + 1) % n2], p1))
            .map(|j| (i, j))
    })?;

    let p1 = a[i];
    let p2 = a[(i + 1) % n1];

    // convexity at p1
    let back = a[(i + n1 - 1) % n1];
    let edge_normal = normal.cross(&(p1 - back)).normalize();
    let ahead = b[(j + 2) % n2];
    let dot = (ahead - p1).dot(&edge_normal);
    if dot > CONTINUOUS_EPSILON {
        return None;
    }
    let keep1 = dot < -CONTINUOUS_EPSILON;

    // convexity at p2
    let back = b[(j + n2 - 1) % n2];
    let edge_normal = normal.cross(&(p2 - back)).normalize();
    let ahead = a[(i + 2) % n1];
    let dot = (ahead - p2).dot(&edge_normal);
    if dot > CONTINUOUS_EPSILON {
        return None;
    }
    let keep2 = dot < -CONTINUOUS_EPSILON;

    let mut points = Vec::with_capacity(n1 + n2);
    // f1 from p2 around to the point before p1
    for k in 1..n1 {
        let idx = (i + 1 + k - 1) % n1;
        let p = a[idx];
        if idx == (i + 1) % n1 && !keep2 {
            continue;
        }
        points.push(p);
    }
    // p1 joint
    if keep1 {
        points.push(p1);
    }
    // f2 after p1 up to the point before p2
    for k in 2..n2 {
        points.push(b[(j + k) % n2]);
    }

    if points.len() < 3 {
        return None;
    }

    Some(Face {
        winding: Winding::new(points),
        ..f1.clone()
    })
}

/// Merge as many faces of the list as possible.
pub fn merge_face_list(faces: Vec<Face>, normal_of: impl Fn(&Face) -> Vector3<Real>) -> Vec<Face> {
    let mut merged: Vec<Face> = Vec::with_capacity(faces.len());
    for face in faces {
        let mut current = face;
        loop {
            let normal = normal_of(&current);
            let hit = merged
                .iter()
                .enumerate()
                .find_map(|(k, other)| try_merge(&current, other, &normal).map(|m| (k, m)));
            match hit {
                Some((k, m)) => {
                    merged.remove(k);
                    current = m;
                },
                None => {
                    merged.push(current);
                    break;
                },
            }
        }
    }
    merged
}

/// Merge compatible faces on every surface.
pub fn merge_surfaces(ctx: &CompileContext, surfaces: Vec<Surface>) -> Vec<Surface> {
    let before: usize = surfaces.iter().map(|s| s.faces.len()).sum();
    let merge = |surface: Surface| {
        let faces = merge_face_list(surface.faces, |f| ctx.planes.get(f.plane).normal);
        Surface::new(surface.plane, faces)
    };

    #[cfg(feature = "parallel")]
    let surfaces: Vec<Surface> = surfaces.into_par_iter().map(merge).collect();
    #[cfg(not(feature = "parallel"))]
    let surfaces: Vec<Surface> = surfaces.into_iter().map(merge).collect();

    let after: usize = surfaces.iter().map(|s| s.faces.len()).sum();
    log::info!("{before:8} faces merged to {after}");
    surfaces
}
