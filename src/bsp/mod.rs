//! Solid BSP builder
//!
//! Recursively partitions the surfaces of a model. Each node splits on the
//! plane of one surface, whose faces then belong to the node. Copies of
//! those faces travel on into both children as bounding faces; a leaf takes
//! the highest-precedence contents its bounding faces report for its side,
//! and a leaf no face touches is solid.

pub mod traits;
pub mod tree;

pub mod serial;

#[cfg(feature = "parallel")]
pub mod parallel;

pub use traits::{BalancedSplittingStrategy, BspOps, MidSplitStrategy, SplittingPlaneStrategy};
pub use tree::{FaceRef, Leaf, Node, NodeRef, Tree};

#[cfg(not(feature = "parallel"))]
pub use serial::SerialBspOps;

#[cfg(feature = "parallel")]
pub use parallel::ParallelBspOps;

use crate::context::CompileContext;
use crate::contents::Contents;
use crate::csg::Surface;
use crate::errors::CompileError;
use crate::float_types::{Bounds, Real, bounds_is_empty, empty_bounds};
use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::plane::Plane;
use crate::winding::Winding;

/// A face copy lying on an ancestor's plane, seen from one side.
#[derive(Debug, Clone)]
struct BoundingFace {
    winding: Winding,
    /// What lies on the side of the face facing the region being built
    contents: Contents,
    /// Set when the region is in front of a visible face
    visible_from: Option<FaceRef>,
    /// Set when the region is inside the face's brush
    inside_brush: Option<usize>,
}

struct Builder<'a> {
    ctx: &'a CompileContext,
    ops: &'a dyn BspOps,
    balanced: BalancedSplittingStrategy,
    midsplit: Option<MidSplitStrategy>,
    total_faces: usize,
    keep_skip: bool,
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

fn surface_bounds(surfaces: &[Surface], bounding: &[BoundingFace]) -> Bounds {
    let mut bounds = empty_bounds();
    for s in surfaces {
        if !bounds_is_empty(&s.bounds) {
            bounds.merge(&s.bounds);
        }
    }
    for b in bounding {
        bounds.merge(&b.winding.bounds());
    }
    bounds
}

impl Builder<'_> {
    fn wants_midsplit(&self, bounds: &Bounds, face_count: usize) -> bool {
        if self.midsplit.is_none() || bounds_is_empty(bounds) {
            return false;
        }
        let options = &self.ctx.options;
        let too_big = options.max_node_size > 0.0
            && bounds.extents().iter().any(|&e| e > options.max_node_size);
        let too_many = options.midsplit_surf_fraction > 0.0
            && face_count as Real > options.midsplit_surf_fraction * self.total_faces as Real;
        too_big || too_many
    }

    fn choose(&self, surfaces: &[Surface], bounds: &Bounds) -> Option<usize> {
        // structural surfaces split before detail ones
        let structural: Vec<usize> = (0..surfaces.len())
            .filter(|&i| surfaces[i].has_structural())
            .collect();
        let candidates = if structural.is_empty() {
            (0..surfaces.len()).collect()
        } else {
            structural
        };
        if candidates.is_empty() {
            return None;
        }

        if let Some(hint) = traits::hint_candidate(surfaces, &candidates) {
            return Some(hint);
        }

        let eps = self.ctx.epsilon();
        let planes = &self.ctx.planes;
        let face_count: usize = surfaces.iter().map(|s| s.faces.len()).sum();
        if let Some(midsplit) = &self.midsplit {
            if self.wants_midsplit(bounds, face_count) {
                let pick = midsplit
                    .pick_splitting_surface(self.ops, planes, surfaces, &candidates, bounds, eps);
                if pick.is_some() {
                    return pick;
                }
            }
        }
        self.balanced
            .pick_splitting_surface(self.ops, planes, surfaces, &candidates, bounds, eps)
    }

    fn make_leaf(&mut self, bounding: Vec<BoundingFace>, parent: Option<usize>) -> NodeRef {
        let mut bounds = empty_bounds();
        let mut contents: Option<Contents> = None;
        let mut mark_faces = Vec::new();
        let mut brushes = Vec::new();

        for face in &bounding {
            bounds.merge(&face.winding.bounds());
            contents = Some(match contents {
                Some(c) => c.max_precedence(face.contents),
                None => face.contents,
            });
            mark_faces.extend(face.visible_from);
            brushes.extend(face.inside_brush);
        }
        mark_faces.sort_unstable();
        mark_faces.dedup();
        brushes.sort_unstable();
        brushes.dedup();

        let index = self.leaves.len();
        self.leaves.push(Leaf {
            contents: contents.unwrap_or(Contents::Solid),
            bounds,
            mark_faces,
            brushes,
            parent,
            outside: false,
        });
        NodeRef::Leaf(index)
    }

    fn split_bounding(
        bounding: Vec<BoundingFace>,
        plane: &Plane,
        eps: Real,
    ) -> (Vec<BoundingFace>, Vec<BoundingFace>) {
        let mut front = Vec::new();
        let mut back = Vec::new();
        for face in bounding {
            let (f, b) = face.winding.split(plane, eps);
            if let Some(w) = f {
                front.push(BoundingFace {
                    winding: w,
                    ..face.clone()
                });
            }
            if let Some(w) = b {
                back.push(BoundingFace { winding: w, ..face });
            }
        }
        (front, back)
    }

    fn split_surfaces(
        surfaces: Vec<Surface>,
        plane: &Plane,
        eps: Real,
    ) -> (Vec<Surface>, Vec<Surface>) {
        let mut front = Vec::new();
        let mut back = Vec::new();
        for surface in surfaces {
            let mut front_faces = Vec::new();
            let mut back_faces = Vec::new();
            for face in surface.faces {
                let (f, b) = face.winding.split(plane, eps);
                if let Some(w) = f {
                    front_faces.push(crate::csg::Face {
                        winding: w,
                        ..face.clone()
                    });
                }
                if let Some(w) = b {
                    back_faces.push(crate::csg::Face { winding: w, ..face });
                }
            }
            if !front_faces.is_empty() {
                front.push(Surface::new(surface.plane, front_faces));
            }
            if !back_faces.is_empty() {
                back.push(Surface::new(surface.plane, back_faces));
            }
        }
        (front, back)
    }

    fn build(
        &mut self,
        mut surfaces: Vec<Surface>,
        bounding: Vec<BoundingFace>,
        parent: Option<usize>,
    ) -> Result<NodeRef, CompileError> {
        surfaces.retain(|s| !s.faces.is_empty());
        if surfaces.is_empty() {
            return Ok(self.make_leaf(bounding, parent));
        }

        let bounds = surface_bounds(&surfaces, &bounding);
        let Some(pick) = self.choose(&surfaces, &bounds) else {
            return Err(CompileError::NoSplitPlane {
                faces: surfaces.iter().map(|s| s.faces.len()).sum(),
            });
        };

        let split = surfaces.swap_remove(pick);
        let plane = self.ctx.planes.canonical(split.plane);
        let eps = self.ctx.epsilon();
        let index = self.nodes.len();

        log::trace!(
            "node {index}: plane {} splits {} surfaces",
            split.plane.0,
            surfaces.len()
        );

        let (mut front_bounding, mut back_bounding) = Self::split_bounding(bounding, &plane, eps);
        for (f, face) in split.faces.iter().enumerate() {
            let face_ref = FaceRef { node: index, face: f };
            let visible = face.is_visible(self.keep_skip);
            // the side of the canonical plane the face looks toward
            let (ahead, behind) = if face.plane.flipped {
                (&mut back_bounding, &mut front_bounding)
            } else {
                (&mut front_bounding, &mut back_bounding)
            };
            ahead.push(BoundingFace {
                winding: face.winding.clone(),
                contents: face.contents[0],
                visible_from: visible.then_some(face_ref),
                inside_brush: None,
            });
            behind.push(BoundingFace {
                winding: face.winding.clone(),
                contents: face.contents[1],
                visible_from: None,
                inside_brush: (face.contents[1] != Contents::Empty).then_some(face.brush),
            });
        }

        self.nodes.push(Node {
            plane: split.plane,
            children: [NodeRef::Leaf(0), NodeRef::Leaf(0)],
            bounds,
            faces: split.faces,
            parent,
        });

        let (front_surfaces, back_surfaces) = Self::split_surfaces(surfaces, &plane, eps);
        let front = self.build(front_surfaces, front_bounding, Some(index))?;
        let back = self.build(back_surfaces, back_bounding, Some(index))?;
        self.nodes[index].children = [front, back];
        Ok(NodeRef::Node(index))
    }
}

/// Build a solid BSP from the surfaces of one model.
///
/// `midsplit_allowed` selects the cheap first-pass tree: large nodes then
/// split near their middle instead of by the full cost heuristic.
pub fn build_tree(
    ctx: &CompileContext,
    surfaces: Vec<Surface>,
    midsplit_allowed: bool,
) -> Result<Tree, CompileError> {
    #[cfg(feature = "parallel")]
    let ops = ParallelBspOps::new();
    #[cfg(not(feature = "parallel"))]
    let ops = SerialBspOps::new();

    build_tree_with(ctx, surfaces, midsplit_allowed, &ops)
}

/// [`build_tree`] with an explicit candidate scorer.
pub fn build_tree_with(
    ctx: &CompileContext,
    surfaces: Vec<Surface>,
    midsplit_allowed: bool,
    ops: &dyn BspOps,
) -> Result<Tree, CompileError> {
    let total_faces: usize = surfaces.iter().map(|s| s.faces.len()).sum();
    let bounds = surface_bounds(&surfaces, &[]);
    log::info!(
        "---- SolidBSP ({} tree, {total_faces} faces) ----",
        if midsplit_allowed { "draft" } else { "good" }
    );

    let mut builder = Builder {
        ctx,
        ops,
        balanced: BalancedSplittingStrategy::default(),
        midsplit: midsplit_allowed.then_some(MidSplitStrategy),
        total_faces,
        keep_skip: ctx.options.no_skip,
        nodes: Vec::new(),
        leaves: Vec::new(),
    };
    let head = builder.build(surfaces, Vec::new(), None)?;

    let tree = Tree {
        nodes: builder.nodes,
        leaves: builder.leaves,
        head,
        bounds,
    };
    let solid = tree.leaves.iter().filter(|l| l.contents.is_solid()).count();
    log::info!("{:8} nodes", tree.nodes.len());
    log::info!("{:8} leaves ({solid} solid)", tree.leaves.len());
    Ok(tree)
}
