//! Node and leaf arenas of a solid BSP tree.

use crate::contents::Contents;
use crate::csg::{Face, Surface, group_surfaces};
use crate::float_types::{Bounds, Real};
use crate::plane::{PlaneId, PlaneTable};
use nalgebra::Point3;

/// A child reference: either an interior node or a leaf, by arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(usize),
    Leaf(usize),
}

/// A face owned by a node, addressed from the leaves it is visible from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceRef {
    pub node: usize,
    pub face: usize,
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Canonical splitting plane; `children[0]` lies in front of it
    pub plane: PlaneId,
    pub children: [NodeRef; 2],
    pub bounds: Bounds,
    /// Faces lying on the splitting plane, either orientation
    pub faces: Vec<Face>,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub contents: Contents,
    pub bounds: Bounds,
    /// Visible node faces whose front side looks into this leaf
    pub mark_faces: Vec<FaceRef>,
    /// Brushes (indices into the entity's brush list) the leaf lies inside
    pub brushes: Vec<usize>,
    pub parent: Option<usize>,
    /// Set by the outside fill on leaves reached from the void
    pub outside: bool,
}

/// A complete solid BSP of one model for one hull.
#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub leaves: Vec<Leaf>,
    pub head: NodeRef,
    /// Bounds of every face that went into the tree
    pub bounds: Bounds,
}

impl Tree {
    /// The leaf containing `point`. Points on a plane go to the front.
    pub fn point_in_leaf(&self, planes: &PlaneTable, point: &Point3<Real>) -> usize {
        let mut current = self.head;
        loop {
            match current {
                NodeRef::Leaf(leaf) => return leaf,
                NodeRef::Node(n) => {
                    let node = &self.nodes[n];
                    let side = planes.canonical(node.plane).distance_to(point) < 0.0;
                    current = node.children[side as usize];
                },
            }
        }
    }

    /// Every node face not listed by a leaf the outside fill reached,
    /// regrouped into surfaces for another build.
    pub fn gather_faces(&self) -> Vec<Surface> {
        let mut removed: Vec<FaceRef> = self
            .leaves
            .iter()
            .filter(|leaf| leaf.outside)
            .flat_map(|leaf| leaf.mark_faces.iter().copied())
            .collect();
        removed.sort_unstable();
        removed.dedup();

        let mut faces = Vec::new();
        for (n, node) in self.nodes.iter().enumerate() {
            for (f, face) in node.faces.iter().enumerate() {
                let face_ref = FaceRef { node: n, face: f };
                if removed.binary_search(&face_ref).is_err() {
                    faces.push(face.clone());
                }
            }
        }
        log::debug!("{} faces removed by the outside fill", removed.len());
        group_surfaces(faces)
    }

    pub fn face(&self, face_ref: FaceRef) -> &Face {
        &self.nodes[face_ref.node].faces[face_ref.face]
    }

    /// Turn detail leaf contents into what the output format expects.
    pub fn resolve_detail(&mut self, hull: usize) {
        for leaf in &mut self.leaves {
            leaf.contents = leaf.contents.resolve_detail(hull);
        }
    }

    /// Visit nodes and leaves depth first, front child before back.
    pub fn walk(&self, mut visit: impl FnMut(NodeRef)) {
        let mut stack = vec![self.head];
        while let Some(current) = stack.pop() {
            visit(current);
            if let NodeRef::Node(n) = current {
                let [front, back] = self.nodes[n].children;
                stack.push(back);
                stack.push(front);
            }
        }
    }

    pub fn face_count(&self) -> usize {
        self.nodes.iter().map(|n| n.faces.len()).sum()
    }
}
