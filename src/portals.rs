//! Portalizer: adjacency between the leaves of a solid BSP.
//!
//! Portals live in a slab and are addressed by index. Every cell (node, leaf
//! or the outside) keeps the list of portal indices touching it, and every
//! live portal sits in exactly two such lists.

use crate::bsp::{NodeRef, Tree};
use crate::context::CompileContext;
use crate::float_types::{SIDESPACE, bounds_is_empty};
use crate::plane::Plane;
use crate::winding::Winding;
use nalgebra::{Point3, Vector3};

/// One side of a portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Node(usize),
    Leaf(usize),
    /// The void around the whole tree
    Outside,
}

impl From<NodeRef> for Cell {
    fn from(node: NodeRef) -> Self {
        match node {
            NodeRef::Node(n) => Cell::Node(n),
            NodeRef::Leaf(l) => Cell::Leaf(l),
        }
    }
}

/// The shared boundary of two cells.
///
/// `sides[0]` lies in front of `plane`, `sides[1]` behind it. The winding is
/// clockwise seen from the front.
#[derive(Debug, Clone)]
pub struct Portal {
    pub plane: Plane,
    pub winding: Winding,
    pub sides: [Cell; 2],
}

impl Portal {
    /// The cell across the portal from `cell`.
    pub fn other(&self, cell: Cell) -> Cell {
        if self.sides[0] == cell {
            self.sides[1]
        } else {
            self.sides[0]
        }
    }
}

/// Arena of portals plus the adjacency lists of every cell.
#[derive(Debug, Clone, Default)]
pub struct PortalGraph {
    portals: Vec<Option<Portal>>,
    free: Vec<usize>,
    node_lists: Vec<Vec<usize>>,
    leaf_lists: Vec<Vec<usize>>,
    outside_list: Vec<usize>,
}

impl PortalGraph {
    pub fn new(nodes: usize, leaves: usize) -> Self {
        PortalGraph {
            portals: Vec::new(),
            free: Vec::new(),
            node_lists: vec![Vec::new(); nodes],
            leaf_lists: vec![Vec::new(); leaves],
            outside_list: Vec::new(),
        }
    }

    fn list_mut(&mut self, cell: Cell) -> &mut Vec<usize> {
        match cell {
            Cell::Node(n) => &mut self.node_lists[n],
            Cell::Leaf(l) => &mut self.leaf_lists[l],
            Cell::Outside => &mut self.outside_list,
        }
    }

    /// Portal indices touching `cell`.
    pub fn portals_of(&self, cell: Cell) -> &[usize] {
        match cell {
            Cell::Node(n) => &self.node_lists[n],
            Cell::Leaf(l) => &self.leaf_lists[l],
            Cell::Outside => &self.outside_list,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Portal> {
        self.portals.get(index).and_then(Option::as_ref)
    }

    /// Live portals with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Portal)> {
        self.portals
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i, p)))
    }

    pub fn len(&self) -> usize {
        self.portals.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a portal and link it into both of its cells.
    pub fn add(&mut self, portal: Portal) -> usize {
        let sides = portal.sides;
        let index = match self.free.pop() {
            Some(slot) => {
                self.portals[slot] = Some(portal);
                slot
            },
            None => {
                self.portals.push(Some(portal));
                self.portals.len() - 1
            },
        };
        for cell in sides {
            self.list_mut(cell).push(index);
        }
        index
    }

    /// Unlink a portal from both cells and free its slot.
    pub fn remove(&mut self, index: usize) -> Option<Portal> {
        let portal = self.portals.get_mut(index)?.take()?;
        for cell in portal.sides {
            let list = self.list_mut(cell);
            if let Some(pos) = list.iter().position(|&p| p == index) {
                list.swap_remove(pos);
            }
        }
        self.free.push(index);
        Some(portal)
    }
}

fn make_headnode_portals(ctx: &CompileContext, tree: &Tree, graph: &mut PortalGraph) {
    let (mins, maxs) = if bounds_is_empty(&tree.bounds) {
        (Point3::origin(), Point3::origin())
    } else {
        (tree.bounds.mins, tree.bounds.maxs)
    };
    let mins = mins - Vector3::repeat(SIDESPACE);
    let maxs = maxs + Vector3::repeat(SIDESPACE);
    let extent = ctx.options.world_extent;
    let eps = ctx.epsilon();

    // every plane faces into the box, so the tree is always in front
    let mut planes = Vec::with_capacity(6);
    for axis in 0..3 {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        planes.push(Plane {
            normal,
            dist: mins[axis],
        });
        planes.push(Plane {
            normal: -normal,
            dist: -maxs[axis],
        });
    }

    for (i, plane) in planes.iter().enumerate() {
        let mut winding = Some(Winding::from_plane(plane, extent * 2.0));
        for (j, other) in planes.iter().enumerate() {
            if i != j {
                winding = winding.and_then(|w| w.clip(other, eps, false));
            }
        }
        if let Some(winding) = winding {
            graph.add(Portal {
                plane: *plane,
                winding,
                sides: [Cell::from(tree.head), Cell::Outside],
            });
        }
    }
}

/// The node's plane clipped by every ancestor constraint.
fn base_winding_for_node(ctx: &CompileContext, tree: &Tree, node: usize) -> Option<Winding> {
    let eps = ctx.epsilon();
    let plane = ctx.planes.canonical(tree.nodes[node].plane);
    let mut winding = Winding::from_plane(&plane, ctx.options.world_extent * 2.0);

    let mut child = NodeRef::Node(node);
    let mut parent = tree.nodes[node].parent;
    while let Some(p) = parent {
        let parent_node = &tree.nodes[p];
        let parent_plane = ctx.planes.canonical(parent_node.plane);
        let keep = if parent_node.children[0] == child {
            parent_plane
        } else {
            parent_plane.flipped()
        };
        winding = winding.clip(&keep, eps, false)?;
        child = NodeRef::Node(p);
        parent = parent_node.parent;
    }
    Some(winding)
}

fn make_node_portal(ctx: &CompileContext, tree: &Tree, graph: &mut PortalGraph, node: usize) {
    let eps = ctx.epsilon();
    let Some(mut winding) = base_winding_for_node(ctx, tree, node) else {
        log::debug!("node {node}: base winding clipped away");
        return;
    };

    let cell = Cell::Node(node);
    for &index in graph.portals_of(cell) {
        let Some(portal) = graph.get(index) else {
            continue;
        };
        let keep = if portal.sides[0] == cell {
            portal.plane
        } else {
            portal.plane.flipped()
        };
        match winding.clip(&keep, eps, false) {
            Some(w) => winding = w,
            None => {
                log::debug!("node {node}: new portal clipped away");
                return;
            },
        }
    }

    if winding.is_tiny() {
        log::debug!("node {node}: tiny node portal dropped");
        return;
    }

    let n = &tree.nodes[node];
    graph.add(Portal {
        plane: ctx.planes.canonical(n.plane),
        winding,
        sides: [Cell::from(n.children[0]), Cell::from(n.children[1])],
    });
}

/// Move every portal of `node` onto its children, splitting by the node plane.
fn split_node_portals(ctx: &CompileContext, tree: &Tree, graph: &mut PortalGraph, node: usize) {
    let eps = ctx.epsilon();
    let n = &tree.nodes[node];
    let plane = ctx.planes.canonical(n.plane);
    let front = Cell::from(n.children[0]);
    let back = Cell::from(n.children[1]);
    let cell = Cell::Node(node);

    let list: Vec<usize> = graph.portals_of(cell).to_vec();
    for index in list {
        let Some(portal) = graph.remove(index) else {
            continue;
        };
        let side = usize::from(portal.sides[0] != cell);

        let (front_winding, back_winding) = portal.winding.split(&plane, eps);
        for (piece, child) in [(front_winding, front), (back_winding, back)] {
            let Some(piece) = piece else {
                continue;
            };
            if piece.is_tiny() {
                log::debug!("node {node}: tiny portal fragment dropped");
                continue;
            }
            let mut sides = portal.sides;
            sides[side] = child;
            graph.add(Portal {
                plane: portal.plane,
                winding: piece,
                sides,
            });
        }
    }
}

fn make_tree_portals(ctx: &CompileContext, tree: &Tree, graph: &mut PortalGraph, head: NodeRef) {
    let mut stack = vec![head];
    while let Some(current) = stack.pop() {
        let NodeRef::Node(node) = current else {
            continue;
        };
        make_node_portal(ctx, tree, graph, node);
        split_node_portals(ctx, tree, graph, node);
        let [front, back] = tree.nodes[node].children;
        stack.push(back);
        stack.push(front);
    }
}

/// Build the portal graph of a tree.
///
/// When this returns, only leaves and the outside hold portals.
pub fn portalize(ctx: &CompileContext, tree: &Tree) -> PortalGraph {
    log::info!("---- Portalize ----");
    let mut graph = PortalGraph::new(tree.nodes.len(), tree.leaves.len());
    make_headnode_portals(ctx, tree, &mut graph);
    make_tree_portals(ctx, tree, &mut graph, tree.head);

    let leaf_portals = graph
        .iter()
        .filter(|(_, p)| p.sides.iter().all(|s| matches!(s, Cell::Leaf(_))))
        .count();
    log::info!("{:8} portals ({leaf_portals} between leaves)", graph.len());
    graph
}

