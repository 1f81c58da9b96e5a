//! Outside fill and leak detection.
//!
//! A breadth-first flood from the void across portals, never entering a
//! sealing leaf. Reaching a leaf that holds an entity means the map leaks.
//! Otherwise every reached leaf becomes solid and its faces are dropped on
//! the next rebuild.

use crate::bsp::Tree;
use crate::context::CompileContext;
use crate::float_types::Real;
use crate::map::Entity;
use crate::portals::{Cell, PortalGraph};
use nalgebra::Point3;
use std::collections::VecDeque;

/// An entity sitting in open space.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub entity: usize,
    pub classname: String,
    pub origin: Point3<Real>,
    pub leaf: usize,
}

/// The shortest route from an occupied leaf to the void.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakReport {
    pub occupant: Occupant,
    /// Portals crossed, starting next to the entity
    pub portals: Vec<usize>,
    /// Entity origin followed by the centre of every crossed portal
    pub path: Vec<Point3<Real>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    /// The void was sealed off and filled
    Filled { outside_leaves: usize },
    /// The flood reached an entity; the tree is left untouched
    Leaked(LeakReport),
    /// Nothing to protect: no entity lies in open space
    Skipped,
}

/// Entities (other than worldspawn) whose origin lies in a non-solid leaf.
pub fn find_occupants(ctx: &CompileContext, tree: &Tree, entities: &[Entity]) -> Vec<Occupant> {
    entities
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, e)| e.brushes.is_empty())
        .filter_map(|(index, entity)| {
            let origin = entity.origin()?;
            let leaf = tree.point_in_leaf(&ctx.planes, &origin);
            let contents = tree.leaves[leaf].contents;
            if contents.is_opaque() {
                log::debug!("entity {index} ({}) is inside solid", entity.classname());
                return None;
            }
            Some(Occupant {
                entity: index,
                classname: entity.classname().to_string(),
                origin,
                leaf,
            })
        })
        .collect()
}

/// Flood from the void. On success, reached leaves are marked `outside` and
/// turned solid.
///
/// Leak severity is the caller's concern: a leak is always reported as
/// [`FillOutcome::Leaked`] so the leak file can be written first.
pub fn fill_outside(
    ctx: &CompileContext,
    tree: &mut Tree,
    graph: &PortalGraph,
    entities: &[Entity],
) -> FillOutcome {
    log::info!("---- FillOutside ----");
    let occupants = find_occupants(ctx, tree, entities);
    if occupants.is_empty() {
        log::warn!("no entities in empty space, no filling performed");
        return FillOutcome::Skipped;
    }

    let mut occupant_of: Vec<Option<usize>> = vec![None; tree.leaves.len()];
    for (i, occupant) in occupants.iter().enumerate() {
        occupant_of[occupant.leaf].get_or_insert(i);
    }

    // predecessor portal of every reached leaf
    let mut came_from: Vec<Option<usize>> = vec![None; tree.leaves.len()];
    let mut reached = vec![false; tree.leaves.len()];
    let mut queue: VecDeque<Cell> = VecDeque::new();
    queue.push_back(Cell::Outside);

    while let Some(cell) = queue.pop_front() {
        for &index in graph.portals_of(cell) {
            let Some(portal) = graph.get(index) else {
                continue;
            };
            let Cell::Leaf(leaf) = portal.other(cell) else {
                continue;
            };
            if reached[leaf] || tree.leaves[leaf].contents.is_sealing() {
                continue;
            }
            reached[leaf] = true;
            came_from[leaf] = Some(index);

            if let Some(occupant) = occupant_of[leaf] {
                let report = trace_leak(graph, &came_from, occupants[occupant].clone());
                log::warn!(
                    "map leaks: entity {} ({}) at {} reaches the outside through {} portals",
                    report.occupant.entity,
                    report.occupant.classname,
                    report.occupant.origin,
                    report.portals.len()
                );
                return FillOutcome::Leaked(report);
            }
            queue.push_back(Cell::Leaf(leaf));
        }
    }

    let mut outside_leaves = 0;
    for (leaf, hit) in tree.leaves.iter_mut().zip(reached) {
        if hit {
            leaf.outside = true;
            leaf.contents = crate::contents::Contents::Solid;
            outside_leaves += 1;
        }
    }
    log::info!("{outside_leaves:8} outside leaves filled");
    FillOutcome::Filled { outside_leaves }
}

fn trace_leak(graph: &PortalGraph, came_from: &[Option<usize>], occupant: Occupant) -> LeakReport {
    let mut portals = Vec::new();
    let mut path = vec![occupant.origin];
    let mut cell = Cell::Leaf(occupant.leaf);

    while let Cell::Leaf(leaf) = cell {
        let Some(index) = came_from[leaf] else {
            break;
        };
        let Some(portal) = graph.get(index) else {
            break;
        };
        portals.push(index);
        path.push(portal.winding.center());
        cell = portal.other(cell);
    }

    LeakReport {
        occupant,
        portals,
        path,
    }
}
