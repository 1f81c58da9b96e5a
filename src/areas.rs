//! Area flood: numbers the open regions separated by area-portal brushes.

use crate::brush::Brush;
use crate::bsp::Tree;
use crate::contents::Contents;
use crate::portals::{Cell, PortalGraph};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaMap {
    /// Area of every leaf, 0 for none
    pub leaf_area: Vec<usize>,
    /// Number of areas; ids run from 1
    pub count: usize,
    /// Areas bordered by each area-portal entity (keyed by source entity)
    pub portal_areas: BTreeMap<usize, Vec<usize>>,
}

fn floods(contents: Contents) -> bool {
    !contents.is_opaque() && contents != Contents::AreaPortal
}

/// Flood every open region of the tree, stopping at area-portal leaves.
///
/// `brushes` is the brush list the tree was built from; it maps an
/// area-portal leaf back to the entity its brush came from.
pub fn flood_areas(tree: &Tree, graph: &PortalGraph, brushes: &[Brush]) -> AreaMap {
    log::info!("---- FloodAreas ----");
    let mut leaf_area = vec![0usize; tree.leaves.len()];
    let mut touched: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut count = 0;

    let portal_entity = |leaf: usize| {
        tree.leaves[leaf]
            .brushes
            .iter()
            .filter_map(|&b| brushes.get(b))
            .find(|b| b.contents == Contents::AreaPortal)
            .map(|b| b.source_entity)
    };

    for seed in 0..tree.leaves.len() {
        let seed_leaf = &tree.leaves[seed];
        if leaf_area[seed] != 0 || seed_leaf.outside || !floods(seed_leaf.contents) {
            continue;
        }
        if graph.portals_of(Cell::Leaf(seed)).is_empty() {
            log::debug!("leaf {seed} has no portals, no area");
            continue;
        }
        count += 1;
        leaf_area[seed] = count;
        let mut queue = VecDeque::from([seed]);

        while let Some(leaf) = queue.pop_front() {
            let cell = Cell::Leaf(leaf);
            for &index in graph.portals_of(cell) {
                let Some(portal) = graph.get(index) else {
                    continue;
                };
                let Cell::Leaf(next) = portal.other(cell) else {
                    continue;
                };
                let next_leaf = &tree.leaves[next];
                if next_leaf.contents == Contents::AreaPortal {
                    // the portal leaf itself belongs to the first area reaching it
                    if leaf_area[next] == 0 {
                        leaf_area[next] = count;
                    }
                    match portal_entity(next) {
                        Some(entity) => {
                            touched.entry(entity).or_default().insert(count);
                        },
                        None => log::debug!("area portal leaf {next} has no portal brush"),
                    }
                    continue;
                }
                if leaf_area[next] != 0 || next_leaf.outside || !floods(next_leaf.contents) {
                    continue;
                }
                leaf_area[next] = count;
                queue.push_back(next);
            }
        }
    }

    let portal_areas: BTreeMap<usize, Vec<usize>> = touched
        .into_iter()
        .map(|(entity, areas)| (entity, areas.into_iter().collect::<Vec<_>>()))
        .collect();

    for (entity, areas) in &portal_areas {
        match areas.len() {
            2 => {},
            1 => log::warn!("areaportal entity {entity} touches only one area"),
            n => log::warn!("areaportal entity {entity} touches {n} areas"),
        }
    }
    log::info!("{count:8} areas");

    AreaMap {
        leaf_area,
        count,
        portal_areas,
    }
}
