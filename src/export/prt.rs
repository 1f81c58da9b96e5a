//! PRT1 portal file for the vis tool.

use crate::bsp::Tree;
use crate::export::ModelExport;
use crate::portals::{Cell, PortalGraph};
use std::fmt::Write as _;

/// Render the portal file text. Leaves are numbered by output leaf index
/// minus one; only portals between two see-through leaves are listed.
pub fn portal_file_text(
    tree: &Tree,
    graph: &PortalGraph,
    export: &ModelExport,
    transwater: bool,
) -> String {
    let see_through = |cell: Cell| match cell {
        Cell::Leaf(leaf) => {
            let out = export.leaf_map[leaf];
            (out != 0 && tree.leaves[leaf].contents.is_see_through(transwater)).then(|| out - 1)
        },
        _ => None,
    };

    let mut body = String::new();
    let mut count = 0;
    for (_, portal) in graph.iter() {
        let (Some(front), Some(back)) = (see_through(portal.sides[0]), see_through(portal.sides[1]))
        else {
            continue;
        };
        count += 1;
        let _ = write!(body, "{} {front} {back}", portal.winding.len());
        for p in &portal.winding.points {
            let _ = write!(body, " ({:.6} {:.6} {:.6})", p.x, p.y, p.z);
        }
        body.push('\n');
    }

    format!("PRT1\n{}\n{count}\n{body}", export.vis_leafs)
}
