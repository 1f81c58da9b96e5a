mod support;

use qbsp::bsp::{NodeRef, Tree, build_tree, build_tree_with, serial::SerialBspOps};
use qbsp::contents::Contents;
use qbsp::context::CompileContext;
use qbsp::CompileOptions;
use qbsp::float_types::Real;
use support::{box_brush, context, p, sealed_room, world, world_surfaces, world_tree};

fn leaf_contents(ctx: &CompileContext, tree: &Tree, x: Real, y: Real, z: Real) -> Contents {
    tree.leaves[tree.point_in_leaf(&ctx.planes, &p(x, y, z))].contents
}

#[test]
fn box_interior_is_solid() {
    let ctx = context();
    let tree = world_tree(&ctx, &world(&box_brush([0.0; 3], [64.0; 3], "base"), ""));
    assert_eq!(tree.nodes.len(), 6);
    assert_eq!(leaf_contents(&ctx, &tree, 32.0, 32.0, 32.0), Contents::Solid);
    assert_eq!(leaf_contents(&ctx, &tree, 100.0, 32.0, 32.0), Contents::Empty);
    assert_eq!(leaf_contents(&ctx, &tree, -5.0, -5.0, -5.0), Contents::Empty);
}

#[test]
fn no_surfaces_make_one_solid_leaf() {
    let ctx = context();
    let tree = build_tree(&ctx, Vec::new(), true).unwrap();
    assert!(tree.nodes.is_empty());
    assert_eq!(tree.head, NodeRef::Leaf(0));
    assert_eq!(tree.leaves.len(), 1);
    assert_eq!(tree.leaves[0].contents, Contents::Solid);
}

#[test]
fn node_faces_lie_on_the_node_plane() {
    let ctx = context();
    let tree = world_tree(&ctx, &sealed_room());
    for node in &tree.nodes {
        let plane = ctx.planes.canonical(node.plane);
        for face in &node.faces {
            assert_eq!(face.plane.id, node.plane);
            for point in &face.winding.points {
                assert!(plane.distance_to(point).abs() < 0.01);
            }
        }
    }
}

#[test]
fn room_interior_is_empty_and_walls_solid() {
    let ctx = context();
    let tree = world_tree(&ctx, &sealed_room());
    assert_eq!(leaf_contents(&ctx, &tree, 128.0, 128.0, 128.0), Contents::Empty);
    assert_eq!(leaf_contents(&ctx, &tree, -8.0, 128.0, 128.0), Contents::Solid);
    assert_eq!(leaf_contents(&ctx, &tree, 128.0, 128.0, 264.0), Contents::Solid);
    assert_eq!(leaf_contents(&ctx, &tree, 400.0, 128.0, 128.0), Contents::Empty);
}

#[test]
fn every_leaf_has_a_parent_that_points_back() {
    let ctx = context();
    let tree = world_tree(&ctx, &sealed_room());
    for (index, leaf) in tree.leaves.iter().enumerate() {
        let parent = leaf.parent.unwrap();
        assert!(tree.nodes[parent].children.contains(&NodeRef::Leaf(index)));
    }
    let mut visited = 0;
    tree.walk(|_| visited += 1);
    assert_eq!(visited, tree.nodes.len() + tree.leaves.len());
}

#[test]
fn visible_faces_are_marked_by_empty_leaves() {
    let ctx = context();
    let tree = world_tree(&ctx, &world(&box_brush([0.0; 3], [64.0; 3], "base"), ""));
    let marked: usize = tree
        .leaves
        .iter()
        .filter(|l| l.contents == Contents::Empty)
        .map(|l| l.mark_faces.len())
        .sum();
    assert_eq!(marked, 6);
    assert!(
        tree.leaves
            .iter()
            .filter(|l| l.contents == Contents::Solid)
            .all(|l| l.mark_faces.is_empty() && l.brushes == vec![0])
    );
}

#[test]
fn midsplit_tree_classifies_like_the_full_heuristic() {
    let options = CompileOptions {
        max_node_size: 64.0,
        ..CompileOptions::default()
    };
    let ctx = CompileContext::new(options);
    let draft = build_tree(&ctx, world_surfaces(&ctx, &sealed_room()), true).unwrap();
    let good = build_tree(&ctx, world_surfaces(&ctx, &sealed_room()), false).unwrap();
    for point in [
        [128.0, 128.0, 128.0],
        [-8.0, 10.0, 10.0],
        [300.0, 10.0, 10.0],
        [128.0, 128.0, -8.0],
    ] {
        assert_eq!(
            leaf_contents(&ctx, &draft, point[0], point[1], point[2]),
            leaf_contents(&ctx, &good, point[0], point[1], point[2])
        );
    }
}

#[test]
fn serial_and_default_scoring_agree() {
    let ctx = context();
    let text = sealed_room();
    let default = build_tree(&ctx, world_surfaces(&ctx, &text), false).unwrap();
    let serial =
        build_tree_with(&ctx, world_surfaces(&ctx, &text), false, &SerialBspOps::new()).unwrap();
    assert_eq!(default.nodes.len(), serial.nodes.len());
    for (a, b) in default.nodes.iter().zip(&serial.nodes) {
        assert_eq!(a.plane, b.plane);
    }
}

#[test]
fn detail_leaves_resolve_to_solid() {
    let ctx = context();
    let text = world(
        &box_brush([0.0; 3], [64.0; 3], "base"),
        &format!(
            "{{\n\"classname\" \"func_detail\"\n{}}}\n",
            box_brush([128.0; 3], [192.0; 3], "crate")
        ),
    );
    let mut tree = world_tree(&ctx, &text);
    assert_eq!(leaf_contents(&ctx, &tree, 160.0, 160.0, 160.0), Contents::DetailSolid);
    tree.resolve_detail(0);
    assert_eq!(leaf_contents(&ctx, &tree, 160.0, 160.0, 160.0), Contents::Solid);
}
