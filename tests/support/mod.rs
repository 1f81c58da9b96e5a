//! Test support library
//! Builds `.map` text for axis-aligned boxes and rooms and runs stages on it.

#![allow(dead_code)]

use nalgebra::Point3;
use qbsp::brush::{Brush, load_entity};
use qbsp::bsp::{Tree, build_tree};
use qbsp::csg::{Surface, csg_faces};
use qbsp::float_types::Real;
use qbsp::map::{MapFile, parse_map};
use qbsp::{CompileContext, CompileOptions};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

fn axis(i: usize) -> [Real; 3] {
    let mut v = [0.0; 3];
    v[i] = 64.0;
    v
}

fn point(p: [Real; 3]) -> String {
    format!("( {} {} {} )", p[0], p[1], p[2])
}

fn offset(p: [Real; 3], d: [Real; 3]) -> [Real; 3] {
    [p[0] + d[0], p[1] + d[1], p[2] + d[2]]
}

/// One side line through three points; the plane faces
/// `(p0 - p1) × (p2 - p1)`.
fn side(p0: [Real; 3], p1: [Real; 3], p2: [Real; 3], texture: &str) -> String {
    format!(
        "{} {} {} {texture} 0 0 0 1 1\n",
        point(p0),
        point(p1),
        point(p2)
    )
}

/// An axis-aligned box brush in `.map` syntax.
pub fn box_brush(mins: [Real; 3], maxs: [Real; 3], texture: &str) -> String {
    let mut text = String::from("{\n");
    for i in 0..3 {
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        let mut hi = [0.0; 3];
        hi[i] = maxs[i];
        text.push_str(&side(offset(hi, axis(j)), hi, offset(hi, axis(k)), texture));
        let mut lo = [0.0; 3];
        lo[i] = mins[i];
        text.push_str(&side(offset(lo, axis(k)), lo, offset(lo, axis(j)), texture));
    }
    text.push_str("}\n");
    text
}

/// A 64-unit box brush with a seventh side whose three points are collinear.
pub fn box_with_collinear_side() -> String {
    let mut brush = box_brush([0.0; 3], [64.0; 3], "crate");
    brush.truncate(brush.len() - 2);
    brush.push_str("( 0 0 0 ) ( 1 1 1 ) ( 2 2 2 ) crate 0 0 0 1 1\n}\n");
    brush
}

/// Six walls of `thickness` enclosing the open box `mins`-`maxs`.
/// `skip_wall` leaves one wall out (0 = -x, 1 = +x, 2 = -y, 3 = +y, 4 = -z, 5 = +z).
pub fn room_brushes(
    mins: [Real; 3],
    maxs: [Real; 3],
    thickness: Real,
    skip_wall: Option<usize>,
) -> String {
    let outer_min = mins.map(|c| c - thickness);
    let outer_max = maxs.map(|c| c + thickness);
    let mut text = String::new();
    for wall in 0..6 {
        if skip_wall == Some(wall) {
            continue;
        }
        let axis = wall / 2;
        let (mut lo, mut hi) = (outer_min, outer_max);
        if wall % 2 == 0 {
            hi[axis] = mins[axis];
        } else {
            lo[axis] = maxs[axis];
        }
        text.push_str(&box_brush(lo, hi, "wall"));
    }
    text
}

/// A point entity.
pub fn point_entity(classname: &str, origin: [Real; 3]) -> String {
    format!(
        "{{\n\"classname\" \"{classname}\"\n\"origin\" \"{} {} {}\"\n}}\n",
        origin[0], origin[1], origin[2]
    )
}

/// Worldspawn holding `brushes`, followed by `extra` entity text.
pub fn world(brushes: &str, extra: &str) -> String {
    format!("{{\n\"classname\" \"worldspawn\"\n{brushes}}}\n{extra}")
}

/// A sealed 256-unit room with a player start in the middle.
pub fn sealed_room() -> String {
    world(
        &room_brushes([0.0; 3], [256.0; 3], 16.0, None),
        &point_entity("info_player_start", [128.0, 128.0, 64.0]),
    )
}

/// The same room with its +x wall missing.
pub fn leaky_room() -> String {
    world(
        &room_brushes([0.0; 3], [256.0; 3], 16.0, Some(1)),
        &point_entity("info_player_start", [128.0, 128.0, 64.0]),
    )
}

pub fn parse(text: &str) -> MapFile {
    parse_map(text).expect("test map parses")
}

pub fn context() -> CompileContext {
    CompileContext::new(CompileOptions::default())
}

/// Hull 0 brushes of worldspawn.
pub fn world_brushes(ctx: &CompileContext, map: &mut MapFile) -> Vec<Brush> {
    map.merge_world_brush_entities(&ctx.options);
    load_entity(ctx, &map.entities[0], true, 0, None)
        .expect("world brushes build")
        .brushes
}

/// Post-CSG surfaces of worldspawn.
pub fn world_surfaces(ctx: &CompileContext, text: &str) -> Vec<Surface> {
    let mut map = parse(text);
    let brushes = world_brushes(ctx, &mut map);
    csg_faces(ctx, &brushes)
}

/// A tree of worldspawn built with the full split heuristic.
pub fn world_tree(ctx: &CompileContext, text: &str) -> Tree {
    build_tree(ctx, world_surfaces(ctx, text), false).expect("tree builds")
}

pub fn p(x: Real, y: Real, z: Real) -> Point3<Real> {
    Point3::new(x, y, z)
}
