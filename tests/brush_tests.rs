mod support;

use nalgebra::{Point3, Vector3};
use qbsp::brush::{brush_contents, build_brush, check_face, load_entity};
use qbsp::contents::{Contents, Liquid};
use qbsp::errors::CompileError;
use qbsp::export::{BSP29, FormatProfile, HullBox};
use qbsp::map::{BrushClass, MapBrush};
use qbsp::plane::Plane;
use qbsp::winding::Winding;
use support::{box_brush, box_with_collinear_side, context, parse, point_entity, world};

fn single_brush(text: &str) -> MapBrush {
    let map = parse(&world(text, ""));
    map.entities[0].brushes[0].clone()
}

#[test]
fn box_brush_has_six_square_sides() {
    let ctx = context();
    let map_brush = single_brush(&box_brush([0.0, 0.0, 0.0], [64.0, 32.0, 16.0], "base"));
    let brush = build_brush(&ctx, &map_brush, Contents::Solid, &Vector3::zeros(), None).unwrap();

    assert_eq!(brush.sides.len(), 6);
    assert!(brush.sides.iter().all(|s| s.winding.len() == 4));
    assert_eq!(brush.bounds.mins.coords, Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(brush.bounds.maxs.coords, Vector3::new(64.0, 32.0, 16.0));
    // opposite sides lie at different distances, so no plane is shared
    assert_eq!(ctx.planes.len(), 6);
}

#[test]
fn side_windings_face_out_of_the_brush() {
    let ctx = context();
    let map_brush = single_brush(&box_brush([0.0; 3], [64.0; 3], "base"));
    let brush = build_brush(&ctx, &map_brush, Contents::Solid, &Vector3::zeros(), None).unwrap();
    let center = brush.bounds.center();
    for side in &brush.sides {
        let plane = ctx.planes.get(side.plane);
        assert!(plane.distance_to(&center) < 0.0);
        let normal = side.winding.normal().normalize();
        assert!((normal - plane.normal).norm() < 1e-6);
    }
}

#[test]
fn offset_moves_the_brush() {
    let ctx = context();
    let map_brush = single_brush(&box_brush([0.0; 3], [64.0; 3], "base"));
    let offset = Vector3::new(32.0, 0.0, 0.0);
    let brush = build_brush(&ctx, &map_brush, Contents::Solid, &offset, None).unwrap();
    assert_eq!(brush.bounds.mins.x, -32.0);
    assert_eq!(brush.bounds.maxs.x, 32.0);
}

#[test]
fn hull_expansion_grows_by_the_box() {
    let ctx = context();
    let map_brush = single_brush(&box_brush([0.0; 3], [64.0; 3], "base"));
    let hull = HullBox {
        mins: [-16.0, -16.0, -24.0],
        maxs: [16.0, 16.0, 32.0],
    };
    let brush = build_brush(
        &ctx,
        &map_brush,
        Contents::Solid,
        &Vector3::zeros(),
        Some(&hull),
    )
    .unwrap();
    // an axial box needs no bevels
    assert_eq!(brush.sides.len(), 6);
    assert_eq!(brush.bounds.mins.coords, Vector3::new(-16.0, -16.0, -32.0));
    assert_eq!(brush.bounds.maxs.coords, Vector3::new(80.0, 80.0, 88.0));
}

#[test]
fn too_few_planes_is_an_error() {
    let ctx = context();
    let text = "{\n\
        ( 0 64 0 ) ( 0 0 0 ) ( 0 0 64 ) base 0 0 0 1 1\n\
        ( 0 0 64 ) ( 0 0 0 ) ( 64 0 0 ) base 0 0 0 1 1\n\
        ( 64 0 0 ) ( 0 0 0 ) ( 0 64 0 ) base 0 0 0 1 1\n\
        }\n";
    let map_brush = single_brush(text);
    let err = build_brush(&ctx, &map_brush, Contents::Solid, &Vector3::zeros(), None).unwrap_err();
    assert!(matches!(err, CompileError::TooFewPlanes { count: 3, .. }));
}

#[test]
fn duplicate_sides_are_dropped() {
    let ctx = context();
    let mut text = box_brush([0.0; 3], [64.0; 3], "base");
    let first_side = text.lines().nth(1).unwrap().to_string();
    text.insert_str(2, &format!("{first_side}\n"));
    let map_brush = single_brush(&text);
    assert_eq!(map_brush.sides.len(), 7);
    let brush = build_brush(&ctx, &map_brush, Contents::Solid, &Vector3::zeros(), None).unwrap();
    assert_eq!(brush.sides.len(), 6);
}

#[test]
fn coordinates_past_the_world_extent_fail() {
    let ctx = context();
    let map_brush = single_brush(&box_brush([70000.0, 0.0, 0.0], [70064.0, 64.0, 64.0], "base"));
    let err = build_brush(&ctx, &map_brush, Contents::Solid, &Vector3::zeros(), None).unwrap_err();
    assert!(matches!(err, CompileError::WorldExtent { .. }));
}

#[test]
fn contents_come_from_texture_names() {
    let solid = single_brush(&box_brush([0.0; 3], [64.0; 3], "base"));
    let water = single_brush(&box_brush([0.0; 3], [64.0; 3], "*water1"));
    let lava = single_brush(&box_brush([0.0; 3], [64.0; 3], "*lava1"));
    let sky = single_brush(&box_brush([0.0; 3], [64.0; 3], "sky4"));
    let clip = single_brush(&box_brush([0.0; 3], [64.0; 3], "clip"));

    assert_eq!(brush_contents(&solid, 0, false), Some(Contents::Solid));
    assert_eq!(brush_contents(&water, 0, false), Some(Contents::Liquid(Liquid::Water)));
    assert_eq!(brush_contents(&lava, 0, false), Some(Contents::Liquid(Liquid::Lava)));
    assert_eq!(brush_contents(&sky, 0, false), Some(Contents::Sky));
    // clip only exists in the collision hulls, liquids only in the point hull
    assert_eq!(brush_contents(&clip, 0, false), None);
    assert_eq!(brush_contents(&clip, 1, false), Some(Contents::Clip));
    assert_eq!(brush_contents(&water, 1, false), None);
}

#[test]
fn sky_is_solid_in_the_collision_hulls() {
    let sky = single_brush(&box_brush([0.0; 3], [64.0; 3], "sky4"));
    assert_eq!(brush_contents(&sky, 1, false), Some(Contents::Solid));
    assert_eq!(brush_contents(&sky, 2, false), Some(Contents::Solid));
}

#[test]
fn solid_models_drop_their_contents() {
    let water = single_brush(&box_brush([0.0; 3], [64.0; 3], "*water1"));
    assert_eq!(brush_contents(&water, 0, true), Some(Contents::Solid));
    assert_eq!(brush_contents(&water, 1, true), Some(Contents::Solid));

    let mut mirrored = water.clone();
    mirrored.mirror_inside = Some(true);
    assert_eq!(brush_contents(&mirrored, 0, true), Some(Contents::DetailFence));
    assert_eq!(brush_contents(&mirrored, 1, true), Some(Contents::Solid));

    // clip keeps to the collision hulls even in a solid model
    let clip = single_brush(&box_brush([0.0; 3], [64.0; 3], "clip"));
    assert_eq!(brush_contents(&clip, 0, true), None);
    assert_eq!(brush_contents(&clip, 1, true), Some(Contents::Clip));
}

#[test]
fn illusionary_detail_has_no_collision() {
    let mut brush = single_brush(&box_brush([0.0; 3], [64.0; 3], "grass"));
    brush.class = BrushClass::DetailIllusionary;
    assert_eq!(brush_contents(&brush, 0, false), Some(Contents::DetailIllusionary));
    assert_eq!(brush_contents(&brush, 1, false), None);
}

#[test]
fn brush_with_a_collinear_side_still_builds() {
    let ctx = context();
    let map_brush = single_brush(&box_with_collinear_side());
    let brush = build_brush(&ctx, &map_brush, Contents::Solid, &Vector3::zeros(), None).unwrap();
    assert_eq!(brush.sides.len(), 6);
}

#[test]
fn side_windings_are_checked() {
    let plane = Plane::from_normal(Vector3::z(), 0.0);
    let square = Winding::new(vec![
        Point3::new(0.0, 64.0, 0.0),
        Point3::new(64.0, 64.0, 0.0),
        Point3::new(64.0, 64.0, 0.00001),
        Point3::new(64.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
    ]);
    let healed = check_face(square, &plane, 1, 1e-4).expect("square survives");
    assert_eq!(healed.len(), 4);

    let sliver = Winding::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.00001, 0.0, 0.0),
        Point3::new(0.0, 0.00001, 0.0),
    ]);
    assert!(check_face(sliver, &plane, 1, 1e-4).is_none());

    let dart = Winding::new(vec![
        Point3::new(0.0, 64.0, 0.0),
        Point3::new(64.0, 64.0, 0.0),
        Point3::new(64.0, 0.0, 0.0),
        Point3::new(32.0, 48.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
    ]);
    assert!(check_face(dart, &plane, 1, 1e-4).is_none());
}

#[test]
fn clip_brushes_bound_the_point_hull() {
    let ctx = context();
    let text = world(
        "",
        &format!(
            "{{\n\"classname\" \"func_wall\"\n{}{}}}\n",
            box_brush([0.0; 3], [64.0; 3], "wall"),
            box_brush([-32.0, 0.0, 0.0], [128.0, 64.0, 96.0], "clip"),
        ),
    );
    let map = parse(&text);
    let loaded = load_entity(&ctx, &map.entities[1], false, 0, None).unwrap();
    assert_eq!(loaded.brushes.len(), 1);
    let bounds = loaded.clip_bounds.expect("clip brush bounds");
    assert_eq!(bounds.mins.x, -32.0);
    assert_eq!(bounds.maxs.z, 96.0);

    let hull1 = load_entity(&ctx, &map.entities[1], false, 1, Some(&BSP29.hulls()[1])).unwrap();
    assert_eq!(hull1.brushes.len(), 2);
    assert!(hull1.clip_bounds.is_none());
}

#[test]
fn origin_brush_sets_entity_origin() {
    let ctx = context();
    let text = world(
        "",
        &format!(
            "{{\n\"classname\" \"func_door\"\n{}{}}}\n",
            box_brush([96.0, 0.0, 0.0], [160.0, 64.0, 64.0], "door"),
            box_brush([120.0, 24.0, 24.0], [136.0, 40.0, 40.0], "origin"),
        ),
    );
    let map = parse(&text);
    let loaded = load_entity(&ctx, &map.entities[1], false, 0, None).unwrap();
    let origin = loaded.origin.unwrap();
    assert_eq!((origin.x, origin.y, origin.z), (128.0, 32.0, 32.0));
    assert_eq!(loaded.brushes.len(), 1);
    assert_eq!(loaded.brushes[0].bounds.mins.x, -32.0);
    assert_eq!(loaded.stats.solid, 1);
}

#[test]
fn rotation_entities_are_offset_by_their_origin() {
    let ctx = context();
    let text = world(
        "",
        &format!(
            "{{\n\"classname\" \"rotate_object\"\n\"origin\" \"32 32 32\"\n{}}}\n",
            box_brush([0.0; 3], [64.0; 3], "crate"),
        ),
    );
    let map = parse(&text);
    let loaded = load_entity(&ctx, &map.entities[1], false, 0, None).unwrap();
    let origin = loaded.origin.unwrap();
    assert_eq!((origin.x, origin.y, origin.z), (32.0, 32.0, 32.0));
    assert_eq!(loaded.brushes[0].bounds.mins.x, -32.0);
    assert_eq!(loaded.brushes[0].bounds.maxs.z, 32.0);
}

#[test]
fn point_entities_load_nothing() {
    let ctx = context();
    let map = parse(&world("", &point_entity("light", [0.0, 0.0, 0.0])));
    let loaded = load_entity(&ctx, &map.entities[1], false, 0, None).unwrap();
    assert!(loaded.brushes.is_empty());
    assert!(loaded.origin.is_none());
}
