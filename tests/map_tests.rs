mod support;

use qbsp::errors::MapParseError;
use qbsp::map::{BrushClass, parse_map};
use qbsp::CompileOptions;
use qbsp::float_types::Real;
use support::{box_brush, box_with_collinear_side, point_entity, world};

#[test]
fn parses_entities_keys_and_brushes() {
    let text = world(
        &box_brush([0.0; 3], [64.0; 3], "floor"),
        &point_entity("info_player_start", [32.0, 32.0, 96.0]),
    );
    let map = parse_map(&text).unwrap();
    assert_eq!(map.entities.len(), 2);

    let world = &map.entities[0];
    assert_eq!(world.classname(), "worldspawn");
    assert_eq!(world.brushes.len(), 1);
    assert_eq!(world.brushes[0].sides.len(), 6);
    assert!(world.brushes[0].sides.iter().all(|s| s.texture == "floor"));

    let player = &map.entities[1];
    assert_eq!(player.classname(), "info_player_start");
    assert_eq!(player.origin().unwrap().z, 96.0);
    assert!(player.brushes.is_empty());
}

#[test]
fn comments_are_skipped() {
    let text = "// header\n{\n\"classname\" \"worldspawn\" // trailing\n}\n";
    let map = parse_map(text).unwrap();
    assert_eq!(map.entities.len(), 1);
    assert_eq!(map.entities[0].pairs.len(), 1);
}

#[test]
fn valve_sides_parse() {
    let text = "{\n\"classname\" \"worldspawn\"\n{\n\
        ( 0 0 0 ) ( 0 64 0 ) ( 64 0 0 ) base [ 1 0 0 0 ] [ 0 -1 0 0 ] 0 1 1\n}\n}\n";
    let map = parse_map(text).unwrap();
    assert_eq!(map.entities[0].brushes[0].sides.len(), 1);
}

#[test]
fn quake2_side_info_parses() {
    let text = "{\n{\n( 0 0 0 ) ( 0 64 0 ) ( 64 0 0 ) e1u1/floor 0 0 0 1 1 1 8 2\n}\n}\n";
    let map = parse_map(text).unwrap();
    let q2 = map.entities[0].brushes[0].sides[0].q2.unwrap();
    assert_eq!((q2.contents, q2.flags, q2.value), (1, 8, 2));
}

#[test]
fn unterminated_string_is_reported() {
    let err = parse_map("{\n\"classname\" \"worldspawn\n}\n").unwrap_err();
    assert_eq!(err, MapParseError::UnterminatedString { line: 2 });
}

#[test]
fn eof_inside_entity_is_reported() {
    let err = parse_map("{\n\"classname\" \"worldspawn\"\n").unwrap_err();
    assert!(matches!(err, MapParseError::UnexpectedEof { .. }));
}

#[test]
fn eof_inside_brush_is_reported() {
    let err = parse_map("{\n{\n( 0 0 0 ) ( 0 64").unwrap_err();
    assert!(matches!(err, MapParseError::UnexpectedEof { .. }));
}

#[test]
fn collinear_sides_are_dropped() {
    let map = parse_map(&world(&box_with_collinear_side(), "")).unwrap();
    let sides = &map.entities[0].brushes[0].sides;
    assert_eq!(sides.len(), 6);
    assert_eq!(sides[5].line, 9);
}

#[test]
fn detail_and_group_brushes_join_worldspawn() {
    let text = world(
        &box_brush([0.0; 3], [64.0; 3], "floor"),
        &format!(
            "{{\n\"classname\" \"func_detail\"\n{}}}\n{{\n\"classname\" \"func_group\"\n{}}}\n",
            box_brush([128.0; 3], [192.0; 3], "crate"),
            box_brush([256.0; 3], [320.0; 3], "crate"),
        ),
    );
    let mut map = parse_map(&text).unwrap();
    map.merge_world_brush_entities(&CompileOptions::default());

    let world = &map.entities[0];
    assert_eq!(world.brushes.len(), 3);
    assert_eq!(world.brushes[1].class, BrushClass::Detail);
    assert_eq!(world.brushes[1].source_entity, 1);
    assert_eq!(world.brushes[2].class, BrushClass::Structural);
    assert!(map.entities[1].brushes.is_empty());
}

/// Worldspawn with one floor brush, then one entity of each detail kind.
fn every_detail_kind() -> String {
    let kinds = [
        "func_detail",
        "func_detail_wall",
        "func_detail_illusionary",
        "func_detail_fence",
    ];
    let entities: String = kinds
        .iter()
        .enumerate()
        .map(|(i, classname)| {
            let lo = 128.0 * (i + 1) as Real;
            format!(
                "{{\n\"classname\" \"{classname}\"\n{}}}\n",
                box_brush([lo; 3], [lo + 64.0; 3], "crate")
            )
        })
        .collect();
    world(&box_brush([0.0; 3], [64.0; 3], "floor"), &entities)
}

#[test]
fn omitted_detail_disappears() {
    let mut map = parse_map(&every_detail_kind()).unwrap();
    let options = CompileOptions {
        omit_detail: true,
        ..CompileOptions::default()
    };
    map.merge_world_brush_entities(&options);
    let world = &map.entities[0];
    assert_eq!(world.brushes.len(), 1);
    assert_eq!(world.brushes[0].class, BrushClass::Structural);
}

#[test]
fn single_detail_kinds_can_be_omitted() {
    let mut map = parse_map(&every_detail_kind()).unwrap();
    let options = CompileOptions {
        omit_detail_illusionary: true,
        ..CompileOptions::default()
    };
    map.merge_world_brush_entities(&options);
    let classes: Vec<BrushClass> = map.entities[0].brushes.iter().map(|b| b.class).collect();
    assert_eq!(
        classes,
        [
            BrushClass::Structural,
            BrushClass::Detail,
            BrushClass::DetailWall,
            BrushClass::DetailFence,
        ]
    );
}

#[test]
fn no_detail_makes_every_kind_structural() {
    let mut map = parse_map(&every_detail_kind()).unwrap();
    let options = CompileOptions {
        no_detail: true,
        ..CompileOptions::default()
    };
    map.merge_world_brush_entities(&options);
    let world = &map.entities[0];
    assert_eq!(world.brushes.len(), 5);
    assert!(world.brushes.iter().all(|b| b.class == BrushClass::Structural));
}

#[test]
fn rotation_entities_take_their_target_origin() {
    let text = world(
        "",
        &format!(
            "{{\n\"classname\" \"rotate_object\"\n\"target\" \"pivot\"\n{}}}\n\
             {{\n\"classname\" \"rotate_door\"\n{}}}\n\
             {{\n\"classname\" \"info_rotate\"\n\"targetname\" \"pivot\"\n\"origin\" \"32 -16 8\"\n}}\n",
            box_brush([0.0; 3], [64.0; 3], "crate"),
            box_brush([0.0; 3], [64.0; 3], "crate"),
        ),
    );
    let mut map = parse_map(&text).unwrap();
    map.fix_rotate_origins();
    assert_eq!(map.entities[1].value("origin"), Some("32 -16 8"));
    // no target
    assert_eq!(map.entities[2].value("origin"), Some("0 0 0"));
    assert_eq!(map.entities[3].value("origin"), Some("32 -16 8"));
}

#[test]
fn area_portals_are_numbered_from_one() {
    let portal = |x: Real| {
        format!(
            "{{\n\"classname\" \"func_areaportal\"\n{}}}\n",
            box_brush([x, 0.0, 0.0], [x + 8.0, 64.0, 64.0], "trigger")
        )
    };
    let text = world("", &(portal(0.0) + &portal(100.0)));
    let mut map = parse_map(&text).unwrap();
    map.merge_world_brush_entities(&CompileOptions::default());
    assert_eq!(map.area_portal_number(1), Some(1));
    assert_eq!(map.area_portal_number(2), Some(2));
    assert_eq!(map.area_portal_number(0), None);
}
