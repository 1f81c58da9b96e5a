mod support;

use qbsp::{CompileContext, CompileOptions, Target, compile_map};
use support::{box_brush, parse, point_entity, room_brushes, world};

/// Two 256-unit rooms side by side. The dividing wall has a doorway that a
/// func_areaportal brush fills exactly when `portal` is set.
fn two_rooms(portal: bool) -> String {
    let mut walls = room_brushes([0.0; 3], [512.0, 256.0, 256.0], 16.0, None);
    walls += &box_brush([248.0, 0.0, 0.0], [264.0, 96.0, 256.0], "wall");
    walls += &box_brush([248.0, 160.0, 0.0], [264.0, 256.0, 256.0], "wall");
    walls += &box_brush([248.0, 96.0, 128.0], [264.0, 160.0, 256.0], "wall");

    let mut entities = String::new();
    if portal {
        entities += &format!(
            "{{\n\"classname\" \"func_areaportal\"\n{}}}\n",
            box_brush([248.0, 96.0, 0.0], [264.0, 160.0, 128.0], "trigger")
        );
    }
    entities += &point_entity("info_player_start", [128.0, 128.0, 64.0]);
    entities += &point_entity("light", [384.0, 128.0, 64.0]);
    world(&walls, &entities)
}

fn quake2() -> CompileContext {
    CompileContext::new(CompileOptions {
        target: Target::Quake2,
        ..CompileOptions::default()
    })
}

#[test]
fn area_portal_splits_two_rooms() {
    let ctx = quake2();
    let mut map = parse(&two_rooms(true));
    let compiled = compile_map(&ctx, &mut map, None).unwrap();
    assert!(compiled.leak.is_none());

    let areas = compiled.areas.unwrap();
    assert_eq!(areas.count, 2);
    assert_eq!(areas.portal_areas.get(&1), Some(&vec![1, 2]));
}

#[test]
fn area_lumps_link_both_ways() {
    let ctx = quake2();
    let mut map = parse(&two_rooms(true));
    let compiled = compile_map(&ctx, &mut map, None).unwrap();
    let data = &compiled.data;

    // index 0 of both lumps is a placeholder
    assert_eq!(data.areas.len(), 3);
    assert_eq!(data.area_portals.len(), 3);
    for (area, other) in [(1usize, 2u32), (2, 1)] {
        let entry = data.areas[area];
        assert_eq!(entry.num_portals, 1);
        let portal = data.area_portals[entry.first_portal as usize];
        assert_eq!(portal.portal_num, 1);
        assert_eq!(portal.other_area, other);
    }
    assert_eq!(map.entities[1].value("style"), Some("1"));
}

#[test]
fn without_a_portal_the_rooms_share_an_area() {
    let ctx = quake2();
    let mut map = parse(&two_rooms(false));
    let compiled = compile_map(&ctx, &mut map, None).unwrap();
    let areas = compiled.areas.unwrap();
    assert_eq!(areas.count, 1);
    assert!(areas.portal_areas.is_empty());
}

#[test]
fn quake1_targets_have_no_areas() {
    let ctx = CompileContext::new(CompileOptions::default());
    let mut map = parse(&two_rooms(true));
    let compiled = compile_map(&ctx, &mut map, None).unwrap();
    assert!(compiled.areas.is_none());
    assert!(compiled.data.areas.is_empty());
}
