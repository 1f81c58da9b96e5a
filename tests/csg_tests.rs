mod support;

use qbsp::contents::Contents;
use qbsp::csg::{Face, csg_faces};
use qbsp::float_types::Real;
use qbsp::merge::merge_surfaces;
use support::{approx_eq, box_brush, context, parse, world, world_brushes, world_surfaces};

fn all_faces(surfaces: &[qbsp::csg::Surface]) -> Vec<&Face> {
    surfaces.iter().flat_map(|s| s.faces.iter()).collect()
}

#[test]
fn single_box_keeps_all_sides() {
    let ctx = context();
    let surfaces = world_surfaces(&ctx, &world(&box_brush([0.0; 3], [64.0; 3], "base"), ""));
    let faces = all_faces(&surfaces);
    assert_eq!(surfaces.len(), 6);
    assert_eq!(faces.len(), 6);
    for face in faces {
        assert_eq!(face.contents, [Contents::Empty, Contents::Solid]);
        assert!(approx_eq(face.winding.area(), 64.0 * 64.0, 1e-6));
    }
}

#[test]
fn touching_boxes_lose_the_shared_wall() {
    let ctx = context();
    let text = world(
        &(box_brush([0.0; 3], [64.0; 3], "base") + &box_brush([64.0, 0.0, 0.0], [128.0, 64.0, 64.0], "base")),
        "",
    );
    let surfaces = world_surfaces(&ctx, &text);
    assert_eq!(all_faces(&surfaces).len(), 10);
    for face in all_faces(&surfaces) {
        let center = face.winding.center();
        assert!(!(approx_eq(center.x, 64.0, 1e-6) && face.winding.area() > 1.0));
    }

    // coplanar neighbours with the same texture merge back together
    let merged = merge_surfaces(&ctx, surfaces);
    assert_eq!(all_faces(&merged).len(), 6);
}

#[test]
fn overlapping_boxes_leave_no_hidden_faces() {
    let ctx = context();
    let text = world(
        &(box_brush([0.0; 3], [64.0; 3], "base") + &box_brush([32.0, 0.0, 0.0], [96.0, 64.0, 64.0], "base")),
        "",
    );
    let mut map = parse(&text);
    let brushes = world_brushes(&ctx, &mut map);
    let surfaces = csg_faces(&ctx, &brushes);

    for face in all_faces(&surfaces) {
        let center = face.winding.center();
        for brush in &brushes {
            let deep_inside = brush
                .sides
                .iter()
                .all(|side| ctx.planes.get(side.plane).distance_to(&center) < -1.0);
            assert!(!deep_inside, "face at {center:?} is hidden in a brush");
        }
    }

    // the union's skin: each outer plane covered exactly once
    let area_on = |pick: &dyn Fn(&Face) -> bool| -> Real {
        all_faces(&surfaces)
            .into_iter()
            .filter(|f| pick(f))
            .map(|f| f.winding.area())
            .sum()
    };
    let bottom = area_on(&|f| f.winding.points.iter().all(|p| p.z == 0.0));
    assert!(approx_eq(bottom, 96.0 * 64.0, 1e-6));
    let inner = area_on(&|f| {
        let on = |x: Real| f.winding.points.iter().all(|p| p.x == x);
        on(32.0) || on(64.0)
    });
    assert!(approx_eq(inner, 0.0, 1e-6));
}

#[test]
fn water_faces_are_mirrored_inside() {
    let ctx = context();
    let surfaces = world_surfaces(&ctx, &world(&box_brush([0.0; 3], [64.0; 3], "*water"), ""));
    let faces = all_faces(&surfaces);
    assert_eq!(faces.len(), 12);
    let liquid = Contents::Liquid(qbsp::contents::Liquid::Water);
    assert_eq!(faces.iter().filter(|f| f.contents == [Contents::Empty, liquid]).count(), 6);
    assert_eq!(faces.iter().filter(|f| f.contents == [liquid, Contents::Empty]).count(), 6);
}

#[test]
fn water_inside_solid_disappears() {
    let ctx = context();
    let text = world(
        &(box_brush([0.0; 3], [128.0; 3], "base") + &box_brush([32.0; 3], [96.0; 3], "*water")),
        "",
    );
    let surfaces = world_surfaces(&ctx, &text);
    let faces = all_faces(&surfaces);
    assert_eq!(faces.len(), 6);
    assert!(faces.iter().all(|f| f.contents[1] == Contents::Solid));
}

#[test]
fn brush_order_does_not_change_visible_area() {
    let a = box_brush([0.0; 3], [64.0; 3], "base");
    let b = box_brush([32.0, 16.0, 0.0], [96.0, 48.0, 80.0], "base");
    let total = |text: String| -> Real {
        let ctx = context();
        all_faces(&world_surfaces(&ctx, &text))
            .into_iter()
            .map(|f| f.winding.area())
            .sum()
    };
    let forward = total(world(&(a.clone() + &b), ""));
    let backward = total(world(&(b + &a), ""));
    assert!(approx_eq(forward, backward, 1e-6));
}
