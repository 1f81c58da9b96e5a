mod support;

use hashbrown::HashMap;
use qbsp::bsp::NodeRef;
use qbsp::export::lumps::ClipChild;
use qbsp::export::{BSP2, BSP29, BspData, FormatProfile, QUAKE2, write_bsp};
use qbsp::float_types::Real;
use qbsp::{CompileContext, CompileOptions, Compiled, Target, compile_map};
use support::{box_brush, leaky_room, parse, point_entity, room_brushes, sealed_room, world};

fn compile_with(text: &str, options: CompileOptions) -> Compiled {
    let ctx = CompileContext::new(options);
    let mut map = parse(text);
    compile_map(&ctx, &mut map, None).unwrap()
}

fn compile(text: &str) -> Compiled {
    compile_with(text, CompileOptions::default())
}

fn round_trip(data: &BspData, profile: &dyn FormatProfile) -> BspData {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bsp");
    write_bsp(&path, data, profile).unwrap();
    BspData::read(&std::fs::read(&path).unwrap()).unwrap()
}

/// A room with a pillar and a separate door model.
fn furnished_room() -> String {
    let brushes = room_brushes([0.0; 3], [512.0, 256.0, 256.0], 16.0, None)
        + &box_brush([200.0, 100.0, 0.0], [232.0, 132.0, 256.0], "pillar");
    let door = format!(
        "{{\n\"classname\" \"func_door\"\n{}}}\n",
        box_brush([400.0, 0.0, 0.0], [416.0, 64.0, 128.0], "door")
    );
    world(
        &brushes,
        &(door + &point_entity("info_player_start", [64.0, 64.0, 64.0])),
    )
}

#[test]
fn fixed_slots_are_reserved() {
    let data = compile(&sealed_room()).data;
    assert_eq!(data.edges[0], [0, 0]);
    assert_eq!(data.leaves[0].contents, -2);
    assert_eq!(data.models.len(), 1);
    assert_eq!(data.models[0].head_nodes[0], 0);
    for face in &data.faces {
        assert_eq!(face.styles, [255; 4]);
        assert_eq!(face.light_ofs, -1);
    }
}

#[test]
fn face_points_lie_on_their_planes() {
    let data = compile(&furnished_room()).data;
    for face in 0..data.faces.len() {
        let points = data.face_points(face).unwrap();
        assert!(points.len() >= 3);
        let (normal, dist) = data.face_plane(face).unwrap();
        for p in &points {
            let d = normal[0] as Real * p.x + normal[1] as Real * p.y + normal[2] as Real * p.z
                - dist as Real;
            assert!(d.abs() < 0.01, "face {face} point {p:?} is {d} off its plane");
        }
        // clockwise seen from the side the plane faces
        let winding = qbsp::winding::Winding::new(points);
        let n = winding.normal().normalize();
        let dot = n.x * normal[0] as Real + n.y * normal[1] as Real + n.z * normal[2] as Real;
        assert!(dot > 0.99);
    }
}

#[test]
fn each_edge_is_walked_once_each_way() {
    let data = compile(&furnished_room()).data;
    let mut uses: HashMap<i32, usize> = HashMap::new();
    for &se in &data.surfedges {
        assert_ne!(se, 0);
        *uses.entry(se).or_default() += 1;
    }
    assert!(uses.values().all(|&n| n == 1));
    // most edges of a closed skin are shared
    let shared = uses.keys().filter(|&&se| se < 0).count();
    assert!(shared > 0);
}

#[test]
fn vertices_are_unique() {
    let data = compile(&furnished_room()).data;
    let mut seen = std::collections::HashSet::new();
    for v in &data.vertices {
        assert!(seen.insert(v.map(f32::to_bits)));
    }
}

#[test]
fn every_model_gets_its_own_tree() {
    let compiled = compile(&furnished_room());
    let data = &compiled.data;
    assert_eq!(data.models.len(), 2);
    let door = data.models[1];
    assert_eq!(door.num_faces, 6);
    assert_eq!(door.first_face, data.models[0].num_faces);
    assert!(door.head_nodes[0] > 0);
    assert!(data.entities.contains("\"model\" \"*1\""));
    // every hull has its own clipnode root
    assert_ne!(door.head_nodes[1], door.head_nodes[2]);
    assert!(!data.clipnodes.is_empty());
}

// plane ids follow brush load order, which the rayon pool does not fix
#[cfg(not(feature = "parallel"))]
#[test]
fn output_is_deterministic() {
    let a = compile(&furnished_room()).data;
    let b = compile(&furnished_room()).data;
    assert_eq!(a, b);
}

#[test]
fn quake1_round_trip_keeps_tables() {
    let data = compile(&furnished_room()).data;
    for profile in [&BSP29 as &dyn FormatProfile, &BSP2] {
        let back = round_trip(&data, profile);
        assert_eq!(back.planes, data.planes);
        assert_eq!(back.vertices, data.vertices);
        assert_eq!(back.edges, data.edges);
        assert_eq!(back.surfedges, data.surfedges);
        assert_eq!(back.faces, data.faces);
        assert_eq!(back.clipnodes, data.clipnodes);
        assert_eq!(back.mark_surfaces, data.mark_surfaces);
        assert_eq!(back.models, data.models);
        assert_eq!(back.textures, data.textures);
        assert_eq!(back.entities, data.entities);
        assert_eq!(back.nodes.len(), data.nodes.len());
        for (a, b) in back.nodes.iter().zip(&data.nodes) {
            assert_eq!(a.children, b.children);
            assert_eq!(a.plane, b.plane);
        }
    }
}

#[test]
fn quake2_output_has_paired_planes_and_brushes() {
    let options = CompileOptions {
        target: Target::Quake2,
        ..CompileOptions::default()
    };
    let data = compile_with(&furnished_room(), options).data;
    assert_eq!(data.planes.len() % 2, 0);
    for pair in data.planes.chunks(2) {
        assert_eq!(pair[1].dist, -pair[0].dist);
    }
    // seven world brushes and the door
    assert_eq!(data.brushes.len(), 8);
    assert!(data.clipnodes.is_empty());

    let back = round_trip(&data, &QUAKE2);
    assert_eq!(back.planes, data.planes);
    assert_eq!(back.brushes, data.brushes);
    assert_eq!(back.brush_sides, data.brush_sides);
    assert_eq!(back.leaf_brushes, data.leaf_brushes);
    assert_eq!(back.faces, data.faces);
    assert_eq!(back.areas, data.areas);
}

#[test]
fn empty_world_gets_a_stand_in_node() {
    let options = CompileOptions {
        no_clip: true,
        ..CompileOptions::default()
    };
    let data = compile_with(&world("", ""), options).data;
    assert_eq!(data.nodes.len(), 1);
    assert_eq!(data.nodes[0].children[0], data.nodes[0].children[1]);
    assert_eq!(data.nodes[0].children[0], NodeRef::Leaf(0));
    assert!(data.faces.is_empty());
    // without clip hulls every hull shares the hull 0 root
    assert_eq!(data.models[0].head_nodes[..3], [0, 0, 0]);
}

#[test]
fn empty_world_without_noclip_fails() {
    let ctx = CompileContext::new(CompileOptions::default());
    let mut map = parse(&world("", ""));
    assert!(compile_map(&ctx, &mut map, None).is_err());
}

/// Contents the collision hull `hull` of `model` reports at `point`.
fn clip_contents_at(data: &BspData, model: usize, hull: usize, point: [f32; 3]) -> i32 {
    let mut current = ClipChild::Node(data.models[model].head_nodes[hull] as usize);
    loop {
        match current {
            ClipChild::Node(n) => {
                let node = data.clipnodes[n];
                current = node.children[usize::from(plane_side(data, node.plane, point) < 0.0)];
            },
            ClipChild::Contents(contents) => return contents,
        }
    }
}

/// Contents of the point hull leaf of `model` holding `point`.
fn leaf_contents_at(data: &BspData, model: usize, point: [f32; 3]) -> i32 {
    let mut current = NodeRef::Node(data.models[model].head_nodes[0] as usize);
    loop {
        match current {
            NodeRef::Node(n) => {
                let node = data.nodes[n];
                current = node.children[usize::from(plane_side(data, node.plane, point) < 0.0)];
            },
            NodeRef::Leaf(l) => return data.leaves[l].contents,
        }
    }
}

fn plane_side(data: &BspData, plane: u32, point: [f32; 3]) -> f32 {
    let plane = data.planes[plane as usize];
    plane.normal[0] * point[0] + plane.normal[1] * point[1] + plane.normal[2] * point[2]
        - plane.dist
}

#[test]
fn clip_hull_of_a_box_is_solid_inside() {
    let data = compile(&world(&box_brush([0.0; 3], [64.0; 3], "base"), "")).data;
    assert_eq!(clip_contents_at(&data, 0, 1, [32.0; 3]), -2);
}

/// A 256 room with a sky ceiling holding a pool, illusionary detail and a
/// clip brush.
fn room_with_every_brush_kind() -> String {
    let brushes = room_brushes([0.0; 3], [256.0; 3], 16.0, Some(5))
        + &box_brush([-16.0, -16.0, 256.0], [272.0, 272.0, 272.0], "sky1")
        + &box_brush([16.0, 16.0, 0.0], [96.0, 96.0, 64.0], "*water1")
        + &box_brush([160.0, 16.0, 0.0], [224.0, 48.0, 64.0], "clip");
    let extra = format!(
        "{{\n\"classname\" \"func_detail_illusionary\"\n{}}}\n{}",
        box_brush([160.0, 160.0, 0.0], [200.0, 200.0, 64.0], "vines"),
        point_entity("info_player_start", [128.0, 128.0, 128.0]),
    );
    world(&brushes, &extra)
}

#[test]
fn collision_hulls_are_only_solid_or_empty() {
    let compiled = compile(&room_with_every_brush_kind());
    assert!(compiled.leak.is_none());
    let data = &compiled.data;
    for node in &data.clipnodes {
        for child in node.children {
            if let ClipChild::Contents(contents) = child {
                assert!(contents == -1 || contents == -2, "clip leaf with contents {contents}");
            }
        }
    }

    for hull in 1..3 {
        // sky ceiling and clip brush block
        assert_eq!(clip_contents_at(data, 0, hull, [128.0, 128.0, 264.0]), -2);
        assert_eq!(clip_contents_at(data, 0, hull, [192.0, 32.0, 48.0]), -2);
        // water and illusionary detail don't
        assert_eq!(clip_contents_at(data, 0, hull, [56.0, 56.0, 60.0]), -1);
        assert_eq!(clip_contents_at(data, 0, hull, [180.0, 180.0, 60.0]), -1);
    }

    // the point hull sees the water and not the clip brush
    assert_eq!(leaf_contents_at(data, 0, [56.0, 56.0, 32.0]), -3);
    assert_eq!(leaf_contents_at(data, 0, [192.0, 32.0, 48.0]), -1);
    assert_eq!(leaf_contents_at(data, 0, [180.0, 180.0, 32.0]), -1);
}

#[test]
fn quake1_brush_models_are_solid() {
    let text = world(
        &room_brushes([0.0; 3], [256.0; 3], 16.0, None),
        &format!(
            "{{\n\"classname\" \"func_wall\"\n{}}}\n{}",
            box_brush([100.0, 180.0, 100.0], [140.0, 220.0, 140.0], "*water1"),
            point_entity("info_player_start", [128.0, 128.0, 64.0]),
        ),
    );
    let data = compile(&text).data;
    assert_eq!(data.models.len(), 2);
    assert_eq!(leaf_contents_at(&data, 1, [120.0, 200.0, 120.0]), -2);
    assert_eq!(clip_contents_at(&data, 1, 1, [120.0, 200.0, 120.0]), -2);
    assert_eq!(clip_contents_at(&data, 1, 2, [120.0, 200.0, 120.0]), -2);
    assert!(data.leaves.iter().all(|leaf| leaf.contents != -3));
}

#[test]
fn quake2_brush_models_keep_their_contents() {
    let text = world(
        &room_brushes([0.0; 3], [256.0; 3], 16.0, None),
        &format!(
            "{{\n\"classname\" \"func_water\"\n{}}}\n{}",
            box_brush([100.0, 180.0, 100.0], [140.0, 220.0, 140.0], "*water1"),
            point_entity("info_player_start", [128.0, 128.0, 64.0]),
        ),
    );
    let options = CompileOptions {
        target: Target::Quake2,
        ..Default::default()
    };
    let data = compile_with(&text, options).data;
    // Quake II water
    assert_eq!(leaf_contents_at(&data, 1, [120.0, 200.0, 120.0]), 0x20);
}

#[test]
fn clip_brushes_widen_the_model_bounds() {
    let text = world(
        &room_brushes([0.0; 3], [256.0; 3], 16.0, None),
        &format!(
            "{{\n\"classname\" \"func_wall\"\n{}{}}}\n{}",
            box_brush([100.0, 100.0, 0.0], [140.0, 140.0, 64.0], "wall"),
            box_brush([100.0, 100.0, 0.0], [140.0, 140.0, 128.0], "clip"),
            point_entity("info_player_start", [32.0, 32.0, 64.0]),
        ),
    );
    let data = compile(&text).data;
    let wall = data.models[1];
    assert_eq!(wall.num_faces, 6);
    assert_eq!(wall.mins, [100.0, 100.0, 0.0]);
    assert_eq!(wall.maxs, [140.0, 140.0, 128.0]);
}

#[test]
fn quake2_clusters_number_the_open_leaves() {
    let options = CompileOptions {
        target: Target::Quake2,
        ..Default::default()
    };
    let text = world(
        &(room_brushes([0.0; 3], [512.0, 256.0, 256.0], 16.0, None)
            + &box_brush([200.0, 100.0, 0.0], [232.0, 132.0, 256.0], "pillar")),
        &point_entity("info_player_start", [64.0, 64.0, 64.0]),
    );
    let data = compile_with(&text, options).data;
    let clusters: Vec<i32> = data
        .leaves
        .iter()
        .filter(|leaf| leaf.cluster >= 0)
        .map(|leaf| leaf.cluster)
        .collect();
    assert!(!clusters.is_empty());
    let expected: Vec<i32> = (0..clusters.len() as i32).collect();
    assert_eq!(clusters, expected);
}

#[test]
fn rotating_models_sit_on_their_target() {
    let text = world(
        &room_brushes([0.0; 3], [256.0; 3], 16.0, None),
        &format!(
            "{{\n\"classname\" \"rotate_object\"\n\"target\" \"pivot\"\n{}}}\n\
             {{\n\"classname\" \"info_rotate\"\n\"targetname\" \"pivot\"\n\"origin\" \"112 112 112\"\n}}\n{}",
            box_brush([96.0; 3], [128.0; 3], "wall"),
            point_entity("info_player_start", [32.0, 32.0, 64.0]),
        ),
    );
    let data = compile(&text).data;
    assert!(data.entities.contains("\"origin\" \"112 112 112\""));
    assert_eq!(data.models[1].mins, [-16.0; 3]);
    assert_eq!(data.models[1].maxs, [16.0; 3]);
}

#[test]
fn files_land_next_to_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = CompileContext::new(CompileOptions::default());

    let sealed = dir.path().join("sealed.bsp");
    let mut map = parse(&sealed_room());
    compile_map(&ctx, &mut map, Some(&sealed)).unwrap();
    let bytes = std::fs::read(&sealed).unwrap();
    assert_eq!(&bytes[..4], &[29, 0, 0, 0]);
    let prt = std::fs::read_to_string(dir.path().join("sealed.prt")).unwrap();
    assert!(prt.starts_with("PRT1\n"));

    let ctx = CompileContext::new(CompileOptions::default());
    let leaky = dir.path().join("leaky.bsp");
    let mut map = parse(&leaky_room());
    compile_map(&ctx, &mut map, Some(&leaky)).unwrap();
    assert!(!dir.path().join("leaky.prt").exists());
    let pts = std::fs::read_to_string(dir.path().join("leaky.pts")).unwrap();
    let first: Vec<Real> = pts
        .lines()
        .next()
        .unwrap()
        .split_whitespace()
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(first, vec![128.0, 128.0, 64.0]);
}

#[test]
fn bsp2_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.bsp");
    let ctx = CompileContext::new(CompileOptions {
        target: Target::Bsp2,
        ..CompileOptions::default()
    });
    let mut map = parse(&sealed_room());
    compile_map(&ctx, &mut map, Some(&path)).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"BSP2");
    let data = BspData::read(&bytes).unwrap();
    assert_eq!(data.faces.len(), 6);
}
