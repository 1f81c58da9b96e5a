//! Output format profiles.
//!
//! A profile describes one binary flavour: header, lump table, field widths,
//! collision hull sizes and contents values. The export stage only ever talks
//! to a `&dyn FormatProfile`.

use crate::contents::{Contents, Liquid};
use crate::errors::CompileError;
use crate::export::lumps::{
    BspData, DArea, DAreaPortal, DBrush, DBrushSide, DClipNode, DFace, DLeaf, DModel, DNode,
    DPlane, DTexInfo, LumpReader, LumpWriter, Width, assemble, decode_child, decode_clip_child,
    encode_child, encode_clip_child, read_directory,
};
use crate::float_types::Real;
use crate::map::{
    Q2_CONTENTS_AREAPORTAL, Q2_CONTENTS_DETAIL, Q2_CONTENTS_LAVA, Q2_CONTENTS_MIST,
    Q2_CONTENTS_MONSTERCLIP, Q2_CONTENTS_PLAYERCLIP, Q2_CONTENTS_SLIME, Q2_CONTENTS_SOLID,
    Q2_CONTENTS_TRANSLUCENT, Q2_CONTENTS_WATER, Q2_CONTENTS_WINDOW, q2_contents,
};
use std::fmt::Debug;

/// Collision box of one hull, relative to the entity origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullBox {
    pub mins: [Real; 3],
    pub maxs: [Real; 3],
}

impl HullBox {
    pub const POINT: HullBox = HullBox {
        mins: [0.0; 3],
        maxs: [0.0; 3],
    };
}

/// Integer widths of the fields that differ between format flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Widths {
    /// Node children
    pub node_child: Width,
    /// Node and leaf bounds stored as shorts instead of floats
    pub short_bounds: bool,
    /// Face ranges, mark surfaces and edge vertices
    pub index: Width,
    /// Face plane, side, edge count and texinfo
    pub face_field: Width,
    /// Clipnode children
    pub clip_child: Width,
}

/// One binary output flavour.
pub trait FormatProfile: Sync + Debug {
    fn name(&self) -> &'static str;

    /// Bytes every file of this flavour starts with
    fn header(&self) -> &'static [u8];

    fn lump_names(&self) -> &'static [&'static str];

    fn widths(&self) -> Widths;

    /// Hull boxes; index 0 is the point hull
    fn hulls(&self) -> &'static [HullBox];

    fn contents_value(&self, contents: Contents) -> i32;

    fn contents_from_value(&self, value: i32) -> Contents;

    /// Detail leaves are written as plain solid or empty
    fn resolves_detail(&self) -> bool;

    /// Every solid leaf collapses onto leaf 0
    fn shares_solid_leaf(&self) -> bool;

    /// Emits brush, brush side, leaf brush, area and area portal lumps
    fn has_brush_lists(&self) -> bool;

    /// Brush models may keep liquid and sky contents; otherwise every
    /// brush entity other than worldspawn is solid
    fn allows_contented_bmodels(&self) -> bool;

    /// Planes are written in pairs, the negated plane right after each one
    fn paired_planes(&self) -> bool;

    fn has_clipnodes(&self) -> bool {
        self.hulls().len() > 1
    }

    fn write(&self, data: &BspData) -> Result<Vec<u8>, CompileError>;

    fn read(&self, bytes: &[u8]) -> Result<BspData, CompileError>;
}

const QUAKE_HULLS: [HullBox; 3] = [
    HullBox::POINT,
    HullBox {
        mins: [-16.0, -16.0, -24.0],
        maxs: [16.0, 16.0, 32.0],
    },
    HullBox {
        mins: [-32.0, -32.0, -24.0],
        maxs: [32.0, 32.0, 64.0],
    },
];

const QUAKE2_HULLS: [HullBox; 1] = [HullBox::POINT];

const QUAKE_LUMPS: [&str; 15] = [
    "entities",
    "planes",
    "textures",
    "vertexes",
    "visibility",
    "nodes",
    "texinfo",
    "faces",
    "lighting",
    "clipnodes",
    "leafs",
    "marksurfaces",
    "edges",
    "surfedges",
    "models",
];

const QUAKE2_LUMPS: [&str; 19] = [
    "entities",
    "planes",
    "vertexes",
    "visibility",
    "nodes",
    "texinfo",
    "faces",
    "lighting",
    "leafs",
    "leaffaces",
    "leafbrushes",
    "edges",
    "surfedges",
    "models",
    "brushes",
    "brushsides",
    "pop",
    "areas",
    "areaportals",
];

// Quake I leaf contents
pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

/// Quake I family: version 29 and the 32-bit "BSP2" extension.
#[derive(Debug)]
pub struct QuakeProfile {
    name: &'static str,
    header: &'static [u8],
    widths: Widths,
}

pub static BSP29: QuakeProfile = QuakeProfile {
    name: "bsp29",
    header: &[29, 0, 0, 0],
    widths: Widths {
        node_child: Width::I16,
        short_bounds: true,
        index: Width::U16,
        face_field: Width::I16,
        clip_child: Width::I16,
    },
};

pub static BSP2: QuakeProfile = QuakeProfile {
    name: "bsp2",
    header: b"BSP2",
    widths: Widths {
        node_child: Width::I32,
        short_bounds: false,
        index: Width::U32,
        face_field: Width::I32,
        clip_child: Width::I32,
    },
};

/// Quake II, `IBSP` version 38.
#[derive(Debug)]
pub struct Quake2Profile;

pub static QUAKE2: Quake2Profile = Quake2Profile;

/// The profile whose header `bytes` starts with.
pub fn profile_for_header(bytes: &[u8]) -> Option<&'static dyn FormatProfile> {
    let profiles: [&'static dyn FormatProfile; 3] = [&BSP29, &BSP2, &QUAKE2];
    profiles
        .into_iter()
        .find(|p| bytes.starts_with(p.header()))
}

fn entities_lump(data: &BspData) -> Vec<u8> {
    let mut raw = data.entities.as_bytes().to_vec();
    raw.push(0);
    raw
}

fn read_entities(lump: &[u8]) -> String {
    let end = lump.iter().position(|&b| b == 0).unwrap_or(lump.len());
    String::from_utf8_lossy(&lump[..end]).into_owned()
}

fn planes_lump(data: &BspData) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for p in &data.planes {
        w.vec3(&p.normal)?;
        w.f32(p.dist)?;
        w.i32(p.ty)?;
    }
    Ok(w.bytes)
}

fn read_planes(lump: &[u8]) -> Result<Vec<DPlane>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut planes = Vec::new();
    while r.remaining() > 0 {
        planes.push(DPlane {
            normal: r.vec3()?,
            dist: r.f32()?,
            ty: r.i32()?,
        });
    }
    Ok(planes)
}

fn vertices_lump(data: &BspData) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for v in &data.vertices {
        w.vec3(v)?;
    }
    Ok(w.bytes)
}

fn read_vertices(lump: &[u8]) -> Result<Vec<[f32; 3]>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut vertices = Vec::new();
    while r.remaining() > 0 {
        vertices.push(r.vec3()?);
    }
    Ok(vertices)
}

fn edges_lump(data: &BspData, width: Width) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for e in &data.edges {
        w.int(width, e[0] as i64)?;
        w.int(width, e[1] as i64)?;
    }
    Ok(w.bytes)
}

fn read_edges(lump: &[u8], width: Width) -> Result<Vec<[u32; 2]>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut edges = Vec::new();
    while r.remaining() > 0 {
        edges.push([r.int(width)? as u32, r.int(width)? as u32]);
    }
    Ok(edges)
}

fn int_list_lump(values: &[u32], width: Width) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for &v in values {
        w.int(width, v as i64)?;
    }
    Ok(w.bytes)
}

fn read_int_list(lump: &[u8], width: Width) -> Result<Vec<u32>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut values = Vec::new();
    while r.remaining() > 0 {
        values.push(r.int(width)? as u32);
    }
    Ok(values)
}

fn surfedges_lump(data: &BspData) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for &se in &data.surfedges {
        w.i32(se)?;
    }
    Ok(w.bytes)
}

fn read_surfedges(lump: &[u8]) -> Result<Vec<i32>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut surfedges = Vec::new();
    while r.remaining() > 0 {
        surfedges.push(r.i32()?);
    }
    Ok(surfedges)
}

fn faces_lump(data: &BspData, plane: Width, field: Width) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for f in &data.faces {
        w.int(plane, f.plane as i64)?;
        w.int(field, f.side as i64)?;
        w.int(Width::I32, f.first_edge as i64)?;
        w.int(field, f.num_edges as i64)?;
        w.int(field, f.texinfo as i64)?;
        w.bytes(&f.styles);
        w.i32(f.light_ofs)?;
    }
    Ok(w.bytes)
}

fn read_faces(lump: &[u8], plane: Width, field: Width) -> Result<Vec<DFace>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut faces = Vec::new();
    while r.remaining() > 0 {
        let plane = r.int(plane)? as u32;
        let side = r.int(field)? != 0;
        let first_edge = r.int(Width::I32)? as u32;
        let num_edges = r.int(field)? as u32;
        let texinfo = r.int(field)? as u32;
        let styles = r.array4()?;
        faces.push(DFace {
            plane,
            side,
            first_edge,
            num_edges,
            texinfo,
            styles,
            light_ofs: r.i32()?,
        });
    }
    Ok(faces)
}

fn models_lump(data: &BspData, hulls: usize) -> Result<Vec<u8>, CompileError> {
    let mut w = LumpWriter::default();
    for m in &data.models {
        w.vec3(&m.mins)?;
        w.vec3(&m.maxs)?;
        w.vec3(&m.origin)?;
        for &h in &m.head_nodes[..hulls] {
            w.i32(h)?;
        }
        if hulls > 1 {
            w.i32(m.vis_leafs)?;
        }
        w.int(Width::I32, m.first_face as i64)?;
        w.int(Width::I32, m.num_faces as i64)?;
    }
    Ok(w.bytes)
}

fn read_models(lump: &[u8], hulls: usize) -> Result<Vec<DModel>, CompileError> {
    let mut r = LumpReader::new(lump);
    let mut models = Vec::new();
    while r.remaining() > 0 {
        let mut m = DModel {
            mins: r.vec3()?,
            maxs: r.vec3()?,
            origin: r.vec3()?,
            ..Default::default()
        };
        for h in m.head_nodes[..hulls].iter_mut() {
            *h = r.i32()?;
        }
        if hulls > 1 {
            m.vis_leafs = r.i32()?;
        }
        m.first_face = r.i32()? as u32;
        m.num_faces = r.i32()? as u32;
        models.push(m);
    }
    Ok(models)
}

impl QuakeProfile {
    fn textures_lump(data: &BspData) -> Result<Vec<u8>, CompileError> {
        const MIPTEX_SIZE: usize = 40;
        let mut w = LumpWriter::default();
        let count = data.textures.len();
        w.int(Width::I32, count as i64)?;
        for i in 0..count {
            w.int(Width::I32, (4 + 4 * count + MIPTEX_SIZE * i) as i64)?;
        }
        // headers only, no image data
        for name in &data.textures {
            w.name(name, 16);
            w.int(Width::U32, 16)?;
            w.int(Width::U32, 16)?;
            for _ in 0..4 {
                w.int(Width::U32, 0)?;
            }
        }
        Ok(w.bytes)
    }

    fn read_textures(lump: &[u8]) -> Result<Vec<String>, CompileError> {
        if lump.is_empty() {
            return Ok(Vec::new());
        }
        let mut r = LumpReader::new(lump);
        let count = r.i32()?.max(0) as usize;
        let offsets: Vec<i32> = (0..count).map(|_| r.i32()).collect::<Result<_, _>>()?;
        offsets
            .into_iter()
            .map(|ofs| {
                if ofs < 0 {
                    return Ok(String::new());
                }
                let raw = lump
                    .get(ofs as usize..)
                    .ok_or_else(|| CompileError::Format("miptex offset out of range".into()))?;
                LumpReader::new(raw).name(16)
            })
            .collect()
    }
}

impl FormatProfile for QuakeProfile {
    fn name(&self) -> &'static str {
        self.name
    }

    fn header(&self) -> &'static [u8] {
        self.header
    }

    fn lump_names(&self) -> &'static [&'static str] {
        &QUAKE_LUMPS
    }

    fn widths(&self) -> Widths {
        self.widths
    }

    fn hulls(&self) -> &'static [HullBox] {
        &QUAKE_HULLS
    }

    fn contents_value(&self, contents: Contents) -> i32 {
        match contents {
            Contents::Empty
            | Contents::AreaPortal
            | Contents::DetailIllusionary
            | Contents::DetailFence => CONTENTS_EMPTY,
            Contents::Solid | Contents::DetailSolid | Contents::Clip => CONTENTS_SOLID,
            Contents::Liquid(Liquid::Water) => CONTENTS_WATER,
            Contents::Liquid(Liquid::Slime) => CONTENTS_SLIME,
            Contents::Liquid(Liquid::Lava) => CONTENTS_LAVA,
            Contents::Sky => CONTENTS_SKY,
        }
    }

    fn contents_from_value(&self, value: i32) -> Contents {
        match value {
            CONTENTS_EMPTY => Contents::Empty,
            CONTENTS_WATER => Contents::Liquid(Liquid::Water),
            CONTENTS_SLIME => Contents::Liquid(Liquid::Slime),
            CONTENTS_LAVA => Contents::Liquid(Liquid::Lava),
            CONTENTS_SKY => Contents::Sky,
            _ => Contents::Solid,
        }
    }

    fn resolves_detail(&self) -> bool {
        true
    }

    fn shares_solid_leaf(&self) -> bool {
        true
    }

    fn has_brush_lists(&self) -> bool {
        false
    }

    fn allows_contented_bmodels(&self) -> bool {
        false
    }

    fn paired_planes(&self) -> bool {
        false
    }

    fn write(&self, data: &BspData) -> Result<Vec<u8>, CompileError> {
        let wd = self.widths;

        let mut nodes = LumpWriter::default();
        for n in &data.nodes {
            nodes.int(Width::I32, n.plane as i64)?;
            for &c in &n.children {
                nodes.int(wd.node_child, encode_child(c))?;
            }
            nodes.bounds(&n.mins, &n.maxs, wd.short_bounds)?;
            nodes.int(wd.index, n.first_face as i64)?;
            nodes.int(wd.index, n.num_faces as i64)?;
        }

        let mut texinfo = LumpWriter::default();
        for t in &data.texinfos {
            for row in &t.vecs {
                for &v in row {
                    texinfo.f32(v)?;
                }
            }
            texinfo.int(Width::I32, t.miptex as i64)?;
            texinfo.i32(t.flags)?;
        }

        let mut clipnodes = LumpWriter::default();
        for c in &data.clipnodes {
            clipnodes.int(Width::I32, c.plane as i64)?;
            for &child in &c.children {
                clipnodes.int(wd.clip_child, encode_clip_child(child))?;
            }
        }

        let mut leaves = LumpWriter::default();
        for l in &data.leaves {
            leaves.i32(l.contents)?;
            leaves.i32(l.vis_ofs)?;
            leaves.bounds(&l.mins, &l.maxs, wd.short_bounds)?;
            leaves.int(wd.index, l.first_mark_surface as i64)?;
            leaves.int(wd.index, l.num_mark_surfaces as i64)?;
            leaves.bytes(&l.ambient);
        }

        let lumps = vec![
            entities_lump(data),
            planes_lump(data)?,
            Self::textures_lump(data)?,
            vertices_lump(data)?,
            Vec::new(),
            nodes.bytes,
            texinfo.bytes,
            faces_lump(data, wd.face_field, wd.face_field)?,
            Vec::new(),
            clipnodes.bytes,
            leaves.bytes,
            int_list_lump(&data.mark_surfaces, wd.index)?,
            edges_lump(data, wd.index)?,
            surfedges_lump(data)?,
            models_lump(data, 4)?,
        ];
        assemble(self.header, &lumps)
    }

    fn read(&self, bytes: &[u8]) -> Result<BspData, CompileError> {
        if !bytes.starts_with(self.header) {
            return Err(CompileError::Format(format!("not a {} file", self.name)));
        }
        let wd = self.widths;
        let lumps = read_directory(bytes, self.header.len(), QUAKE_LUMPS.len())?;

        let mut nodes = Vec::new();
        let mut r = LumpReader::new(lumps[5]);
        while r.remaining() > 0 {
            let plane = r.int(Width::I32)? as u32;
            let children = [
                decode_child(r.int(wd.node_child)?),
                decode_child(r.int(wd.node_child)?),
            ];
            let (mins, maxs) = r.bounds(wd.short_bounds)?;
            nodes.push(DNode {
                plane,
                children,
                mins,
                maxs,
                first_face: r.int(wd.index)? as u32,
                num_faces: r.int(wd.index)? as u32,
            });
        }

        let mut texinfos = Vec::new();
        let mut r = LumpReader::new(lumps[6]);
        while r.remaining() > 0 {
            let mut t = DTexInfo::default();
            for row in t.vecs.iter_mut() {
                for v in row.iter_mut() {
                    *v = r.f32()?;
                }
            }
            t.miptex = r.i32()? as u32;
            t.flags = r.i32()?;
            texinfos.push(t);
        }

        let mut clipnodes = Vec::new();
        let mut r = LumpReader::new(lumps[9]);
        while r.remaining() > 0 {
            let plane = r.int(Width::I32)? as u32;
            let children = [
                decode_clip_child(r.int(wd.clip_child)?),
                decode_clip_child(r.int(wd.clip_child)?),
            ];
            clipnodes.push(DClipNode { plane, children });
        }

        let mut leaves = Vec::new();
        let mut r = LumpReader::new(lumps[10]);
        while r.remaining() > 0 {
            let contents = r.i32()?;
            let vis_ofs = r.i32()?;
            let (mins, maxs) = r.bounds(wd.short_bounds)?;
            let first_mark_surface = r.int(wd.index)? as u32;
            let num_mark_surfaces = r.int(wd.index)? as u32;
            let ambient = r.array4()?;
            leaves.push(DLeaf {
                contents,
                vis_ofs,
                mins,
                maxs,
                first_mark_surface,
                num_mark_surfaces,
                ambient,
                ..Default::default()
            });
        }

        Ok(BspData {
            entities: read_entities(lumps[0]),
            planes: read_planes(lumps[1])?,
            textures: Self::read_textures(lumps[2])?,
            vertices: read_vertices(lumps[3])?,
            nodes,
            texinfos,
            faces: read_faces(lumps[7], wd.face_field, wd.face_field)?,
            clipnodes,
            leaves,
            mark_surfaces: read_int_list(lumps[11], wd.index)?,
            edges: read_edges(lumps[12], wd.index)?,
            surfedges: read_surfedges(lumps[13])?,
            models: read_models(lumps[14], 4)?,
            ..Default::default()
        })
    }
}

impl FormatProfile for Quake2Profile {
    fn name(&self) -> &'static str {
        "quake2"
    }

    fn header(&self) -> &'static [u8] {
        b"IBSP\x26\0\0\0"
    }

    fn lump_names(&self) -> &'static [&'static str] {
        &QUAKE2_LUMPS
    }

    fn widths(&self) -> Widths {
        Widths {
            node_child: Width::I32,
            short_bounds: true,
            index: Width::U16,
            face_field: Width::I16,
            clip_child: Width::I32,
        }
    }

    fn hulls(&self) -> &'static [HullBox] {
        &QUAKE2_HULLS
    }

    fn contents_value(&self, contents: Contents) -> i32 {
        match contents {
            Contents::Empty => 0,
            Contents::AreaPortal => Q2_CONTENTS_AREAPORTAL,
            Contents::DetailIllusionary => Q2_CONTENTS_MIST | Q2_CONTENTS_DETAIL,
            Contents::Liquid(Liquid::Water) => Q2_CONTENTS_WATER,
            Contents::Liquid(Liquid::Slime) => Q2_CONTENTS_SLIME,
            Contents::Liquid(Liquid::Lava) => Q2_CONTENTS_LAVA,
            Contents::DetailFence => {
                Q2_CONTENTS_WINDOW | Q2_CONTENTS_DETAIL | Q2_CONTENTS_TRANSLUCENT
            },
            Contents::DetailSolid => Q2_CONTENTS_SOLID | Q2_CONTENTS_DETAIL,
            Contents::Sky | Contents::Solid => Q2_CONTENTS_SOLID,
            Contents::Clip => Q2_CONTENTS_PLAYERCLIP | Q2_CONTENTS_MONSTERCLIP,
        }
    }

    fn contents_from_value(&self, value: i32) -> Contents {
        if value == 0 {
            Contents::Empty
        } else {
            q2_contents(value)
        }
    }

    fn resolves_detail(&self) -> bool {
        false
    }

    fn shares_solid_leaf(&self) -> bool {
        false
    }

    fn has_brush_lists(&self) -> bool {
        true
    }

    fn allows_contented_bmodels(&self) -> bool {
        true
    }

    fn paired_planes(&self) -> bool {
        true
    }

    fn write(&self, data: &BspData) -> Result<Vec<u8>, CompileError> {
        let mut nodes = LumpWriter::default();
        for n in &data.nodes {
            nodes.int(Width::I32, n.plane as i64)?;
            for &c in &n.children {
                nodes.int(Width::I32, encode_child(c))?;
            }
            nodes.bounds(&n.mins, &n.maxs, true)?;
            nodes.int(Width::U16, n.first_face as i64)?;
            nodes.int(Width::U16, n.num_faces as i64)?;
        }

        let mut texinfo = LumpWriter::default();
        for t in &data.texinfos {
            for row in &t.vecs {
                for &v in row {
                    texinfo.f32(v)?;
                }
            }
            texinfo.i32(t.flags)?;
            texinfo.i32(t.value)?;
            texinfo.name(&t.texture, 32);
            texinfo.i32(t.next)?;
        }

        let mut leaves = LumpWriter::default();
        for l in &data.leaves {
            leaves.i32(l.contents)?;
            leaves.int(Width::I16, l.cluster as i64)?;
            leaves.int(Width::I16, l.area as i64)?;
            leaves.bounds(&l.mins, &l.maxs, true)?;
            leaves.int(Width::U16, l.first_mark_surface as i64)?;
            leaves.int(Width::U16, l.num_mark_surfaces as i64)?;
            leaves.int(Width::U16, l.first_leaf_brush as i64)?;
            leaves.int(Width::U16, l.num_leaf_brushes as i64)?;
        }

        let mut brushes = LumpWriter::default();
        for b in &data.brushes {
            brushes.int(Width::I32, b.first_side as i64)?;
            brushes.int(Width::I32, b.num_sides as i64)?;
            brushes.i32(b.contents)?;
        }

        let mut sides = LumpWriter::default();
        for s in &data.brush_sides {
            sides.int(Width::U16, s.plane as i64)?;
            sides.int(Width::I16, s.texinfo as i64)?;
        }

        let mut areas = LumpWriter::default();
        for a in &data.areas {
            areas.int(Width::I32, a.num_portals as i64)?;
            areas.int(Width::I32, a.first_portal as i64)?;
        }

        let mut area_portals = LumpWriter::default();
        for p in &data.area_portals {
            area_portals.int(Width::I32, p.portal_num as i64)?;
            area_portals.int(Width::I32, p.other_area as i64)?;
        }

        let lumps = vec![
            entities_lump(data),
            planes_lump(data)?,
            vertices_lump(data)?,
            Vec::new(),
            nodes.bytes,
            texinfo.bytes,
            faces_lump(data, Width::U16, Width::I16)?,
            Vec::new(),
            leaves.bytes,
            int_list_lump(&data.mark_surfaces, Width::U16)?,
            int_list_lump(&data.leaf_brushes, Width::U16)?,
            edges_lump(data, Width::U16)?,
            surfedges_lump(data)?,
            models_lump(data, 1)?,
            brushes.bytes,
            sides.bytes,
            Vec::new(),
            areas.bytes,
            area_portals.bytes,
        ];
        assemble(self.header(), &lumps)
    }

    fn read(&self, bytes: &[u8]) -> Result<BspData, CompileError> {
        if !bytes.starts_with(self.header()) {
            return Err(CompileError::Format("not a Quake II BSP file".to_string()));
        }
        let lumps = read_directory(bytes, self.header().len(), QUAKE2_LUMPS.len())?;

        let mut nodes = Vec::new();
        let mut r = LumpReader::new(lumps[4]);
        while r.remaining() > 0 {
            let plane = r.int(Width::I32)? as u32;
            let children = [
                decode_child(r.int(Width::I32)?),
                decode_child(r.int(Width::I32)?),
            ];
            let (mins, maxs) = r.bounds(true)?;
            nodes.push(DNode {
                plane,
                children,
                mins,
                maxs,
                first_face: r.int(Width::U16)? as u32,
                num_faces: r.int(Width::U16)? as u32,
            });
        }

        let mut texinfos = Vec::new();
        let mut r = LumpReader::new(lumps[5]);
        while r.remaining() > 0 {
            let mut t = DTexInfo::default();
            for row in t.vecs.iter_mut() {
                for v in row.iter_mut() {
                    *v = r.f32()?;
                }
            }
            t.flags = r.i32()?;
            t.value = r.i32()?;
            t.texture = r.name(32)?;
            t.next = r.i32()?;
            texinfos.push(t);
        }

        let mut leaves = Vec::new();
        let mut r = LumpReader::new(lumps[8]);
        while r.remaining() > 0 {
            let contents = r.i32()?;
            let cluster = r.int(Width::I16)? as i32;
            let area = r.int(Width::I16)? as i32;
            let (mins, maxs) = r.bounds(true)?;
            leaves.push(DLeaf {
                contents,
                vis_ofs: -1,
                cluster,
                area,
                mins,
                maxs,
                first_mark_surface: r.int(Width::U16)? as u32,
                num_mark_surfaces: r.int(Width::U16)? as u32,
                first_leaf_brush: r.int(Width::U16)? as u32,
                num_leaf_brushes: r.int(Width::U16)? as u32,
                ambient: [0; 4],
            });
        }

        let mut brushes = Vec::new();
        let mut r = LumpReader::new(lumps[14]);
        while r.remaining() > 0 {
            brushes.push(DBrush {
                first_side: r.i32()? as u32,
                num_sides: r.i32()? as u32,
                contents: r.i32()?,
            });
        }

        let mut brush_sides = Vec::new();
        let mut r = LumpReader::new(lumps[15]);
        while r.remaining() > 0 {
            brush_sides.push(DBrushSide {
                plane: r.int(Width::U16)? as u32,
                texinfo: r.int(Width::I16)? as i32,
            });
        }

        let mut areas = Vec::new();
        let mut r = LumpReader::new(lumps[17]);
        while r.remaining() > 0 {
            areas.push(DArea {
                num_portals: r.i32()? as u32,
                first_portal: r.i32()? as u32,
            });
        }

        let mut area_portals = Vec::new();
        let mut r = LumpReader::new(lumps[18]);
        while r.remaining() > 0 {
            area_portals.push(DAreaPortal {
                portal_num: r.i32()? as u32,
                other_area: r.i32()? as u32,
            });
        }

        Ok(BspData {
            entities: read_entities(lumps[0]),
            planes: read_planes(lumps[1])?,
            vertices: read_vertices(lumps[2])?,
            nodes,
            texinfos,
            faces: read_faces(lumps[6], Width::U16, Width::I16)?,
            leaves,
            mark_surfaces: read_int_list(lumps[9], Width::U16)?,
            leaf_brushes: read_int_list(lumps[10], Width::U16)?,
            edges: read_edges(lumps[11], Width::U16)?,
            surfedges: read_surfedges(lumps[12])?,
            models: read_models(lumps[13], 1)?,
            brushes,
            brush_sides,
            areas,
            area_portals,
            ..Default::default()
        })
    }
}
