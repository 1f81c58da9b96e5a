//! Hull/Export stage: finished trees to output tables.
//!
//! [`BspBuilder`] assigns every output index in depth-first order, front
//! child first, so the same trees always produce the same file. Planes,
//! vertices, edges and texinfos are deduplicated across all models of one
//! file; the binary layout is left to a [`FormatProfile`].

pub mod format;
pub mod leakfile;
pub mod lumps;
pub mod obj;
pub mod prt;

pub use format::{BSP2, BSP29, FormatProfile, HullBox, QUAKE2};
pub use lumps::BspData;

use crate::areas::AreaMap;
use crate::brush::{Brush, add_bevels};
use crate::bsp::{FaceRef, NodeRef, Tree};
use crate::context::CompileContext;
use crate::csg::Face;
use crate::errors::CompileError;
use crate::float_types::{Bounds, Real, bounds_is_empty};
use crate::map::{Entity, TextureClass, classify_texture};
use crate::plane::{Plane, PlaneId, PlaneRef};
use hashbrown::HashMap;
use lumps::{
    ClipChild, DArea, DAreaPortal, DBrush, DBrushSide, DClipNode, DFace, DLeaf, DModel, DNode,
    DPlane, DTexInfo,
};
use nalgebra::{Point3, Vector3};
use std::path::Path;

/// Quake I texinfo flag for warped and sky surfaces.
const TEX_SPECIAL: i32 = 1;

/// Where one model ended up in the output tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelExport {
    pub model: usize,
    /// Output leaf of every tree leaf
    pub leaf_map: Vec<usize>,
    /// Leaves written for this model, not counting the shared solid leaf
    pub vis_leafs: usize,
}

/// Per-model bookkeeping while a tree is written.
struct ModelState<'t> {
    tree: &'t Tree,
    face_map: HashMap<FaceRef, u32>,
    leaf_map: Vec<usize>,
    vis_leafs: usize,
    /// Next Quake II cluster; opaque leaves take none
    clusters: usize,
    brush_base: Option<usize>,
    areas: Option<&'t AreaMap>,
}

fn to_f32(v: &Vector3<Real>) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}

fn bounds_f32(bounds: &Bounds) -> ([f32; 3], [f32; 3]) {
    if bounds_is_empty(bounds) {
        ([0.0; 3], [0.0; 3])
    } else {
        (to_f32(&bounds.mins.coords), to_f32(&bounds.maxs.coords))
    }
}

fn dplane(plane: &Plane) -> DPlane {
    DPlane {
        normal: to_f32(&plane.normal),
        dist: plane.dist as f32,
        ty: plane.plane_type().value(),
    }
}

/// Serialize entities in `.map` key/value syntax.
pub fn entities_text(entities: &[Entity]) -> String {
    let mut text = String::new();
    for entity in entities {
        text.push_str("{\n");
        for (key, value) in &entity.pairs {
            text.push_str(&format!("\"{key}\" \"{value}\"\n"));
        }
        text.push_str("}\n");
    }
    text
}

/// Accumulates every model of one output file.
pub struct BspBuilder<'a> {
    ctx: &'a CompileContext,
    profile: &'static dyn FormatProfile,
    data: BspData,
    plane_map: HashMap<PlaneId, u32>,
    vertex_map: HashMap<[u32; 3], u32>,
    /// Edges used once so far, keyed by (start, end)
    open_edges: HashMap<(u32, u32), usize>,
    texinfo_map: HashMap<usize, u32>,
    texture_map: HashMap<String, u32>,
}

impl<'a> BspBuilder<'a> {
    pub fn new(ctx: &'a CompileContext, profile: &'static dyn FormatProfile) -> Self {
        let mut data = BspData::default();
        // edge 0 can't be negated, so nothing may use it
        data.edges.push([0, 0]);
        // leaf 0 is the shared solid leaf
        data.leaves.push(DLeaf {
            contents: profile.contents_value(crate::contents::Contents::Solid),
            vis_ofs: -1,
            cluster: -1,
            ..Default::default()
        });
        if profile.has_brush_lists() {
            data.areas.push(DArea::default());
            data.area_portals.push(DAreaPortal::default());
        }
        BspBuilder {
            ctx,
            profile,
            data,
            plane_map: HashMap::new(),
            vertex_map: HashMap::new(),
            open_edges: HashMap::new(),
            texinfo_map: HashMap::new(),
            texture_map: HashMap::new(),
        }
    }

    pub fn profile(&self) -> &'static dyn FormatProfile {
        self.profile
    }

    pub fn data(&self) -> &BspData {
        &self.data
    }

    /// Output index of a canonical plane. Paired profiles store the negated
    /// plane right after it.
    fn plane_index(&mut self, id: PlaneId) -> u32 {
        if let Some(&index) = self.plane_map.get(&id) {
            return index;
        }
        let plane = self.ctx.planes.canonical(id);
        let index = self.data.planes.len() as u32;
        self.data.planes.push(dplane(&plane));
        if self.profile.paired_planes() {
            self.data.planes.push(dplane(&plane.flipped()));
        }
        self.plane_map.insert(id, index);
        index
    }

    /// Output index of an oriented plane in a paired profile.
    fn side_plane_index(&mut self, plane: PlaneRef) -> u32 {
        let base = self.plane_index(plane.id);
        if self.profile.paired_planes() && plane.flipped {
            base + 1
        } else {
            base
        }
    }

    fn vertex_index(&mut self, p: &Point3<Real>) -> u32 {
        // + 0.0 folds negative zero into zero
        let v = [p.x as f32 + 0.0, p.y as f32 + 0.0, p.z as f32 + 0.0];
        let key = [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()];
        *self.vertex_map.entry(key).or_insert_with(|| {
            self.data.vertices.push(v);
            (self.data.vertices.len() - 1) as u32
        })
    }

    /// Signed surfedge for the edge `a`-`b`. A second face walking the same
    /// edge backwards reuses it negated; after that the edge is closed.
    fn edge(&mut self, a: u32, b: u32) -> i32 {
        if let Some(index) = self.open_edges.remove(&(b, a)) {
            return -(index as i32);
        }
        let index = self.data.edges.len();
        self.data.edges.push([a, b]);
        self.open_edges.insert((a, b), index);
        index as i32
    }

    fn texture_index(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.texture_map.get(name) {
            return index;
        }
        let index = self.data.textures.len() as u32;
        self.data.textures.push(name.to_string());
        self.texture_map.insert(name.to_string(), index);
        index
    }

    fn texinfo_index(&mut self, texinfo: usize) -> u32 {
        if let Some(&index) = self.texinfo_map.get(&texinfo) {
            return index;
        }
        let source = self.ctx.texinfos.get(texinfo);
        let vecs = source.vecs.map(|row| row.map(|v| v as f32));
        let out = if self.profile.has_brush_lists() {
            DTexInfo {
                vecs,
                miptex: 0,
                flags: source.flags,
                value: source.value,
                texture: source.texture.clone(),
                next: -1,
            }
        } else {
            let special = matches!(
                classify_texture(&source.texture),
                TextureClass::Sky | TextureClass::Liquid(_)
            );
            DTexInfo {
                vecs,
                miptex: self.texture_index(&source.texture),
                flags: if special { TEX_SPECIAL } else { 0 },
                texture: source.texture.clone(),
                ..Default::default()
            }
        };
        let index = self.data.texinfos.len() as u32;
        self.data.texinfos.push(out);
        self.texinfo_map.insert(texinfo, index);
        index
    }

    /// Write one face. Degenerate faces (fewer than three distinct output
    /// vertices) are skipped.
    fn emit_face(&mut self, face: &Face) -> Option<u32> {
        let mut verts: Vec<u32> = Vec::with_capacity(face.winding.len());
        for p in &face.winding.points {
            let v = self.vertex_index(p);
            if verts.last() != Some(&v) {
                verts.push(v);
            }
        }
        while verts.len() > 1 && verts.first() == verts.last() {
            verts.pop();
        }
        if verts.len() < 3 {
            log::debug!("face collapsed to {} vertices, skipped", verts.len());
            return None;
        }

        let first_edge = self.data.surfedges.len() as u32;
        for i in 0..verts.len() {
            let se = self.edge(verts[i], verts[(i + 1) % verts.len()]);
            self.data.surfedges.push(se);
        }
        let index = self.data.faces.len() as u32;
        let plane = self.plane_index(face.plane.id);
        let texinfo = self.texinfo_index(face.texinfo);
        self.data.faces.push(DFace {
            plane,
            side: face.plane.flipped,
            first_edge,
            num_edges: verts.len() as u32,
            texinfo,
            styles: [255; 4],
            light_ofs: -1,
        });
        Some(index)
    }

    fn emit_leaf(&mut self, state: &mut ModelState, leaf: usize) -> NodeRef {
        let tree = state.tree;
        let source = &tree.leaves[leaf];
        if self.profile.shares_solid_leaf() && source.contents.is_solid() {
            state.leaf_map[leaf] = 0;
            return NodeRef::Leaf(0);
        }

        let first_mark_surface = self.data.mark_surfaces.len() as u32;
        for face_ref in &source.mark_faces {
            if let Some(&face) = state.face_map.get(face_ref) {
                self.data.mark_surfaces.push(face);
            }
        }
        let first_leaf_brush = self.data.leaf_brushes.len() as u32;
        if let Some(base) = state.brush_base {
            self.data
                .leaf_brushes
                .extend(source.brushes.iter().map(|&b| (base + b) as u32));
        }

        let cluster = if !self.profile.has_brush_lists() {
            0
        } else if source.contents.is_opaque() {
            -1
        } else {
            state.clusters += 1;
            state.clusters as i32 - 1
        };
        let area = state.areas.map_or(0, |a| a.leaf_area[leaf] as i32);
        let (mins, maxs) = bounds_f32(&source.bounds);

        let index = self.data.leaves.len();
        self.data.leaves.push(DLeaf {
            contents: self.profile.contents_value(source.contents),
            vis_ofs: -1,
            cluster,
            area,
            mins,
            maxs,
            first_mark_surface,
            num_mark_surfaces: self.data.mark_surfaces.len() as u32 - first_mark_surface,
            first_leaf_brush,
            num_leaf_brushes: self.data.leaf_brushes.len() as u32 - first_leaf_brush,
            ambient: [0; 4],
        });
        state.leaf_map[leaf] = index;
        state.vis_leafs += 1;
        NodeRef::Leaf(index)
    }

    fn emit_node(&mut self, state: &mut ModelState, current: NodeRef) -> NodeRef {
        let n = match current {
            NodeRef::Leaf(leaf) => return self.emit_leaf(state, leaf),
            NodeRef::Node(n) => n,
        };
        let tree = state.tree;
        let node = &tree.nodes[n];
        let keep_skip = self.ctx.options.no_skip;

        let first_face = self.data.faces.len() as u32;
        for (f, face) in node.faces.iter().enumerate() {
            if !face.is_visible(keep_skip) {
                continue;
            }
            if let Some(index) = self.emit_face(face) {
                state.face_map.insert(FaceRef { node: n, face: f }, index);
            }
        }
        let num_faces = self.data.faces.len() as u32 - first_face;

        let index = self.data.nodes.len();
        let (mins, maxs) = bounds_f32(&node.bounds);
        let plane = self.plane_index(node.plane);
        self.data.nodes.push(DNode {
            plane,
            children: [NodeRef::Leaf(0); 2],
            mins,
            maxs,
            first_face,
            num_faces,
        });
        let front = self.emit_node(state, node.children[0]);
        let back = self.emit_node(state, node.children[1]);
        self.data.nodes[index].children = [front, back];
        NodeRef::Node(index)
    }

    /// Plane of the stand-in node of a single-leaf model.
    fn dummy_plane(&mut self) -> u32 {
        let plane = self.ctx.planes.find_or_insert(&Plane {
            normal: Vector3::z(),
            dist: 0.0,
        });
        self.plane_index(plane.id)
    }

    /// Write the hull 0 tree of one model: faces, nodes, leaves and mark
    /// surfaces. `brush_base` is the first output brush of the model's brush
    /// list when the profile carries one.
    pub fn add_model_faces(
        &mut self,
        tree: &Tree,
        origin: Option<Point3<Real>>,
        brush_base: Option<usize>,
        areas: Option<&AreaMap>,
    ) -> Result<ModelExport, CompileError> {
        let mut state = ModelState {
            tree,
            face_map: HashMap::new(),
            leaf_map: vec![0; tree.leaves.len()],
            vis_leafs: 0,
            clusters: 0,
            brush_base,
            areas,
        };
        let first_face = self.data.faces.len() as u32;

        let head = match tree.head {
            NodeRef::Node(_) => self.emit_node(&mut state, tree.head),
            NodeRef::Leaf(leaf) => {
                let child = self.emit_leaf(&mut state, leaf);
                let plane = self.dummy_plane();
                let (mins, maxs) = bounds_f32(&tree.bounds);
                self.data.nodes.push(DNode {
                    plane,
                    children: [child, child],
                    mins,
                    maxs,
                    first_face,
                    num_faces: 0,
                });
                NodeRef::Node(self.data.nodes.len() - 1)
            },
        };
        let NodeRef::Node(head) = head else {
            return Err(CompileError::Format("model head is not a node".to_string()));
        };

        let (mins, maxs) = bounds_f32(&tree.bounds);
        let model = self.data.models.len();
        self.data.models.push(DModel {
            mins,
            maxs,
            origin: origin.map_or([0.0; 3], |o| to_f32(&o.coords)),
            head_nodes: [head as i32, 0, 0, 0],
            vis_leafs: state.vis_leafs as i32,
            first_face,
            num_faces: self.data.faces.len() as u32 - first_face,
        });
        log::debug!(
            "model {model}: {} faces, {} leaves",
            self.data.faces.len() as u32 - first_face,
            state.vis_leafs
        );

        Ok(ModelExport {
            model,
            leaf_map: state.leaf_map,
            vis_leafs: state.vis_leafs,
        })
    }

    /// Grow a model's bounds, for geometry that has no faces in hull 0.
    pub fn extend_model_bounds(&mut self, model: usize, bounds: &Bounds) -> Result<(), CompileError> {
        if bounds_is_empty(bounds) {
            return Ok(());
        }
        let (mins, maxs) = bounds_f32(bounds);
        let out = self
            .data
            .models
            .get_mut(model)
            .ok_or_else(|| CompileError::Format(format!("no model {model}")))?;
        let empty = out.mins == [0.0; 3] && out.maxs == [0.0; 3] && out.num_faces == 0;
        for i in 0..3 {
            out.mins[i] = if empty { mins[i] } else { out.mins[i].min(mins[i]) };
            out.maxs[i] = if empty { maxs[i] } else { out.maxs[i].max(maxs[i]) };
        }
        Ok(())
    }

    fn emit_clipnode(&mut self, tree: &Tree, current: NodeRef) -> ClipChild {
        let n = match current {
            NodeRef::Leaf(leaf) => {
                return ClipChild::Contents(
                    self.profile.contents_value(tree.leaves[leaf].contents),
                );
            },
            NodeRef::Node(n) => n,
        };
        let node = &tree.nodes[n];
        let index = self.data.clipnodes.len();
        let plane = self.plane_index(node.plane);
        self.data.clipnodes.push(DClipNode {
            plane,
            children: [ClipChild::Contents(0); 2],
        });
        let front = self.emit_clipnode(tree, node.children[0]);
        let back = self.emit_clipnode(tree, node.children[1]);
        self.data.clipnodes[index].children = [front, back];
        ClipChild::Node(index)
    }

    /// Write a collision hull tree as clipnodes and point the model's
    /// headnode for `hull` at it.
    pub fn add_clip_hull(
        &mut self,
        model: usize,
        hull: usize,
        tree: &Tree,
    ) -> Result<(), CompileError> {
        if !self.profile.has_clipnodes() {
            return Err(CompileError::Format(format!(
                "{} has no clipnodes",
                self.profile.name()
            )));
        }
        let head = match self.emit_clipnode(tree, tree.head) {
            ClipChild::Node(index) => index,
            leaf @ ClipChild::Contents(_) => {
                let plane = self.dummy_plane();
                self.data.clipnodes.push(DClipNode {
                    plane,
                    children: [leaf, leaf],
                });
                self.data.clipnodes.len() - 1
            },
        };
        self.set_head_node(model, hull, head as i32)
    }

    pub fn set_head_node(&mut self, model: usize, hull: usize, head: i32) -> Result<(), CompileError> {
        let slot = self
            .data
            .models
            .get_mut(model)
            .and_then(|m| m.head_nodes.get_mut(hull))
            .ok_or_else(|| CompileError::Format(format!("no hull {hull} slot on model {model}")))?;
        *slot = head;
        Ok(())
    }

    /// Write the brush list of one model, with the axial and edge bevels a
    /// box trace needs. Returns the index of the first written brush.
    pub fn add_brush_list(&mut self, brushes: &[Brush]) -> Result<usize, CompileError> {
        let base = self.data.brushes.len();
        let eps = self.ctx.epsilon();
        for brush in brushes {
            let first_side = self.data.brush_sides.len() as u32;
            let mut texinfo = None;
            for side in &brush.sides {
                let plane = self.side_plane_index(side.plane);
                let out = self.texinfo_index(side.texinfo) as i32;
                texinfo.get_or_insert(out);
                self.data.brush_sides.push(DBrushSide {
                    plane,
                    texinfo: out,
                });
            }

            let planes: Vec<Plane> = brush
                .sides
                .iter()
                .map(|s| self.ctx.planes.get(s.plane))
                .collect();
            let windings: Vec<_> = brush.sides.iter().map(|s| s.winding.clone()).collect();
            for bevel in add_bevels(&planes, &windings, eps) {
                let plane = self.ctx.planes.find_or_insert(&bevel);
                let plane = self.side_plane_index(plane);
                self.data.brush_sides.push(DBrushSide {
                    plane,
                    texinfo: texinfo.unwrap_or(-1),
                });
            }

            self.data.brushes.push(DBrush {
                first_side,
                num_sides: self.data.brush_sides.len() as u32 - first_side,
                contents: self.profile.contents_value(brush.contents),
            });
        }
        log::debug!(
            "{} brushes, {} brush sides",
            self.data.brushes.len() - base,
            self.data.brush_sides.len()
        );
        Ok(base)
    }

    /// Write the areas lump and one area-portal record per area for every
    /// area-portal entity bordering it. `portal_number` maps an entity to
    /// its portal number.
    pub fn add_areas(
        &mut self,
        areas: &AreaMap,
        portal_number: impl Fn(usize) -> Option<usize>,
    ) -> Result<(), CompileError> {
        if !self.profile.has_brush_lists() {
            return Ok(());
        }
        for area in 1..=areas.count {
            let first_portal = self.data.area_portals.len() as u32;
            for (&entity, touched) in &areas.portal_areas {
                if touched.len() != 2 || !touched.contains(&area) {
                    continue;
                }
                let other = if touched[0] == area {
                    touched[1]
                } else {
                    touched[0]
                };
                let Some(portal_num) = portal_number(entity) else {
                    log::warn!("entity {entity} borders areas but has no portal number");
                    continue;
                };
                self.data.area_portals.push(DAreaPortal {
                    portal_num: portal_num as u32,
                    other_area: other as u32,
                });
            }
            self.data.areas.push(DArea {
                num_portals: self.data.area_portals.len() as u32 - first_portal,
                first_portal,
            });
        }
        Ok(())
    }

    /// Attach the entity text and hand over the finished tables.
    pub fn finish(mut self, entities: &[Entity]) -> BspData {
        self.data.entities = entities_text(entities);
        log::info!("---- Export ({}) ----", self.profile.name());
        let d = &self.data;
        for (count, what) in [
            (d.models.len(), "models"),
            (d.planes.len(), "planes"),
            (d.vertices.len(), "vertices"),
            (d.edges.len(), "edges"),
            (d.faces.len(), "faces"),
            (d.nodes.len(), "nodes"),
            (d.leaves.len(), "leaves"),
            (d.clipnodes.len(), "clipnodes"),
            (d.brushes.len(), "brushes"),
            (d.areas.len(), "areas"),
        ] {
            log::info!("{count:8} {what}");
        }
        self.data
    }
}

/// Encode `data` with `profile` and write it to `path`.
pub fn write_bsp(
    path: &Path,
    data: &BspData,
    profile: &dyn FormatProfile,
) -> Result<(), CompileError> {
    let bytes = profile.write(data)?;
    std::fs::write(path, &bytes)?;
    log::info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
