//! Generic output tables shared by every format, plus low-level lump I/O.

use crate::bsp::NodeRef;
use crate::errors::CompileError;
use crate::export::format::{FormatProfile, profile_for_header};
use crate::float_types::Real;
use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use nalgebra::Point3;
use std::io::Cursor;

/// Integer field width of an on-disk struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    I16,
    U16,
    I32,
    U32,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Width::I16 | Width::U16 => 2,
            Width::I32 | Width::U32 => 4,
        }
    }

    const fn range(self) -> (i64, i64) {
        match self {
            Width::I16 => (i16::MIN as i64, i16::MAX as i64),
            Width::U16 => (0, u16::MAX as i64),
            Width::I32 => (i32::MIN as i64, i32::MAX as i64),
            Width::U32 => (0, u32::MAX as i64),
        }
    }
}

/// A clipnode child: another clipnode or the contents value of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipChild {
    Node(usize),
    Contents(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub ty: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DNode {
    pub plane: u32,
    pub children: [NodeRef; 2],
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub first_face: u32,
    pub num_faces: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DTexInfo {
    pub vecs: [[f32; 4]; 2],
    /// Index into the texture list (Quake I)
    pub miptex: u32,
    pub flags: i32,
    pub value: i32,
    pub texture: String,
    pub next: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DFace {
    pub plane: u32,
    /// The face looks along the negated plane
    pub side: bool,
    pub first_edge: u32,
    pub num_edges: u32,
    pub texinfo: u32,
    pub styles: [u8; 4],
    pub light_ofs: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DClipNode {
    pub plane: u32,
    pub children: [ClipChild; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DLeaf {
    pub contents: i32,
    pub vis_ofs: i32,
    pub cluster: i32,
    pub area: i32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub first_mark_surface: u32,
    pub num_mark_surfaces: u32,
    pub first_leaf_brush: u32,
    pub num_leaf_brushes: u32,
    pub ambient: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    /// Hull 0 root node, then the clipnode roots of the collision hulls
    pub head_nodes: [i32; 4],
    pub vis_leafs: i32,
    pub first_face: u32,
    pub num_faces: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DBrush {
    pub first_side: u32,
    pub num_sides: u32,
    pub contents: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DBrushSide {
    pub plane: u32,
    pub texinfo: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DArea {
    pub num_portals: u32,
    pub first_portal: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DAreaPortal {
    pub portal_num: u32,
    pub other_area: u32,
}

/// Everything a BSP file holds, independent of field widths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BspData {
    pub entities: String,
    pub planes: Vec<DPlane>,
    pub textures: Vec<String>,
    pub vertices: Vec<[f32; 3]>,
    pub nodes: Vec<DNode>,
    pub texinfos: Vec<DTexInfo>,
    pub faces: Vec<DFace>,
    pub clipnodes: Vec<DClipNode>,
    pub leaves: Vec<DLeaf>,
    pub mark_surfaces: Vec<u32>,
    pub edges: Vec<[u32; 2]>,
    pub surfedges: Vec<i32>,
    pub models: Vec<DModel>,
    pub leaf_brushes: Vec<u32>,
    pub brushes: Vec<DBrush>,
    pub brush_sides: Vec<DBrushSide>,
    pub areas: Vec<DArea>,
    pub area_portals: Vec<DAreaPortal>,
}

impl BspData {
    /// Parse a file of any supported format, detected from its header.
    pub fn read(bytes: &[u8]) -> Result<BspData, CompileError> {
        let profile: &dyn FormatProfile = profile_for_header(bytes)
            .ok_or_else(|| CompileError::Format("unrecognised BSP header".to_string()))?;
        profile.read(bytes)
    }

    /// Vertices of `face` in winding order, rebuilt from its surfedges.
    pub fn face_points(&self, face: usize) -> Result<Vec<Point3<Real>>, CompileError> {
        let f = self
            .faces
            .get(face)
            .ok_or_else(|| CompileError::Format(format!("face {face} out of range")))?;
        let first = f.first_edge as usize;
        let last = first + f.num_edges as usize;
        let surfedges = self
            .surfedges
            .get(first..last)
            .ok_or_else(|| CompileError::Format(format!("face {face} surfedges out of range")))?;

        surfedges
            .iter()
            .map(|&se| {
                let edge = self
                    .edges
                    .get(se.unsigned_abs() as usize)
                    .ok_or_else(|| CompileError::Format(format!("edge {se} out of range")))?;
                let v = if se >= 0 { edge[0] } else { edge[1] };
                let p = self
                    .vertices
                    .get(v as usize)
                    .ok_or_else(|| CompileError::Format(format!("vertex {v} out of range")))?;
                Ok(Point3::new(p[0] as Real, p[1] as Real, p[2] as Real))
            })
            .collect()
    }

    /// The plane of `face` as the face sees it.
    pub fn face_plane(&self, face: usize) -> Option<([f32; 3], f32)> {
        let f = self.faces.get(face)?;
        let p = self.planes.get(f.plane as usize)?;
        Some(if f.side {
            ([-p.normal[0], -p.normal[1], -p.normal[2]], -p.dist)
        } else {
            (p.normal, p.dist)
        })
    }
}

/// Little-endian lump writer with range-checked integer fields.
#[derive(Debug, Default)]
pub struct LumpWriter {
    pub bytes: Vec<u8>,
}

impl LumpWriter {
    pub fn int(&mut self, width: Width, value: i64) -> Result<(), CompileError> {
        let (lo, hi) = width.range();
        if value < lo || value > hi {
            return Err(CompileError::Format(format!(
                "value {value} does not fit a {width:?} field"
            )));
        }
        match width {
            Width::I16 => self.bytes.write_i16::<LE>(value as i16)?,
            Width::U16 => self.bytes.write_u16::<LE>(value as u16)?,
            Width::I32 => self.bytes.write_i32::<LE>(value as i32)?,
            Width::U32 => self.bytes.write_u32::<LE>(value as u32)?,
        }
        Ok(())
    }

    pub fn i32(&mut self, value: i32) -> Result<(), CompileError> {
        self.bytes.write_i32::<LE>(value)?;
        Ok(())
    }

    pub fn f32(&mut self, value: f32) -> Result<(), CompileError> {
        self.bytes.write_f32::<LE>(value)?;
        Ok(())
    }

    pub fn vec3(&mut self, v: &[f32; 3]) -> Result<(), CompileError> {
        v.iter().try_for_each(|&c| self.f32(c))
    }

    /// Bounds as floats, or as shorts rounded outward.
    pub fn bounds(
        &mut self,
        mins: &[f32; 3],
        maxs: &[f32; 3],
        short: bool,
    ) -> Result<(), CompileError> {
        if !short {
            self.vec3(mins)?;
            return self.vec3(maxs);
        }
        for &c in mins {
            self.int(Width::I16, (c.floor() as i64).clamp(-32768, 32767))?;
        }
        for &c in maxs {
            self.int(Width::I16, (c.ceil() as i64).clamp(-32768, 32767))?;
        }
        Ok(())
    }

    /// A fixed-size, NUL-padded name.
    pub fn name(&mut self, name: &str, size: usize) {
        let mut raw = name.as_bytes().to_vec();
        raw.truncate(size - 1);
        raw.resize(size, 0);
        self.bytes.extend_from_slice(&raw);
    }

    pub fn bytes(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
    }
}

/// Little-endian lump reader over one lump's bytes.
pub struct LumpReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> LumpReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        LumpReader {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn int(&mut self, width: Width) -> Result<i64, CompileError> {
        Ok(match width {
            Width::I16 => self.cursor.read_i16::<LE>()? as i64,
            Width::U16 => self.cursor.read_u16::<LE>()? as i64,
            Width::I32 => self.cursor.read_i32::<LE>()? as i64,
            Width::U32 => self.cursor.read_u32::<LE>()? as i64,
        })
    }

    pub fn i32(&mut self) -> Result<i32, CompileError> {
        Ok(self.cursor.read_i32::<LE>()?)
    }

    pub fn f32(&mut self) -> Result<f32, CompileError> {
        Ok(self.cursor.read_f32::<LE>()?)
    }

    pub fn vec3(&mut self) -> Result<[f32; 3], CompileError> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    pub fn bounds(&mut self, short: bool) -> Result<([f32; 3], [f32; 3]), CompileError> {
        if !short {
            return Ok((self.vec3()?, self.vec3()?));
        }
        let mut v = [0.0f32; 6];
        for c in v.iter_mut() {
            *c = self.int(Width::I16)? as f32;
        }
        Ok(([v[0], v[1], v[2]], [v[3], v[4], v[5]]))
    }

    pub fn array4(&mut self) -> Result<[u8; 4], CompileError> {
        let mut raw = [0u8; 4];
        std::io::Read::read_exact(&mut self.cursor, &mut raw)?;
        Ok(raw)
    }

    pub fn name(&mut self, size: usize) -> Result<String, CompileError> {
        let mut raw = vec![0u8; size];
        std::io::Read::read_exact(&mut self.cursor, &mut raw)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(size);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.cursor.position() as usize
    }
}

/// Encode a tree child the way node structs store it.
pub fn encode_child(child: NodeRef) -> i64 {
    match child {
        NodeRef::Node(n) => n as i64,
        NodeRef::Leaf(l) => -(l as i64) - 1,
    }
}

pub fn decode_child(raw: i64) -> NodeRef {
    if raw >= 0 {
        NodeRef::Node(raw as usize)
    } else {
        NodeRef::Leaf((-raw - 1) as usize)
    }
}

pub fn encode_clip_child(child: ClipChild) -> i64 {
    match child {
        ClipChild::Node(n) => n as i64,
        ClipChild::Contents(c) => c as i64,
    }
}

pub fn decode_clip_child(raw: i64) -> ClipChild {
    if raw >= 0 {
        ClipChild::Node(raw as usize)
    } else {
        ClipChild::Contents(raw as i32)
    }
}

/// Split a whole file into its lumps given the directory position.
pub fn read_directory<'a>(
    bytes: &'a [u8],
    directory: usize,
    count: usize,
) -> Result<Vec<&'a [u8]>, CompileError> {
    let mut reader = LumpReader::new(bytes.get(directory..).unwrap_or(&[]));
    (0..count)
        .map(|i| {
            let offset = reader.i32()?;
            let length = reader.i32()?;
            let (offset, length) = (offset as usize, length as usize);
            bytes
                .get(offset..offset + length)
                .ok_or_else(|| CompileError::Format(format!("lump {i} out of range")))
        })
        .collect()
}

/// Assemble a file: `header` then the directory then every lump, 4-aligned.
pub fn assemble(header: &[u8], lumps: &[Vec<u8>]) -> Result<Vec<u8>, CompileError> {
    let mut out = LumpWriter::default();
    out.bytes(header);
    let mut offset = header.len() + lumps.len() * 8;
    let mut directory = Vec::with_capacity(lumps.len());
    for lump in lumps {
        directory.push((offset, lump.len()));
        offset += lump.len().next_multiple_of(4);
    }
    for (ofs, len) in &directory {
        out.int(Width::I32, *ofs as i64)?;
        out.int(Width::I32, *len as i64)?;
    }
    for lump in lumps {
        out.bytes(lump);
        let padded = lump.len().next_multiple_of(4);
        out.bytes.resize(out.bytes.len() + padded - lump.len(), 0);
    }
    Ok(out.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_encode_leaves_as_negative() {
        assert_eq!(encode_child(NodeRef::Node(5)), 5);
        assert_eq!(encode_child(NodeRef::Leaf(0)), -1);
        assert_eq!(decode_child(-3), NodeRef::Leaf(2));
        assert_eq!(decode_clip_child(-2), ClipChild::Contents(-2));
        assert_eq!(decode_clip_child(7), ClipChild::Node(7));
    }

    #[test]
    fn writer_rejects_out_of_range_fields() {
        let mut w = LumpWriter::default();
        assert!(w.int(Width::I16, 40_000).is_err());
        assert!(w.int(Width::U16, -1).is_err());
        assert!(w.int(Width::U16, 65_535).is_ok());
        assert_eq!(w.bytes, vec![0xff, 0xff]);
    }

    #[test]
    fn lumps_are_four_byte_aligned() {
        let bytes = assemble(b"TEST", &[vec![1, 2, 3], vec![4]]).unwrap();
        let lumps = read_directory(&bytes, 4, 2).unwrap();
        assert_eq!(lumps[0], &[1, 2, 3]);
        assert_eq!(lumps[1], &[4]);
        assert_eq!(bytes.len(), 4 + 16 + 4 + 4);
    }
}
