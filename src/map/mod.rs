//! Level source: entities with key/value pairs and half-space brushes.

pub mod parser;
pub mod texinfo;

pub use parser::parse_map;

use crate::contents::{Contents, Liquid};
use crate::float_types::Real;
use crate::options::CompileOptions;
use crate::plane::Plane;
use nalgebra::Point3;
use texinfo::TexProjection;

// Quake II contents bits found on brush sides
pub const Q2_CONTENTS_SOLID: i32 = 0x1;
pub const Q2_CONTENTS_WINDOW: i32 = 0x2;
pub const Q2_CONTENTS_AUX: i32 = 0x4;
pub const Q2_CONTENTS_LAVA: i32 = 0x8;
pub const Q2_CONTENTS_SLIME: i32 = 0x10;
pub const Q2_CONTENTS_WATER: i32 = 0x20;
pub const Q2_CONTENTS_MIST: i32 = 0x40;
pub const Q2_CONTENTS_AREAPORTAL: i32 = 0x8000;
pub const Q2_CONTENTS_PLAYERCLIP: i32 = 0x10000;
pub const Q2_CONTENTS_MONSTERCLIP: i32 = 0x20000;
pub const Q2_CONTENTS_ORIGIN: i32 = 0x1000000;
pub const Q2_CONTENTS_DETAIL: i32 = 0x8000000;
pub const Q2_CONTENTS_TRANSLUCENT: i32 = 0x10000000;

/// The trailing integers of a Quake II brush side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Q2SideInfo {
    pub contents: i32,
    pub flags: i32,
    pub value: i32,
}

/// One half-space of a source brush. The plane faces out of the brush.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSide {
    pub plane: Plane,
    pub texture: String,
    pub projection: TexProjection,
    pub q2: Option<Q2SideInfo>,
    pub line: usize,
}

/// How an entity's brushes take part in the compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrushClass {
    #[default]
    Structural,
    Detail,
    DetailWall,
    DetailIllusionary,
    DetailFence,
    AreaPortal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapBrush {
    pub sides: Vec<MapSide>,
    pub line: usize,
    /// Entity the brush was written in, before world merging
    pub source_entity: usize,
    pub class: BrushClass,
    /// log2 of the lightmap scale
    pub lmshift: u8,
    /// Override for mirroring inside faces
    pub mirror_inside: Option<bool>,
}

impl MapBrush {
    pub const fn new(sides: Vec<MapSide>, line: usize) -> Self {
        MapBrush {
            sides,
            line,
            source_entity: 0,
            class: BrushClass::Structural,
            lmshift: 4,
            mirror_inside: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub pairs: Vec<(String, String)>,
    pub brushes: Vec<MapBrush>,
    pub line: usize,
}

impl Entity {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace or append a key.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn classname(&self) -> &str {
        self.value("classname").unwrap_or("")
    }

    pub fn origin(&self) -> Option<Point3<Real>> {
        let value = self.value("origin")?;
        let mut parts = value.split_whitespace().map(|s| s.parse::<Real>());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => Some(Point3::new(x, y, z)),
            _ => None,
        }
    }

    fn numeric(&self, key: &str) -> Option<Real> {
        self.value(key).and_then(|v| v.trim().parse::<Real>().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapFile {
    pub entities: Vec<Entity>,
}

/// Brush class for an entity classname, `None` when the entity keeps its own model.
fn merged_class(classname: &str) -> Option<BrushClass> {
    match classname {
        "func_group" => Some(BrushClass::Structural),
        "func_detail" => Some(BrushClass::Detail),
        "func_detail_wall" => Some(BrushClass::DetailWall),
        "func_detail_illusionary" => Some(BrushClass::DetailIllusionary),
        "func_detail_fence" => Some(BrushClass::DetailFence),
        "func_areaportal" => Some(BrushClass::AreaPortal),
        _ => None,
    }
}

const fn is_detail_class(class: BrushClass) -> bool {
    matches!(
        class,
        BrushClass::Detail
            | BrushClass::DetailWall
            | BrushClass::DetailIllusionary
            | BrushClass::DetailFence
    )
}

/// `-omitdetail` drops every kind of detail, the others one kind each.
fn omitted(class: BrushClass, options: &CompileOptions) -> bool {
    if options.omit_detail && is_detail_class(class) {
        return true;
    }
    match class {
        BrushClass::DetailWall => options.omit_detail_wall,
        BrushClass::DetailIllusionary => options.omit_detail_illusionary,
        BrushClass::DetailFence => options.omit_detail_fence,
        _ => false,
    }
}

impl MapFile {
    pub fn world(&self) -> Option<&Entity> {
        self.entities.first()
    }

    /// Stamp every brush with its entity attributes, then move the brushes of
    /// group, detail and area-portal entities into worldspawn. Area-portal
    /// entities are numbered from 1 and keep their number in `style`.
    pub fn merge_world_brush_entities(&mut self, options: &CompileOptions) {
        let mut moved = Vec::new();
        let mut next_portal = 1;

        for (index, entity) in self.entities.iter_mut().enumerate() {
            let lmshift = entity
                .numeric("_lmscale")
                .filter(|s| *s > 0.0)
                .map_or(4, |s| s.log2().round().clamp(0.0, 8.0) as u8);
            let mirror_inside = entity.numeric("_mirrorinside").map(|v| v != 0.0);
            let omit_brushes = entity.numeric("_omitbrushes").is_some_and(|v| v != 0.0);

            let class = if index == 0 {
                None
            } else {
                merged_class(entity.classname())
            };
            let class = match class {
                Some(c) if options.no_detail && is_detail_class(c) => Some(BrushClass::Structural),
                other => other,
            };

            if class == Some(BrushClass::AreaPortal) {
                entity.set("style", &next_portal.to_string());
                next_portal += 1;
            }

            for brush in entity.brushes.iter_mut() {
                brush.source_entity = index;
                brush.class = class.unwrap_or_default();
                brush.lmshift = lmshift;
                brush.mirror_inside = mirror_inside;
            }

            if omit_brushes || class.is_some_and(|c| omitted(c, options)) {
                log::debug!("entity {index} ({}): brushes omitted", entity.classname());
                entity.brushes.clear();
            }

            if class.is_some() {
                moved.append(&mut entity.brushes);
            }
        }

        if let Some(world) = self.entities.first_mut() {
            world.brushes.extend(moved);
        }
    }

    /// Give every `rotate_*` entity the origin of the entity it targets, or
    /// the world origin when it has no target.
    pub fn fix_rotate_origins(&mut self) {
        let origins: Vec<(usize, Point3<Real>)> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.classname().starts_with("rotate_"))
            .map(|(index, entity)| {
                let target = entity.value("target").and_then(|name| {
                    self.entities
                        .iter()
                        .find(|e| e.value("targetname") == Some(name))
                });
                let origin = match target {
                    Some(target) => target.origin().unwrap_or_else(Point3::origin),
                    None => {
                        log::warn!("no target for rotation entity \"{}\"", entity.classname());
                        Point3::origin()
                    },
                };
                (index, origin)
            })
            .collect();
        for (index, o) in origins {
            self.entities[index].set("origin", &format!("{} {} {}", o.x, o.y, o.z));
        }
    }

    /// Number of the area portal belonging to entity `index`.
    pub fn area_portal_number(&self, index: usize) -> Option<usize> {
        let entity = self.entities.get(index)?;
        if entity.classname() != "func_areaportal" {
            return None;
        }
        entity.value("style").and_then(|s| s.parse().ok())
    }
}

/// What a texture name says about its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureClass {
    Normal,
    Sky,
    Liquid(Liquid),
    Clip,
    Hint,
    Skip,
    Origin,
}

pub fn classify_texture(name: &str) -> TextureClass {
    let lower = name.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix('*') {
        return if rest.starts_with("lava") {
            TextureClass::Liquid(Liquid::Lava)
        } else if rest.starts_with("slime") {
            TextureClass::Liquid(Liquid::Slime)
        } else {
            TextureClass::Liquid(Liquid::Water)
        };
    }
    match lower.as_str() {
        "clip" => TextureClass::Clip,
        "hint" | "hintskip" => TextureClass::Hint,
        "skip" => TextureClass::Skip,
        "origin" => TextureClass::Origin,
        s if s.starts_with("sky") => TextureClass::Sky,
        _ => TextureClass::Normal,
    }
}

/// Contents of a Quake II brush from its side contents bits.
pub fn q2_contents(bits: i32) -> Contents {
    let detail = bits & Q2_CONTENTS_DETAIL != 0;
    if bits & Q2_CONTENTS_AREAPORTAL != 0 {
        Contents::AreaPortal
    } else if bits & Q2_CONTENTS_SOLID != 0 {
        if detail {
            Contents::DetailSolid
        } else {
            Contents::Solid
        }
    } else if bits & Q2_CONTENTS_WINDOW != 0 {
        if detail || bits & Q2_CONTENTS_TRANSLUCENT != 0 {
            Contents::DetailFence
        } else {
            Contents::Solid
        }
    } else if bits & Q2_CONTENTS_LAVA != 0 {
        Contents::Liquid(Liquid::Lava)
    } else if bits & Q2_CONTENTS_SLIME != 0 {
        Contents::Liquid(Liquid::Slime)
    } else if bits & Q2_CONTENTS_WATER != 0 {
        Contents::Liquid(Liquid::Water)
    } else if bits & Q2_CONTENTS_MIST != 0 {
        Contents::DetailIllusionary
    } else if bits & (Q2_CONTENTS_PLAYERCLIP | Q2_CONTENTS_MONSTERCLIP) != 0 {
        Contents::Clip
    } else if bits == 0 {
        Contents::Solid
    } else {
        log::warn!("unknown contents value {bits:#x}, treating as solid");
        Contents::Solid
    }
}
