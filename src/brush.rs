//! Brush Builder: half-space definitions to convex brushes with face windings.

use crate::context::CompileContext;
use crate::contents::Contents;
use crate::errors::CompileError;
use crate::export::format::HullBox;
use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::float_types::{Bounds, Real, bounds_is_empty, empty_bounds};
use crate::map::texinfo::{SURF_HINT, SURF_NODRAW, SURF_SKIP, TexInfo};
use crate::map::{
    BrushClass, Entity, MapBrush, MapSide, Q2_CONTENTS_ORIGIN, TextureClass, classify_texture,
    q2_contents,
};
use crate::plane::{Plane, PlaneRef, PlaneTable};
use crate::winding::Winding;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-side markers that keep a face out of the visible skin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideFlags {
    /// Preferred split plane, never drawn
    pub hint: bool,
    /// Drawn nowhere unless `no_skip` is set
    pub skip: bool,
    /// Added by hull expansion or brush-list export
    pub bevel: bool,
}

impl SideFlags {
    pub const fn is_visible(self) -> bool {
        !self.hint && !self.skip && !self.bevel
    }
}

/// One face of a built brush.
#[derive(Debug, Clone)]
pub struct Side {
    pub plane: PlaneRef,
    pub texinfo: usize,
    pub winding: Winding,
    pub flags: SideFlags,
    pub lmshift: u8,
}

/// A convex solid with its faces.
#[derive(Debug, Clone)]
pub struct Brush {
    pub sides: Vec<Side>,
    pub contents: Contents,
    pub bounds: Bounds,
    /// Source line of the brush in the map file
    pub line: usize,
    /// Entity the brush came from before world merging
    pub source_entity: usize,
    /// Faces are copied inward so they render from inside the volume
    pub mirror_inside: bool,
    /// Every side is a hint or skip side; only hint faces survive CSG
    pub hint: bool,
}

impl Brush {
    /// `true` if `point` lies inside every side's half-space (within `epsilon`).
    pub fn contains_point(&self, planes: &PlaneTable, point: &Point3<Real>, epsilon: Real) -> bool {
        self.sides
            .iter()
            .all(|side| planes.get(side.plane).distance_to(point) <= epsilon)
    }
}

/// Brush counts per contents for the entity statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrushStats {
    pub solid: usize,
    pub sky: usize,
    pub detail: usize,
    pub detail_illusionary: usize,
    pub detail_fence: usize,
    pub liquid: usize,
    pub area_portal: usize,
    pub clip: usize,
    pub hint: usize,
}

impl BrushStats {
    fn count(&mut self, brush: &Brush) {
        if brush.hint {
            self.hint += 1;
            return;
        }
        match brush.contents {
            Contents::Solid => self.solid += 1,
            Contents::Sky => self.sky += 1,
            Contents::DetailSolid => self.detail += 1,
            Contents::DetailIllusionary => self.detail_illusionary += 1,
            Contents::DetailFence => self.detail_fence += 1,
            Contents::Liquid(_) => self.liquid += 1,
            Contents::AreaPortal => self.area_portal += 1,
            Contents::Clip => self.clip += 1,
            Contents::Empty => {},
        }
    }

    pub fn log(&self) {
        let rows = [
            (self.solid, "solid"),
            (self.sky, "sky"),
            (self.detail, "detail"),
            (self.detail_illusionary, "detail illusionary"),
            (self.detail_fence, "detail fence"),
            (self.liquid, "liquid"),
            (self.area_portal, "area portal"),
            (self.clip, "clip"),
            (self.hint, "hint"),
        ];
        for (count, what) in rows {
            if count > 0 {
                log::info!("{count:8} {what} brushes");
            }
        }
    }
}

/// Result of loading one entity's brushes for one hull.
#[derive(Debug, Clone, Default)]
pub struct LoadedEntity {
    pub brushes: Vec<Brush>,
    pub stats: BrushStats,
    /// Centre of the entity's origin brush, if it had one
    pub origin: Option<Point3<Real>>,
    /// Extent of the clip brushes left out of the point hull
    pub clip_bounds: Option<Bounds>,
}

fn side_class(side: &MapSide) -> TextureClass {
    if let Some(q2) = side.q2 {
        if q2.contents & Q2_CONTENTS_ORIGIN != 0 {
            return TextureClass::Origin;
        }
        if q2.flags & SURF_HINT != 0 {
            return TextureClass::Hint;
        }
        if q2.flags & (SURF_SKIP | SURF_NODRAW) != 0 {
            return TextureClass::Skip;
        }
    }
    classify_texture(&side.texture)
}

fn is_origin_brush(brush: &MapBrush) -> bool {
    !brush.sides.is_empty()
        && brush
            .sides
            .iter()
            .all(|s| side_class(s) == TextureClass::Origin)
}

fn is_hint_brush(brush: &MapBrush) -> bool {
    let classes: Vec<_> = brush.sides.iter().map(side_class).collect();
    classes.contains(&TextureClass::Hint)
        && classes
            .iter()
            .all(|c| matches!(c, TextureClass::Hint | TextureClass::Skip))
}

/// Contents of a source brush from its textures and its entity class,
/// before any per-hull rule.
fn source_contents(brush: &MapBrush) -> Contents {
    let contents = match brush.sides.iter().find_map(|s| s.q2) {
        Some(_) => {
            let bits = brush
                .sides
                .iter()
                .filter_map(|s| s.q2)
                .fold(0, |acc, q| acc | q.contents);
            q2_contents(bits)
        },
        None => {
            let classes: Vec<_> = brush.sides.iter().map(side_class).collect();
            if classes.iter().all(|c| *c == TextureClass::Clip) {
                Contents::Clip
            } else if classes.contains(&TextureClass::Sky) {
                Contents::Sky
            } else if let Some(TextureClass::Liquid(liquid)) =
                classes.iter().find(|c| matches!(c, TextureClass::Liquid(_)))
            {
                Contents::Liquid(*liquid)
            } else {
                Contents::Solid
            }
        },
    };

    match (brush.class, contents) {
        (BrushClass::Detail | BrushClass::DetailWall, Contents::Solid) => Contents::DetailSolid,
        (BrushClass::DetailIllusionary, Contents::Solid) => Contents::DetailIllusionary,
        (BrushClass::DetailFence, Contents::Solid) => Contents::DetailFence,
        (BrushClass::AreaPortal, _) => Contents::AreaPortal,
        (_, other) => other,
    }
}

/// Contents a source brush takes in the given hull, `None` when it is left out.
///
/// `solid_model` is set for brush entities of formats whose brush models
/// can't carry contents: their brushes are all solid, or fence detail in the
/// point hull when they mirror their inside faces.
pub fn brush_contents(brush: &MapBrush, hull: usize, solid_model: bool) -> Option<Contents> {
    if is_hint_brush(brush) {
        return (hull == 0).then_some(Contents::Empty);
    }
    if hull > 0 && brush.class == BrushClass::DetailIllusionary {
        return None;
    }

    let mut contents = source_contents(brush);
    if contents == Contents::Clip {
        return (hull > 0).then_some(Contents::Clip);
    }
    if solid_model {
        contents = if hull == 0 && brush.mirror_inside == Some(true) {
            Contents::DetailFence
        } else {
            Contents::Solid
        };
    }

    if hull == 0 {
        return Some(contents);
    }
    match contents {
        // sky stops players like any wall
        Contents::Sky => Some(Contents::Solid),
        Contents::Liquid(_)
        | Contents::DetailIllusionary
        | Contents::AreaPortal
        | Contents::Empty => None,
        other => Some(other),
    }
}

/// Offset a brush plane outward by a hull box.
pub fn expand_plane(plane: &Plane, hull: &HullBox) -> Plane {
    let corner: Vector3<Real> = Vector3::from_fn(|i, _| {
        if plane.normal[i] < 0.0 {
            hull.maxs[i]
        } else {
            hull.mins[i]
        }
    });
    Plane {
        normal: plane.normal,
        dist: plane.dist - plane.normal.dot(&corner),
    }
}

/// Axial planes the brush is missing plus edge bevels.
///
/// An edge bevel is a plane through a winding edge, perpendicular to one of
/// the axes, that has every brush vertex behind it. Such planes add no volume
/// but stop an expanded box from catching on sharp edges.
pub fn add_bevels(planes: &[Plane], windings: &[Winding], epsilon: Real) -> Vec<Plane> {
    let mut bounds = empty_bounds();
    for w in windings {
        for p in &w.points {
            bounds.take_point(*p);
        }
    }

    let mut added: Vec<Plane> = Vec::new();
    let known = |candidate: &Plane, added: &[Plane]| {
        planes
            .iter()
            .chain(added.iter())
            .any(|p| p.snapped().approx_eq(&candidate.snapped()))
    };

    for axis in 0..3 {
        for dir in [-1.0, 1.0] {
            let exists = planes
                .iter()
                .any(|p| (p.normal[axis] - dir).abs() < 1e-5);
            if exists {
                continue;
            }
            let mut normal = Vector3::zeros();
            normal[axis] = dir;
            let dist = if dir > 0.0 {
                bounds.maxs[axis]
            } else {
                -bounds.mins[axis]
            };
            added.push(Plane { normal, dist });
        }
    }

    for w in windings {
        for (p0, p1) in w.edges() {
            let mut edge = p1 - p0;
            if edge.norm() < 0.5 {
                continue;
            }
            edge.normalize_mut();
            for k in 0..3 {
                if (edge[k] - 1.0).abs() < 1e-5 {
                    edge[k] = 1.0;
                } else if (edge[k] + 1.0).abs() < 1e-5 {
                    edge[k] = -1.0;
                } else if edge[k].abs() < 1e-5 {
                    edge[k] = 0.0;
                }
            }

            for axis in 0..3 {
                for dir in [-1.0, 1.0] {
                    let mut axis_vec = Vector3::zeros();
                    axis_vec[axis] = dir;
                    let normal = edge.cross(&axis_vec);
                    if normal.norm() < 0.5 {
                        continue;
                    }
                    let normal = normal.normalize();
                    let candidate = Plane {
                        normal,
                        dist: normal.dot(&p0.coords),
                    };
                    if known(&candidate, &added) {
                        continue;
                    }
                    let behind = windings
                        .iter()
                        .flat_map(|w| w.points.iter())
                        .all(|p| candidate.distance_to(p) <= 0.1 + epsilon);
                    if behind {
                        added.push(candidate);
                    }
                }
            }
        }
    }

    added
}

/// Intersect the half-spaces: one winding per plane, `None` where the plane
/// is clipped away entirely.
pub fn make_windings(planes: &[Plane], extent: Real, epsilon: Real) -> Vec<Option<Winding>> {
    planes
        .iter()
        .enumerate()
        .map(|(i, plane)| {
            let mut winding = Winding::from_plane(plane, extent * 2.0);
            for (j, other) in planes.iter().enumerate() {
                if i == j {
                    continue;
                }
                winding = winding.clip(&other.flipped(), epsilon, false)?;
            }
            Some(winding)
        })
        .collect()
}

struct PlaneSource<'a> {
    plane: Plane,
    side: &'a MapSide,
    bevel: bool,
}

/// Build one brush.
///
/// `offset` translates the brush (for entities with origin brushes); `hull`
/// expands it for a collision hull.
pub fn build_brush(
    ctx: &CompileContext,
    map_brush: &MapBrush,
    contents: Contents,
    offset: &Vector3<Real>,
    hull: Option<&HullBox>,
) -> Result<Brush, CompileError> {
    let eps = ctx.epsilon();
    let extent = ctx.options.world_extent;
    let line = map_brush.line;

    // unique planes, translated
    let mut sources: Vec<PlaneSource<'_>> = Vec::with_capacity(map_brush.sides.len());
    for side in &map_brush.sides {
        let plane = Plane {
            normal: side.plane.normal,
            dist: side.plane.dist - side.plane.normal.dot(offset),
        }
        .snapped();
        if sources.iter().any(|s| s.plane.approx_eq(&plane)) {
            log::warn!("line {}: brush has duplicate plane, side dropped", side.line);
            continue;
        }
        if sources.iter().any(|s| s.plane.approx_eq(&plane.flipped())) {
            log::warn!("line {}: brush has mirrored planes", side.line);
        }
        sources.push(PlaneSource {
            plane,
            side,
            bevel: false,
        });
    }

    if sources.len() < 4 {
        return Err(CompileError::TooFewPlanes {
            line,
            count: sources.len(),
        });
    }

    if let Some(hull) = hull {
        let planes: Vec<Plane> = sources.iter().map(|s| s.plane).collect();
        let windings: Vec<Winding> = make_windings(&planes, extent, eps)
            .into_iter()
            .flatten()
            .collect();
        let first = sources[0].side;
        for bevel in add_bevels(&planes, &windings, eps) {
            sources.push(PlaneSource {
                plane: bevel,
                side: first,
                bevel: true,
            });
        }
        for source in sources.iter_mut() {
            source.plane = expand_plane(&source.plane, hull).snapped();
        }
    }

    let planes: Vec<Plane> = sources.iter().map(|s| s.plane).collect();
    let windings = make_windings(&planes, extent, eps);

    let mut sides = Vec::with_capacity(sources.len());
    let mut bounds = empty_bounds();
    let hint_brush = contents == Contents::Empty;

    for (source, winding) in sources.iter().zip(windings) {
        let Some(winding) = winding else {
            if !source.bevel && hull.is_none() {
                log::warn!("line {}: brush side clipped away", source.side.line);
            }
            continue;
        };
        let Some(winding) = check_face(winding, &source.plane, source.side.line, eps) else {
            continue;
        };
        if winding.is_tiny() && !source.bevel {
            log::debug!("line {}: tiny brush side", source.side.line);
        }
        for p in &winding.points {
            if p.coords.iter().any(|c| c.abs() > extent) {
                return Err(CompileError::WorldExtent {
                    line,
                    coord: *p,
                    extent,
                });
            }
            bounds.take_point(*p);
        }

        let class = side_class(source.side);
        let (q2_flags, q2_value) = source.side.q2.map_or((0, 0), |q| (q.flags, q.value));
        let texinfo = TexInfo::new(
            &source.side.texture,
            &source.side.projection,
            &source.plane.normal,
        )
        .with_flags(q2_flags, q2_value);

        sides.push(Side {
            plane: ctx.planes.find_or_insert(&source.plane),
            texinfo: ctx.texinfos.find_or_insert(texinfo),
            winding,
            flags: SideFlags {
                hint: class == TextureClass::Hint,
                skip: class == TextureClass::Skip
                    || (hint_brush && class != TextureClass::Hint),
                bevel: source.bevel,
            },
            lmshift: map_brush.lmshift,
        });
    }

    if sides.is_empty() {
        return Err(CompileError::EmptyBrush { line });
    }

    Ok(Brush {
        sides,
        contents,
        bounds,
        line,
        source_entity: map_brush.source_entity,
        mirror_inside: map_brush
            .mirror_inside
            .unwrap_or_else(|| contents.mirrors_inside()),
        hint: hint_brush,
    })
}

/// Heal degenerate edges of a fresh side winding and warn about points off
/// its plane. Windings that end up with fewer than three points or that are
/// not convex are dropped.
pub fn check_face(mut winding: Winding, plane: &Plane, line: usize, epsilon: Real) -> Option<Winding> {
    for p in winding.heal_degenerate_edges(epsilon) {
        log::warn!(
            "line {line}: healing degenerate edge at ({:.3} {:.3} {:.3})",
            p.x,
            p.y,
            p.z
        );
    }
    if winding.len() < 3 {
        log::warn!("line {line}: too few points ({})", winding.len());
        return None;
    }
    for p in &winding.points {
        let dist = plane.distance_to(p);
        if dist.abs() > epsilon {
            log::warn!(
                "line {line}: point ({:.3} {:.3} {:.3}) off plane by {dist:.4}",
                p.x,
                p.y,
                p.z
            );
        }
    }
    if let Some((p, error)) = winding.convexity_error(plane, epsilon) {
        log::warn!(
            "line {line}: found a non-convex face (error size {error}, point: {:.3} {:.3} {:.3})",
            p.x,
            p.y,
            p.z
        );
        return None;
    }
    Some(winding)
}

/// Bounds of a source brush without building it.
fn brush_bounds(brush: &MapBrush, offset: &Vector3<Real>, extent: Real, epsilon: Real) -> Bounds {
    let planes: Vec<Plane> = brush
        .sides
        .iter()
        .map(|side| Plane {
            normal: side.plane.normal,
            dist: side.plane.dist - side.plane.normal.dot(offset),
        })
        .collect();
    let mut bounds = empty_bounds();
    for winding in make_windings(&planes, extent, epsilon).into_iter().flatten() {
        for p in winding.points {
            bounds.take_point(p);
        }
    }
    bounds
}

/// Centre of an entity's origin brush.
fn origin_of(ctx: &CompileContext, brush: &MapBrush) -> Result<Point3<Real>, CompileError> {
    let built = build_brush(ctx, brush, Contents::Solid, &Vector3::zeros(), None)?;
    Ok(built.bounds.center())
}

/// Build every brush of `entity` for hull `hull`. `world` marks worldspawn,
/// which keeps the contents of its brushes in every format.
///
/// Brushes are built on the rayon pool when the `parallel` feature is on;
/// the first fatal error aborts the whole entity.
pub fn load_entity(
    ctx: &CompileContext,
    entity: &Entity,
    world: bool,
    hull: usize,
    hull_box: Option<&HullBox>,
) -> Result<LoadedEntity, CompileError> {
    let mut origin = None;
    for brush in entity.brushes.iter().filter(|b| is_origin_brush(b)) {
        origin = Some(origin_of(ctx, brush)?);
    }
    if origin.is_none() && entity.classname().starts_with("rotate_") {
        origin = entity.origin();
    }
    let offset = origin.map_or_else(Vector3::zeros, |o| o.coords);
    let solid_model = !world && !ctx.options.target.profile().allows_contented_bmodels();

    let sources: Vec<&MapBrush> = entity
        .brushes
        .iter()
        .filter(|b| !is_origin_brush(b))
        .collect();
    let candidates: Vec<(&MapBrush, Contents)> = sources
        .iter()
        .filter_map(|&b| brush_contents(b, hull, solid_model).map(|c| (b, c)))
        .collect();

    // clip brushes have no faces in the point hull but still bound the model
    let mut clip_bounds = None;
    if hull == 0 {
        for &brush in sources.iter().filter(|b| !is_hint_brush(b)) {
            if source_contents(brush) != Contents::Clip {
                continue;
            }
            let bounds = brush_bounds(brush, &offset, ctx.options.world_extent, ctx.epsilon());
            if !bounds_is_empty(&bounds) {
                clip_bounds = Some(clip_bounds.map_or(bounds, |b: Bounds| b.merged(&bounds)));
            }
        }
    }

    let build = |(map_brush, contents): &(&MapBrush, Contents)| {
        build_brush(ctx, map_brush, *contents, &offset, hull_box)
    };

    #[cfg(feature = "parallel")]
    let brushes: Result<Vec<Brush>, CompileError> = candidates.par_iter().map(build).collect();
    #[cfg(not(feature = "parallel"))]
    let brushes: Result<Vec<Brush>, CompileError> = candidates.iter().map(build).collect();
    let brushes = brushes?;

    let mut stats = BrushStats::default();
    for brush in &brushes {
        stats.count(brush);
    }

    Ok(LoadedEntity {
        brushes,
        stats,
        origin,
        clip_bounds,
    })
}
