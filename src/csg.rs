//! CSG Face Clipper: overlapping brushes to a skin without hidden faces.
//!
//! Every brush side starts as a face with contents `[Empty, brush contents]`
//! (front, back). Each face is then clipped against every other brush whose
//! bounds touch it. Fragments that end up inside another brush are dropped
//! when that brush hides them, and otherwise take the other brush's contents
//! on their front side.

use crate::brush::{Brush, SideFlags};
use crate::context::{CompileContext, Progress};
use crate::contents::Contents;
use crate::float_types::{Bounds, empty_bounds};
use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::plane::{PlaneId, PlaneRef};
use crate::winding::Winding;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A polygon of the skin.
#[derive(Debug, Clone)]
pub struct Face {
    pub winding: Winding,
    pub plane: PlaneRef,
    pub texinfo: usize,
    /// Contents in front of and behind the face
    pub contents: [Contents; 2],
    pub flags: SideFlags,
    pub lmshift: u8,
    /// Entity of the brush the face came from, before world merging
    pub source_entity: usize,
    /// Index of the brush in the entity's brush list
    pub brush: usize,
}

impl Face {
    /// Detail faces never become split candidates while structural ones remain.
    pub const fn is_detail(&self) -> bool {
        self.contents[1].is_detail()
    }

    /// Drawn in the final map.
    pub const fn is_visible(&self, keep_skip: bool) -> bool {
        !self.flags.hint
            && !self.flags.bevel
            && (keep_skip || !self.flags.skip)
            && !self.contents[0].is_opaque()
            && !matches!(self.contents[1], Contents::AreaPortal | Contents::Clip)
    }

    /// The face seen from the other side.
    pub fn mirrored(&self) -> Self {
        Face {
            winding: self.winding.reversed(),
            plane: self.plane.flip(),
            contents: [self.contents[1], self.contents[0]],
            ..self.clone()
        }
    }
}

/// All faces lying on one plane, either orientation.
#[derive(Debug, Clone)]
pub struct Surface {
    pub plane: PlaneId,
    pub faces: Vec<Face>,
    pub bounds: Bounds,
}

impl Surface {
    pub fn new(plane: PlaneId, faces: Vec<Face>) -> Self {
        let mut bounds = empty_bounds();
        for f in &faces {
            bounds.merge(&f.winding.bounds());
        }
        Surface {
            plane,
            faces,
            bounds,
        }
    }

    pub fn has_structural(&self) -> bool {
        self.faces.iter().any(|f| !f.is_detail())
    }
}

/// Group faces into surfaces ordered by plane id.
pub fn group_surfaces(faces: Vec<Face>) -> Vec<Surface> {
    let mut by_plane: std::collections::BTreeMap<PlaneId, Vec<Face>> = Default::default();
    for face in faces {
        by_plane.entry(face.plane.id).or_default().push(face);
    }
    by_plane
        .into_iter()
        .map(|(plane, faces)| Surface::new(plane, faces))
        .collect()
}

fn brush_faces(brush: &Brush, index: usize) -> Vec<Face> {
    brush
        .sides
        .iter()
        .filter(|side| !brush.hint || side.flags.hint)
        .map(|side| Face {
            winding: side.winding.clone(),
            plane: side.plane,
            texinfo: side.texinfo,
            contents: [Contents::Empty, brush.contents],
            flags: side.flags,
            lmshift: side.lmshift,
            source_entity: brush.source_entity,
            brush: index,
        })
        .collect()
}

/// Split `faces` by the sides of `clipper`. Returns `(inside, outside)`.
///
/// A fragment on a clipper plane facing into the clipper counts as inside.
/// One facing the same way counts as inside only when `clipper_wins`, so of
/// two coincident faces exactly one survives.
fn clip_inside(
    ctx: &CompileContext,
    faces: Vec<Face>,
    clipper: &Brush,
    clipper_wins: bool,
) -> (Vec<Face>, Vec<Face>) {
    let eps = ctx.epsilon();
    let mut inside = faces;
    let mut outside = Vec::new();

    for side in &clipper.sides {
        let plane = ctx.planes.get(side.plane);
        let mut still_inside = Vec::with_capacity(inside.len());
        for face in inside {
            if face.plane.id == side.plane.id {
                if face.plane.flipped != side.plane.flipped || clipper_wins {
                    still_inside.push(face);
                } else {
                    outside.push(face);
                }
                continue;
            }
            let (front, back) = face.winding.split(&plane, eps);
            if let Some(w) = front {
                outside.push(Face {
                    winding: w,
                    ..face.clone()
                });
            }
            if let Some(w) = back {
                still_inside.push(Face { winding: w, ..face });
            }
        }
        inside = still_inside;
        if inside.is_empty() {
            break;
        }
    }

    (inside, outside)
}

fn clip_brush(ctx: &CompileContext, brushes: &[Brush], index: usize) -> Vec<Face> {
    let brush = &brushes[index];
    let mut outside = brush_faces(brush, index);
    let mut later = false;
    let eps = ctx.epsilon();

    for (j, clipper) in brushes.iter().enumerate() {
        if j == index {
            later = true;
            continue;
        }
        if clipper.hint || outside.is_empty() {
            continue;
        }
        if !clipper.bounds.loosened(eps).intersects(&brush.bounds) {
            continue;
        }

        let ours = brush.contents.precedence();
        let theirs = clipper.contents.precedence();
        let clipper_wins = theirs > ours || (theirs == ours && later);

        let (inside, mut kept) = clip_inside(ctx, outside, clipper, clipper_wins);
        for mut face in inside {
            if theirs >= ours {
                if clipper.contents.is_opaque() || clipper.contents == brush.contents {
                    continue;
                }
                face.contents[0] = clipper.contents;
            } else {
                face.contents[0] = face.contents[0].max_precedence(clipper.contents);
            }
            kept.push(face);
        }
        outside = kept;
    }

    // hint faces float in whatever they were clipped into
    if brush.hint {
        for face in &mut outside {
            face.contents[1] = face.contents[0];
        }
    }

    if brush.mirror_inside {
        let mirrored: Vec<Face> = outside
            .iter()
            .filter(|f| !f.contents[0].is_opaque() && f.contents[0] != f.contents[1])
            .filter(|f| f.flags.is_visible())
            .map(Face::mirrored)
            .collect();
        outside.extend(mirrored);
    }

    outside
}

/// Clip every brush of an entity against the others and return the visible
/// skin grouped per plane.
///
/// Visible geometry does not depend on brush order; only which of two
/// coincident faces survives does.
pub fn csg_faces(ctx: &CompileContext, brushes: &[Brush]) -> Vec<Surface> {
    let progress = Progress::new("CSGFaces", brushes.len());
    let clip = |index: usize| {
        let faces = clip_brush(ctx, brushes, index);
        progress.tick();
        faces
    };

    #[cfg(feature = "parallel")]
    let per_brush: Vec<Vec<Face>> = (0..brushes.len()).into_par_iter().map(clip).collect();
    #[cfg(not(feature = "parallel"))]
    let per_brush: Vec<Vec<Face>> = (0..brushes.len()).map(clip).collect();

    let faces: Vec<Face> = per_brush.into_iter().flatten().collect();
    let face_count = faces.len();
    let surfaces = group_surfaces(faces);
    log::info!("{face_count:8} faces on {:8} surfaces after CSG", surfaces.len());
    surfaces
}
