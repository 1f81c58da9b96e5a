//! Texture projection vectors derived from map brush sides.

use crate::float_types::{PI, Real};
use nalgebra::Vector3;
use std::hash::{Hash, Hasher};

// Quake II surface flags
pub const SURF_LIGHT: i32 = 0x1;
pub const SURF_SKY: i32 = 0x4;
pub const SURF_WARP: i32 = 0x8;
pub const SURF_NODRAW: i32 = 0x80;
pub const SURF_HINT: i32 = 0x100;
pub const SURF_SKIP: i32 = 0x200;

/// How a side's texture is laid onto its plane in the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum TexProjection {
    /// Classic QuakeEd alignment: axis chosen from the plane normal
    Standard {
        shift: [Real; 2],
        rotate: Real,
        scale: [Real; 2],
    },
    /// Valve 220: explicit axes with offsets
    Valve {
        axes: [[Real; 4]; 2],
        rotate: Real,
        scale: [Real; 2],
    },
}

/// Final texture projection of a face: `s = vecs[0]·p + vecs[0][3]`, same for `t`.
#[derive(Debug, Clone)]
pub struct TexInfo {
    pub vecs: [[Real; 4]; 2],
    pub texture: String,
    /// Quake II surface flags
    pub flags: i32,
    /// Quake II surface value (light emission etc.)
    pub value: i32,
}

impl PartialEq for TexInfo {
    fn eq(&self, other: &Self) -> bool {
        self.texture == other.texture
            && self.flags == other.flags
            && self.value == other.value
            && self
                .vecs
                .iter()
                .flatten()
                .zip(other.vecs.iter().flatten())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for TexInfo {}

impl Hash for TexInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.texture.hash(state);
        self.flags.hash(state);
        self.value.hash(state);
        for v in self.vecs.iter().flatten() {
            v.to_bits().hash(state);
        }
    }
}

// floor, ceiling, west, east, south, north: (normal, s axis, t axis)
const BASE_AXIS: [[[Real; 3]; 3]; 6] = [
    [[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]],
    [[0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]],
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]],
    [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]],
    [[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
    [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
];

/// Pick the texture axes for a plane normal the way QuakeEd does.
pub fn texture_axis_from_plane(normal: &Vector3<Real>) -> (Vector3<Real>, Vector3<Real>) {
    let mut best = 0;
    let mut best_dot = 0.0;
    for (i, axis) in BASE_AXIS.iter().enumerate() {
        let dot = normal.dot(&Vector3::from(axis[0]));
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }
    (
        Vector3::from(BASE_AXIS[best][1]),
        Vector3::from(BASE_AXIS[best][2]),
    )
}

fn sin_cos_degrees(angle: Real) -> (Real, Real) {
    // exact values for the common right angles
    match angle {
        a if a == 0.0 => (0.0, 1.0),
        a if a == 90.0 => (1.0, 0.0),
        a if a == 180.0 => (0.0, -1.0),
        a if a == 270.0 => (-1.0, 0.0),
        a => {
            let rad = a / 180.0 * PI;
            (rad.sin(), rad.cos())
        },
    }
}

impl TexInfo {
    pub fn new(texture: &str, projection: &TexProjection, normal: &Vector3<Real>) -> Self {
        let vecs = match projection {
            TexProjection::Standard {
                shift,
                rotate,
                scale,
            } => standard_vecs(normal, *shift, *rotate, *scale),
            TexProjection::Valve { axes, scale, .. } => {
                let mut vecs = [[0.0; 4]; 2];
                for i in 0..2 {
                    let s = if scale[i] == 0.0 { 1.0 } else { scale[i] };
                    for j in 0..3 {
                        vecs[i][j] = axes[i][j] / s;
                    }
                    vecs[i][3] = axes[i][3];
                }
                vecs
            },
        };
        TexInfo {
            vecs,
            texture: texture.to_string(),
            flags: 0,
            value: 0,
        }
    }

    pub const fn with_flags(mut self, flags: i32, value: i32) -> Self {
        self.flags = flags;
        self.value = value;
        self
    }
}

fn standard_vecs(
    normal: &Vector3<Real>,
    shift: [Real; 2],
    rotate: Real,
    scale: [Real; 2],
) -> [[Real; 4]; 2] {
    let (xv, yv) = texture_axis_from_plane(normal);
    let mut axes = [xv, yv];

    let (sinv, cosv) = sin_cos_degrees(rotate);
    let sv = if xv.x != 0.0 {
        0
    } else if xv.y != 0.0 {
        1
    } else {
        2
    };
    let tv = if yv.x != 0.0 {
        0
    } else if yv.y != 0.0 {
        1
    } else {
        2
    };

    for axis in axes.iter_mut() {
        let ns = cosv * axis[sv] - sinv * axis[tv];
        let nt = sinv * axis[sv] + cosv * axis[tv];
        axis[sv] = ns;
        axis[tv] = nt;
    }

    let mut vecs = [[0.0; 4]; 2];
    for i in 0..2 {
        let s = if scale[i] == 0.0 { 1.0 } else { scale[i] };
        for j in 0..3 {
            vecs[i][j] = axes[i][j] / s;
        }
    }
    vecs[0][3] = shift[0];
    vecs[1][3] = shift[1];
    vecs
}
