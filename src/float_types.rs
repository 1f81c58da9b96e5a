// Re-export parry for the appropriate float size
#[cfg(feature = "f64")]
pub use parry3d_f64 as parry3d;

#[cfg(feature = "f32")]
pub use parry3d;

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Axis-aligned bounding box used throughout the compiler.
pub type Bounds = parry3d::bounding_volume::Aabb;

/// Lazily-initialized plane-side tolerance ("ON_EPSILON") used across the crate.
/// Defaults to `0.0001`, but can be overridden:
///  1) **Build-time**: set env var `QBSP_TOLERANCE` (e.g. `QBSP_TOLERANCE=0.001 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before compiling
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-4
}

/// Returns the current plane-side epsilon.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("QBSP_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the plane-side epsilon once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Archimedes' constant (π)
#[cfg(feature = "f32")]
pub const PI: Real = core::f32::consts::PI;
/// Archimedes' constant (π)
#[cfg(feature = "f64")]
pub const PI: Real = core::f64::consts::PI;

/// Two plane normals closer than this are considered equal.
pub const NORMAL_EPSILON: Real = 1e-5;

/// Two plane distances closer than this are considered equal.
pub const DIST_EPSILON: Real = 1e-4;

/// Vertex welding tolerance for T-junction repair and face merging.
pub const EQUAL_EPSILON: Real = 1e-3;

/// Edges shorter than this do not count toward a winding's size.
pub const EDGE_LENGTH: Real = 0.2;

/// Merged face edges closer to straight than this are treated as collinear.
pub const CONTINUOUS_EPSILON: Real = 1e-3;

/// Default maximum coordinate magnitude of map geometry.
pub const DEFAULT_WORLD_EXTENT: Real = 65536.0;

/// Padding added around a tree's bounds for the outside portals.
pub const SIDESPACE: Real = 24.0;

/// Returns an empty bounding box that grows with [`Bounds::take_point`].
#[inline]
pub fn empty_bounds() -> Bounds {
    Bounds::new_invalid()
}

/// `true` for a box that never took a point.
#[inline]
pub fn bounds_is_empty(bounds: &Bounds) -> bool {
    bounds.mins.x > bounds.maxs.x
}
