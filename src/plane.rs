//! Planes and the shared, deduplicated plane table.
//!
//! Every plane stored in the [`PlaneTable`] is kept in a canonical orientation.
//! Faces, brush sides and nodes never hold a raw plane; they hold a
//! [`PlaneRef`], a table id plus a `flipped` flag selecting the negated plane.

use crate::float_types::{DIST_EPSILON, NORMAL_EPSILON, Real};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use parking_lot::RwLock;

// Plane classification constants
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// Axis classification written into the plane lump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneType {
    X,
    Y,
    Z,
    AnyX,
    AnyY,
    AnyZ,
}

impl PlaneType {
    /// Classify a unit normal.
    pub fn from_normal(normal: &Vector3<Real>) -> Self {
        if normal.x.abs() == 1.0 {
            return PlaneType::X;
        }
        if normal.y.abs() == 1.0 {
            return PlaneType::Y;
        }
        if normal.z.abs() == 1.0 {
            return PlaneType::Z;
        }

        let ax = normal.x.abs();
        let ay = normal.y.abs();
        let az = normal.z.abs();
        if ax >= ay && ax >= az {
            PlaneType::AnyX
        } else if ay >= ax && ay >= az {
            PlaneType::AnyY
        } else {
            PlaneType::AnyZ
        }
    }

    /// Numeric value used on disk (0-5).
    pub const fn value(self) -> i32 {
        match self {
            PlaneType::X => 0,
            PlaneType::Y => 1,
            PlaneType::Z => 2,
            PlaneType::AnyX => 3,
            PlaneType::AnyY => 4,
            PlaneType::AnyZ => 5,
        }
    }

    pub const fn is_axial(self) -> bool {
        matches!(self, PlaneType::X | PlaneType::Y | PlaneType::Z)
    }

    /// Dominant axis index (0, 1 or 2).
    pub const fn axis(self) -> usize {
        match self {
            PlaneType::X | PlaneType::AnyX => 0,
            PlaneType::Y | PlaneType::AnyY => 1,
            PlaneType::Z | PlaneType::AnyZ => 2,
        }
    }
}

/// A plane `normal · p = dist`. The front side is the side the normal points to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal vector of the plane
    pub normal: Vector3<Real>,
    /// Distance from origin along normal
    pub dist: Real,
}

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and a distance
    /// measured along the normalized normal.
    pub fn from_normal(normal: Vector3<Real>, dist: Real) -> Self {
        Plane {
            normal: normal.normalize(),
            dist,
        }
    }

    /// Plane through three points using the map-file winding rule
    /// `(p0 - p1) × (p2 - p1)`. Returns `None` for collinear points.
    pub fn from_points(p0: &Point3<Real>, p1: &Point3<Real>, p2: &Point3<Real>) -> Option<Self> {
        let normal = (p0 - p1).cross(&(p2 - p1));
        let len = normal.norm();
        if len < NORMAL_EPSILON {
            return None;
        }
        let normal = normal / len;
        Some(Plane {
            normal,
            dist: normal.dot(&p1.coords),
        })
    }

    /// The same plane facing the other way.
    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            dist: -self.dist,
        }
    }

    /// Signed distance from `point` to the plane.
    #[inline]
    pub fn distance_to(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.dist
    }

    /// Classify a point as FRONT, BACK or COPLANAR within `epsilon`.
    #[inline]
    pub fn orient_point(&self, point: &Point3<Real>, epsilon: Real) -> i8 {
        let d = self.distance_to(point);
        if d > epsilon {
            FRONT
        } else if d < -epsilon {
            BACK
        } else {
            COPLANAR
        }
    }

    pub fn plane_type(&self) -> PlaneType {
        PlaneType::from_normal(&self.normal)
    }

    /// Geometric equality within the table tolerances.
    pub fn approx_eq(&self, other: &Plane) -> bool {
        (self.normal - other.normal).iter().all(|c| c.abs() < NORMAL_EPSILON)
            && (self.dist - other.dist).abs() < DIST_EPSILON
    }

    /// Snap nearly-axial normals onto the axis and nearly-integral distances
    /// onto the integer.
    pub fn snapped(&self) -> Self {
        let mut normal = self.normal;
        for i in 0..3 {
            if (normal[i] - 1.0).abs() < NORMAL_EPSILON {
                normal = Vector3::zeros();
                normal[i] = 1.0;
                break;
            }
            if (normal[i] + 1.0).abs() < NORMAL_EPSILON {
                normal = Vector3::zeros();
                normal[i] = -1.0;
                break;
            }
        }
        let rounded = self.dist.round();
        let dist = if (self.dist - rounded).abs() < DIST_EPSILON {
            rounded
        } else {
            self.dist
        };
        Plane { normal, dist }
    }

    /// Returns the canonical orientation of this plane and whether `self`
    /// is the negation of it. Axial planes face the positive axis, all
    /// others have a positive dominant component.
    pub fn canonical(&self) -> (Plane, bool) {
        let ty = self.plane_type();
        let axis = ty.axis();
        if self.normal[axis] < 0.0 {
            (self.flipped(), true)
        } else {
            (*self, false)
        }
    }
}

/// Index of a canonical plane in the [`PlaneTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub usize);

/// A canonical plane id plus the orientation actually wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneRef {
    pub id: PlaneId,
    pub flipped: bool,
}

impl PlaneRef {
    pub const fn new(id: PlaneId, flipped: bool) -> Self {
        PlaneRef { id, flipped }
    }

    /// The opposite orientation of the same plane.
    pub const fn flip(self) -> Self {
        PlaneRef {
            id: self.id,
            flipped: !self.flipped,
        }
    }
}

#[derive(Debug, Default)]
struct PlaneStore {
    planes: Vec<Plane>,
    buckets: HashMap<i64, Vec<PlaneId>>,
}

impl PlaneStore {
    fn find(&self, plane: &Plane) -> Option<PlaneId> {
        let key = plane.dist.floor() as i64;
        (key - 1..=key + 1)
            .filter_map(|k| self.buckets.get(&k))
            .flatten()
            .copied()
            .find(|id| self.planes[id.0].approx_eq(plane))
    }
}

/// Append-only table of canonical planes shared by every stage of one compile.
///
/// Lookups take a read lock, inserts a write lock with a second lookup inside
/// it, so concurrent brush loading never stores the same plane twice. Ids are
/// never invalidated while the table lives.
#[derive(Debug, Default)]
pub struct PlaneTable {
    store: RwLock<PlaneStore>,
}

impl PlaneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the plane (in either orientation) or append it.
    pub fn find_or_insert(&self, plane: &Plane) -> PlaneRef {
        let (canonical, flipped) = plane.snapped().canonical();

        if let Some(id) = self.store.read().find(&canonical) {
            return PlaneRef::new(id, flipped);
        }

        let mut store = self.store.write();
        if let Some(id) = store.find(&canonical) {
            return PlaneRef::new(id, flipped);
        }
        let id = PlaneId(store.planes.len());
        store.planes.push(canonical);
        store
            .buckets
            .entry(canonical.dist.floor() as i64)
            .or_default()
            .push(id);
        PlaneRef::new(id, flipped)
    }

    /// The plane `plane_ref` addresses, in its requested orientation.
    pub fn get(&self, plane_ref: PlaneRef) -> Plane {
        let plane = self.store.read().planes[plane_ref.id.0];
        if plane_ref.flipped {
            plane.flipped()
        } else {
            plane
        }
    }

    /// The canonical plane stored under `id`.
    pub fn canonical(&self, id: PlaneId) -> Plane {
        self.store.read().planes[id.0]
    }

    pub fn len(&self) -> usize {
        self.store.read().planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every canonical plane, indexed by [`PlaneId`].
    pub fn snapshot(&self) -> Vec<Plane> {
        self.store.read().planes.clone()
    }
}
