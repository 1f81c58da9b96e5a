use nalgebra::{Point3, Vector3};
use qbsp::plane::{BACK, COPLANAR, FRONT, Plane, PlaneTable, PlaneType};

#[test]
fn from_points_faces_out_of_the_brush() {
    // +x side of a box ending at x = 16
    let p1 = Point3::new(16.0, 0.0, 0.0);
    let p0 = Point3::new(16.0, 64.0, 0.0);
    let p2 = Point3::new(16.0, 0.0, 64.0);
    let plane = Plane::from_points(&p0, &p1, &p2).unwrap();
    assert_eq!(plane.normal, Vector3::x());
    assert_eq!(plane.dist, 16.0);
}

#[test]
fn from_points_rejects_collinear() {
    let a = Point3::new(0.0, 0.0, 0.0);
    let b = Point3::new(1.0, 1.0, 1.0);
    let c = Point3::new(2.0, 2.0, 2.0);
    assert!(Plane::from_points(&a, &b, &c).is_none());
}

#[test]
fn orient_point() {
    let plane = Plane::from_normal(Vector3::z(), 8.0);
    assert_eq!(plane.orient_point(&Point3::new(0.0, 0.0, 9.0), 0.01), FRONT);
    assert_eq!(plane.orient_point(&Point3::new(0.0, 0.0, 7.0), 0.01), BACK);
    assert_eq!(
        plane.orient_point(&Point3::new(5.0, 5.0, 8.005), 0.01),
        COPLANAR
    );
}

#[test]
fn canonical_axial_planes_face_positive() {
    let plane = Plane::from_normal(-Vector3::z(), -5.0);
    let (canonical, flipped) = plane.canonical();
    assert!(flipped);
    assert_eq!(canonical.normal, Vector3::z());
    assert_eq!(canonical.dist, 5.0);
    assert_eq!(canonical.plane_type(), PlaneType::Z);
}

#[test]
fn canonical_non_axial_uses_dominant_component() {
    let plane = Plane::from_normal(Vector3::new(-2.0, 1.0, 0.0), 3.0);
    let (canonical, flipped) = plane.canonical();
    assert!(flipped);
    assert!(canonical.normal.x > 0.0);
    assert_eq!(canonical.plane_type(), PlaneType::AnyX);
}

#[test]
fn plane_table_stores_both_orientations_once() {
    let table = PlaneTable::new();
    let up = Plane::from_normal(Vector3::z(), 32.0);
    let a = table.find_or_insert(&up);
    let b = table.find_or_insert(&up.flipped());
    assert_eq!(a.id, b.id);
    assert_ne!(a.flipped, b.flipped);
    assert_eq!(table.len(), 1);

    let down = table.get(b);
    assert_eq!(down.normal, -Vector3::z());
    assert_eq!(down.dist, -32.0);
}

#[test]
fn plane_table_merges_nearly_equal_planes() {
    let table = PlaneTable::new();
    let a = table.find_or_insert(&Plane::from_normal(Vector3::x(), 10.0));
    let b = table.find_or_insert(&Plane::from_normal(Vector3::x(), 10.000001));
    let c = table.find_or_insert(&Plane::from_normal(Vector3::x(), 11.0));
    assert_eq!(a, b);
    assert_ne!(a.id, c.id);
    assert_eq!(table.len(), 2);
}
