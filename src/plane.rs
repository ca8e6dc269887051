use crate::math::{Matrix4, Vec3};

/// A geometric plane `normal · x + offset = 0` anchored at a point.
///
/// The normal is not normalized. An optional pose transform re-expresses
/// the normal and anchor when they are read, so a plane estimated in one
/// camera pose can be queried from another.
///
/// `Clone` is a deep copy: planes are handed across threads by value.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    normal: Vec3,
    point: Vec3,
    transform: Option<Matrix4>,
}

impl Plane {
    /// Build a plane from two in-plane vectors and a point on the plane.
    ///
    /// Of the two candidate normals `±(v1 × v2)`, the one whose sum with `p`
    /// has the smaller magnitude is kept. Ties keep `v1 × v2`.
    pub fn new(v1: Vec3, v2: Vec3, p: Vec3) -> Self {
        let cross = v1.cross(v2);
        let normal = if (p + cross).magnitude() > (p - cross).magnitude() {
            -cross
        } else {
            cross
        };
        Self {
            normal,
            point: p,
            transform: None,
        }
    }

    /// Plane through three points, anchored at `a`.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self::new(a - b, a - c, a)
    }

    pub fn with_transform(mut self, transform: Matrix4) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn set_transform(&mut self, transform: Option<Matrix4>) {
        self.transform = transform;
    }

    pub fn transform(&self) -> Option<&Matrix4> {
        self.transform.as_ref()
    }

    /// The normal, through the transform's rotation block when one is set.
    pub fn normal(&self) -> Vec3 {
        match &self.transform {
            Some(m) => m.transform_vector(self.normal),
            None => self.normal,
        }
    }

    /// The anchor point, through the full transform when one is set.
    pub fn point(&self) -> Vec3 {
        match &self.transform {
            Some(m) => m.transform_point(self.point),
            None => self.point,
        }
    }

    /// Signed offset `d = -(normal · point)`.
    pub fn offset(&self) -> f64 {
        -self.normal().dot(self.point())
    }

    /// A zero normal (collinear or coincident defining points).
    pub fn is_degenerate(&self) -> bool {
        self.normal.is_zero()
    }

    /// Perpendicular distance from `v` to the plane.
    ///
    /// Degenerate planes have no defined distance and answer
    /// `f64::INFINITY`, so nothing is ever counted as a member.
    pub fn distance(&self, v: Vec3) -> f64 {
        let normal = self.normal();
        let mag = normal.magnitude();
        if mag == 0.0 || !mag.is_finite() {
            return f64::INFINITY;
        }
        (normal.dot(v) + self.offset()).abs() / mag
    }

    /// The point on the plane above `(x, y)`, or `None` when the plane is
    /// parallel to the Z axis.
    pub fn point_at(&self, x: f64, y: f64) -> Option<Vec3> {
        let n = self.normal();
        if n.z == 0.0 {
            return None;
        }
        Some(Vec3::new(x, y, -(n.x * x + n.y * y + self.offset()) / n.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn triangle() -> (Vec3, Vec3, Vec3) {
        (
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, -1.0, 2.5),
            Vec3::new(-2.0, 0.5, 7.0),
        )
    }

    #[test]
    fn test_defining_points_on_plane() {
        let (a, b, c) = triangle();
        let plane = Plane::from_points(a, b, c);
        for p in [a, b, c] {
            assert!(plane.distance(p) < EPS, "distance {}", plane.distance(p));
        }
    }

    #[test]
    fn test_swap_invariance() {
        let (a, b, c) = triangle();
        let p1 = Plane::new(a - b, a - c, a);
        let p2 = Plane::new(a - c, a - b, a);
        let sample = Vec3::new(10.0, -3.0, 0.25);
        assert!((p1.distance(sample) - p2.distance(sample)).abs() < EPS);

        let n1 = p1.normal();
        let n2 = p2.normal();
        assert!(n1.cross(n2).magnitude() < EPS);
    }

    #[test]
    fn test_normal_orientation_convention() {
        // Plane z = 5 anchored at (0, 0, 5): the kept normal points back
        // toward the origin side.
        let p = Vec3::new(0.0, 0.0, 5.0);
        let plane = Plane::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), p);
        assert!(plane.normal().z < 0.0);
        let flipped = Plane::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0), p);
        assert_eq!(plane.normal(), flipped.normal());
    }

    #[test]
    fn test_distance_known_value() {
        let plane = Plane::new(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
        );
        assert!((plane.distance(Vec3::new(7.0, -2.0, 8.0)) - 3.0).abs() < EPS);
        assert!((plane.distance(Vec3::new(0.0, 0.0, 0.0)) - 5.0).abs() < EPS);
        assert!((plane.offset().abs() - 30.0).abs() < EPS);
    }

    #[test]
    fn test_degenerate_distance_is_infinite() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let plane = Plane::from_points(a, Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 2.0, 2.0));
        assert!(plane.is_degenerate());
        assert!(plane.distance(a).is_infinite());
    }

    #[test]
    fn test_point_at() {
        let plane = Plane::from_points(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
        );
        let p = plane.point_at(3.0, -4.0).unwrap();
        assert!((p.z - 5.0).abs() < EPS);

        let wall = Plane::from_points(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        assert!(wall.point_at(1.0, 1.0).is_none());
    }

    #[test]
    fn test_transform_applied_on_read() {
        let plane = Plane::from_points(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
        );
        let moved = plane
            .clone()
            .with_transform(Matrix4::translation(Vec3::new(0.0, 0.0, 2.0)));
        assert_eq!(moved.normal(), plane.normal());
        assert!(moved.distance(Vec3::new(3.0, 3.0, 7.0)) < EPS);
        assert!((moved.distance(Vec3::new(3.0, 3.0, 5.0)) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_clone_is_independent() {
        let (a, b, c) = triangle();
        let mut source = Plane::from_points(a, b, c).with_transform(Matrix4::rotation_y(0.4));
        let copy = source.clone();
        assert_eq!(copy, source);

        source.set_transform(Some(Matrix4::rotation_x(1.2)));
        assert_eq!(copy.transform(), Some(&Matrix4::rotation_y(0.4)));
        assert_ne!(copy.normal(), source.normal());
    }
}
