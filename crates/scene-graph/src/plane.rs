//! Half-space planes and volume classification against them.

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::{BoundingBox, BoundingSphere, SceneError};

/// Where a volume lies relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Entirely on the side the normal points to
    Front,
    /// Entirely on the opposite side
    Back,
    /// Touches both sides
    Spanning,
}

/// A plane in 3D space, represented as `normal · point = offset`.
///
/// The normal points into the retained half-space. Besides the plane itself
/// the indices of the box corners lying furthest along and against the
/// normal are cached, so a box is classified with two dot products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    normal: Vector3<f32>,
    offset: f32,
    upper_corner: usize,
    lower_corner: usize,
}

impl Plane {
    /// Creates a new plane from a normal vector and offset.
    /// The normal will be normalized automatically.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn new(normal: Vector3<f32>, offset: f32) -> Self {
        let norm = normal.norm();
        assert!(norm > f32::EPSILON, "Plane normal cannot be zero");
        Self::with_corners(normal / norm, offset / norm)
    }

    /// Creates the plane `a*x + b*y + c*z + d = 0`.
    ///
    /// # Panics
    /// Panics if `(a, b, c)` has zero length.
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self::new(Vector3::new(a, b, c), -d)
    }

    /// Creates a plane from a point on the plane and a normal vector.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn from_point_and_normal(point: Point3<f32>, normal: Vector3<f32>) -> Self {
        let norm = normal.norm();
        assert!(norm > f32::EPSILON, "Plane normal cannot be zero");
        let unit_normal = normal / norm;
        Self::with_corners(unit_normal, unit_normal.dot(&point.coords))
    }

    /// Creates a plane from three non-collinear points.
    /// The normal direction follows the right-hand rule: (b - a) × (c - a).
    ///
    /// # Panics
    /// Panics if the points are collinear (or nearly so).
    pub fn from_three_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Self::from_point_and_normal(a, (b - a).cross(&(c - a)))
    }

    fn with_corners(normal: Vector3<f32>, offset: f32) -> Self {
        let mut plane = Self {
            normal,
            offset,
            upper_corner: 0,
            lower_corner: 0,
        };
        plane.update_corners();
        plane
    }

    fn update_corners(&mut self) {
        self.upper_corner = usize::from(self.normal.x >= 0.0)
            | (usize::from(self.normal.y >= 0.0) << 1)
            | (usize::from(self.normal.z >= 0.0) << 2);
        self.lower_corner = !self.upper_corner & 7;
    }

    /// Returns the unit normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Index of the box corner furthest along the normal.
    #[inline]
    pub fn upper_corner(&self) -> usize {
        self.upper_corner
    }

    /// Index of the box corner furthest against the normal.
    #[inline]
    pub fn lower_corner(&self) -> usize {
        self.lower_corner
    }

    /// Computes the signed distance from a point to the plane.
    /// Positive distances lie in front, on the side the normal points to.
    #[inline]
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Returns a new plane with the normal flipped (facing the opposite direction).
    #[inline]
    pub fn flipped(&self) -> Self {
        Self::with_corners(-self.normal, -self.offset)
    }

    /// Flips the plane in place.
    pub fn flip(&mut self) {
        *self = self.flipped();
    }

    /// Classifies `volume` against this plane.
    #[inline]
    pub fn classify<V: PlaneClassify + ?Sized>(&self, volume: &V) -> Classification {
        volume.classify(self)
    }

    /// Re-expresses the plane in another frame, given the inverse of the
    /// point transform into that frame.
    ///
    /// Plane coefficients transform by the inverse-transpose, so passing the
    /// inverse directly avoids inverting twice.
    pub fn transform_providing_inverse(&mut self, inverse: &Matrix4<f32>) {
        let coefficients = Vector4::new(self.normal.x, self.normal.y, self.normal.z, -self.offset);
        let mapped = inverse.transpose() * coefficients;
        let normal = mapped.xyz();
        let norm = normal.norm();
        if norm > f32::EPSILON {
            self.normal = normal / norm;
            self.offset = -mapped.w / norm;
        } else {
            self.normal = normal;
            self.offset = -mapped.w;
        }
        self.update_corners();
    }

    /// Transforms the plane by the point transform `matrix`.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) -> Result<(), SceneError> {
        let inverse = matrix.try_inverse().ok_or(SceneError::SingularMatrix)?;
        self.transform_providing_inverse(&inverse);
        Ok(())
    }
}

/// Volumes that can be classified against a [`Plane`].
pub trait PlaneClassify {
    fn classify(&self, plane: &Plane) -> Classification;

    /// Returns `false` for an empty volume, which is never inside anything.
    fn valid(&self) -> bool {
        true
    }
}

impl PlaneClassify for Point3<f32> {
    fn classify(&self, plane: &Plane) -> Classification {
        if plane.signed_distance(*self) >= 0.0 {
            Classification::Front
        } else {
            Classification::Back
        }
    }
}

impl PlaneClassify for BoundingSphere {
    fn classify(&self, plane: &Plane) -> Classification {
        let distance = plane.signed_distance(self.center());
        if distance > self.radius() {
            Classification::Front
        } else if distance < -self.radius() {
            Classification::Back
        } else {
            Classification::Spanning
        }
    }

    fn valid(&self) -> bool {
        BoundingSphere::valid(self)
    }
}

impl PlaneClassify for BoundingBox {
    fn classify(&self, plane: &Plane) -> Classification {
        if plane.signed_distance(self.corner(plane.lower_corner())) > 0.0 {
            Classification::Front
        } else if plane.signed_distance(self.corner(plane.upper_corner())) < 0.0 {
            Classification::Back
        } else {
            Classification::Spanning
        }
    }

    fn valid(&self) -> bool {
        BoundingBox::valid(self)
    }
}

/// A vertex list is in front when no vertex lies behind, behind when no
/// vertex lies in front. An empty list counts as behind.
impl PlaneClassify for [Point3<f32>] {
    fn classify(&self, plane: &Plane) -> Classification {
        let mut above = false;
        let mut below = false;
        for vertex in self {
            let distance = plane.signed_distance(*vertex);
            above |= distance > 0.0;
            below |= distance < 0.0;
            if above && below {
                return Classification::Spanning;
            }
        }
        if above {
            Classification::Front
        } else {
            Classification::Back
        }
    }
}
