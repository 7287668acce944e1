//! Triangles, the primitive every drawable is picked against.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::plane::{Classification, Plane, PlaneClassify};
use crate::BoundingBox;

/// A triangle in 3D space, defined by three vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    vertices: [Point3<f32>; 3],
}

impl Triangle {
    /// Creates a new triangle from three points.
    ///
    /// The winding order determines the normal direction via the right-hand rule:
    /// normal = (b - a) x (c - a)
    pub fn new(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>; 3] {
        &self.vertices
    }

    /// Computes the (unnormalized) normal vector of the triangle.
    pub fn normal(&self) -> Vector3<f32> {
        let [a, b, c] = &self.vertices;
        (b - a).cross(&(c - a))
    }

    /// Computes the unit normal vector of the triangle.
    ///
    /// Returns `None` if the triangle is degenerate (zero area).
    pub fn unit_normal(&self) -> Option<Vector3<f32>> {
        self.normal().try_normalize(f32::EPSILON)
    }

    /// Returns the supporting plane, or `None` for a degenerate triangle.
    pub fn plane(&self) -> Option<Plane> {
        self.unit_normal()
            .map(|normal| Plane::from_point_and_normal(self.vertices[0], normal))
    }

    /// Returns the mean of the three vertices.
    pub fn centroid(&self) -> Point3<f32> {
        let [a, b, c] = &self.vertices;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for vertex in &self.vertices {
            bb.expand_by_point(*vertex);
        }
        bb
    }

    /// Maps every vertex through `matrix`.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Triangle {
        let [a, b, c] = self.vertices.map(|v| matrix.transform_point(&v));
        Triangle::new(a, b, c)
    }
}

impl PlaneClassify for Triangle {
    fn classify(&self, plane: &Plane) -> Classification {
        self.vertices[..].classify(plane)
    }
}
