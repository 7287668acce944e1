//! Rectangle (quad) helper for building flat geometry.

use nalgebra::{Point3, Vector3};

use crate::{BoundingBox, Triangle};

/// A rectangle (quad) in 3D space, defined by a corner and two edge vectors.
///
/// The four vertices are:
/// - `origin`
/// - `origin + u`
/// - `origin + u + v`
/// - `origin + v`
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    origin: Point3<f32>,
    u: Vector3<f32>,
    v: Vector3<f32>,
}

impl Rectangle {
    /// Creates a new rectangle from an origin corner and two edge vectors.
    pub fn new(origin: Point3<f32>, u: Vector3<f32>, v: Vector3<f32>) -> Self {
        Self { origin, u, v }
    }

    /// Creates a rectangle from three consecutive corners `a -> b -> c`;
    /// the fourth corner is implied.
    pub fn from_corners(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Self {
            origin: a,
            u: b - a,
            v: c - b,
        }
    }

    #[inline]
    pub fn origin(&self) -> Point3<f32> {
        self.origin
    }

    #[inline]
    pub fn u(&self) -> Vector3<f32> {
        self.u
    }

    #[inline]
    pub fn v(&self) -> Vector3<f32> {
        self.v
    }

    /// Returns the four vertices of the rectangle, counter-clockwise.
    pub fn vertices(&self) -> [Point3<f32>; 4] {
        [
            self.origin,
            self.origin + self.u,
            self.origin + self.u + self.v,
            self.origin + self.v,
        ]
    }

    /// Splits the rectangle along the `origin` to `origin + u + v` diagonal.
    /// Both halves keep the rectangle's winding.
    pub fn triangles(&self) -> [Triangle; 2] {
        let [a, b, c, d] = self.vertices();
        [Triangle::new(a, b, c), Triangle::new(a, c, d)]
    }

    /// Computes the (unnormalized) normal vector of the rectangle: u x v.
    pub fn normal(&self) -> Vector3<f32> {
        self.u.cross(&self.v)
    }

    /// Returns `None` if the rectangle is degenerate (zero area).
    pub fn unit_normal(&self) -> Option<Vector3<f32>> {
        self.normal().try_normalize(f32::EPSILON)
    }

    pub fn centroid(&self) -> Point3<f32> {
        self.origin + (self.u + self.v) * 0.5
    }

    pub fn area(&self) -> f32 {
        self.normal().norm()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for vertex in self.vertices() {
            bb.expand_by_point(vertex);
        }
        bb
    }
}
