//! Bounding sphere used to bound every node in the graph.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::BoundingBox;

/// A sphere enclosing geometry, `radius < 0` meaning empty.
///
/// Spheres are cheaper to test than boxes during culling and picking, at the
/// cost of enclosing more empty space. Group bounds are built by repeatedly
/// calling [`BoundingSphere::expand_by_sphere`], which moves the center as
/// well as the radius so that the union grows as little as possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    center: Point3<f32>,
    radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingSphere {
    /// Creates a sphere from a center and radius.
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Creates an empty sphere.
    pub fn empty() -> Self {
        Self {
            center: Point3::origin(),
            radius: -1.0,
        }
    }

    /// Resets the sphere to empty.
    pub fn init(&mut self) {
        *self = Self::empty();
    }

    /// Returns `true` unless the sphere is empty.
    #[inline]
    pub fn valid(&self) -> bool {
        self.radius >= 0.0
    }

    #[inline]
    pub fn center(&self) -> Point3<f32> {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Squared radius. Meaningless for an empty sphere.
    #[inline]
    pub fn radius2(&self) -> f32 {
        self.radius * self.radius
    }

    /// Grows the sphere to enclose `point`, shifting the center toward it so
    /// the radius increase is minimal. An empty sphere collapses onto `point`.
    pub fn expand_by_point(&mut self, point: Point3<f32>) {
        if !self.valid() {
            self.center = point;
            self.radius = 0.0;
            return;
        }
        let dv = point - self.center;
        let r = dv.norm();
        if r > self.radius {
            let dr = (r - self.radius) * 0.5;
            self.center += dv * (dr / r);
            self.radius += dr;
        }
    }

    /// Grows the radius to enclose `point` without moving the center.
    pub fn expand_radius_by_point(&mut self, point: Point3<f32>) {
        if !self.valid() {
            self.center = point;
            self.radius = 0.0;
            return;
        }
        let r = (point - self.center).norm();
        if r > self.radius {
            self.radius = r;
        }
    }

    /// Grows the sphere to enclose `other` with minimal radius increase.
    ///
    /// The result spans the two extreme points along the center-to-center
    /// axis: the far side of `self` and the far side of `other`. When either
    /// sphere already contains the other, the larger one is kept as is.
    pub fn expand_by_sphere(&mut self, other: &BoundingSphere) {
        if !other.valid() {
            return;
        }
        if !self.valid() {
            *self = *other;
            return;
        }

        let dv = other.center - self.center;
        let d = dv.norm();
        if d + other.radius <= self.radius {
            return;
        }
        if d + self.radius <= other.radius {
            *self = *other;
            return;
        }

        let e1 = self.center - dv * (self.radius / d);
        let e2 = other.center + dv * (other.radius / d);
        self.center = nalgebra::center(&e1, &e2);
        self.radius = (e2 - self.center).norm();
    }

    /// Grows the radius to enclose `other` without moving the center.
    pub fn expand_radius_by_sphere(&mut self, other: &BoundingSphere) {
        if !other.valid() {
            return;
        }
        if !self.valid() {
            *self = *other;
            return;
        }
        let r = (other.center - self.center).norm() + other.radius;
        if r > self.radius {
            self.radius = r;
        }
    }

    /// Grows the sphere to enclose `bb`.
    ///
    /// Each box corner contributes the point of `self` diametrically opposite
    /// to it; the result is the bounding sphere of the box grown by those
    /// points. This is an approximation and does not always produce the
    /// smallest enclosing sphere.
    pub fn expand_by_box(&mut self, bb: &BoundingBox) {
        if !bb.valid() {
            return;
        }
        if !self.valid() {
            self.center = bb.center();
            self.radius = bb.radius();
            return;
        }

        let mut grown = *bb;
        for pos in 0..8 {
            let direction = (bb.corner(pos) - self.center)
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vector3::x);
            grown.expand_by_point(self.center - direction * self.radius);
        }
        self.center = grown.center();
        self.radius = grown.radius();
    }

    /// Grows the radius to enclose every corner of `bb` without moving the center.
    pub fn expand_radius_by_box(&mut self, bb: &BoundingBox) {
        if !bb.valid() {
            return;
        }
        if !self.valid() {
            self.center = bb.center();
            self.radius = bb.radius();
            return;
        }
        for pos in 0..8 {
            self.expand_radius_by_point(bb.corner(pos));
        }
    }

    /// Returns `true` if `point` lies inside or on the sphere.
    pub fn contains(&self, point: Point3<f32>) -> bool {
        self.valid() && (point - self.center).norm_squared() <= self.radius2()
    }

    /// Returns `true` if the two spheres overlap.
    pub fn intersects(&self, other: &BoundingSphere) -> bool {
        let reach = self.radius + other.radius;
        self.valid()
            && other.valid()
            && (self.center - other.center).norm_squared() <= reach * reach
    }

    /// Maps the sphere through `matrix`.
    ///
    /// The center is transformed directly. The radius is the largest image
    /// length of the three axis offsets `center + radius * axis`. That bound
    /// is tight when any non-uniform scale is applied before rotation. Under
    /// shear, or a scale applied after a rotation, a diagonal can stretch
    /// further than any axis and the result may not enclose the mapped
    /// sphere.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> BoundingSphere {
        if !self.valid() {
            return *self;
        }
        let center = matrix.transform_point(&self.center);
        let radius = [Vector3::x(), Vector3::y(), Vector3::z()]
            .iter()
            .map(|axis| (matrix.transform_point(&(self.center + axis * self.radius)) - center).norm())
            .fold(0.0_f32, f32::max);
        BoundingSphere { center, radius }
    }
}
