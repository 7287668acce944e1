//! Finite line segments and their intersection tests.
//!
//! Every test reports positions as ratios along the segment, `0.0` at the
//! start and `1.0` at the end, so a hit found in a node's local frame keeps
//! its meaning when the segment is mapped back into world space.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::{BoundingBox, BoundingSphere, Triangle};

/// A segment from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    start: Point3<f32>,
    end: Point3<f32>,
}

impl LineSegment {
    /// Creates a new segment from `start` to `end`.
    pub fn new(start: Point3<f32>, end: Point3<f32>) -> Self {
        Self { start, end }
    }

    /// Returns `true` if both endpoints are finite and distinct.
    pub fn is_valid(&self) -> bool {
        let finite = self
            .start
            .coords
            .iter()
            .chain(self.end.coords.iter())
            .all(|c| c.is_finite());
        finite && self.start != self.end
    }

    #[inline]
    pub fn start(&self) -> Point3<f32> {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Point3<f32> {
        self.end
    }

    /// Vector from start to end.
    #[inline]
    pub fn direction(&self) -> Vector3<f32> {
        self.end - self.start
    }

    pub fn length(&self) -> f32 {
        self.direction().norm()
    }

    /// Point at `ratio` along the segment.
    #[inline]
    pub fn point_at(&self, ratio: f32) -> Point3<f32> {
        self.start + self.direction() * ratio
    }

    /// Maps both endpoints through `matrix`. Ratios along the mapped segment
    /// name the same points as ratios along the original.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> LineSegment {
        LineSegment {
            start: matrix.transform_point(&self.start),
            end: matrix.transform_point(&self.end),
        }
    }

    /// Intersects the infinite line through the segment with `sphere`.
    ///
    /// Returns the entry and exit ratios, which may lie outside `[0, 1]`,
    /// or `None` if the line misses the sphere.
    pub fn intersect_sphere(&self, sphere: &BoundingSphere) -> Option<(f32, f32)> {
        if !sphere.valid() {
            return None;
        }
        let sm = self.start - sphere.center();
        let se = self.direction();
        let a = se.norm_squared();
        if a <= 0.0 {
            return None;
        }
        let b = 2.0 * sm.dot(&se);
        let c = sm.norm_squared() - sphere.radius2();
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let div = 1.0 / (2.0 * a);
        Some(((-b - root) * div, (-b + root) * div))
    }

    /// Returns `true` if any part of the segment lies inside `sphere`.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        if !sphere.valid() {
            return false;
        }
        if (self.start - sphere.center()).norm_squared() < sphere.radius2() {
            return true;
        }
        match self.intersect_sphere(sphere) {
            Some((r1, r2)) => !(r1 <= 0.0 && r2 <= 0.0) && !(r1 >= 1.0 && r2 >= 1.0),
            None => false,
        }
    }

    /// Clips the segment against `bb` using the slab method.
    ///
    /// Returns the ratio range `(near, far)` of the part inside the box,
    /// clamped to `[0, 1]`.
    pub fn intersect_box(&self, bb: &BoundingBox) -> Option<(f32, f32)> {
        if !bb.valid() {
            return None;
        }
        let direction = self.direction();
        let (mut near, mut far) = (0.0_f32, 1.0_f32);
        for axis in 0..3 {
            let origin = self.start[axis];
            let delta = direction[axis];
            let (lo, hi) = (bb.min()[axis], bb.max()[axis]);
            if delta == 0.0 {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / delta;
            let (t0, t1) = ((lo - origin) * inv, (hi - origin) * inv);
            let (t0, t1) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            near = near.max(t0);
            far = far.min(t1);
            if near > far {
                return None;
            }
        }
        Some((near, far))
    }

    /// Returns `true` if any part of the segment lies inside `bb`.
    pub fn intersects_box(&self, bb: &BoundingBox) -> bool {
        self.intersect_box(bb).is_some()
    }

    /// Intersects the segment with `triangle`, from either side.
    ///
    /// Returns the ratio of the hit, or `None` for a miss, a hit beyond the
    /// endpoints, a degenerate triangle, or a segment parallel to the
    /// triangle's plane.
    pub fn intersect_triangle(&self, triangle: &Triangle) -> Option<f32> {
        let [v0, v1, v2] = triangle.vertices();
        let direction = self.direction();
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = direction.cross(&edge2);
        let det = edge1.dot(&p);
        let scale = edge1.norm() * edge2.norm() * direction.norm();
        if det.abs() <= f32::EPSILON * scale {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.start - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&edge1);
        let v = direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let ratio = edge2.dot(&q) * inv_det;
        (0.0..=1.0).contains(&ratio).then_some(ratio)
    }
}
