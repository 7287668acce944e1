//! Axis-aligned bounding box.

use nalgebra::{Point3, Vector3};

use crate::BoundingSphere;

/// An axis-aligned box enclosing geometry.
///
/// A box is empty (invalid) when any `min` component exceeds the matching
/// `max` component. [`BoundingBox::empty`] produces the canonical empty box,
/// which any `expand_by_*` call turns into a valid one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point3<f32>,
    max: Point3<f32>,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Creates a box from its minimum and maximum corners.
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Creates an empty box.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Point3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }

    /// Resets the box to empty.
    pub fn init(&mut self) {
        *self = Self::empty();
    }

    /// Returns `true` if the box encloses at least one point.
    #[inline]
    pub fn valid(&self) -> bool {
        self.max.x >= self.min.x && self.max.y >= self.min.y && self.max.z >= self.min.z
    }

    #[inline]
    pub fn min(&self) -> Point3<f32> {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point3<f32> {
        self.max
    }

    /// Returns the center of the box.
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Returns half the length of the box diagonal.
    pub fn radius(&self) -> f32 {
        self.radius2().sqrt()
    }

    /// Returns the squared radius; cheaper than [`BoundingBox::radius`].
    pub fn radius2(&self) -> f32 {
        0.25 * (self.max - self.min).norm_squared()
    }

    /// Returns one of the eight corners.
    ///
    /// Bit 0 of `pos` selects max x over min x, bit 1 max y, bit 2 max z.
    #[inline]
    pub fn corner(&self, pos: usize) -> Point3<f32> {
        Point3::new(
            if pos & 1 != 0 { self.max.x } else { self.min.x },
            if pos & 2 != 0 { self.max.y } else { self.min.y },
            if pos & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// Grows the box to enclose `point`.
    pub fn expand_by_point(&mut self, point: Point3<f32>) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Grows the box to enclose `other`. Empty boxes are ignored.
    pub fn expand_by_box(&mut self, other: &BoundingBox) {
        if !other.valid() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Grows the box to enclose `sphere`. Invalid spheres are ignored.
    pub fn expand_by_sphere(&mut self, sphere: &BoundingSphere) {
        if !sphere.valid() {
            return;
        }
        let extent = Vector3::repeat(sphere.radius());
        self.min = self.min.inf(&(sphere.center() - extent));
        self.max = self.max.sup(&(sphere.center() + extent));
    }

    /// Returns `true` if `point` lies inside or on the box.
    pub fn contains(&self, point: Point3<f32>) -> bool {
        self.valid()
            && (self.min.x..=self.max.x).contains(&point.x)
            && (self.min.y..=self.max.y).contains(&point.y)
            && (self.min.z..=self.max.z).contains(&point.z)
    }
}
