use std::cmp::Ordering;
use std::rc::Rc;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::drawable::Drawable;
use crate::intersect::SegmentId;
use crate::scene::{Geode, NodePath};
use crate::LineSegment;

/// One intersection of a segment with a triangle.
///
/// Positions are kept in the geode's local frame together with the frame's
/// matrices, so world-space values are derived on demand.
#[derive(Debug, Clone)]
pub struct Hit {
    /// Position along the segment, `0.0` at its start.
    pub ratio: f32,
    pub segment: SegmentId,
    /// The segment as registered, in world space.
    pub original: LineSegment,
    /// The segment in the geode's frame.
    pub local: LineSegment,
    /// Path from the traversal root to the geode.
    pub node_path: NodePath,
    pub drawable: Rc<dyn Drawable>,
    /// Index of the drawable within the geode.
    pub drawable_index: usize,
    /// Local-to-world matrix, `None` when the geode is in world space.
    pub matrix: Option<Matrix4<f32>>,
    pub inverse: Option<Matrix4<f32>>,
    /// Index of the triangle within the drawable.
    pub primitive_index: usize,
    /// Vertex indices of that triangle, when the drawable is indexed.
    pub vertex_indices: Option<[u32; 3]>,
    pub local_point: Point3<f32>,
    /// Unit geometric normal of the triangle, in the local frame.
    pub local_normal: Vector3<f32>,
}

impl Hit {
    /// Returns the intersection point in world space.
    pub fn world_point(&self) -> Point3<f32> {
        match &self.matrix {
            Some(matrix) => matrix.transform_point(&self.local_point),
            None => self.local_point,
        }
    }

    /// Normal mapped by the inverse-transpose of the local-to-world matrix,
    /// renormalized.
    pub fn world_normal(&self) -> Vector3<f32> {
        let Some(inverse) = &self.inverse else {
            return self.local_normal;
        };
        let linear: Matrix3<f32> = inverse.fixed_view::<3, 3>(0, 0).into_owned();
        let normal = linear.transpose() * self.local_normal;
        normal.try_normalize(f32::EPSILON).unwrap_or(normal)
    }

    /// The geode that was hit.
    pub fn geode(&self) -> Option<&Geode> {
        self.node_path.last()?.as_any().downcast_ref::<Geode>()
    }

    /// Orders hits by segment, then by ratio.
    pub fn order(&self, other: &Hit) -> Ordering {
        self.segment
            .cmp(&other.segment)
            .then(self.ratio.total_cmp(&other.ratio))
    }
}
