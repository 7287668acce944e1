use nalgebra::Matrix4;

use crate::intersect::{SegmentId, SegmentMask};
use crate::{BoundingSphere, LineSegment};

/// A registered segment expressed in the frame of the current node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPair {
    pub original: SegmentId,
    pub local: LineSegment,
}

/// Per-frame intersection state.
///
/// A frame is pushed for every transform entered. It holds the accumulated
/// local-to-world matrix and its inverse, the segments still alive in that
/// frame, and a mask stack marking which of them are still worth testing at
/// each depth below the transform. Bit `i` of a mask refers to
/// `segments()[i]`.
#[derive(Debug, Clone)]
pub struct IntersectState {
    matrix: Option<Matrix4<f32>>,
    inverse: Option<Matrix4<f32>>,
    segments: Vec<SegmentPair>,
    mask_stack: Vec<SegmentMask>,
}

fn full_mask(count: usize) -> SegmentMask {
    if count >= SegmentMask::BITS as usize {
        SegmentMask::MAX
    } else {
        (1 << count) - 1
    }
}

impl IntersectState {
    /// World frame holding every segment.
    pub fn root(world: &[LineSegment]) -> Self {
        let segments = world
            .iter()
            .enumerate()
            .map(|(index, segment)| SegmentPair {
                original: SegmentId(index),
                local: *segment,
            })
            .collect::<Vec<_>>();
        Self {
            matrix: None,
            inverse: None,
            mask_stack: vec![full_mask(segments.len())],
            segments,
        }
    }

    /// Creates the frame below a transform whose accumulated local-to-world
    /// matrix is `matrix`.
    ///
    /// Only segments active at the current depth are carried over, mapped
    /// into the new frame. Returns `None` if `matrix` is singular.
    pub fn push_matrix(&self, matrix: Matrix4<f32>, world: &[LineSegment]) -> Option<Self> {
        let inverse = matrix.try_inverse()?;
        let segments = self
            .active_segments()
            .filter_map(|(_, pair)| {
                let original = world.get(pair.original.0)?;
                Some(SegmentPair {
                    original: pair.original,
                    local: original.transformed(&inverse),
                })
            })
            .collect::<Vec<_>>();
        Some(Self {
            matrix: Some(matrix),
            inverse: Some(inverse),
            mask_stack: vec![full_mask(segments.len())],
            segments,
        })
    }

    /// Local-to-world matrix, `None` for the world frame.
    #[inline]
    pub fn matrix(&self) -> Option<Matrix4<f32>> {
        self.matrix
    }

    /// Returns the world-to-local matrix of this frame, `None` at the root.
    #[inline]
    pub fn inverse(&self) -> Option<Matrix4<f32>> {
        self.inverse
    }

    /// Returns the segments expressed in this frame.
    #[inline]
    pub fn segments(&self) -> &[SegmentPair] {
        &self.segments
    }

    /// Returns the mask of segments still active at the current depth.
    #[inline]
    pub fn current_mask(&self) -> SegmentMask {
        self.mask_stack.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn mask_depth(&self) -> usize {
        self.mask_stack.len()
    }

    /// Segments whose bit is set in the current mask, with their bit.
    pub fn active_segments(&self) -> impl Iterator<Item = (SegmentMask, &SegmentPair)> {
        let mask = self.current_mask();
        self.segments
            .iter()
            .enumerate()
            .map(|(index, pair)| (1 << index, pair))
            .filter(move |(bit, _)| mask & bit != 0)
    }

    /// Tests the active segments against `bound`.
    ///
    /// Returns the mask of segments that reach the bound, or `None` when
    /// none does and the node can be culled.
    pub fn cull_mask(&self, bound: &BoundingSphere) -> Option<SegmentMask> {
        let mask = self
            .active_segments()
            .filter(|(_, pair)| pair.local.intersects_sphere(bound))
            .fold(0, |mask, (bit, _)| mask | bit);
        (mask != 0).then_some(mask)
    }

    /// Enters a node with the segments in `mask` still active.
    pub fn push_mask(&mut self, mask: SegmentMask) {
        self.mask_stack.push(mask);
    }

    /// Restores the mask of the enclosing depth. The frame's base mask is
    /// never popped.
    pub fn pop_mask(&mut self) {
        if self.mask_stack.len() > 1 {
            self.mask_stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn segments() -> Vec<LineSegment> {
        vec![
            LineSegment::new(Point3::new(0.0, 0.0, -5.0), Point3::new(0.0, 0.0, 5.0)),
            LineSegment::new(Point3::new(10.0, 0.0, -5.0), Point3::new(10.0, 0.0, 5.0)),
            LineSegment::new(Point3::new(20.0, 0.0, -5.0), Point3::new(20.0, 0.0, 5.0)),
        ]
    }

    #[test]
    fn cull_mask_selects_reaching_segments() {
        let state = IntersectState::root(&segments());
        assert_eq!(state.current_mask(), 0b111);

        let near_second = BoundingSphere::new(Point3::new(10.0, 0.0, 0.0), 1.0);
        assert_eq!(state.cull_mask(&near_second), Some(0b010));

        let nowhere = BoundingSphere::new(Point3::new(0.0, 50.0, 0.0), 1.0);
        assert_eq!(state.cull_mask(&nowhere), None);
    }

    #[test]
    fn masks_restrict_deeper_tests() {
        let mut state = IntersectState::root(&segments());
        state.push_mask(0b100);
        let everywhere = BoundingSphere::new(Point3::new(10.0, 0.0, 0.0), 100.0);
        assert_eq!(state.cull_mask(&everywhere), Some(0b100));
        state.pop_mask();
        state.pop_mask();
        assert_eq!(state.mask_depth(), 1);
        assert_eq!(state.cull_mask(&everywhere), Some(0b111));
    }

    #[test]
    fn push_matrix_keeps_active_segments_in_local_frame() {
        let world = segments();
        let mut root = IntersectState::root(&world);
        root.push_mask(0b110);

        let matrix = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        let child = root.push_matrix(matrix, &world).unwrap();
        assert_eq!(child.segments().len(), 2);
        assert_eq!(child.current_mask(), 0b11);
        assert_eq!(child.segments()[0].original, SegmentId(1));
        assert_relative_eq!(child.segments()[0].local.start(), Point3::new(0.0, 0.0, -5.0));
        assert_relative_eq!(child.segments()[1].local.start(), Point3::new(10.0, 0.0, -5.0));
        assert_eq!(child.matrix(), Some(matrix));
    }

    #[test]
    fn singular_matrix_has_no_frame() {
        let world = segments();
        let root = IntersectState::root(&world);
        let flat = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0));
        assert!(root.push_matrix(flat, &world).is_none());
    }
}
