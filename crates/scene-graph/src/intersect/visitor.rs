use std::rc::Rc;

use log::{debug, trace, warn};
use nalgebra::Matrix4;

use crate::config::TraversalConfig;
use crate::drawable::Drawable;
use crate::intersect::{Hit, HitReportingMode, IntersectState, MAX_SEGMENTS, SegmentId};
use crate::scene::{Geode, Node, NodeVisitor, Transform, VisitorState, traverse};
use crate::{LineSegment, SceneError};

/// Finds where registered line segments meet the geometry of a graph.
///
/// ```
/// use std::rc::Rc;
/// use nalgebra::{Point3, Vector3};
/// use scene_graph::{
///     Geode, GroupNode, IntersectVisitor, LineSegment, NodeRef, Transform, TriangleMesh, accept,
/// };
///
/// let transform = Transform::from_translation(Vector3::new(10.0, 0.0, 0.0));
/// transform.add_child(Geode::with_drawable(Rc::new(TriangleMesh::uv_sphere(
///     Point3::origin(),
///     1.0,
///     16,
///     16,
/// ))));
/// let root: NodeRef = transform;
///
/// let mut visitor = IntersectVisitor::new();
/// let ray = visitor
///     .add_line_segment(LineSegment::new(Point3::new(10.0, 0.0, -5.0), Point3::new(10.0, 0.0, 5.0)))
///     .unwrap();
/// accept(&root, &mut visitor);
/// assert!(visitor.nearest_hit(ray).unwrap().world_point().z < 0.0);
/// ```
#[derive(Debug)]
pub struct IntersectVisitor {
    state: VisitorState,
    hit_reporting_mode: HitReportingMode,
    segments: Vec<LineSegment>,
    hits: Vec<Vec<Hit>>,
    stack: Vec<IntersectState>,
}

impl Default for IntersectVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntersectVisitor {
    /// Creates a visitor entering only active children and keeping all hits.
    pub fn new() -> Self {
        Self::with_config(&TraversalConfig::default())
    }

    /// Creates a new visitor with traversal settings and the reporting mode
    /// taken from `config`.
    pub fn with_config(config: &TraversalConfig) -> Self {
        Self {
            state: VisitorState::from_config(config),
            hit_reporting_mode: config.hit_reporting_mode,
            segments: Vec::new(),
            hits: Vec::new(),
            stack: vec![IntersectState::root(&[])],
        }
    }

    /// Returns whether all hits or only the nearest one are kept.
    #[inline]
    pub fn hit_reporting_mode(&self) -> HitReportingMode {
        self.hit_reporting_mode
    }

    /// Sets the reporting mode for the next traversal.
    pub fn set_hit_reporting_mode(&mut self, mode: HitReportingMode) {
        self.hit_reporting_mode = mode;
    }

    /// Registers a world-space segment to test.
    ///
    /// Registering the same segment twice returns the existing id.
    pub fn add_line_segment(&mut self, segment: LineSegment) -> Result<SegmentId, SceneError> {
        if !segment.is_valid() {
            if segment.start() == segment.end() {
                warn!("rejected degenerate segment at {:?}", segment.start());
                return Err(SceneError::DegenerateSegment(segment.start()));
            }
            warn!("rejected segment with non-finite endpoints");
            return Err(SceneError::NonFiniteSegment);
        }
        if let Some(index) = self.segments.iter().position(|s| *s == segment) {
            return Ok(SegmentId(index));
        }
        if self.segments.len() >= MAX_SEGMENTS {
            warn!("intersect visitor already holds {MAX_SEGMENTS} segments");
            return Err(SceneError::TooManySegments { max: MAX_SEGMENTS });
        }
        self.segments.push(segment);
        self.hits.push(Vec::new());
        self.stack = vec![IntersectState::root(&self.segments)];
        Ok(SegmentId(self.segments.len() - 1))
    }

    /// Returns the registered segments, indexed by [`SegmentId`].
    #[inline]
    pub fn segments(&self) -> &[LineSegment] {
        &self.segments
    }

    /// Returns the segment registered under `id`.
    pub fn segment(&self, id: SegmentId) -> Option<LineSegment> {
        self.segments.get(id.0).copied()
    }

    /// Hits of `id`, nearest first.
    pub fn hits(&self, id: SegmentId) -> &[Hit] {
        self.hits.get(id.0).map_or(&[], Vec::as_slice)
    }

    /// Returns the hit with the smallest ratio along segment `id`.
    pub fn nearest_hit(&self, id: SegmentId) -> Option<&Hit> {
        self.hits(id).first()
    }

    /// Returns the number of hits recorded for segment `id`.
    pub fn num_hits(&self, id: SegmentId) -> usize {
        self.hits(id).len()
    }

    /// Returns `true` if any segment hit anything.
    pub fn has_hits(&self) -> bool {
        self.hits.iter().any(|list| !list.is_empty())
    }

    /// Every hit, ordered by segment and then by ratio.
    pub fn all_hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().flatten()
    }

    fn current(&self) -> &IntersectState {
        // the root frame is never popped
        &self.stack[self.stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut IntersectState {
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    /// Masks off segments that miss the node's bound. Returns `false` if
    /// none is left and the node must be skipped.
    fn enter_node(&mut self, node: &dyn Node) -> bool {
        if !node.is_culling_active() {
            let mask = self.current().current_mask();
            self.current_mut().push_mask(mask);
            return true;
        }
        let bound = node.bound();
        if !bound.valid() {
            return false;
        }
        match self.current().cull_mask(&bound) {
            Some(mask) => {
                self.current_mut().push_mask(mask);
                true
            }
            None => {
                trace!("{} culled: no segment reaches its bound", node.class_name());
                false
            }
        }
    }

    fn leave_node(&mut self) {
        self.current_mut().pop_mask();
    }

    fn intersect_drawable(&self, drawable_index: usize, drawable: &Rc<dyn Drawable>) -> Vec<Hit> {
        let frame = self.current();
        let bounding_box = drawable.bounding_box();
        let mut found = Vec::new();
        for (_, pair) in frame.active_segments() {
            if !pair.local.intersects_box(&bounding_box) {
                continue;
            }
            for primitive_index in 0..drawable.triangle_count() {
                let Some(triangle) = drawable.triangle(primitive_index) else {
                    continue;
                };
                let Some(ratio) = pair.local.intersect_triangle(&triangle) else {
                    continue;
                };
                let Some(local_normal) = triangle.unit_normal() else {
                    continue;
                };
                found.push(Hit {
                    ratio,
                    segment: pair.original,
                    original: self.segments[pair.original.0],
                    local: pair.local,
                    node_path: self.state.node_path().to_vec(),
                    drawable: Rc::clone(drawable),
                    drawable_index,
                    matrix: frame.matrix(),
                    inverse: frame.inverse(),
                    primitive_index,
                    vertex_indices: drawable.triangle_indices(primitive_index),
                    local_point: pair.local.point_at(ratio),
                    local_normal,
                });
            }
        }
        found
    }

    fn record(&mut self, hit: Hit) {
        let Some(list) = self.hits.get_mut(hit.segment.0) else {
            return;
        };
        match self.hit_reporting_mode {
            HitReportingMode::OnlyNearestHit => {
                if list.first().is_none_or(|nearest| hit.ratio < nearest.ratio) {
                    list.clear();
                    list.push(hit);
                }
            }
            HitReportingMode::AllHits => {
                let index = list.partition_point(|existing| existing.ratio <= hit.ratio);
                list.insert(index, hit);
            }
        }
    }
}

impl NodeVisitor for IntersectVisitor {
    fn state(&self) -> &VisitorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VisitorState {
        &mut self.state
    }

    /// Clears hits and traversal state. Registered segments are kept.
    fn reset(&mut self) {
        for list in &mut self.hits {
            list.clear();
        }
        self.stack = vec![IntersectState::root(&self.segments)];
        self.state.clear_node_path();
    }

    fn apply_node(&mut self, node: &dyn Node) {
        if self.enter_node(node) {
            traverse(self, node);
            self.leave_node();
        }
    }

    fn apply_geode(&mut self, geode: &Geode) {
        if !self.enter_node(geode) {
            return;
        }
        for (index, drawable) in geode.drawables().iter().enumerate() {
            for hit in self.intersect_drawable(index, drawable) {
                self.record(hit);
            }
        }
        self.leave_node();
    }

    fn apply_transform(&mut self, transform: &Transform) {
        if !self.enter_node(transform) {
            return;
        }
        let parent = self.current().matrix().unwrap_or_else(Matrix4::identity);
        let frame = transform
            .local_to_world(&parent, Some(&self.state))
            .and_then(|matrix| self.current().push_matrix(matrix, &self.segments));
        match frame {
            Some(frame) => {
                self.stack.push(frame);
                traverse(self, transform);
                self.stack.pop();
            }
            None => debug!("skipping subtree below a transform without a usable matrix"),
        }
        self.leave_node();
    }
}
