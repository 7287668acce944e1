//! Hierarchical view-volume culling.
//!
//! [`CullVisitor`] tests every node's bound against a [`Polytope`] and only
//! descends into subtrees that are at least partially inside. The polytope's
//! mask stack carries the planes a parent was found fully in front of, so
//! those planes are never tested again below it.

use log::{debug, trace};
use nalgebra::Matrix4;

use crate::Polytope;
use crate::config::TraversalConfig;
use crate::scene::{Geode, Node, NodePath, NodeVisitor, Transform, VisitorState, traverse};

/// A geode that survived culling.
#[derive(Debug, Clone)]
pub struct VisibleLeaf {
    /// Path from the traversal root to the geode.
    pub node_path: NodePath,
    /// Local-to-world matrix, `None` when the geode is in world space.
    pub matrix: Option<Matrix4<f32>>,
}

impl VisibleLeaf {
    /// Returns the geode at the end of the path.
    pub fn geode(&self) -> Option<&Geode> {
        self.node_path.last()?.as_any().downcast_ref::<Geode>()
    }
}

#[derive(Debug, Clone)]
struct CullFrame {
    /// The clip volume in this frame's coordinates.
    polytope: Polytope,
    matrix: Option<Matrix4<f32>>,
    inverse: Option<Matrix4<f32>>,
}

impl CullFrame {
    fn root(world: &Polytope) -> Self {
        let mut polytope = world.clone();
        polytope.setup_mask();
        Self {
            polytope,
            matrix: None,
            inverse: None,
        }
    }
}

/// Collects the geodes of a graph that lie at least partially inside a
/// world-space polytope.
#[derive(Debug)]
pub struct CullVisitor {
    state: VisitorState,
    world: Polytope,
    frames: Vec<CullFrame>,
    visible: Vec<VisibleLeaf>,
    culled: usize,
}

impl CullVisitor {
    /// Creates a new visitor culling against `polytope`, given in world
    /// space.
    pub fn new(polytope: Polytope) -> Self {
        Self::with_config(polytope, &TraversalConfig::default())
    }

    /// Creates a new visitor with traversal settings taken from `config`.
    pub fn with_config(polytope: Polytope, config: &TraversalConfig) -> Self {
        Self {
            state: VisitorState::from_config(config),
            frames: vec![CullFrame::root(&polytope)],
            world: polytope,
            visible: Vec::new(),
            culled: 0,
        }
    }

    /// The world-space clip volume.
    #[inline]
    pub fn polytope(&self) -> &Polytope {
        &self.world
    }

    /// Replaces the clip volume and resets the visitor.
    pub fn set_polytope(&mut self, polytope: Polytope) {
        self.world = polytope;
        self.reset();
    }

    /// Returns the geodes found inside so far, in traversal order.
    #[inline]
    pub fn visible(&self) -> &[VisibleLeaf] {
        &self.visible
    }

    /// Consumes the visitor, returning the visible geodes.
    pub fn into_visible(self) -> Vec<VisibleLeaf> {
        self.visible
    }

    /// Number of nodes rejected with their subtree.
    #[inline]
    pub fn num_culled(&self) -> usize {
        self.culled
    }

    fn current(&self) -> &CullFrame {
        &self.frames[self.frames.len() - 1]
    }

    fn current_mut(&mut self) -> &mut CullFrame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    fn enter_node(&mut self, node: &dyn Node) -> bool {
        let polytope = &mut self.current_mut().polytope;
        if !node.is_culling_active() {
            polytope.set_result_mask(polytope.current_mask());
            polytope.push_current_mask();
            return true;
        }
        let bound = node.bound();
        if !bound.valid() {
            return false;
        }
        let polytope = &mut self.current_mut().polytope;
        if polytope.contains(&bound) {
            polytope.push_current_mask();
            true
        } else {
            trace!("{} culled: bound outside the view volume", node.class_name());
            self.culled += 1;
            false
        }
    }

    fn leave_node(&mut self) {
        self.current_mut().polytope.pop_current_mask();
    }

    /// The frame below `transform`, with the polytope moved into it.
    fn child_frame(&self, transform: &Transform) -> Option<CullFrame> {
        let parent = self.current();
        let matrix = transform.local_to_world(
            &parent.matrix.unwrap_or_else(Matrix4::identity),
            Some(&self.state),
        )?;
        let inverse = matrix.try_inverse()?;
        // child frame -> parent frame
        let relative = match parent.inverse {
            Some(parent_inverse) => parent_inverse * matrix,
            None => matrix,
        };
        let mut polytope = parent.polytope.clone();
        polytope.transform_providing_inverse(&relative);
        Some(CullFrame {
            polytope,
            matrix: Some(matrix),
            inverse: Some(inverse),
        })
    }
}

impl NodeVisitor for CullVisitor {
    fn state(&self) -> &VisitorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VisitorState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.frames = vec![CullFrame::root(&self.world)];
        self.visible.clear();
        self.culled = 0;
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
        self.visible.push(VisibleLeaf {
            node_path: self.state.node_path().to_vec(),
            matrix: self.current().matrix,
        });
        self.leave_node();
    }

    fn apply_transform(&mut self, transform: &Transform) {
        if !self.enter_node(transform) {
            return;
        }
        match self.child_frame(transform) {
            Some(frame) => {
                self.frames.push(frame);
                traverse(self, transform);
                self.frames.pop();
            }
            None => debug!("skipping subtree below a transform without an invertible matrix"),
        }
        self.leave_node();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::TriangleMesh;
    use crate::scene::{Group, GroupNode, NodeRef, ReferenceFrame, Switch, TraversalMode, accept};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use std::rc::Rc;

    fn ball(name: &str, center: Point3<f32>) -> Rc<Geode> {
        let geode = Geode::with_drawable(Rc::new(TriangleMesh::uv_sphere(center, 0.2, 8, 6)));
        geode.core().set_name(name);
        geode
    }

    fn unit_cube() -> Polytope {
        let mut polytope = Polytope::new();
        polytope.set_to_unit_frustum(true, true);
        polytope
    }

    fn visible_names(visitor: &CullVisitor) -> Vec<String> {
        visitor
            .visible()
            .iter()
            .filter_map(|leaf| leaf.geode())
            .map(|geode| geode.core().name())
            .collect()
    }

    #[test]
    fn keeps_only_geodes_inside() {
        let root = Group::new();
        root.add_child(ball("inside", Point3::origin()));
        root.add_child(ball("straddling", Point3::new(1.0, 0.0, 0.0)));
        root.add_child(ball("outside", Point3::new(5.0, 0.0, 0.0)));
        let root: NodeRef = root;

        let mut visitor = CullVisitor::new(unit_cube());
        accept(&root, &mut visitor);

        assert_eq!(visible_names(&visitor), ["inside", "straddling"]);
        assert_eq!(visitor.num_culled(), 1);
        assert_eq!(visitor.visible()[0].node_path.len(), 2);
        assert!(visitor.visible()[0].matrix.is_none());
        assert_eq!(visitor.current().polytope.mask_stack_depth(), 1);
    }

    #[test]
    fn subtree_outside_is_culled_once() {
        let far = Group::new();
        for i in 0..4 {
            far.add_child(ball("far", Point3::new(10.0 + i as f32, 0.0, 0.0)));
        }
        let root = Group::new();
        root.add_child(far);
        root.add_child(ball("near", Point3::origin()));
        let root: NodeRef = root;

        let mut visitor = CullVisitor::new(unit_cube());
        accept(&root, &mut visitor);
        assert_eq!(visible_names(&visitor), ["near"]);
        assert_eq!(visitor.num_culled(), 1);
    }

    #[test]
    fn transforms_move_the_volume_into_local_frames() {
        let back = Transform::from_translation(Vector3::new(-5.0, 0.0, 0.0));
        back.add_child(ball("moved in", Point3::new(5.0, 0.0, 0.0)));
        let scaled = Transform::with_matrix(Matrix4::new_scaling(10.0));
        scaled.add_child(ball("scaled out", Point3::new(0.5, 0.0, 0.0)));
        let nested = Transform::from_translation(Vector3::new(0.0, 3.0, 0.0));
        let inner = Transform::from_translation(Vector3::new(0.0, -3.0, 0.0));
        inner.add_child(ball("nested", Point3::origin()));
        nested.add_child(inner);

        let root = Group::new();
        root.add_child(back);
        root.add_child(scaled);
        root.add_child(nested);
        let root: NodeRef = root;

        let mut visitor = CullVisitor::new(unit_cube());
        accept(&root, &mut visitor);
        assert_eq!(visible_names(&visitor), ["moved in", "nested"]);

        let moved = &visitor.visible()[0];
        let world = moved.matrix.unwrap().transform_point(&Point3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(world, Point3::origin(), epsilon = 1e-5);
        assert_relative_eq!(visitor.visible()[1].matrix.unwrap(), Matrix4::identity(), epsilon = 1e-5);
    }

    #[test]
    fn absolute_transform_is_not_culled_by_its_parent() {
        let absolute = Transform::new();
        absolute.set_reference_frame(ReferenceFrame::Absolute);
        absolute.add_child(ball("pinned", Point3::origin()));
        let outer = Transform::from_translation(Vector3::new(100.0, 0.0, 0.0));
        outer.add_child(absolute);
        outer.add_child(ball("far", Point3::origin()));
        let root: NodeRef = outer;

        let mut visitor = CullVisitor::new(unit_cube());
        accept(&root, &mut visitor);
        assert_eq!(visible_names(&visitor), ["pinned"]);
        assert_eq!(visitor.num_culled(), 1);
        assert_relative_eq!(visitor.visible()[0].matrix.unwrap(), Matrix4::identity(), epsilon = 1e-5);
        assert_eq!(visitor.current().polytope.mask_stack_depth(), 1);
    }

    #[test]
    fn reset_and_new_volume() {
        let root: NodeRef = Group::with_children([ball("a", Point3::new(5.0, 0.0, 0.0)) as NodeRef]);
        let mut visitor = CullVisitor::new(unit_cube());
        accept(&root, &mut visitor);
        assert!(visitor.visible().is_empty());

        let mut moved = unit_cube();
        moved
            .transform(&Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)))
            .unwrap();
        visitor.set_polytope(moved);
        assert_eq!(visitor.num_culled(), 0);
        accept(&root, &mut visitor);
        assert_eq!(visible_names(&visitor), ["a"]);
    }

    #[test]
    fn switch_and_mask_respected() {
        let switch = Switch::new();
        switch.add_child(ball("off", Point3::origin()));
        switch.add_child(ball("on", Point3::origin()));
        switch.set_value(0, false);
        let root: NodeRef = switch;

        let mut visitor = CullVisitor::new(unit_cube());
        accept(&root, &mut visitor);
        assert_eq!(visible_names(&visitor), ["on"]);

        let config = TraversalConfig {
            traversal_mode: TraversalMode::AllChildren,
            ..TraversalConfig::default()
        };
        let mut visitor = CullVisitor::with_config(unit_cube(), &config);
        accept(&root, &mut visitor);
        assert_eq!(visible_names(&visitor), ["off", "on"]);

        visitor.reset();
        visitor.state_mut().set_traversal_mask(0);
        accept(&root, &mut visitor);
        assert!(visitor.visible().is_empty());
    }
}
