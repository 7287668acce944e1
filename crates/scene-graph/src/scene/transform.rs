//! Groups that place their children in a local coordinate frame.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use log::debug;
use nalgebra::{Matrix4, Vector3};

use crate::BoundingSphere;
use crate::scene::group::{ChildList, GroupNode, traverse_children};
use crate::scene::node::{Node, NodeCore, subtree_culling_active};
use crate::scene::visitor::{NodeVisitor, VisitorState};

/// Frame a transform's matrix is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceFrame {
    /// The matrix is applied on top of the parents' transforms.
    #[default]
    RelativeToParents,
    /// The matrix replaces everything accumulated above it.
    Absolute,
}

/// Supplies a transform's matrices from outside the graph, for instance from
/// an animation driven by [`VisitorState::traversal_number`].
///
/// Both methods receive the matrix accumulated so far and return it with the
/// transform's contribution applied, or `None` if no matrix is available.
pub trait ComputeTransformCallback: fmt::Debug {
    fn compute_local_to_world(
        &self,
        matrix: &Matrix4<f32>,
        transform: &Transform,
        state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>>;

    fn compute_world_to_local(
        &self,
        matrix: &Matrix4<f32>,
        transform: &Transform,
        state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>>;
}

/// A group whose children are positioned by a matrix.
///
/// Points in the children's frame map to the parent's frame by
/// `matrix * p`. The inverse is kept alongside the matrix; a singular matrix
/// has no inverse and yields no world-to-local matrix.
#[derive(Debug)]
pub struct Transform {
    core: NodeCore,
    children: ChildList,
    matrix: Cell<Matrix4<f32>>,
    inverse: Cell<Option<Matrix4<f32>>>,
    reference_frame: Cell<ReferenceFrame>,
    callback: RefCell<Option<Rc<dyn ComputeTransformCallback>>>,
}

impl Transform {
    /// Creates a new transform with the identity matrix.
    pub fn new() -> Rc<Self> {
        Self::with_matrix(Matrix4::identity())
    }

    /// Creates a new transform with the given child-to-parent matrix.
    pub fn with_matrix(matrix: Matrix4<f32>) -> Rc<Self> {
        Rc::new_cyclic(|owner: &Weak<Transform>| {
            let owner: Weak<dyn Node> = owner.clone();
            Transform {
                core: NodeCore::default(),
                children: ChildList::new(owner),
                matrix: Cell::new(matrix),
                inverse: Cell::new(matrix.try_inverse()),
                reference_frame: Cell::default(),
                callback: RefCell::default(),
            }
        })
    }

    /// Creates a new transform that translates its children.
    pub fn from_translation(translation: Vector3<f32>) -> Rc<Self> {
        Self::with_matrix(Matrix4::new_translation(&translation))
    }

    /// Returns the child-to-parent matrix.
    #[inline]
    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix.get()
    }

    /// Inverse of [`Transform::matrix`], `None` when it is singular.
    #[inline]
    pub fn inverse(&self) -> Option<Matrix4<f32>> {
        self.inverse.get()
    }

    /// Replaces the matrix, recomputing the inverse and dirtying bounds.
    pub fn set_matrix(&self, matrix: Matrix4<f32>) {
        self.matrix.set(matrix);
        self.inverse.set(matrix.try_inverse());
        self.dirty_bound();
    }

    /// Applies `matrix` before the current one: `current * matrix`.
    pub fn pre_mult(&self, matrix: &Matrix4<f32>) {
        self.set_matrix(self.matrix() * matrix);
    }

    /// Applies `matrix` after the current one: `matrix * current`.
    pub fn post_mult(&self, matrix: &Matrix4<f32>) {
        self.set_matrix(matrix * self.matrix());
    }

    /// Returns the frame the matrix is expressed in.
    #[inline]
    pub fn reference_frame(&self) -> ReferenceFrame {
        self.reference_frame.get()
    }

    /// Sets the frame the matrix is expressed in.
    ///
    /// An absolute transform's bound is a world-space bound, which means
    /// nothing in its parents' frames, so culling is switched off for it and
    /// its ancestors until the frame is relative again.
    pub fn set_reference_frame(&self, frame: ReferenceFrame) {
        self.reference_frame.set(frame);
        self.dirty_bound();
    }

    /// Returns the callback supplying this transform's matrices, if any.
    pub fn compute_transform_callback(&self) -> Option<Rc<dyn ComputeTransformCallback>> {
        self.callback.borrow().clone()
    }

    /// Installs or removes the callback that overrides the stored matrix.
    pub fn set_compute_transform_callback(&self, callback: Option<Rc<dyn ComputeTransformCallback>>) {
        *self.callback.borrow_mut() = callback;
        self.dirty_bound();
    }

    /// Composes `parent`, the accumulated local-to-world matrix above this
    /// node, with this node's own contribution.
    pub fn local_to_world(
        &self,
        parent: &Matrix4<f32>,
        state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>> {
        if let Some(callback) = self.compute_transform_callback() {
            return callback.compute_local_to_world(parent, self, state);
        }
        Some(match self.reference_frame() {
            ReferenceFrame::RelativeToParents => parent * self.matrix(),
            ReferenceFrame::Absolute => self.matrix(),
        })
    }

    /// Composes `parent`, the accumulated world-to-local matrix above this
    /// node, with the inverse of this node's contribution.
    pub fn world_to_local(
        &self,
        parent: &Matrix4<f32>,
        state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>> {
        if let Some(callback) = self.compute_transform_callback() {
            return callback.compute_world_to_local(parent, self, state);
        }
        let inverse = self.inverse()?;
        Some(match self.reference_frame() {
            ReferenceFrame::RelativeToParents => inverse * parent,
            ReferenceFrame::Absolute => inverse,
        })
    }
}

impl Node for Transform {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn as_node(&self) -> &dyn Node {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn class_name(&self) -> &'static str {
        "Transform"
    }

    fn dispatch(&self, visitor: &mut dyn NodeVisitor) {
        visitor.apply_transform(self);
    }

    /// The children's union, mapped into the parent's frame.
    fn compute_bound(&self) -> BoundingSphere {
        let local = self.children.union_bound();
        if !local.valid() {
            return local;
        }
        match self.local_to_world(&Matrix4::identity(), None) {
            Some(matrix) => local.transformed(&matrix),
            None => {
                debug!("transform has no local matrix, bounding children untransformed");
                local
            }
        }
    }

    fn compute_culling_active(&self) -> bool {
        self.reference_frame() == ReferenceFrame::RelativeToParents
            && subtree_culling_active(self)
    }

    fn as_group(&self) -> Option<&dyn GroupNode> {
        Some(self)
    }

    fn traverse(&self, visitor: &mut dyn NodeVisitor) {
        traverse_children(self, visitor);
    }

    fn accumulate_local_to_world(
        &self,
        matrix: &Matrix4<f32>,
        state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>> {
        self.local_to_world(matrix, state)
    }

    fn accumulate_world_to_local(
        &self,
        matrix: &Matrix4<f32>,
        state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>> {
        self.world_to_local(matrix, state)
    }
}

impl GroupNode for Transform {
    fn child_list(&self) -> &ChildList {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::TriangleMesh;
    use crate::scene::Geode;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn unit_sphere_geode() -> Rc<Geode> {
        let geode = Geode::new();
        geode.add_drawable(Rc::new(TriangleMesh::uv_sphere(Point3::origin(), 1.0, 8, 8)));
        geode
    }

    #[derive(Debug)]
    struct Spin;

    impl ComputeTransformCallback for Spin {
        fn compute_local_to_world(
            &self,
            matrix: &Matrix4<f32>,
            _transform: &Transform,
            state: Option<&VisitorState>,
        ) -> Option<Matrix4<f32>> {
            let frame = state.map_or(0, VisitorState::traversal_number) as f32;
            Some(matrix * Matrix4::new_translation(&Vector3::new(frame, 0.0, 0.0)))
        }

        fn compute_world_to_local(
            &self,
            matrix: &Matrix4<f32>,
            _transform: &Transform,
            state: Option<&VisitorState>,
        ) -> Option<Matrix4<f32>> {
            let frame = state.map_or(0, VisitorState::traversal_number) as f32;
            Some(Matrix4::new_translation(&Vector3::new(-frame, 0.0, 0.0)) * matrix)
        }
    }

    #[test]
    fn bound_follows_matrix() {
        let transform = Transform::from_translation(Vector3::new(10.0, 0.0, 0.0));
        transform.add_child(unit_sphere_geode());
        let bound = transform.bound();
        assert_relative_eq!(bound.center(), Point3::new(10.0, 0.0, 0.0), epsilon = 1e-4);

        transform.set_matrix(Matrix4::new_scaling(2.0));
        let bound = transform.bound();
        assert_relative_eq!(bound.center(), Point3::origin(), epsilon = 1e-4);
        assert!(bound.radius() > 1.9);
    }

    #[test]
    fn matrix_changes_dirty_parents() {
        let parent = crate::scene::Group::new();
        let transform = Transform::new();
        transform.add_child(unit_sphere_geode());
        parent.add_child(transform.clone());
        parent.bound();

        transform.post_mult(&Matrix4::new_translation(&Vector3::new(0.0, 3.0, 0.0)));
        assert!(parent.core().bound_cache().is_dirty());
        assert_relative_eq!(parent.bound().center(), Point3::new(0.0, 3.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn pre_and_post_mult_order() {
        let translate = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let scale = Matrix4::new_scaling(2.0);

        let pre = Transform::with_matrix(translate);
        pre.pre_mult(&scale);
        assert_relative_eq!(pre.matrix().transform_point(&Point3::new(1.0, 0.0, 0.0)), Point3::new(3.0, 0.0, 0.0));

        let post = Transform::with_matrix(translate);
        post.post_mult(&scale);
        assert_relative_eq!(post.matrix().transform_point(&Point3::new(1.0, 0.0, 0.0)), Point3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let transform = Transform::with_matrix(Matrix4::new_nonuniform_scaling(&Vector3::new(0.0, 1.0, 1.0)));
        assert!(transform.inverse().is_none());
        assert!(transform.world_to_local(&Matrix4::identity(), None).is_none());
        assert!(transform.local_to_world(&Matrix4::identity(), None).is_some());
    }

    #[test]
    fn absolute_frame_ignores_parents() {
        let transform = Transform::from_translation(Vector3::new(0.0, 0.0, 4.0));
        transform.set_reference_frame(ReferenceFrame::Absolute);
        let parent = Matrix4::new_translation(&Vector3::new(100.0, 0.0, 0.0));
        let l2w = transform.local_to_world(&parent, None).unwrap();
        assert_relative_eq!(l2w.transform_point(&Point3::origin()), Point3::new(0.0, 0.0, 4.0));
        let w2l = transform.world_to_local(&parent, None).unwrap();
        assert_relative_eq!(w2l.transform_point(&Point3::new(0.0, 0.0, 4.0)), Point3::origin());
    }

    #[test]
    fn absolute_frame_turns_off_culling_above_it() {
        let absolute = Transform::new();
        absolute.add_child(unit_sphere_geode());
        let outer = Transform::from_translation(Vector3::new(100.0, 0.0, 0.0));
        outer.add_child(absolute.clone());
        let sibling = unit_sphere_geode();
        outer.add_child(sibling.clone());
        assert!(outer.is_culling_active());

        absolute.set_reference_frame(ReferenceFrame::Absolute);
        assert!(!absolute.is_culling_active());
        assert!(!outer.is_culling_active());
        assert!(sibling.is_culling_active());
        assert!(absolute.children()[0].is_culling_active());

        absolute.set_reference_frame(ReferenceFrame::RelativeToParents);
        assert!(outer.is_culling_active());
    }

    #[test]
    fn callback_overrides_matrix() {
        let transform = Transform::from_translation(Vector3::new(50.0, 0.0, 0.0));
        transform.set_compute_transform_callback(Some(Rc::new(Spin)));

        let mut state = VisitorState::default();
        state.set_traversal_number(7);
        let l2w = transform.local_to_world(&Matrix4::identity(), Some(&state)).unwrap();
        assert_relative_eq!(l2w.transform_point(&Point3::origin()), Point3::new(7.0, 0.0, 0.0));

        let w2l = transform.world_to_local(&Matrix4::identity(), Some(&state)).unwrap();
        assert_relative_eq!(w2l.transform_point(&Point3::new(7.0, 0.0, 0.0)), Point3::origin());
    }
}
