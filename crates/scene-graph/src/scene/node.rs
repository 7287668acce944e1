//! The node trait and the state every node carries.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use nalgebra::Matrix4;

use crate::BoundingSphere;
use crate::scene::visitor::{NodeVisitor, VisitorState, accept};
use crate::scene::GroupNode;

/// Bitmask tested against a visitor's traversal mask.
pub type NodeMask = u32;

/// Shared handle to a node. Parents own their children through these.
pub type NodeRef = Rc<dyn Node>;

/// Nodes from the traversal root down to the node being visited.
pub type NodePath = Vec<NodeRef>;

/// Opaque per-node attributes owned by collaborators such as renderers.
pub type StateSet = Rc<dyn Any>;

/// Returns `true` if both references name the same node.
#[inline]
pub fn same_node(a: &dyn Node, b: &dyn Node) -> bool {
    std::ptr::addr_eq(a, b)
}

/// Address of a node, used to match weak parent handles.
#[inline]
pub(crate) fn node_addr(node: &dyn Node) -> *const () {
    node as *const dyn Node as *const ()
}

/// Lazily computed bounding sphere with a dirty flag.
///
/// Whether culling is active for the subtree is derived from the same
/// children as the sphere, so it is cached and invalidated alongside it.
///
/// The counters record how often the sphere was recomputed and how often it
/// went from clean to dirty, so callers can observe that cached bounds are
/// reused and that invalidation stops at already-dirty nodes.
#[derive(Debug)]
pub struct BoundCache {
    sphere: Cell<BoundingSphere>,
    culling_active: Cell<bool>,
    dirty: Cell<bool>,
    computations: Cell<u64>,
    invalidations: Cell<u64>,
}

impl Default for BoundCache {
    fn default() -> Self {
        Self {
            sphere: Cell::new(BoundingSphere::empty()),
            culling_active: Cell::new(true),
            dirty: Cell::new(true),
            computations: Cell::new(0),
            invalidations: Cell::new(0),
        }
    }
}

impl BoundCache {
    /// Returns the cached sphere and culling flag, running `compute` first
    /// if they are dirty.
    pub fn get_or_compute(
        &self,
        compute: impl FnOnce() -> (BoundingSphere, bool),
    ) -> (BoundingSphere, bool) {
        if self.dirty.get() {
            let (sphere, culling_active) = compute();
            self.sphere.set(sphere);
            self.culling_active.set(culling_active);
            self.dirty.set(false);
            self.computations.set(self.computations.get() + 1);
        }
        (self.sphere.get(), self.culling_active.get())
    }

    /// Marks the cache dirty. Returns `false` if it already was.
    pub fn invalidate(&self) -> bool {
        if self.dirty.get() {
            return false;
        }
        self.dirty.set(true);
        self.invalidations.set(self.invalidations.get() + 1);
        true
    }

    /// Returns `true` if the cached values must be recomputed before use.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Number of times the cached values were computed.
    #[inline]
    pub fn computations(&self) -> u64 {
        self.computations.get()
    }

    /// Number of clean-to-dirty transitions.
    #[inline]
    pub fn invalidations(&self) -> u64 {
        self.invalidations.get()
    }
}

/// State shared by every node kind.
///
/// All fields use interior mutability: nodes are shared through [`NodeRef`]
/// and mutated through `&self`, under the single-writer discipline of the
/// graph.
#[derive(Debug)]
pub struct NodeCore {
    name: RefCell<String>,
    node_mask: Cell<NodeMask>,
    culling_active: Cell<bool>,
    state_set: RefCell<Option<StateSet>>,
    descriptions: RefCell<Vec<String>>,
    bound: BoundCache,
    parents: RefCell<Vec<Weak<dyn Node>>>,
}

impl Default for NodeCore {
    fn default() -> Self {
        Self {
            name: RefCell::default(),
            node_mask: Cell::new(NodeMask::MAX),
            culling_active: Cell::new(true),
            state_set: RefCell::default(),
            descriptions: RefCell::default(),
            bound: BoundCache::default(),
            parents: RefCell::default(),
        }
    }
}

impl NodeCore {
    /// Returns the display name.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Sets the display name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    /// Returns the mask tested by [`VisitorState::valid_node_mask`].
    #[inline]
    pub fn node_mask(&self) -> NodeMask {
        self.node_mask.get()
    }

    /// Sets the node mask. A mask of zero hides the node from every visitor
    /// without a matching override.
    #[inline]
    pub fn set_node_mask(&self, mask: NodeMask) {
        self.node_mask.set(mask);
    }

    /// Returns the culling flag set on this node alone. See
    /// [`Node::is_culling_active`] for the value visitors use.
    #[inline]
    pub fn culling_active(&self) -> bool {
        self.culling_active.get()
    }

    pub(crate) fn store_culling_active(&self, active: bool) {
        self.culling_active.set(active);
    }

    /// Returns the attached state set, if any.
    pub fn state_set(&self) -> Option<StateSet> {
        self.state_set.borrow().clone()
    }

    /// Attaches or detaches the opaque state set.
    pub fn set_state_set(&self, state_set: Option<StateSet>) {
        *self.state_set.borrow_mut() = state_set;
    }

    /// Returns the state set if it holds a `T`.
    pub fn state_set_as<T: Any>(&self) -> Option<Rc<T>> {
        self.state_set()?.downcast::<T>().ok()
    }

    /// Appends a free-text description.
    pub fn add_description(&self, description: impl Into<String>) {
        self.descriptions.borrow_mut().push(description.into());
    }

    /// Returns the descriptions in the order they were added.
    pub fn descriptions(&self) -> Vec<String> {
        self.descriptions.borrow().clone()
    }

    /// Returns the cache holding the bounding sphere.
    #[inline]
    pub fn bound_cache(&self) -> &BoundCache {
        &self.bound
    }

    /// Returns the live parents, one entry per group listing this node.
    pub fn parents(&self) -> Vec<NodeRef> {
        self.parents.borrow().iter().filter_map(Weak::upgrade).collect()
    }

    /// Returns the number of parent entries, one per listing group.
    pub fn num_parents(&self) -> usize {
        self.parents.borrow().len()
    }

    pub(crate) fn add_parent(&self, parent: Weak<dyn Node>) {
        self.parents.borrow_mut().push(parent);
    }

    /// Drops one back-reference to the parent at `parent` address.
    pub(crate) fn remove_parent(&self, parent: *const ()) {
        let mut parents = self.parents.borrow_mut();
        if let Some(index) = parents
            .iter()
            .position(|p| std::ptr::addr_eq(p.as_ptr(), parent))
        {
            parents.remove(index);
        }
    }
}

/// A vertex of the scene graph.
///
/// Concrete node kinds implement [`Node::dispatch`] by calling the
/// [`NodeVisitor`] method for their own type; this is the second half of the
/// double dispatch started by [`accept`]. Everything else has a default.
pub trait Node: Any + fmt::Debug {
    fn core(&self) -> &NodeCore;

    fn as_node(&self) -> &dyn Node;

    fn as_any(&self) -> &dyn Any;

    fn class_name(&self) -> &'static str;

    /// Calls the `apply_*` method of `visitor` matching this node's type.
    fn dispatch(&self, visitor: &mut dyn NodeVisitor);

    /// Computes the bounding sphere from scratch. Called by [`Node::bound`]
    /// when the cached sphere is dirty.
    fn compute_bound(&self) -> BoundingSphere;

    fn as_group(&self) -> Option<&dyn GroupNode> {
        None
    }

    /// Visits the children, if any.
    fn traverse(&self, _visitor: &mut dyn NodeVisitor) {}

    /// Visits every live parent.
    fn ascend(&self, visitor: &mut dyn NodeVisitor) {
        for parent in self.core().parents() {
            accept(&parent, visitor);
        }
    }

    /// Appends this node's contribution to a local-to-world matrix.
    /// `None` means the contribution could not be computed.
    fn accumulate_local_to_world(
        &self,
        matrix: &Matrix4<f32>,
        _state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>> {
        Some(*matrix)
    }

    /// Appends this node's contribution to a world-to-local matrix.
    fn accumulate_world_to_local(
        &self,
        matrix: &Matrix4<f32>,
        _state: Option<&VisitorState>,
    ) -> Option<Matrix4<f32>> {
        Some(*matrix)
    }

    /// Decides whether visitors may cull this node by its bound. Called
    /// together with [`Node::compute_bound`].
    fn compute_culling_active(&self) -> bool {
        subtree_culling_active(self.as_node())
    }

    /// Returns the bounding sphere, recomputing it only after invalidation.
    fn bound(&self) -> BoundingSphere {
        self.cached_bound().0
    }

    /// Returns `false` if visitors must not cull this node by its bound.
    ///
    /// A node whose bound is not expressed in its parent's frame, such as a
    /// transform with [`ReferenceFrame::Absolute`], turns culling off for
    /// itself and every ancestor.
    ///
    /// [`ReferenceFrame::Absolute`]: crate::scene::ReferenceFrame::Absolute
    fn is_culling_active(&self) -> bool {
        self.cached_bound().1
    }

    /// Turns culling of this node on or off and refreshes its ancestors.
    fn set_culling_active(&self, active: bool) {
        self.core().store_culling_active(active);
        self.dirty_bound();
    }

    #[doc(hidden)]
    fn cached_bound(&self) -> (BoundingSphere, bool) {
        self.core()
            .bound_cache()
            .get_or_compute(|| (self.compute_bound(), self.compute_culling_active()))
    }

    /// Invalidates the bound of this node and every ancestor.
    ///
    /// Propagation stops at nodes that are already dirty, so each ancestor
    /// is touched at most once per wave of invalidation.
    fn dirty_bound(&self) {
        if self.core().bound_cache().invalidate() {
            for parent in self.core().parents() {
                parent.dirty_bound();
            }
        }
    }
}

/// The node's own culling flag, cleared if any child has culling off.
pub(crate) fn subtree_culling_active(node: &dyn Node) -> bool {
    node.core().culling_active()
        && node.as_group().is_none_or(|group| {
            group
                .children()
                .iter()
                .all(|child| child.is_culling_active())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geode, Group};

    #[test]
    fn core_defaults() {
        let core = NodeCore::default();
        assert_eq!(core.node_mask(), 0xFFFF_FFFF);
        assert!(core.name().is_empty());
        assert!(core.state_set().is_none());
        assert!(core.bound_cache().is_dirty());
        assert_eq!(core.num_parents(), 0);
    }

    #[test]
    fn state_set_downcasts_on_demand() {
        #[derive(Debug, PartialEq)]
        struct Material(u8);

        let core = NodeCore::default();
        core.set_state_set(Some(Rc::new(Material(3))));
        assert_eq!(core.state_set_as::<Material>().as_deref(), Some(&Material(3)));
        assert!(core.state_set_as::<String>().is_none());
    }

    #[test]
    fn names_and_descriptions() {
        let geode = Geode::new();
        geode.core().set_name("leaf");
        geode.core().add_description("first");
        geode.core().add_description("second");
        assert_eq!(geode.core().name(), "leaf");
        assert_eq!(geode.core().descriptions(), ["first", "second"]);
        assert_eq!(geode.class_name(), "Geode");
    }

    #[test]
    fn bound_cache_counts() {
        let cache = BoundCache::default();
        assert!(!cache.invalidate());
        let (sphere, culling) =
            cache.get_or_compute(|| (BoundingSphere::new(nalgebra::Point3::origin(), 1.0), true));
        assert_eq!(sphere.radius(), 1.0);
        assert!(culling);
        cache.get_or_compute(|| unreachable!());
        assert_eq!(cache.computations(), 1);
        assert!(cache.invalidate());
        assert!(!cache.invalidate());
        assert_eq!(cache.invalidations(), 1);
    }

    #[test]
    fn same_node_compares_identity() {
        let a = Group::new();
        let b = Group::new();
        assert!(same_node(a.as_ref(), a.as_node()));
        assert!(!same_node(a.as_ref(), b.as_ref()));
    }

    #[test]
    fn culling_flag_spreads_to_ancestors() {
        let root = Group::new();
        let middle = Group::new();
        let leaf = Geode::new();
        root.add_child(middle.clone());
        middle.add_child(leaf.clone());
        assert!(root.is_culling_active());

        leaf.set_culling_active(false);
        assert!(!leaf.is_culling_active());
        assert!(!middle.is_culling_active());
        assert!(!root.is_culling_active());
        assert!(root.core().culling_active());

        middle.remove_child(leaf.as_ref());
        assert!(middle.is_culling_active());
        assert!(root.is_culling_active());
        assert!(!leaf.is_culling_active());
    }
}
