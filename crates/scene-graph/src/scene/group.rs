//! Nodes owning an ordered list of children.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use crate::BoundingSphere;
use crate::scene::node::{Node, NodeCore, NodeRef, node_addr, same_node};
use crate::scene::visitor::{NodeVisitor, accept};

/// Children of a group node plus a handle back to the group itself.
///
/// The handle is what children store as their parent back-reference. When
/// the list is dropped along with its group, the group is removed from the
/// parent list of every child it still holds.
#[derive(Debug)]
pub struct ChildList {
    owner: Weak<dyn Node>,
    children: RefCell<Vec<NodeRef>>,
}

impl ChildList {
    /// Creates an empty list owned by the node behind `owner`.
    pub fn new(owner: Weak<dyn Node>) -> Self {
        Self {
            owner,
            children: RefCell::default(),
        }
    }

    /// Union of the children's bounding spheres.
    pub fn union_bound(&self) -> BoundingSphere {
        let mut sphere = BoundingSphere::empty();
        for child in self.children.borrow().iter() {
            sphere.expand_by_sphere(&child.bound());
        }
        sphere
    }
}

impl Drop for ChildList {
    fn drop(&mut self) {
        let owner = self.owner.as_ptr() as *const ();
        for child in self.children.get_mut().drain(..) {
            child.core().remove_parent(owner);
        }
    }
}

/// Operations shared by every node that owns children.
///
/// Implementors provide the [`ChildList`]; the structural mutations keep the
/// parent back-references of the children in step with the list and
/// invalidate the bound once per successful change. Failed mutations have
/// no side effects.
pub trait GroupNode: Node {
    fn child_list(&self) -> &ChildList;

    /// Called after a child was inserted at `index`.
    fn child_inserted(&self, _index: usize) {}

    /// Called after the child at `index` was removed.
    fn child_removed(&self, _index: usize) {}

    #[inline]
    fn num_children(&self) -> usize {
        self.child_list().children.borrow().len()
    }

    fn child(&self, index: usize) -> Option<NodeRef> {
        self.child_list().children.borrow().get(index).cloned()
    }

    fn child_index(&self, node: &dyn Node) -> Option<usize> {
        self.child_list()
            .children
            .borrow()
            .iter()
            .position(|child| same_node(child.as_ref(), node))
    }

    fn contains_node(&self, node: &dyn Node) -> bool {
        self.child_index(node).is_some()
    }

    /// Snapshot of the children.
    fn children(&self) -> Vec<NodeRef> {
        self.child_list().children.borrow().clone()
    }

    /// Appends `child`. Fails if it is already a child, or if it is this
    /// group or one of its ancestors.
    fn add_child(&self, child: NodeRef) -> bool {
        self.insert_child(self.num_children(), child)
    }

    /// Inserts `child` before `index`, appending when `index` is past the end.
    fn insert_child(&self, index: usize, child: NodeRef) -> bool {
        if self.contains_node(child.as_ref()) || creates_cycle(self.as_node(), child.as_ref()) {
            debug!(
                "{} refused child {}: already present or an ancestor",
                self.class_name(),
                child.class_name()
            );
            return false;
        }
        let list = self.child_list();
        let index = index.min(self.num_children());
        child.core().add_parent(list.owner.clone());
        list.children.borrow_mut().insert(index, child);
        self.child_inserted(index);
        self.dirty_bound();
        true
    }

    /// Removes `child`. Fails if it is not a child of this group.
    fn remove_child(&self, child: &dyn Node) -> bool {
        match self.child_index(child) {
            Some(index) => self.remove_child_at(index),
            None => false,
        }
    }

    fn remove_child_at(&self, index: usize) -> bool {
        let list = self.child_list();
        if index >= self.num_children() {
            return false;
        }
        let removed = list.children.borrow_mut().remove(index);
        removed.core().remove_parent(node_addr(self.as_node()));
        self.child_removed(index);
        self.dirty_bound();
        true
    }

    /// Replaces `original` with `replacement` at the same position.
    /// Fails if `original` is not a child, or if `replacement` could not be
    /// added as a new child.
    fn replace_child(&self, original: &dyn Node, replacement: NodeRef) -> bool {
        if same_node(original, replacement.as_ref())
            || self.contains_node(replacement.as_ref())
            || creates_cycle(self.as_node(), replacement.as_ref())
        {
            return false;
        }
        let Some(index) = self.child_index(original) else {
            return false;
        };
        let list = self.child_list();
        replacement.core().add_parent(list.owner.clone());
        let previous = std::mem::replace(&mut list.children.borrow_mut()[index], replacement);
        previous.core().remove_parent(node_addr(self.as_node()));
        self.dirty_bound();
        true
    }
}

/// Returns `true` if making `child` a child of `group` would close a loop.
fn creates_cycle(group: &dyn Node, child: &dyn Node) -> bool {
    if same_node(group, child) {
        return true;
    }
    let mut pending = group.core().parents();
    while let Some(ancestor) = pending.pop() {
        if same_node(ancestor.as_ref(), child) {
            return true;
        }
        pending.extend(ancestor.core().parents());
    }
    false
}

/// Visits every child of `group` in order.
///
/// Children are fetched one at a time so the visitor may edit the graph.
pub fn traverse_children(group: &dyn GroupNode, visitor: &mut dyn NodeVisitor) {
    let mut index = 0;
    while let Some(child) = group.child(index) {
        accept(&child, visitor);
        index += 1;
    }
}

/// Plain child container.
#[derive(Debug)]
pub struct Group {
    core: NodeCore,
    children: ChildList,
}

impl Group {
    /// Creates a new group with no children.
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|owner: &Weak<Group>| {
            let owner: Weak<dyn Node> = owner.clone();
            Group {
                core: NodeCore::default(),
                children: ChildList::new(owner),
            }
        })
    }

    /// Creates a group holding `children` in order.
    pub fn with_children(children: impl IntoIterator<Item = NodeRef>) -> Rc<Self> {
        let group = Self::new();
        for child in children {
            group.add_child(child);
        }
        group
    }
}

impl Node for Group {
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
        "Group"
    }

    fn dispatch(&self, visitor: &mut dyn NodeVisitor) {
        visitor.apply_group(self);
    }

    fn compute_bound(&self) -> BoundingSphere {
        self.children.union_bound()
    }

    fn as_group(&self) -> Option<&dyn GroupNode> {
        Some(self)
    }

    fn traverse(&self, visitor: &mut dyn NodeVisitor) {
        traverse_children(self, visitor);
    }
}

impl GroupNode for Group {
    fn child_list(&self) -> &ChildList {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::TriangleMesh;
    use crate::scene::Geode;
    use nalgebra::Point3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sphere_geode(x: f32, radius: f32) -> Rc<Geode> {
        let geode = Geode::new();
        geode.add_drawable(Rc::new(TriangleMesh::uv_sphere(Point3::new(x, 0.0, 0.0), radius, 8, 6)));
        geode
    }

    fn parent_count(node: &dyn Node, group: &dyn Node) -> usize {
        node.core()
            .parents()
            .iter()
            .filter(|parent| same_node(parent.as_ref(), group))
            .count()
    }

    #[test]
    fn add_child_links_both_ways() {
        let group = Group::new();
        let leaf = Geode::new();
        assert!(group.add_child(leaf.clone()));
        assert_eq!(group.num_children(), 1);
        assert_eq!(leaf.core().num_parents(), 1);
        assert!(same_node(leaf.core().parents()[0].as_ref(), group.as_ref()));
    }

    #[test]
    fn failed_mutations_have_no_effect() {
        let group = Group::new();
        let leaf = Geode::new();
        let stranger = Geode::new();
        assert!(group.add_child(leaf.clone()));
        group.bound();

        assert!(!group.add_child(leaf.clone()));
        assert!(!group.remove_child(stranger.as_ref()));
        assert!(!group.remove_child_at(5));
        assert!(!group.replace_child(stranger.as_ref(), Geode::new()));
        assert!(!group.replace_child(leaf.as_ref(), leaf.clone()));

        assert_eq!(group.num_children(), 1);
        assert_eq!(leaf.core().num_parents(), 1);
        assert_eq!(stranger.core().num_parents(), 0);
        assert!(!group.core().bound_cache().is_dirty());
    }

    #[test]
    fn cycles_are_refused() {
        let root = Group::new();
        let middle = Group::new();
        root.add_child(middle.clone());
        assert!(!middle.add_child(root.clone()));
        assert!(!middle.add_child(middle.clone()));
        assert_eq!(root.core().num_parents(), 0);
    }

    #[test]
    fn replace_child_keeps_position() {
        let group = Group::new();
        let a = Geode::new();
        let b = Geode::new();
        let c = Geode::new();
        group.add_child(a.clone());
        group.add_child(b.clone());

        assert!(group.replace_child(a.as_ref(), c.clone()));
        assert_eq!(group.child_index(c.as_ref()), Some(0));
        assert_eq!(group.child_index(b.as_ref()), Some(1));
        assert_eq!(a.core().num_parents(), 0);
        assert_eq!(c.core().num_parents(), 1);
    }

    #[test]
    fn shared_child_tracks_each_parent() {
        let left = Group::new();
        let right = Group::new();
        let shared = Geode::new();
        left.add_child(shared.clone());
        right.add_child(shared.clone());
        assert_eq!(shared.core().num_parents(), 2);

        left.remove_child(shared.as_ref());
        assert_eq!(shared.core().num_parents(), 1);
        assert_eq!(parent_count(shared.as_ref(), right.as_ref()), 1);
    }

    #[test]
    fn dropping_group_clears_back_references() {
        let leaf = Geode::new();
        {
            let group = Group::new();
            group.add_child(leaf.clone());
            assert_eq!(leaf.core().num_parents(), 1);
        }
        assert_eq!(leaf.core().num_parents(), 0);
        assert_eq!(Rc::strong_count(&leaf), 1);
    }

    #[test]
    fn referential_symmetry_under_random_mutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let groups: Vec<Rc<Group>> = (0..4).map(|_| Group::new()).collect();
        let leaves: Vec<Rc<Geode>> = (0..6).map(|_| Geode::new()).collect();

        for _ in 0..500 {
            let group = &groups[rng.gen_range(0..groups.len())];
            let leaf = leaves[rng.gen_range(0..leaves.len())].clone();
            match rng.gen_range(0..3) {
                0 => {
                    group.add_child(leaf);
                }
                1 => {
                    group.remove_child(leaf.as_ref());
                }
                _ => {
                    if let Some(existing) = group.child(rng.gen_range(0..4)) {
                        group.replace_child(existing.as_ref(), leaf);
                    }
                }
            }

            for leaf in &leaves {
                for group in &groups {
                    let listed = usize::from(group.contains_node(leaf.as_ref()));
                    assert_eq!(parent_count(leaf.as_ref(), group.as_ref()), listed);
                }
                let total: usize = groups
                    .iter()
                    .map(|g| usize::from(g.contains_node(leaf.as_ref())))
                    .sum();
                assert_eq!(leaf.core().num_parents(), total);
            }
        }
    }

    #[test]
    fn bound_encloses_children_and_is_cached() {
        let group = Group::with_children([
            sphere_geode(-3.0, 1.0) as NodeRef,
            sphere_geode(2.0, 0.5) as NodeRef,
        ]);
        let bound = group.bound();
        for child in group.children() {
            let inner = child.bound();
            let reach = (inner.center() - bound.center()).norm() + inner.radius();
            assert!(reach <= bound.radius() + 1e-4);
        }

        group.bound();
        group.bound();
        assert_eq!(group.core().bound_cache().computations(), 1);

        group.add_child(sphere_geode(10.0, 1.0));
        let grown = group.bound();
        assert_eq!(group.core().bound_cache().computations(), 2);
        assert!(grown.radius() > bound.radius());
    }

    #[test]
    fn dirty_bound_propagates_once() {
        let root = Group::new();
        let left = Group::new();
        let right = Group::new();
        let leaf = sphere_geode(0.0, 1.0);
        root.add_child(left.clone());
        root.add_child(right.clone());
        left.add_child(leaf.clone());
        right.add_child(leaf.clone());
        root.bound();

        let before = [
            root.core().bound_cache().invalidations(),
            left.core().bound_cache().invalidations(),
            right.core().bound_cache().invalidations(),
        ];
        leaf.dirty_bound();
        leaf.dirty_bound();
        let after = [
            root.core().bound_cache().invalidations(),
            left.core().bound_cache().invalidations(),
            right.core().bound_cache().invalidations(),
        ];
        assert_eq!(after, before.map(|count| count + 1));
        assert_eq!(leaf.core().bound_cache().invalidations(), 1);
        assert!(root.core().bound_cache().is_dirty());
    }
}
