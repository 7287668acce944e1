//! Groups that turn individual children on and off.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::BoundingSphere;
use crate::scene::group::{ChildList, GroupNode, traverse_children};
use crate::scene::node::{Node, NodeCore};
use crate::scene::visitor::{NodeVisitor, TraversalMode, accept};

/// A group with an on/off value per child.
///
/// Visitors in [`TraversalMode::ActiveChildren`] only enter children that
/// are on; [`TraversalMode::AllChildren`] enters every child. The bound
/// always covers every child.
#[derive(Debug)]
pub struct Switch {
    core: NodeCore,
    children: ChildList,
    values: RefCell<Vec<bool>>,
    new_child_default_value: Cell<bool>,
}

impl Switch {
    /// Creates a new switch with no children.
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|owner: &Weak<Switch>| {
            let owner: Weak<dyn Node> = owner.clone();
            Switch {
                core: NodeCore::default(),
                children: ChildList::new(owner),
                values: RefCell::default(),
                new_child_default_value: Cell::new(true),
            }
        })
    }

    /// Value given to children added from now on.
    pub fn set_new_child_default_value(&self, value: bool) {
        self.new_child_default_value.set(value);
    }

    /// Returns the value given to children added without one.
    #[inline]
    pub fn new_child_default_value(&self) -> bool {
        self.new_child_default_value.get()
    }

    /// Sets the value of the child at `index`. Returns `false` if there is
    /// no such child.
    pub fn set_value(&self, index: usize, value: bool) -> bool {
        match self.values.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Sets the value of `child`. Returns `false` if it is not a child.
    pub fn set_child_value(&self, child: &dyn Node, value: bool) -> bool {
        self.child_index(child)
            .is_some_and(|index| self.set_value(index, value))
    }

    /// Value of the child at `index`; `false` past the end.
    pub fn value(&self, index: usize) -> bool {
        self.values.borrow().get(index).copied().unwrap_or(false)
    }

    /// Turns every child on and makes new children default to on.
    pub fn set_all_children_on(&self) {
        self.new_child_default_value.set(true);
        self.values.borrow_mut().fill(true);
    }

    /// Turns every child off and makes new children default to off.
    pub fn set_all_children_off(&self) {
        self.new_child_default_value.set(false);
        self.values.borrow_mut().fill(false);
    }

    /// Turns the child at `index` on and every other child off.
    pub fn set_single_child_on(&self, index: usize) -> bool {
        let mut values = self.values.borrow_mut();
        if index >= values.len() {
            return false;
        }
        for (i, value) in values.iter_mut().enumerate() {
            *value = i == index;
        }
        true
    }
}

impl Node for Switch {
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
        "Switch"
    }

    fn dispatch(&self, visitor: &mut dyn NodeVisitor) {
        visitor.apply_switch(self);
    }

    fn compute_bound(&self) -> BoundingSphere {
        self.children.union_bound()
    }

    fn as_group(&self) -> Option<&dyn GroupNode> {
        Some(self)
    }

    fn traverse(&self, visitor: &mut dyn NodeVisitor) {
        if visitor.state().traversal_mode() != TraversalMode::ActiveChildren {
            traverse_children(self, visitor);
            return;
        }
        let mut index = 0;
        while let Some(child) = self.child(index) {
            if self.value(index) {
                accept(&child, visitor);
            }
            index += 1;
        }
    }
}

impl GroupNode for Switch {
    fn child_list(&self) -> &ChildList {
        &self.children
    }

    fn child_inserted(&self, index: usize) {
        let value = self.new_child_default_value.get();
        let mut values = self.values.borrow_mut();
        let index = index.min(values.len());
        values.insert(index, value);
    }

    fn child_removed(&self, index: usize) {
        let mut values = self.values.borrow_mut();
        if index < values.len() {
            values.remove(index);
        }
    }
}
