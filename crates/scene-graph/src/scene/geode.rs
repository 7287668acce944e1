//! Geometry leaves.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::drawable::Drawable;
use crate::scene::node::{Node, NodeCore};
use crate::scene::visitor::NodeVisitor;
use crate::{BoundingBox, BoundingSphere};

/// A leaf node holding drawables.
#[derive(Debug, Default)]
pub struct Geode {
    core: NodeCore,
    drawables: RefCell<Vec<Rc<dyn Drawable>>>,
}

impl Geode {
    /// Creates a new geode with no drawables.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Creates a geode holding a single drawable.
    pub fn with_drawable(drawable: Rc<dyn Drawable>) -> Rc<Self> {
        let geode = Self::new();
        geode.add_drawable(drawable);
        geode
    }

    /// Adds `drawable` unless it is already held. Invalidates the bound.
    pub fn add_drawable(&self, drawable: Rc<dyn Drawable>) -> bool {
        if self.contains_drawable(&drawable) {
            return false;
        }
        self.drawables.borrow_mut().push(drawable);
        self.dirty_bound();
        true
    }

    /// Removes `drawable`, returning `false` if it was not attached.
    pub fn remove_drawable(&self, drawable: &Rc<dyn Drawable>) -> bool {
        let mut drawables = self.drawables.borrow_mut();
        let Some(index) = drawables.iter().position(|d| Rc::ptr_eq(d, drawable)) else {
            return false;
        };
        drawables.remove(index);
        drop(drawables);
        self.dirty_bound();
        true
    }

    /// Returns `true` if this exact drawable is attached.
    pub fn contains_drawable(&self, drawable: &Rc<dyn Drawable>) -> bool {
        self.drawables.borrow().iter().any(|d| Rc::ptr_eq(d, drawable))
    }

    /// Returns the number of attached drawables.
    #[inline]
    pub fn num_drawables(&self) -> usize {
        self.drawables.borrow().len()
    }

    /// Returns the drawable at `index`.
    pub fn drawable(&self, index: usize) -> Option<Rc<dyn Drawable>> {
        self.drawables.borrow().get(index).cloned()
    }

    /// Returns the attached drawables in order.
    pub fn drawables(&self) -> Vec<Rc<dyn Drawable>> {
        self.drawables.borrow().clone()
    }

    /// Union of the drawables' bounding boxes.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for drawable in self.drawables.borrow().iter() {
            bb.expand_by_box(&drawable.bounding_box());
        }
        bb
    }
}

impl Node for Geode {
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
        "Geode"
    }

    fn dispatch(&self, visitor: &mut dyn NodeVisitor) {
        visitor.apply_geode(self);
    }

    fn compute_bound(&self) -> BoundingSphere {
        let mut sphere = BoundingSphere::empty();
        sphere.expand_by_box(&self.bounding_box());
        sphere
    }
}
