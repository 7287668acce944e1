//! Double-dispatch visitors over the scene graph.
//!
//! A traversal starts with [`accept`], which tests the node mask, pushes the
//! node onto the visitor's path and calls [`Node::dispatch`]. The node calls
//! back the [`NodeVisitor`] method for its own type. Each `apply_*` method
//! defaults to the method of the nearest more general node type, ending in
//! [`NodeVisitor::apply_node`], which continues with [`traverse`]. A visitor
//! therefore overrides only the node types it cares about and inherits the
//! recursion for everything else.

use std::fmt;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::config::TraversalConfig;
use crate::scene::geode::Geode;
use crate::scene::group::GroupNode;
use crate::scene::node::{Node, NodeMask, NodePath, NodeRef, same_node};
use crate::scene::path;
use crate::scene::switch::Switch;
use crate::scene::transform::Transform;

/// Which related nodes [`traverse`] continues to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    /// Stop at the current node.
    #[default]
    None,
    /// Continue to every parent.
    Parents,
    /// Continue to every child.
    AllChildren,
    /// Continue to children that are switched on.
    ActiveChildren,
    /// Hand the node to the nested traversal visitor.
    Visitor,
}

/// Bookkeeping shared by every visitor.
pub struct VisitorState {
    traversal_mode: TraversalMode,
    traversal_mask: NodeMask,
    node_mask_override: NodeMask,
    traversal_number: u64,
    node_path: NodePath,
    traversal_visitor: Option<Box<dyn NodeVisitor>>,
}

impl fmt::Debug for VisitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitorState")
            .field("traversal_mode", &self.traversal_mode)
            .field("traversal_mask", &format_args!("{:#x}", self.traversal_mask))
            .field("node_mask_override", &format_args!("{:#x}", self.node_mask_override))
            .field("traversal_number", &self.traversal_number)
            .field("node_path_len", &self.node_path.len())
            .field("has_traversal_visitor", &self.traversal_visitor.is_some())
            .finish()
    }
}

impl Default for VisitorState {
    fn default() -> Self {
        Self::new(TraversalMode::None)
    }
}

impl VisitorState {
    pub fn new(traversal_mode: TraversalMode) -> Self {
        Self {
            traversal_mode,
            traversal_mask: NodeMask::MAX,
            node_mask_override: 0,
            traversal_number: 0,
            node_path: NodePath::new(),
            traversal_visitor: None,
        }
    }

    /// Creates a state with the mode and masks of `config`.
    pub fn from_config(config: &TraversalConfig) -> Self {
        let mut state = Self::new(config.traversal_mode);
        state.traversal_mask = config.traversal_mask;
        state.node_mask_override = config.node_mask_override;
        state
    }

    /// Returns which children a traversal descends into.
    #[inline]
    pub fn traversal_mode(&self) -> TraversalMode {
        self.traversal_mode
    }

    /// Sets the mode. Leaving [`TraversalMode::Visitor`] detaches the
    /// nested traversal visitor.
    pub fn set_traversal_mode(&mut self, mode: TraversalMode) {
        self.traversal_mode = mode;
        if mode != TraversalMode::Visitor {
            self.traversal_visitor = None;
        }
    }

    /// Attaches a visitor that takes over traversal, switching to
    /// [`TraversalMode::Visitor`]. `None` detaches it and falls back to
    /// [`TraversalMode::None`].
    pub fn set_traversal_visitor(&mut self, visitor: Option<Box<dyn NodeVisitor>>) {
        self.traversal_mode = if visitor.is_some() {
            TraversalMode::Visitor
        } else {
            TraversalMode::None
        };
        self.traversal_visitor = visitor;
    }

    pub fn traversal_visitor(&self) -> Option<&dyn NodeVisitor> {
        self.traversal_visitor.as_deref()
    }

    /// Returns the mask ANDed with each node's mask.
    #[inline]
    pub fn traversal_mask(&self) -> NodeMask {
        self.traversal_mask
    }

    /// Sets the mask ANDed with each node's mask.
    #[inline]
    pub fn set_traversal_mask(&mut self, mask: NodeMask) {
        self.traversal_mask = mask;
    }

    /// Returns the bits ORed into every node's mask before the test.
    #[inline]
    pub fn node_mask_override(&self) -> NodeMask {
        self.node_mask_override
    }

    #[inline]
    pub fn set_node_mask_override(&mut self, mask: NodeMask) {
        self.node_mask_override = mask;
    }

    /// Frame counter handed to transform callbacks.
    #[inline]
    pub fn traversal_number(&self) -> u64 {
        self.traversal_number
    }

    #[inline]
    pub fn set_traversal_number(&mut self, number: u64) {
        self.traversal_number = number;
    }

    /// `traversal_mask & (node_mask_override | node mask)` is non-zero.
    #[inline]
    pub fn valid_node_mask(&self, node: &dyn Node) -> bool {
        self.traversal_mask & (self.node_mask_override | node.core().node_mask()) != 0
    }

    /// Nodes from the traversal root down to the node being visited.
    #[inline]
    pub fn node_path(&self) -> &[NodeRef] {
        &self.node_path
    }

    /// Appends `node` to the path of the current traversal.
    pub fn push_onto_node_path(&mut self, node: NodeRef) {
        self.node_path.push(node);
    }

    /// Removes the last node from the path.
    pub fn pop_from_node_path(&mut self) {
        self.node_path.pop();
    }

    /// Empties the path.
    pub fn clear_node_path(&mut self) {
        self.node_path.clear();
    }

    /// Local-to-world matrix of the current node path.
    pub fn local_to_world_matrix(&self) -> Option<Matrix4<f32>> {
        path::local_to_world_matrix(&self.node_path, Some(self))
    }

    /// World-to-local matrix of the current node path.
    pub fn world_to_local_matrix(&self) -> Option<Matrix4<f32>> {
        path::world_to_local_matrix(&self.node_path, Some(self))
    }
}

/// Gives default trait methods a `&mut dyn NodeVisitor` to pass on.
pub trait AsNodeVisitor {
    fn as_node_visitor(&mut self) -> &mut dyn NodeVisitor;
}

impl<V: NodeVisitor> AsNodeVisitor for V {
    fn as_node_visitor(&mut self) -> &mut dyn NodeVisitor {
        self
    }
}

/// An operation applied to nodes by type.
pub trait NodeVisitor: AsNodeVisitor {
    fn state(&self) -> &VisitorState;

    fn state_mut(&mut self) -> &mut VisitorState;

    /// Prepares the visitor for another traversal.
    fn reset(&mut self) {
        self.state_mut().clear_node_path();
    }

    fn apply_node(&mut self, node: &dyn Node) {
        traverse(self.as_node_visitor(), node);
    }

    fn apply_geode(&mut self, geode: &Geode) {
        self.apply_node(geode);
    }

    fn apply_group(&mut self, group: &dyn GroupNode) {
        self.apply_node(group.as_node());
    }

    fn apply_transform(&mut self, transform: &Transform) {
        self.apply_group(transform);
    }

    fn apply_switch(&mut self, switch: &Switch) {
        self.apply_group(switch);
    }
}

/// Visits `node` and, through the visitor's `apply_*` methods, whatever the
/// traversal reaches from it.
///
/// Nodes failing [`VisitorState::valid_node_mask`] are skipped with their
/// whole subgraph.
pub fn accept(node: &NodeRef, visitor: &mut dyn NodeVisitor) {
    if !visitor.state().valid_node_mask(node.as_ref()) {
        log::trace!("{} masked out", node.class_name());
        return;
    }
    visitor.state_mut().push_onto_node_path(node.clone());
    node.dispatch(visitor);
    visitor.state_mut().pop_from_node_path();
}

/// Continues a traversal from `node` according to the visitor's mode.
pub fn traverse(visitor: &mut dyn NodeVisitor, node: &dyn Node) {
    match visitor.state().traversal_mode() {
        TraversalMode::None => {}
        TraversalMode::Parents => node.ascend(visitor),
        TraversalMode::AllChildren | TraversalMode::ActiveChildren => node.traverse(visitor),
        TraversalMode::Visitor => {
            let Some(mut nested) = visitor.state_mut().traversal_visitor.take() else {
                return;
            };
            let current = visitor.state().node_path().last().cloned();
            match current {
                Some(current) if same_node(current.as_ref(), node) => {
                    accept(&current, nested.as_mut());
                }
                _ => node.dispatch(nested.as_mut()),
            }
            visitor.state_mut().traversal_visitor = Some(nested);
        }
    }
}

/// Collects every node it is applied to, in visiting order.
#[derive(Debug)]
pub struct CollectingVisitor {
    state: VisitorState,
    collected: Vec<NodeRef>,
}

impl CollectingVisitor {
    /// Creates a new visitor that records nodes in visit order.
    pub fn new(mode: TraversalMode) -> Self {
        Self {
            state: VisitorState::new(mode),
            collected: Vec::new(),
        }
    }

    /// Returns the nodes visited so far.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.collected
    }

    /// Consumes the visitor, returning the visited nodes.
    pub fn into_nodes(self) -> Vec<NodeRef> {
        self.collected
    }
}

impl NodeVisitor for CollectingVisitor {
    fn state(&self) -> &VisitorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VisitorState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.state.clear_node_path();
        self.collected.clear();
    }

    fn apply_node(&mut self, node: &dyn Node) {
        if let Some(current) = self.state.node_path().last() {
            self.collected.push(current.clone());
        }
        traverse(self, node);
    }
}

/// Calls a closure with every node it is applied to and the current path.
pub struct FnVisitor<F>
where
    F: FnMut(&dyn Node, &[NodeRef]),
{
    state: VisitorState,
    func: F,
}

impl<F> FnVisitor<F>
where
    F: FnMut(&dyn Node, &[NodeRef]),
{
    /// Creates a new visitor calling `func` on every node it reaches.
    pub fn new(mode: TraversalMode, func: F) -> Self {
        Self {
            state: VisitorState::new(mode),
            func,
        }
    }
}

impl<F> NodeVisitor for FnVisitor<F>
where
    F: FnMut(&dyn Node, &[NodeRef]),
{
    fn state(&self) -> &VisitorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VisitorState {
        &mut self.state
    }

    fn apply_node(&mut self, node: &dyn Node) {
        (self.func)(node, self.state.node_path());
        traverse(self, node);
    }
}
