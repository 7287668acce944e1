//! The scene graph: nodes, groups, and the visitors that walk them.

mod geode;
mod group;
mod node;
pub mod path;
mod switch;
mod transform;
mod visitor;

pub use geode::Geode;
pub use group::{ChildList, Group, GroupNode, traverse_children};
pub use node::{BoundCache, Node, NodeCore, NodeMask, NodePath, NodeRef, StateSet, same_node};
pub use switch::Switch;
pub use transform::{ComputeTransformCallback, ReferenceFrame, Transform};
pub use visitor::{
    AsNodeVisitor, CollectingVisitor, FnVisitor, NodeVisitor, TraversalMode, VisitorState, accept,
    traverse,
};
