//! Traversal and spatial-query core of a retained-mode 3D scene graph.
//!
//! Nodes are shared through [`NodeRef`] and may have several parents. Every
//! node caches a bounding sphere that is recomputed lazily after
//! invalidation. Operations on the graph are [`NodeVisitor`]s dispatched by
//! node kind; [`CullVisitor`] culls against a [`Polytope`] and
//! [`IntersectVisitor`] picks geometry along line segments.

mod bounding_box;
mod bounding_sphere;
mod config;
mod cull;
mod drawable;
mod error;
pub mod intersect;
mod line_segment;
mod plane;
mod polytope;
mod rectangle;
pub mod scene;
mod triangle;

pub use bounding_box::BoundingBox;
pub use bounding_sphere::BoundingSphere;
pub use config::{ConfigError, TraversalConfig};
pub use cull::{CullVisitor, VisibleLeaf};
pub use drawable::{Drawable, TriangleMesh};
pub use error::SceneError;
pub use intersect::{Hit, HitReportingMode, IntersectVisitor, SegmentId};
pub use line_segment::LineSegment;
pub use plane::{Classification, Plane, PlaneClassify};
pub use polytope::{ClippingMask, MAX_PLANES, Polytope};
pub use rectangle::Rectangle;
pub use scene::{
    Geode, Group, GroupNode, Node, NodeMask, NodePath, NodeRef, NodeVisitor, Switch, Transform,
    TraversalMode, VisitorState, accept,
};
pub use triangle::Triangle;
