//! Line-segment picking against the scene graph.
//!
//! [`IntersectVisitor`] walks the graph with a set of world-space segments,
//! keeps them expressed in the frame of the node being visited, masks off
//! segments that miss a node's bound for that node's subtree, and tests the
//! survivors against the triangles of every reachable geode.

mod hit;
mod state;
mod visitor;

use serde::{Deserialize, Serialize};

pub use hit::Hit;
pub use state::{IntersectState, SegmentPair};
pub use visitor::IntersectVisitor;

/// One bit per registered segment.
pub type SegmentMask = u32;

/// Number of segments one visitor can test at once.
pub const MAX_SEGMENTS: usize = SegmentMask::BITS as usize;

/// Handle of a segment registered with an [`IntersectVisitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub(crate) usize);

impl SegmentId {
    /// Registration order, starting at zero.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// How many hits a segment keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitReportingMode {
    /// Only the hit with the smallest ratio.
    OnlyNearestHit,
    /// Every hit, sorted by ratio.
    #[default]
    AllHits,
}
