//! Matrices accumulated along node paths.

use nalgebra::Matrix4;

use crate::scene::node::NodeRef;
use crate::scene::visitor::VisitorState;

/// Composes the local-to-world matrix of the last node in `path`.
///
/// Every node contributes through [`Node::accumulate_local_to_world`];
/// non-transform nodes contribute the identity. Returns `None` if any
/// contribution is unavailable.
///
/// [`Node::accumulate_local_to_world`]: crate::scene::Node::accumulate_local_to_world
pub fn local_to_world_matrix(path: &[NodeRef], state: Option<&VisitorState>) -> Option<Matrix4<f32>> {
    path.iter().try_fold(Matrix4::identity(), |matrix, node| {
        node.accumulate_local_to_world(&matrix, state)
    })
}

/// Composes the world-to-local matrix of the last node in `path`, the
/// inverse of [`local_to_world_matrix`]. Returns `None` if a transform on
/// the path is singular.
pub fn world_to_local_matrix(path: &[NodeRef], state: Option<&VisitorState>) -> Option<Matrix4<f32>> {
    path.iter().try_fold(Matrix4::identity(), |matrix, node| {
        node.accumulate_world_to_local(&matrix, state)
    })
}
