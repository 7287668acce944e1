//! Error types for recoverable scene graph failures.

use nalgebra::Point3;
use thiserror::Error;

/// Errors returned by operations that reject their input.
///
/// Traversal itself never fails: invalid volumes and singular transforms
/// degrade to "no result" instead of surfacing here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// A line segment whose start and end coincide.
    #[error("degenerate line segment: start and end coincide at {0:?}")]
    DegenerateSegment(Point3<f32>),

    /// A line segment with NaN or infinite coordinates.
    #[error("line segment has non-finite coordinates")]
    NonFiniteSegment,

    /// More segments than the segment mask has bits.
    #[error("too many line segments: at most {max} can be tested in one traversal")]
    TooManySegments { max: usize },

    /// More planes than the clipping mask has bits.
    #[error("too many planes: a polytope holds at most {max}")]
    TooManyPlanes { max: usize },

    /// A matrix that has no inverse.
    #[error("matrix is not invertible")]
    SingularMatrix,
}
