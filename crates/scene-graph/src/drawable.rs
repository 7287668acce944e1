//! Geometry held by [`Geode`](crate::scene::Geode) leaves.

use std::f32::consts::PI;
use std::fmt;

use nalgebra::Point3;

use crate::{BoundingBox, Rectangle, Triangle};

/// Leaf geometry that can be bounded and picked.
///
/// The graph never draws anything; it only needs a bounding box for the
/// geode's bound and access to the triangles for exact intersection.
pub trait Drawable: fmt::Debug {
    /// Returns the box enclosing every vertex.
    fn bounding_box(&self) -> BoundingBox;

    fn triangle_count(&self) -> usize;

    /// Returns the triangle at `index`, or `None` past the end.
    fn triangle(&self, index: usize) -> Option<Triangle>;

    /// Returns the vertex indices of the triangle at `index`, for drawables
    /// that share vertices between triangles.
    fn triangle_indices(&self, _index: usize) -> Option<[u32; 3]> {
        None
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Point3<f32>>,
    indices: Vec<[u32; 3]>,
    bounding_box: BoundingBox,
}

impl TriangleMesh {
    /// Creates a mesh from shared vertices and triangle indices.
    /// Triangles referring to missing vertices are skipped when picking.
    pub fn new(vertices: Vec<Point3<f32>>, indices: Vec<[u32; 3]>) -> Self {
        let mut bounding_box = BoundingBox::empty();
        for vertex in &vertices {
            bounding_box.expand_by_point(*vertex);
        }
        Self {
            vertices,
            indices,
            bounding_box,
        }
    }

    /// Creates an unindexed mesh, three fresh vertices per triangle.
    pub fn from_triangles(triangles: impl IntoIterator<Item = Triangle>) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for triangle in triangles {
            let base = vertices.len() as u32;
            vertices.extend_from_slice(triangle.vertices());
            indices.push([base, base + 1, base + 2]);
        }
        Self::new(vertices, indices)
    }

    /// Tessellates a sphere into `slices` segments around the Y axis and
    /// `stacks` bands from pole to pole. Triangles wind outward.
    pub fn uv_sphere(center: Point3<f32>, radius: f32, slices: u32, stacks: u32) -> Self {
        let slices = slices.max(3);
        let stacks = stacks.max(2);

        let mut vertices = Vec::with_capacity(((slices + 1) * (stacks + 1)) as usize);
        for stack in 0..=stacks {
            let theta = PI * stack as f32 / stacks as f32;
            for slice in 0..=slices {
                let phi = 2.0 * PI * slice as f32 / slices as f32;
                vertices.push(Point3::new(
                    center.x + radius * theta.sin() * phi.cos(),
                    center.y + radius * theta.cos(),
                    center.z + radius * theta.sin() * phi.sin(),
                ));
            }
        }

        let row = slices + 1;
        let mut indices = Vec::with_capacity((slices * stacks * 2) as usize);
        for stack in 0..stacks {
            for slice in 0..slices {
                let a = stack * row + slice;
                let b = a + row;
                if stack != 0 {
                    indices.push([a, a + 1, b]);
                }
                if stack != stacks - 1 {
                    indices.push([a + 1, b + 1, b]);
                }
            }
        }
        Self::new(vertices, indices)
    }

    /// Returns the shared vertex array.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    /// Returns one index triple per triangle.
    #[inline]
    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }
}

impl Drawable for TriangleMesh {
    fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    fn triangle(&self, index: usize) -> Option<Triangle> {
        let [a, b, c] = *self.indices.get(index)?;
        let vertex = |i: u32| self.vertices.get(i as usize).copied();
        Some(Triangle::new(vertex(a)?, vertex(b)?, vertex(c)?))
    }

    fn triangle_indices(&self, index: usize) -> Option<[u32; 3]> {
        self.indices.get(index).copied()
    }
}

impl From<Rectangle> for TriangleMesh {
    fn from(rectangle: Rectangle) -> Self {
        Self::new(rectangle.vertices().to_vec(), vec![[0, 1, 2], [0, 2, 3]])
    }
}
