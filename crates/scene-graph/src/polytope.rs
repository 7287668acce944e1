//! Convex clip volumes and hierarchical mask-stack culling.
//!
//! A [`Polytope`] is the intersection of the retained half-spaces of its
//! planes. Each plane owns one bit of a [`ClippingMask`]; a set bit means the
//! plane still has to be tested. Testing a volume with
//! [`Polytope::contains`] clears the bits of every plane the volume lies
//! fully in front of, leaving the narrowed mask in
//! [`Polytope::result_mask`]. A traversal pushes that mask before descending
//! into a subtree and pops it on return, so children only test the planes
//! their parent straddled and siblings still see the parent's mask.

use nalgebra::{Matrix4, Point3};

use crate::plane::{Classification, Plane, PlaneClassify};
use crate::SceneError;

/// One bit per plane, bit `i` for the plane at index `i`.
pub type ClippingMask = u32;

/// Number of planes a single polytope can hold.
pub const MAX_PLANES: usize = ClippingMask::BITS as usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Polytope {
    planes: Vec<Plane>,
    mask_stack: Vec<ClippingMask>,
    result_mask: ClippingMask,
}

impl Default for Polytope {
    fn default() -> Self {
        Self::new()
    }
}

impl Polytope {
    /// Creates a polytope with no planes. It contains everything.
    pub fn new() -> Self {
        Self {
            planes: Vec::new(),
            mask_stack: vec![0],
            result_mask: 0,
        }
    }

    /// Creates a polytope bounded by `planes`.
    pub fn from_planes(planes: impl IntoIterator<Item = Plane>) -> Result<Self, SceneError> {
        let mut polytope = Self::new();
        for plane in planes {
            polytope.add(plane)?;
        }
        Ok(polytope)
    }

    /// Replaces the planes with the unit clip-space frustum `[-1, 1]` on x
    /// and y, optionally closed by the near (`z >= -1`) and far (`z <= 1`)
    /// planes.
    pub fn set_to_unit_frustum(&mut self, with_near: bool, with_far: bool) {
        self.planes.clear();
        self.planes.push(Plane::from_coefficients(1.0, 0.0, 0.0, 1.0));
        self.planes.push(Plane::from_coefficients(-1.0, 0.0, 0.0, 1.0));
        self.planes.push(Plane::from_coefficients(0.0, 1.0, 0.0, 1.0));
        self.planes.push(Plane::from_coefficients(0.0, -1.0, 0.0, 1.0));
        if with_near {
            self.planes.push(Plane::from_coefficients(0.0, 0.0, 1.0, 1.0));
        }
        if with_far {
            self.planes.push(Plane::from_coefficients(0.0, 0.0, -1.0, 1.0));
        }
        self.setup_mask();
    }

    /// Appends a plane and resets the mask stack to test every plane.
    pub fn add(&mut self, plane: Plane) -> Result<(), SceneError> {
        if self.planes.len() >= MAX_PLANES {
            log::warn!("polytope already holds {MAX_PLANES} planes, ignoring another");
            return Err(SceneError::TooManyPlanes { max: MAX_PLANES });
        }
        self.planes.push(plane);
        self.setup_mask();
        Ok(())
    }

    /// Removes every plane.
    pub fn clear(&mut self) {
        self.planes.clear();
        self.setup_mask();
    }

    /// Flips every plane, swapping the retained and rejected half-spaces.
    pub fn flip(&mut self) {
        for plane in &mut self.planes {
            plane.flip();
        }
    }

    /// Collapses the mask stack to a single entry with one bit per plane.
    pub fn setup_mask(&mut self) {
        let full = Self::full_mask(self.planes.len());
        self.mask_stack.clear();
        self.mask_stack.push(full);
        self.result_mask = full;
    }

    fn full_mask(count: usize) -> ClippingMask {
        if count >= MAX_PLANES {
            ClippingMask::MAX
        } else {
            (1 << count) - 1
        }
    }

    /// Returns the planes in insertion order; plane `i` owns mask bit `i`.
    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Mask on top of the stack, the planes the current depth must test.
    #[inline]
    pub fn current_mask(&self) -> ClippingMask {
        self.mask_stack.last().copied().unwrap_or(0)
    }

    /// Mask left behind by the last `contains` call.
    #[inline]
    pub fn result_mask(&self) -> ClippingMask {
        self.result_mask
    }

    #[inline]
    pub fn set_result_mask(&mut self, mask: ClippingMask) {
        self.result_mask = mask;
    }

    /// Returns the number of masks on the stack, the base mask included.
    #[inline]
    pub fn mask_stack_depth(&self) -> usize {
        self.mask_stack.len()
    }

    /// Pushes the result mask, making it current for the subtree below.
    pub fn push_current_mask(&mut self) {
        self.mask_stack.push(self.result_mask);
    }

    /// Restores the mask of the enclosing depth. The base entry set up by
    /// [`Polytope::setup_mask`] is never popped.
    pub fn pop_current_mask(&mut self) {
        if self.mask_stack.len() > 1 {
            self.mask_stack.pop();
        }
    }

    fn active_planes(&self, mask: ClippingMask) -> impl Iterator<Item = (ClippingMask, &Plane)> {
        self.planes
            .iter()
            .enumerate()
            .map(|(index, plane)| (1 << index, plane))
            .filter(move |(bit, _)| mask & bit != 0)
    }

    /// Returns `true` if `point` lies in the retained half-space of every
    /// currently active plane. The result mask is left untouched.
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        self.active_planes(self.current_mask())
            .all(|(_, plane)| plane.signed_distance(point) >= 0.0)
    }

    /// Returns `false` if `volume` is empty or lies entirely behind an
    /// active plane.
    ///
    /// Planes the volume lies entirely in front of are cleared from the
    /// result mask; straddled planes stay set for the subtree below.
    pub fn contains<V: PlaneClassify + ?Sized>(&mut self, volume: &V) -> bool {
        let (inside, mask) = self.classify_active(volume, |c| c != Classification::Back);
        self.result_mask = mask;
        inside
    }

    /// Returns `true` only if `volume` lies entirely in front of every active
    /// plane. With no active planes any non-empty volume is contained.
    pub fn contains_all_of<V: PlaneClassify + ?Sized>(&mut self, volume: &V) -> bool {
        let (inside, mask) = self.classify_active(volume, |c| c == Classification::Front);
        self.result_mask = mask;
        inside
    }

    /// Walks the active planes, clearing the bit of each plane `volume` lies
    /// in front of and stopping at the first plane `accept` rejects.
    fn classify_active<V, F>(&self, volume: &V, accept: F) -> (bool, ClippingMask)
    where
        V: PlaneClassify + ?Sized,
        F: Fn(Classification) -> bool,
    {
        let mask = self.current_mask();
        if !volume.valid() {
            return (false, mask);
        }
        let mut result = mask;
        for (bit, plane) in self.active_planes(mask) {
            let classification = volume.classify(plane);
            if !accept(classification) {
                return (false, result);
            }
            if classification == Classification::Front {
                result ^= bit;
            }
        }
        (true, result)
    }

    /// Re-expresses every plane in another frame, given the inverse of the
    /// point transform into that frame.
    pub fn transform_providing_inverse(&mut self, inverse: &Matrix4<f32>) {
        for plane in &mut self.planes {
            plane.transform_providing_inverse(inverse);
        }
    }

    /// Transforms every plane by the point transform `matrix`. Prefer
    /// [`Polytope::transform_providing_inverse`] when the inverse is at hand.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) -> Result<(), SceneError> {
        let inverse = matrix.try_inverse().ok_or(SceneError::SingularMatrix)?;
        self.transform_providing_inverse(&inverse);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, BoundingSphere};
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_box(x: f32, y: f32, z: f32, half: f32) -> BoundingBox {
        BoundingBox::new(
            Point3::new(x - half, y - half, z - half),
            Point3::new(x + half, y + half, z + half),
        )
    }

    fn cube_polytope() -> Polytope {
        let mut polytope = Polytope::new();
        polytope.set_to_unit_frustum(true, true);
        polytope
    }

    fn random_plane(rng: &mut StdRng) -> Plane {
        loop {
            let normal = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if normal.norm() > 0.1 {
                return Plane::new(normal, rng.gen_range(-2.0..2.0));
            }
        }
    }

    fn random_box(rng: &mut StdRng) -> BoundingBox {
        let min = Point3::new(
            rng.gen_range(-4.0..4.0),
            rng.gen_range(-4.0..4.0),
            rng.gen_range(-4.0..4.0),
        );
        let extent = Vector3::new(
            rng.gen_range(0.0..3.0),
            rng.gen_range(0.0..3.0),
            rng.gen_range(0.0..3.0),
        );
        BoundingBox::new(min, min + extent)
    }

    /// Reference classification testing all eight corners.
    fn corner_distances(plane: &Plane, bb: &BoundingBox) -> (bool, bool) {
        let distances: Vec<f32> = (0..8).map(|i| plane.signed_distance(bb.corner(i))).collect();
        let all_front = distances.iter().all(|&d| d > 0.0);
        let all_back = distances.iter().all(|&d| d < 0.0);
        (all_front, all_back)
    }

    #[test]
    fn unit_frustum_plane_counts() {
        let mut polytope = Polytope::new();
        polytope.set_to_unit_frustum(false, false);
        assert_eq!(polytope.planes().len(), 4);
        assert_eq!(polytope.current_mask(), 0b1111);

        polytope.set_to_unit_frustum(true, true);
        assert_eq!(polytope.planes().len(), 6);
        assert_eq!(polytope.current_mask(), 0b11_1111);
        assert!(polytope.contains_point(Point3::origin()));
        assert!(polytope.contains_point(Point3::new(1.0, -1.0, 1.0)));
        assert!(!polytope.contains_point(Point3::new(0.0, 0.0, 1.5)));
    }

    #[test]
    fn contains_clears_satisfied_planes() {
        let mut polytope = cube_polytope();

        assert!(polytope.contains(&unit_box(0.0, 0.0, 0.0, 0.5)));
        assert_eq!(polytope.result_mask(), 0);

        // straddles only the +x boundary, plane index 1
        assert!(polytope.contains(&unit_box(1.0, 0.0, 0.0, 0.5)));
        assert_eq!(polytope.result_mask(), 0b10);

        assert!(!polytope.contains(&unit_box(3.0, 0.0, 0.0, 0.5)));
        assert!(!polytope.contains(&BoundingSphere::new(Point3::new(0.0, 3.0, 0.0), 1.0)));
        assert!(polytope.contains(&BoundingSphere::new(Point3::new(0.0, 1.5, 0.0), 1.0)));
    }

    #[test]
    fn contains_all_of_requires_every_plane() {
        let mut polytope = cube_polytope();
        assert!(polytope.contains_all_of(&unit_box(0.0, 0.0, 0.0, 0.5)));
        assert!(!polytope.contains_all_of(&unit_box(1.0, 0.0, 0.0, 0.5)));
        assert!(!polytope.contains_all_of(&unit_box(3.0, 0.0, 0.0, 0.5)));

        let mut empty = Polytope::new();
        assert!(empty.contains_all_of(&unit_box(3.0, 0.0, 0.0, 0.5)));
        assert!(empty.contains(&unit_box(3.0, 0.0, 0.0, 0.5)));
    }

    #[test]
    fn empty_volumes_are_never_contained() {
        let mut polytope = cube_polytope();
        polytope.set_result_mask(0b1);
        assert!(!polytope.contains(&BoundingBox::empty()));
        assert_eq!(polytope.result_mask(), polytope.current_mask());
        assert!(!polytope.contains(&BoundingSphere::empty()));
        assert!(!polytope.contains_all_of(&BoundingBox::empty()));
        assert!(!polytope.contains_all_of(&BoundingSphere::empty()));

        let mut unbounded = Polytope::new();
        assert!(!unbounded.contains(&BoundingBox::empty()));
        assert!(!unbounded.contains_all_of(&BoundingSphere::empty()));
        assert!(unbounded.contains(&BoundingSphere::new(Point3::origin(), 0.0)));
    }

    #[test]
    fn push_and_pop_restore_parent_mask() {
        let mut polytope = cube_polytope();
        let full = polytope.current_mask();

        assert!(polytope.contains(&unit_box(1.0, 0.0, 0.0, 0.5)));
        polytope.push_current_mask();
        assert_eq!(polytope.mask_stack_depth(), 2);
        assert_eq!(polytope.current_mask(), 0b10);

        // a box the parent already proved inside every plane but +x
        assert!(polytope.contains(&unit_box(0.9, 0.0, 5.0, 0.2)));
        polytope.push_current_mask();
        assert_eq!(polytope.current_mask(), 0b10);
        polytope.pop_current_mask();

        polytope.pop_current_mask();
        assert_eq!(polytope.current_mask(), full);
        polytope.pop_current_mask();
        assert_eq!(polytope.mask_stack_depth(), 1);
        assert_eq!(polytope.current_mask(), full);
    }

    #[test]
    fn mask_only_narrows_within_scope() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut polytope = cube_polytope();
        for _ in 0..200 {
            let parent = polytope.current_mask();
            polytope.contains(&random_box(&mut rng));
            assert_eq!(polytope.result_mask() & !parent, 0);
        }
    }

    #[test]
    fn agrees_with_brute_force_corners() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let count = rng.gen_range(1..8);
            let planes: Vec<Plane> = (0..count).map(|_| random_plane(&mut rng)).collect();
            let mut polytope = Polytope::from_planes(planes.iter().copied()).unwrap();

            for _ in 0..20 {
                let bb = random_box(&mut rng);
                let reference: Vec<(bool, bool)> =
                    planes.iter().map(|plane| corner_distances(plane, &bb)).collect();

                let expected_contains = reference.iter().all(|&(_, all_back)| !all_back);
                let expected_all_of = reference.iter().all(|&(all_front, _)| all_front);
                assert_eq!(polytope.contains(&bb), expected_contains);
                assert_eq!(polytope.contains_all_of(&bb), expected_all_of);
            }
        }
    }

    #[test]
    fn rejects_too_many_planes() {
        let mut polytope = Polytope::new();
        for i in 0..MAX_PLANES {
            polytope.add(Plane::new(Vector3::x(), i as f32)).unwrap();
        }
        assert_eq!(polytope.current_mask(), ClippingMask::MAX);
        assert_eq!(
            polytope.add(Plane::new(Vector3::y(), 0.0)),
            Err(SceneError::TooManyPlanes { max: MAX_PLANES })
        );
    }

    #[test]
    fn transform_moves_every_plane() {
        let mut polytope = cube_polytope();
        polytope
            .transform(&Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)))
            .unwrap();
        assert!(polytope.contains_point(Point3::new(10.0, 0.0, 0.0)));
        assert!(!polytope.contains_point(Point3::origin()));
        assert!(polytope.contains(&unit_box(10.0, 0.5, 0.5, 0.25)));
    }
}
