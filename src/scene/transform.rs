//! 2D transform with cached matrices
//!
//! A `Transform2D` holds the local affine state of a node (position, scale,
//! rotation and rotation origin). The local matrix is cached behind a dirty
//! flag, and the composed world matrix is cached alongside it so the scene
//! graph can hand it out without walking the parent chain every read.
//!
//! # Example
//!
//! ```ignore
//! let mut t = Transform2D::from_position(Vec2::new(100.0, 50.0));
//! let local = t.local_matrix();   // computed and cached
//! t.set_rotation(0.5);            // invalidates
//! let world = t.compose(parent);  // parent * local
//! ```

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

// ============================================================================
// Transform2D
// ============================================================================

/// Local 2D transform of a scene node.
///
/// Mutating any component marks both the local and the world cache dirty.
/// The world cache is additionally invalidated by the scene graph when an
/// ancestor changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform2D {
    /// Position relative to the parent
    position: Vec2,
    /// Scale factor (0 is legal and collapses the node)
    scale: Vec2,
    /// Rotation in radians
    rotation: f32,
    /// Origin that rotation and scale pivot around, in local units
    rotation_point: Vec2,

    #[serde(skip)]
    local: Affine2,
    #[serde(skip, default = "dirty")]
    local_dirty: bool,
    #[serde(skip)]
    world: Affine2,
    #[serde(skip, default = "dirty")]
    world_dirty: bool,
}

const fn dirty() -> bool {
    true
}

impl Transform2D {
    /// Identity transform
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform with just a position
    #[must_use]
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Transform from all components
    #[must_use]
    pub fn from_parts(position: Vec2, scale: Vec2, rotation: f32) -> Self {
        Self {
            position,
            scale,
            rotation,
            ..Default::default()
        }
    }

    // -------------------------------------------------------------------------
    // Getters
    // -------------------------------------------------------------------------

    #[must_use]
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[must_use]
    #[inline]
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Rotation in radians
    #[must_use]
    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    #[must_use]
    #[inline]
    pub fn rotation_point(&self) -> Vec2 {
        self.rotation_point
    }

    // -------------------------------------------------------------------------
    // Setters (invalidate cache)
    // -------------------------------------------------------------------------

    pub fn set_position(&mut self, position: Vec2) {
        if self.position != position {
            self.position = position;
            self.invalidate();
        }
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        if self.scale != scale {
            self.scale = scale;
            self.invalidate();
        }
    }

    /// Set both scale axes to the same factor
    pub fn set_scale_uniform(&mut self, scale: f32) {
        self.set_scale(Vec2::splat(scale));
    }

    /// Set the rotation in radians
    pub fn set_rotation(&mut self, rotation: f32) {
        if self.rotation != rotation {
            self.rotation = rotation;
            self.invalidate();
        }
    }

    pub fn set_rotation_point(&mut self, point: Vec2) {
        if self.rotation_point != point {
            self.rotation_point = point;
            self.invalidate();
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
        self.invalidate();
    }

    pub fn rotate_by(&mut self, radians: f32) {
        self.rotation += radians;
        self.invalidate();
    }

    pub fn scale_by(&mut self, factor: Vec2) {
        self.scale *= factor;
        self.invalidate();
    }

    // -------------------------------------------------------------------------
    // Matrices
    // -------------------------------------------------------------------------

    /// Local matrix: `T(pos + rp) * R * S * T(-rp)`, recomputed only when dirty.
    #[must_use]
    pub fn local_matrix(&mut self) -> Affine2 {
        if self.local_dirty {
            self.local = self.matrix();
            self.local_dirty = false;
        }
        self.local
    }

    /// Local matrix computed from scratch, without touching the cache.
    #[must_use]
    pub fn matrix(&self) -> Affine2 {
        let rp = self.rotation_point;
        Affine2::from_translation(self.position + rp)
            * Affine2::from_angle(self.rotation)
            * Affine2::from_scale(self.scale)
            * Affine2::from_translation(-rp)
    }

    /// Parent-composed matrix: `parent * local`.
    #[must_use]
    pub fn compose(&mut self, parent: Affine2) -> Affine2 {
        parent * self.local_matrix()
    }

    /// Cached world matrix, or `None` when it needs recomputing.
    #[must_use]
    pub(crate) fn cached_world(&self) -> Option<Affine2> {
        (!self.world_dirty).then_some(self.world)
    }

    /// Store a freshly composed world matrix.
    pub(crate) fn store_world(&mut self, world: Affine2) {
        self.world = world;
        self.world_dirty = false;
    }

    /// Mark the world matrix stale (parent changed or node reparented).
    #[inline]
    pub fn mark_world_dirty(&mut self) {
        self.world_dirty = true;
    }

    /// Check if the local matrix needs recomputation
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.local_dirty
    }

    /// Check if the world matrix needs recomputation
    #[must_use]
    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty
    }

    fn invalidate(&mut self) {
        self.local_dirty = true;
        self.world_dirty = true;
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            rotation_point: Vec2::ZERO,
            local: Affine2::IDENTITY,
            local_dirty: true,
            world: Affine2::IDENTITY,
            world_dirty: true,
        }
    }
}

// ============================================================================
// Global Transform
// ============================================================================

/// Decomposed world-space transform, for inspection and debugging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTransform2D {
    pub position: Vec2,
    /// Rotation in radians
    pub rotation: f32,
    pub scale: Vec2,
}

impl GlobalTransform2D {
    /// Decompose an affine matrix. Shear is discarded.
    #[must_use]
    pub fn from_matrix(matrix: Affine2) -> Self {
        let (scale, rotation, position) = matrix.to_scale_angle_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }
}

impl Default for GlobalTransform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_default_is_identity() {
        let mut t = Transform2D::new();
        assert!(t.is_dirty());
        assert_eq!(t.local_matrix(), Affine2::IDENTITY);
        assert!(!t.is_dirty());
    }

    #[test]
    fn test_translation() {
        let mut t = Transform2D::from_position(Vec2::new(100.0, 50.0));
        let p = t.local_matrix().transform_point2(Vec2::ZERO);
        assert!(approx(p, Vec2::new(100.0, 50.0)));
    }

    #[test]
    fn test_compose_with_parent_offset() {
        let mut t = Transform2D::from_position(Vec2::new(100.0, 50.0));
        let parent = Affine2::from_translation(Vec2::new(10.0, 0.0));

        let world = t.compose(parent);
        assert!(approx(world.translation, Vec2::new(110.0, 50.0)));
    }

    #[test]
    fn test_rotation_about_rotation_point() {
        let mut t = Transform2D::new();
        t.set_rotation_point(Vec2::new(10.0, 0.0));
        t.set_rotation(FRAC_PI_2);

        let m = t.local_matrix();
        // The pivot stays put
        assert!(approx(m.transform_point2(Vec2::new(10.0, 0.0)), Vec2::new(10.0, 0.0)));
        // The origin swings around it
        assert!(approx(m.transform_point2(Vec2::ZERO), Vec2::new(10.0, -10.0)));
    }

    #[test]
    fn test_zero_scale_is_degenerate_not_error() {
        let mut t = Transform2D::new();
        t.set_scale(Vec2::ZERO);

        let m = t.local_matrix();
        assert!(approx(m.transform_point2(Vec2::new(5.0, 5.0)), Vec2::ZERO));
    }

    #[test]
    fn test_same_value_does_not_invalidate() {
        let mut t = Transform2D::from_position(Vec2::new(1.0, 2.0));
        let _ = t.local_matrix();
        t.store_world(Affine2::IDENTITY);

        t.set_position(Vec2::new(1.0, 2.0));
        assert!(!t.is_dirty());
        assert!(!t.is_world_dirty());

        t.translate(Vec2::X);
        assert!(t.is_dirty());
        assert!(t.is_world_dirty());
    }

    #[test]
    fn test_decompose() {
        let t = Transform2D::from_parts(Vec2::new(3.0, 4.0), Vec2::splat(2.0), 0.25);
        let g = GlobalTransform2D::from_matrix(t.matrix());

        assert!(approx(g.position, Vec2::new(3.0, 4.0)));
        assert!(approx(g.scale, Vec2::splat(2.0)));
        assert!((g.rotation - 0.25).abs() < 1e-4);
    }
}
