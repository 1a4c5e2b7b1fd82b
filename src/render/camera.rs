//! Camera for 2D rendering

use glam::{Affine2, Mat4, Vec2, Vec4};

/// Orthographic 2D camera. Screen space is y-down with the origin at the
/// top-left of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    /// World point shown at the viewport centre
    pub position: Vec2,
    /// Magnification (2.0 draws everything twice as large)
    pub zoom: f32,
    /// Rotation of the view in radians
    pub rotation: f32,
    /// Viewport size in pixels
    pub viewport: Vec2,
}

impl Camera2D {
    /// Camera whose view maps world units 1:1 onto a `width` x `height` viewport
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let viewport = Vec2::new(width as f32, height as f32);
        Self {
            position: viewport * 0.5,
            zoom: 1.0,
            rotation: 0.0,
            viewport,
        }
    }

    /// World to screen transform
    #[must_use]
    pub fn view_matrix(&self) -> Affine2 {
        Affine2::from_translation(self.viewport * 0.5)
            * Affine2::from_scale(Vec2::splat(self.zoom))
            * Affine2::from_angle(-self.rotation)
            * Affine2::from_translation(-self.position)
    }

    /// Screen to NDC projection (y-down)
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(0.0, self.viewport.x, self.viewport.y, 0.0, -1.0, 1.0)
    }

    /// World to NDC
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * affine_to_mat4(self.view_matrix())
    }

    /// Map a screen point back into world space
    #[must_use]
    pub fn screen_to_world(&self, point: Vec2) -> Vec2 {
        self.view_matrix().inverse().transform_point2(point)
    }

    /// Update the viewport, keeping the centred world point
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Vec2::new(width as f32, height as f32);
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.position += delta;
    }

    /// Multiply the zoom, ignoring non-positive factors
    pub fn zoom_by(&mut self, factor: f32) {
        if factor > 0.0 {
            self.zoom *= factor;
        }
    }
}

impl Default for Camera2D {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Embed a 2D affine transform into a 4x4 matrix acting on the xy plane
#[must_use]
pub fn affine_to_mat4(m: Affine2) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(m.matrix2.x_axis.x, m.matrix2.x_axis.y, 0.0, 0.0),
        Vec4::new(m.matrix2.y_axis.x, m.matrix2.y_axis.y, 0.0, 0.0),
        Vec4::Z,
        Vec4::new(m.translation.x, m.translation.y, 0.0, 1.0),
    )
}
