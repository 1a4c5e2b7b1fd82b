//! Software canvas over an in-memory RGBA image

use std::path::Path;

use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};

use super::Canvas;
use crate::animation::Cell;
use crate::render::Color;

/// Smallest transform determinant still treated as invertible
const MIN_DETERMINANT: f32 = 1e-8;

/// CPU rasterizer with nearest-neighbour sampling and source-over blending
#[derive(Debug, Clone)]
pub struct ImageCanvas {
    target: RgbaImage,
}

impl ImageCanvas {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: RgbaImage::new(width, height),
        }
    }

    /// Rendered pixels
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.target
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.target
    }

    /// Write the current frame as a PNG
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be encoded or written
    pub fn save_png(&self, path: impl AsRef<Path>) -> image::ImageResult<()> {
        self.target.save(path)
    }

    /// Call `shade(local)` for every target pixel whose centre maps inside
    /// `(0, 0)..size` under `transform`.
    fn rasterize(
        &mut self,
        size: Vec2,
        transform: Affine2,
        mut shade: impl FnMut(Vec2) -> Option<[f32; 4]>,
    ) {
        if size.x <= 0.0 || size.y <= 0.0 {
            return;
        }
        if transform.matrix2.determinant().abs() < MIN_DETERMINANT {
            return;
        }
        let inverse = transform.inverse();

        let corners = [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            Vec2::new(0.0, size.y),
            size,
        ]
        .map(|c| transform.transform_point2(c));
        let min = corners.iter().fold(Vec2::splat(f32::MAX), |a, &c| a.min(c));
        let max = corners.iter().fold(Vec2::splat(f32::MIN), |a, &c| a.max(c));

        let (w, h) = self.target.dimensions();
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(w);
        let y1 = (max.y.ceil().max(0.0) as u32).min(h);

        for py in y0..y1 {
            for px in x0..x1 {
                let local = inverse.transform_point2(Vec2::new(px as f32 + 0.5, py as f32 + 0.5));
                if local.x < 0.0 || local.y < 0.0 || local.x >= size.x || local.y >= size.y {
                    continue;
                }
                if let Some(src) = shade(local) {
                    let dst = self.target.get_pixel_mut(px, py);
                    *dst = blend_over(src, *dst);
                }
            }
        }
    }
}

impl Canvas for ImageCanvas {
    fn size(&self) -> (u32, u32) {
        self.target.dimensions()
    }

    fn clear(&mut self, color: Color) {
        let pixel = Rgba(color.to_rgba8());
        for p in self.target.pixels_mut() {
            *p = pixel;
        }
    }

    fn draw_image_region(&mut self, image: &RgbaImage, region: &Cell, transform: Affine2, alpha: f32) {
        let size = Vec2::new(region.w as f32, region.h as f32);
        self.rasterize(size, transform, |local| {
            let sx = region.x + (local.x as u32).min(region.w.saturating_sub(1));
            let sy = region.y + (local.y as u32).min(region.h.saturating_sub(1));
            let texel = image.get_pixel_checked(sx, sy)?;
            let c = Color::from_rgba8(texel.0);
            Some([c.r, c.g, c.b, c.a * alpha])
        });
    }

    fn fill_rect(&mut self, size: Vec2, color: Color, transform: Affine2, alpha: f32) {
        let c = color.with_alpha_scaled(alpha);
        self.rasterize(size, transform, |_| Some(c.to_array()));
    }
}

/// Source-over compositing of straight-alpha colours
fn blend_over(src: [f32; 4], dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3].clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let d = Color::from_rgba8(dst.0);
    let out_a = sa + d.a * (1.0 - sa);
    let channel = |s: f32, dc: f32| (s * sa + dc * d.a * (1.0 - sa)) / out_a;
    Rgba(
        Color::rgba(
            channel(src[0], d.r),
            channel(src[1], d.g),
            channel(src[2], d.b),
            out_a,
        )
        .to_rgba8(),
    )
}
