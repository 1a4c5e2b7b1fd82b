//! Quad batching
//!
//! Leaves are turned into world-space quads in traversal order. Consecutive
//! quads that use the same shader and texture share one draw call; a change
//! of either starts a new batch, so z order is preserved exactly.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Vec2};

use super::shader::ShaderId;
use crate::assets::{AtlasId, AtlasStore};
use crate::render::{Color, Painter};

/// Vertices per quad (two triangles)
pub const QUAD_VERTICES: u32 = 6;

/// Vertex layout shared by the sprite and solid shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl SpriteVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2, // uv
        2 => Float32x4, // color
    ];

    /// Vertex buffer layout
    #[must_use]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// A run of quads drawn with one shader and texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawBatch {
    pub shader: ShaderId,
    /// Atlas sampled by the batch; `None` for untextured shaders
    pub texture: Option<AtlasId>,
    /// Vertex range in the frame's vertex buffer
    pub vertices: Range<u32>,
}

impl DrawBatch {
    /// Number of quads in the batch
    #[must_use]
    pub fn quad_count(&self) -> u32 {
        (self.vertices.end - self.vertices.start) / QUAD_VERTICES
    }
}

/// [`Painter`] that accumulates vertices and batches for one frame
pub struct BatchBuilder<'a> {
    atlases: &'a AtlasStore,
    vertices: Vec<SpriteVertex>,
    batches: Vec<DrawBatch>,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(atlases: &'a AtlasStore) -> Self {
        Self {
            atlases,
            vertices: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// Vertices and batches collected so far
    #[must_use]
    pub fn finish(self) -> (Vec<SpriteVertex>, Vec<DrawBatch>) {
        (self.vertices, self.batches)
    }

    fn push_quad(
        &mut self,
        shader: ShaderId,
        texture: Option<AtlasId>,
        world: Affine2,
        size: Vec2,
        uv: [Vec2; 2],
        color: [f32; 4],
    ) {
        let start = self.vertices.len() as u32;
        let corner = |x: f32, y: f32, u: f32, v: f32| SpriteVertex {
            position: world.transform_point2(Vec2::new(x, y)).to_array(),
            uv: [u, v],
            color,
        };
        let (w, h) = (size.x, size.y);
        let ([u0, v0], [u1, v1]) = (uv[0].to_array(), uv[1].to_array());
        self.vertices.extend_from_slice(&[
            corner(0.0, 0.0, u0, v0),
            corner(w, 0.0, u1, v0),
            corner(w, h, u1, v1),
            corner(0.0, 0.0, u0, v0),
            corner(w, h, u1, v1),
            corner(0.0, h, u0, v1),
        ]);
        let end = start + QUAD_VERTICES;

        match self.batches.last_mut() {
            Some(last) if last.shader == shader && last.texture == texture => {
                last.vertices.end = end;
            }
            _ => self.batches.push(DrawBatch {
                shader,
                texture,
                vertices: start..end,
            }),
        }
    }
}

impl Painter for BatchBuilder<'_> {
    fn draw_cell(&mut self, atlas: AtlasId, cell: usize, world: Affine2, alpha: f32) {
        let Some(atlas_ref) = self.atlases.get(atlas) else {
            log::warn!("Sprite references missing atlas {atlas:?}");
            return;
        };
        let Some(region) = atlas_ref.cell(cell) else {
            log::warn!("Atlas '{}' has no cell {cell}", atlas_ref.name());
            return;
        };

        let extent = Vec2::new(atlas_ref.width() as f32, atlas_ref.height() as f32).max(Vec2::ONE);
        let origin = Vec2::new(region.x as f32, region.y as f32);
        let size = Vec2::new(region.w as f32, region.h as f32);
        let uv = [origin / extent, (origin + size) / extent];

        self.push_quad(
            ShaderId::TEXTURED,
            Some(atlas),
            world,
            size,
            uv,
            Color::WHITE.with_alpha_scaled(alpha).to_array(),
        );
    }

    fn fill_rect(&mut self, size: Vec2, color: Color, world: Affine2, alpha: f32) {
        self.push_quad(
            ShaderId::SOLID,
            None,
            world,
            size,
            [Vec2::ZERO, Vec2::ZERO],
            color.with_alpha_scaled(alpha).to_array(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Atlas, SheetLayout};
    use image::RgbaImage;

    fn store() -> (AtlasStore, AtlasId, AtlasId) {
        let mut store = AtlasStore::new();
        let a = store.add(
            Atlas::sprite_sheet("a", RgbaImage::new(8, 4), SheetLayout::new(4, 4)).unwrap(),
        );
        let b = store.add(Atlas::single_image("b", RgbaImage::new(4, 4)).unwrap());
        (store, a, b)
    }

    #[test]
    fn test_consecutive_quads_merge() {
        let (store, a, b) = store();
        let mut batcher = BatchBuilder::new(&store);
        batcher.draw_cell(a, 0, Affine2::IDENTITY, 1.0);
        batcher.draw_cell(a, 1, Affine2::IDENTITY, 1.0);
        batcher.draw_cell(b, 0, Affine2::IDENTITY, 1.0);
        batcher.fill_rect(Vec2::ONE, Color::WHITE, Affine2::IDENTITY, 1.0);
        batcher.draw_cell(a, 0, Affine2::IDENTITY, 1.0);

        let (vertices, batches) = batcher.finish();
        assert_eq!(vertices.len(), 5 * QUAD_VERTICES as usize);

        let keys: Vec<_> = batches.iter().map(|b| (b.shader, b.texture, b.quad_count())).collect();
        assert_eq!(
            keys,
            vec![
                (ShaderId::TEXTURED, Some(a), 2),
                (ShaderId::TEXTURED, Some(b), 1),
                (ShaderId::SOLID, None, 1),
                (ShaderId::TEXTURED, Some(a), 1),
            ]
        );
        assert_eq!(batches[3].vertices, 24..30);
    }

    #[test]
    fn test_quad_geometry_and_uv() {
        let (store, a, _) = store();
        let mut batcher = BatchBuilder::new(&store);
        batcher.draw_cell(a, 1, Affine2::from_translation(Vec2::new(10.0, 20.0)), 0.5);

        let (vertices, _) = batcher.finish();
        assert_eq!(vertices[0].position, [10.0, 20.0]);
        assert_eq!(vertices[2].position, [14.0, 24.0]);
        assert_eq!(vertices[0].uv, [0.5, 0.0]);
        assert_eq!(vertices[2].uv, [1.0, 1.0]);
        assert_eq!(vertices[0].color, [1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn test_missing_cell_adds_nothing() {
        let (store, a, _) = store();
        let mut batcher = BatchBuilder::new(&store);
        batcher.draw_cell(a, 9, Affine2::IDENTITY, 1.0);
        let (vertices, batches) = batcher.finish();
        assert!(vertices.is_empty() && batches.is_empty());
    }
}
