//! Canvas backend
//!
//! Immediate-mode rendering onto a 2D surface: the scene is traversed once
//! per frame and every leaf paints straight into the [`Canvas`].

mod image_canvas;

pub use image_canvas::ImageCanvas;

use glam::{Affine2, Vec2};
use image::RgbaImage;

use super::camera::Camera2D;
use super::color::Color;
use super::stats::RenderStats;
use super::traverse::{Painter, traverse};
use crate::animation::Cell;
use crate::assets::{AtlasId, AtlasStore};
use crate::scene::SceneGraph;

/// Backing surface of the canvas renderer. Transforms map local space to
/// surface pixels.
pub trait Canvas {
    /// Surface size in pixels
    fn size(&self) -> (u32, u32);

    /// Fill the whole surface
    fn clear(&mut self, color: Color);

    /// Draw `region` of `image` with its top-left corner at the local origin
    fn draw_image_region(&mut self, image: &RgbaImage, region: &Cell, transform: Affine2, alpha: f32);

    /// Fill `(0, 0)..size` in local space
    fn fill_rect(&mut self, size: Vec2, color: Color, transform: Affine2, alpha: f32);
}

/// Renders a scene graph onto a [`Canvas`]
pub struct CanvasRenderer<C: Canvas> {
    canvas: C,
    background: Color,
}

impl<C: Canvas> CanvasRenderer<C> {
    pub fn new(canvas: C, background: Color) -> Self {
        Self { canvas, background }
    }

    /// Clear to the background colour and paint every renderable leaf
    pub fn render(
        &mut self,
        graph: &SceneGraph,
        atlases: &AtlasStore,
        camera: &Camera2D,
    ) -> RenderStats {
        self.canvas.clear(self.background);

        let mut painter = CanvasPainter {
            canvas: &mut self.canvas,
            atlases,
            view: camera.view_matrix(),
            draw_calls: 0,
        };
        let mut stats = traverse(graph, &mut painter);
        stats.draw_calls = painter.draw_calls;
        stats
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    #[must_use]
    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }
}

/// Forwards leaf paints to the canvas through the camera
struct CanvasPainter<'a, C: Canvas> {
    canvas: &'a mut C,
    atlases: &'a AtlasStore,
    view: Affine2,
    draw_calls: u32,
}

impl<C: Canvas> Painter for CanvasPainter<'_, C> {
    fn draw_cell(&mut self, atlas: AtlasId, cell: usize, world: Affine2, alpha: f32) {
        let Some(atlas_ref) = self.atlases.get(atlas) else {
            log::warn!("Sprite references missing atlas {atlas:?}");
            return;
        };
        let Some(region) = atlas_ref.cell(cell) else {
            log::warn!("Atlas '{}' has no cell {cell}", atlas_ref.name());
            return;
        };
        self.canvas
            .draw_image_region(atlas_ref.image(), region, self.view * world, alpha);
        self.draw_calls += 1;
    }

    fn fill_rect(&mut self, size: Vec2, color: Color, world: Affine2, alpha: f32) {
        self.canvas.fill_rect(size, color, self.view * world, alpha);
        self.draw_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Atlas;
    use crate::scene::Transform2D;

    /// Canvas that only counts calls
    #[derive(Default)]
    struct CountingCanvas {
        clears: u32,
        images: Vec<(u32, Vec2)>,
        rects: u32,
    }

    impl Canvas for CountingCanvas {
        fn size(&self) -> (u32, u32) {
            (64, 64)
        }

        fn clear(&mut self, _color: Color) {
            self.clears += 1;
        }

        fn draw_image_region(
            &mut self,
            _image: &RgbaImage,
            region: &Cell,
            transform: Affine2,
            _alpha: f32,
        ) {
            self.images.push((region.x, transform.translation));
        }

        fn fill_rect(&mut self, _size: Vec2, _color: Color, _transform: Affine2, _alpha: f32) {
            self.rects += 1;
        }
    }

    fn sheet(store: &mut AtlasStore) -> AtlasId {
        let atlas = Atlas::sprite_sheet(
            "sheet",
            RgbaImage::new(8, 4),
            crate::animation::SheetLayout::new(4, 4),
        )
        .unwrap();
        store.add(atlas)
    }

    #[test]
    fn test_render_clears_then_paints() {
        let mut store = AtlasStore::new();
        let id = sheet(&mut store);
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let sprite = graph.spawn_sprite(id, 1, Transform2D::from_position(Vec2::new(5.0, 6.0)));
        let rect = graph.spawn_rect(Vec2::ONE, Color::WHITE, Transform2D::new());
        graph.add_child(root, sprite).unwrap();
        graph.add_child(root, rect).unwrap();

        let mut renderer = CanvasRenderer::new(CountingCanvas::default(), Color::BLACK);
        let camera = Camera2D::new(64, 64);
        let stats = renderer.render(&graph, &store, &camera);

        let canvas = renderer.canvas();
        assert_eq!(canvas.clears, 1);
        assert_eq!(canvas.images, vec![(4, Vec2::new(5.0, 6.0))]);
        assert_eq!(canvas.rects, 1);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.leaves_painted, 2);
    }

    #[test]
    fn test_hidden_group_paints_nothing() {
        let mut store = AtlasStore::new();
        let id = sheet(&mut store);
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.spawn_group(Transform2D::new());
        graph.add_child(root, group).unwrap();
        for cell in 0..3 {
            let s = graph.spawn_sprite(id, cell % 2, Transform2D::new());
            graph.add_child(group, s).unwrap();
        }
        graph.set_will_render(group, false);

        let mut renderer = CanvasRenderer::new(CountingCanvas::default(), Color::BLACK);
        let stats = renderer.render(&graph, &store, &Camera2D::new(64, 64));

        assert!(renderer.canvas().images.is_empty());
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(renderer.canvas().clears, 1);
    }

    #[test]
    fn test_missing_cell_is_skipped() {
        let mut store = AtlasStore::new();
        let id = sheet(&mut store);
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let sprite = graph.spawn_sprite(id, 42, Transform2D::new());
        graph.add_child(root, sprite).unwrap();

        let mut renderer = CanvasRenderer::new(CountingCanvas::default(), Color::BLACK);
        let stats = renderer.render(&graph, &store, &Camera2D::new(64, 64));
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn test_image_canvas_end_to_end() {
        let mut store = AtlasStore::new();
        let mut img = RgbaImage::new(2, 2);
        for p in img.pixels_mut() {
            *p = image::Rgba([255, 0, 0, 255]);
        }
        let id = store.add(Atlas::single_image("red", img).unwrap());

        let mut graph = SceneGraph::new();
        let root = graph.root();
        let sprite = graph.spawn_sprite(id, 0, Transform2D::from_position(Vec2::new(1.0, 1.0)));
        graph.add_child(root, sprite).unwrap();

        let mut renderer = CanvasRenderer::new(ImageCanvas::new(4, 4), Color::WHITE);
        renderer.render(&graph, &store, &Camera2D::new(4, 4));

        let out = renderer.canvas().image();
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(3, 3).0, [255, 255, 255, 255]);
    }
}
