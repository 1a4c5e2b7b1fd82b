//! Node payloads and per-node flags

use glam::{Affine2, Vec2};

use crate::assets::AtlasId;
use crate::render::{Color, Painter};

// ============================================================================
// Flags
// ============================================================================

/// Per-node state flags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Gates `update` for the node and its subtree
    pub active: bool,
    /// Gates painting of a leaf
    pub visible: bool,
    /// Gates traversal of the node and its whole subtree
    pub will_render: bool,
    /// Opacity multiplier in `[0, 1]`
    pub alpha: f32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            active: true,
            visible: true,
            will_render: true,
            alpha: 1.0,
        }
    }
}

/// Debug name of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Leaf that draws one atlas cell with its top-left corner at the local origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sprite {
    pub atlas: AtlasId,
    pub cell: usize,
}

impl Sprite {
    #[must_use]
    pub const fn new(atlas: AtlasId, cell: usize) -> Self {
        Self { atlas, cell }
    }
}

/// Leaf that fills a solid rectangle spanning `(0, 0)..size` in local units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRect {
    pub size: Vec2,
    pub color: Color,
}

impl ColorRect {
    #[must_use]
    pub const fn new(size: Vec2, color: Color) -> Self {
        Self { size, color }
    }
}

/// What a node is
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Container; members live in its `Children`
    Group,
    Sprite(Sprite),
    Rect(ColorRect),
}

impl NodeKind {
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group)
    }

    /// Paint a leaf through `painter` with its composed world matrix.
    ///
    /// Groups paint nothing themselves. Invisible or fully transparent
    /// leaves are skipped. Returns whether anything was painted.
    pub fn render(&self, node: &Node, world: Affine2, painter: &mut dyn Painter) -> bool {
        if !node.visible || node.alpha <= 0.0 {
            return false;
        }
        let alpha = node.alpha.min(1.0);
        match *self {
            Self::Group => false,
            Self::Sprite(sprite) => {
                painter.draw_cell(sprite.atlas, sprite.cell, world, alpha);
                true
            }
            Self::Rect(rect) => {
                painter.fill_rect(rect.size, rect.color, world, alpha);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingPainter {
        cells: Vec<(usize, f32)>,
        rects: usize,
    }

    impl Painter for CountingPainter {
        fn draw_cell(&mut self, _atlas: AtlasId, cell: usize, _world: Affine2, alpha: f32) {
            self.cells.push((cell, alpha));
        }

        fn fill_rect(&mut self, _size: Vec2, _color: Color, _world: Affine2, _alpha: f32) {
            self.rects += 1;
        }
    }

    fn atlas_id() -> AtlasId {
        let mut store = crate::assets::AtlasStore::new();
        store.add(
            crate::animation::Atlas::single_image("a", image::RgbaImage::new(2, 2)).unwrap(),
        )
    }

    #[test]
    fn test_leaf_render_respects_flags() {
        let mut painter = CountingPainter::default();
        let sprite = NodeKind::Sprite(Sprite::new(atlas_id(), 3));
        let rect = NodeKind::Rect(ColorRect::new(Vec2::splat(4.0), Color::WHITE));

        let node = Node::default();
        assert!(sprite.render(&node, Affine2::IDENTITY, &mut painter));
        assert!(rect.render(&node, Affine2::IDENTITY, &mut painter));

        let hidden = Node {
            visible: false,
            ..Node::default()
        };
        assert!(!sprite.render(&hidden, Affine2::IDENTITY, &mut painter));

        let clear = Node {
            alpha: 0.0,
            ..Node::default()
        };
        assert!(!rect.render(&clear, Affine2::IDENTITY, &mut painter));

        assert!(!NodeKind::Group.render(&node, Affine2::IDENTITY, &mut painter));
        assert_eq!(painter.cells, vec![(3, 1.0)]);
        assert_eq!(painter.rects, 1);
    }
}
