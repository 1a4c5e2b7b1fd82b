//! Scene traversal shared by both backends
//!
//! The walk is depth-first pre-order from the root: a group is visited
//! before its members, members in z order. A node whose `will_render` flag
//! is off is skipped together with its whole subtree.

use glam::{Affine2, Vec2};

use super::color::Color;
use super::stats::RenderStats;
use crate::assets::AtlasId;
use crate::scene::SceneGraph;

/// Receiver of leaf paint calls. Matrices are in world space.
pub trait Painter {
    /// Draw atlas cell `cell` with its top-left corner at the local origin
    fn draw_cell(&mut self, atlas: AtlasId, cell: usize, world: Affine2, alpha: f32);

    /// Fill `(0, 0)..size` in local space
    fn fill_rect(&mut self, size: Vec2, color: Color, world: Affine2, alpha: f32);
}

/// Walk the scene and paint every renderable leaf.
///
/// Returns the visit and paint counts; backend counters are left at zero.
pub fn traverse(graph: &SceneGraph, painter: &mut dyn Painter) -> RenderStats {
    let mut stats = RenderStats::default();
    let mut stack = vec![graph.root()];

    while let Some(entity) = stack.pop() {
        let (Some(node), Some(kind)) = (graph.node(entity), graph.kind(entity)) else {
            continue;
        };
        if !node.will_render {
            continue;
        }
        stats.nodes_visited += 1;

        if kind.is_group() {
            stack.extend(graph.children(entity).into_iter().rev());
            continue;
        }

        let Some(world) = graph.world_matrix(entity) else {
            continue;
        };
        if kind.render(&node, world, painter) {
            stats.leaves_painted += 1;
        }
    }
    stats
}

#[cfg(test)]
pub(crate) mod tests {
    use hecs::Entity;

    use super::*;
    use crate::scene::Transform2D;

    /// Painter that records what it was asked to paint
    #[derive(Default)]
    pub(crate) struct RecordingPainter {
        pub calls: Vec<(Option<usize>, Vec2)>,
    }

    impl Painter for RecordingPainter {
        fn draw_cell(&mut self, _atlas: AtlasId, cell: usize, world: Affine2, _alpha: f32) {
            self.calls.push((Some(cell), world.translation));
        }

        fn fill_rect(&mut self, _size: Vec2, _color: Color, world: Affine2, _alpha: f32) {
            self.calls.push((None, world.translation));
        }
    }

    fn rect_at(graph: &mut SceneGraph, x: f32) -> Entity {
        graph.spawn_rect(
            Vec2::ONE,
            Color::WHITE,
            Transform2D::from_position(Vec2::new(x, 0.0)),
        )
    }

    #[test]
    fn test_pre_order_z_order() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.spawn_group(Transform2D::from_position(Vec2::new(100.0, 0.0)));
        let a = rect_at(&mut graph, 1.0);
        let b = rect_at(&mut graph, 2.0);
        let c = rect_at(&mut graph, 3.0);
        graph.add_child(root, a).unwrap();
        graph.add_child(root, group).unwrap();
        graph.add_child(group, b).unwrap();
        graph.add_child(root, c).unwrap();

        let mut painter = RecordingPainter::default();
        let stats = traverse(&graph, &mut painter);

        let xs: Vec<f32> = painter.calls.iter().map(|(_, p)| p.x).collect();
        assert_eq!(xs, vec![1.0, 102.0, 3.0]);
        assert_eq!(stats.nodes_visited, 5);
        assert_eq!(stats.leaves_painted, 3);
    }

    #[test]
    fn test_will_render_skips_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.spawn_group(Transform2D::new());
        let a = rect_at(&mut graph, 1.0);
        let b = rect_at(&mut graph, 2.0);
        graph.add_child(root, group).unwrap();
        graph.add_child(group, a).unwrap();
        graph.add_child(group, b).unwrap();
        graph.set_will_render(group, false);

        let mut painter = RecordingPainter::default();
        let stats = traverse(&graph, &mut painter);
        assert!(painter.calls.is_empty());
        assert_eq!(stats.nodes_visited, 1);

        // Visibility only affects the leaf itself
        graph.set_will_render(group, true);
        graph.set_visible(a, false);
        let mut painter = RecordingPainter::default();
        let stats = traverse(&graph, &mut painter);
        assert_eq!(painter.calls.len(), 1);
        assert_eq!(stats.nodes_visited, 4);
    }

    #[test]
    fn test_detached_nodes_are_not_rendered() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = rect_at(&mut graph, 1.0);
        graph.add_child(root, a).unwrap();
        graph.remove_child(root, a);

        let mut painter = RecordingPainter::default();
        traverse(&graph, &mut painter);
        assert!(painter.calls.is_empty());
    }

    #[test]
    fn test_deep_group_chain() {
        let mut graph = SceneGraph::new();
        let mut parent = graph.root();
        for _ in 0..5_000 {
            let group = graph.spawn_group(Transform2D::from_position(Vec2::new(1.0, 0.0)));
            graph.add_child(parent, group).unwrap();
            parent = group;
        }
        let leaf = rect_at(&mut graph, 0.5);
        graph.add_child(parent, leaf).unwrap();

        let mut painter = RecordingPainter::default();
        let stats = traverse(&graph, &mut painter);
        assert_eq!(stats.nodes_visited, 5_002);
        assert_eq!(painter.calls, vec![(None, Vec2::new(5_000.5, 0.0))]);
    }
}
