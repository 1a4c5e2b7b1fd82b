//! Scene graph
//!
//! Nodes live in a `hecs::World` arena. Groups own an ordered `Children`
//! list, every attached node carries a `Parent` back-reference, and the graph
//! keeps both sides consistent: a node has at most one parent, and the
//! parent relation never forms a cycle.
//!
//! Only nodes reachable from the root are updated and rendered. Detached
//! nodes stay alive in the arena until destroyed.

use glam::{Affine2, Vec2};
use hecs::{Entity, World};

use super::events::{EventQueue, SceneEvent};
use super::hierarchy::{Children, Parent};
use super::node::{ColorRect, Name, Node, NodeKind, Sprite};
use super::transform::{GlobalTransform2D, Transform2D};
use crate::animation::{Animation, AnimationManager, Atlas};
use crate::assets::AtlasId;
use crate::render::Color;

/// Errors returned by structural scene operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneError {
    /// The entity is not a node of this graph
    UnknownEntity(Entity),
    /// Only groups can hold children
    NotAGroup(Entity),
    /// `child` is `parent` or one of its ancestors
    Cycle { parent: Entity, child: Entity },
    /// The root cannot be destroyed or attached elsewhere
    RootNode,
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(e) => write!(f, "Unknown scene node {e:?}"),
            Self::NotAGroup(e) => write!(f, "Node {e:?} is not a group"),
            Self::Cycle { parent, child } => {
                write!(f, "Adding {child:?} under {parent:?} would create a cycle")
            }
            Self::RootNode => write!(f, "Operation not allowed on the root node"),
        }
    }
}

impl std::error::Error for SceneError {}

/// Hierarchical scene of groups and drawable leaves
pub struct SceneGraph {
    world: World,
    root: Entity,
    events: EventQueue<SceneEvent>,
}

impl SceneGraph {
    /// Create a graph holding just the root group
    #[must_use]
    pub fn new() -> Self {
        let mut world = World::new();
        let root = world.spawn((
            Node::default(),
            NodeKind::Group,
            Transform2D::default(),
            Children::new(),
            Name::new("root"),
        ));
        Self {
            world,
            root,
            events: EventQueue::new(),
        }
    }

    /// The root group
    #[must_use]
    pub const fn root(&self) -> Entity {
        self.root
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    /// Spawn a detached node
    pub fn spawn(&mut self, kind: NodeKind, transform: Transform2D) -> Entity {
        let entity = match kind {
            NodeKind::Group => {
                self.world
                    .spawn((Node::default(), kind, transform, Children::new()))
            }
            NodeKind::Sprite(_) | NodeKind::Rect(_) => {
                self.world.spawn((Node::default(), kind, transform))
            }
        };
        log::trace!("Spawned {kind:?} as {entity:?}");
        entity
    }

    /// Spawn a detached, empty group
    pub fn spawn_group(&mut self, transform: Transform2D) -> Entity {
        self.spawn(NodeKind::Group, transform)
    }

    /// Spawn a detached sprite showing one atlas cell
    pub fn spawn_sprite(&mut self, atlas: AtlasId, cell: usize, transform: Transform2D) -> Entity {
        self.spawn(NodeKind::Sprite(Sprite::new(atlas, cell)), transform)
    }

    /// Spawn a detached sprite with one animation per sequence of `atlas`
    pub fn spawn_animated_sprite(
        &mut self,
        id: AtlasId,
        atlas: &Atlas,
        transform: Transform2D,
    ) -> Entity {
        let animations = AnimationManager::from_atlas(atlas);
        let cell = animations.current_cell().unwrap_or(0);
        let entity = self.spawn_sprite(id, cell, transform);
        // The entity was just spawned, so the insert cannot miss
        let _ = self.world.insert_one(entity, animations);
        entity
    }

    /// Spawn a detached solid rectangle
    pub fn spawn_rect(&mut self, size: Vec2, color: Color, transform: Transform2D) -> Entity {
        self.spawn(NodeKind::Rect(ColorRect::new(size, color)), transform)
    }

    /// Attach (or replace) the animation set of a sprite
    pub fn set_animations(
        &mut self,
        entity: Entity,
        animations: AnimationManager,
    ) -> Result<(), SceneError> {
        self.check_node(entity)?;
        self.world
            .insert_one(entity, animations)
            .map_err(|_| SceneError::UnknownEntity(entity))?;
        self.sync_animation(entity);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.world.get::<&Node>(entity).is_ok()
    }

    /// Number of live nodes, including the root and detached nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Append `child` to `parent`, detaching it from any previous parent.
    ///
    /// Re-adding a member moves it to the end (drawn last).
    ///
    /// # Errors
    ///
    /// Fails if either node is unknown, `parent` is not a group, `child` is
    /// the root, or `parent` lies inside `child`'s subtree.
    pub fn add_child(&mut self, parent: Entity, child: Entity) -> Result<(), SceneError> {
        self.attach(parent, child, None)
    }

    /// Insert `child` at z position `index` (clamped) within `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`add_child`](Self::add_child).
    pub fn add_child_at(
        &mut self,
        parent: Entity,
        child: Entity,
        index: usize,
    ) -> Result<(), SceneError> {
        self.attach(parent, child, Some(index))
    }

    /// Move `child` under `new_parent`.
    ///
    /// # Errors
    ///
    /// Same as [`add_child`](Self::add_child).
    pub fn reparent(&mut self, child: Entity, new_parent: Entity) -> Result<(), SceneError> {
        self.attach(new_parent, child, None)
    }

    fn attach(
        &mut self,
        parent: Entity,
        child: Entity,
        index: Option<usize>,
    ) -> Result<(), SceneError> {
        self.check_node(parent)?;
        self.check_node(child)?;
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        if !self.is_group(parent) {
            return Err(SceneError::NotAGroup(parent));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        if let Some(old) = self.parent_of(child)
            && old != parent
        {
            self.unlink(old, child);
        }

        {
            let mut children = self
                .world
                .get::<&mut Children>(parent)
                .map_err(|_| SceneError::NotAGroup(parent))?;
            match index {
                Some(index) => children.insert(index, child),
                None => children.push(child),
            }
        }
        self.world
            .insert_one(child, Parent(parent))
            .map_err(|_| SceneError::UnknownEntity(child))?;
        self.invalidate_subtree(child);

        self.events.push(SceneEvent::ChildAdded { parent, child });
        log::trace!("Attached {child:?} to {parent:?}");
        Ok(())
    }

    /// Remove `child` from `parent`. Returns false if it was not a member.
    ///
    /// The child stays alive, detached, and is no longer rendered.
    pub fn remove_child(&mut self, parent: Entity, child: Entity) -> bool {
        let removed = self
            .world
            .get::<&mut Children>(parent)
            .map(|mut children| children.remove(child))
            .unwrap_or(false);
        if !removed {
            return false;
        }

        let _ = self.world.remove_one::<Parent>(child);
        self.invalidate_subtree(child);
        self.events.push(SceneEvent::ChildRemoved { parent, child });
        true
    }

    /// Detach a node from its parent, if it has one
    pub fn detach(&mut self, child: Entity) -> bool {
        match self.parent_of(child) {
            Some(parent) => self.remove_child(parent, child),
            None => false,
        }
    }

    fn unlink(&mut self, parent: Entity, child: Entity) {
        if self.remove_child(parent, child) {
            log::trace!("Detached {child:?} from {parent:?}");
        }
    }

    /// Destroy a node.
    ///
    /// With `cascade` the whole subtree is despawned. Otherwise direct
    /// children are detached and stay alive.
    ///
    /// # Errors
    ///
    /// Fails for the root or an unknown node.
    pub fn destroy(&mut self, entity: Entity, cascade: bool) -> Result<(), SceneError> {
        if entity == self.root {
            return Err(SceneError::RootNode);
        }
        self.check_node(entity)?;
        self.detach(entity);

        if cascade {
            let mut doomed = vec![entity];
            doomed.extend(self.descendants(entity));
            for node in doomed {
                self.despawn(node);
            }
        } else {
            for child in self.children(entity) {
                let _ = self.world.remove_one::<Parent>(child);
                self.invalidate_subtree(child);
                self.events.push(SceneEvent::ChildRemoved {
                    parent: entity,
                    child,
                });
            }
            self.despawn(entity);
        }
        Ok(())
    }

    fn despawn(&mut self, entity: Entity) {
        if self.world.despawn(entity).is_ok() {
            self.events.push(SceneEvent::NodeDestroyed { entity });
        }
    }

    /// Parent of a node, if attached
    #[must_use]
    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<&Parent>(entity).ok().map(|p| p.entity())
    }

    /// Members of a group in z order (empty for leaves)
    #[must_use]
    pub fn children(&self, entity: Entity) -> Vec<Entity> {
        self.world
            .get::<&Children>(entity)
            .map(|children| children.as_slice().to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_child(&self, parent: Entity, child: Entity) -> bool {
        self.world
            .get::<&Children>(parent)
            .is_ok_and(|children| children.contains(child))
    }

    #[must_use]
    pub fn child_count(&self, parent: Entity) -> usize {
        self.world
            .get::<&Children>(parent)
            .map_or(0, |children| children.len())
    }

    /// Z position of `child` within its parent
    #[must_use]
    pub fn index_of(&self, child: Entity) -> Option<usize> {
        let parent = self.parent_of(child)?;
        self.world.get::<&Children>(parent).ok()?.position(child)
    }

    /// All nodes below `entity` in pre-order
    #[must_use]
    pub fn descendants(&self, entity: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack: Vec<Entity> = self.children(entity).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).into_iter().rev());
        }
        out
    }

    /// Whether `node` is reachable from the root
    #[must_use]
    pub fn is_attached(&self, node: Entity) -> bool {
        self.is_ancestor_or_self(self.root, node)
    }

    fn is_ancestor_or_self(&self, ancestor: Entity, node: Entity) -> bool {
        let mut current = Some(node);
        while let Some(e) = current {
            if e == ancestor {
                return true;
            }
            current = self.parent_of(e);
        }
        false
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// Local transform of a node. Changes go through
    /// [`update_transform`](Self::update_transform) so cached world matrices
    /// below the node are refreshed.
    pub fn transform(&self, entity: Entity) -> Option<hecs::Ref<'_, Transform2D>> {
        self.world.get::<&Transform2D>(entity).ok()
    }

    /// Mutate a node's transform and invalidate the world matrices below it.
    /// Returns false for an unknown node.
    pub fn update_transform(&mut self, entity: Entity, f: impl FnOnce(&mut Transform2D)) -> bool {
        {
            let Ok(mut transform) = self.world.get::<&mut Transform2D>(entity) else {
                return false;
            };
            f(&mut transform);
        }
        self.invalidate_subtree(entity);
        true
    }

    /// Parent-composed matrix of a node, cached until invalidated
    #[must_use]
    pub fn world_matrix(&self, entity: Entity) -> Option<Affine2> {
        // Walk up to the nearest cached ancestor, then compose back down
        let mut stale = Vec::new();
        let mut base = Affine2::IDENTITY;
        let mut current = Some(entity);
        while let Some(node) = current {
            if let Some(world) = self.world.get::<&Transform2D>(node).ok()?.cached_world() {
                base = world;
                break;
            }
            stale.push(node);
            current = self.parent_of(node);
        }

        for node in stale.into_iter().rev() {
            let mut transform = self.world.get::<&mut Transform2D>(node).ok()?;
            base = transform.compose(base);
            transform.store_world(base);
        }
        Some(base)
    }

    /// World-space position of a node's origin
    #[must_use]
    pub fn world_position(&self, entity: Entity) -> Option<Vec2> {
        self.world_matrix(entity).map(|m| m.translation)
    }

    /// Map a point from a node's local space to world space
    #[must_use]
    pub fn transform_point(&self, entity: Entity, point: Vec2) -> Option<Vec2> {
        self.world_matrix(entity)
            .map(|m| m.transform_point2(point))
    }

    #[must_use]
    pub fn global_transform(&self, entity: Entity) -> Option<GlobalTransform2D> {
        self.world_matrix(entity).map(GlobalTransform2D::from_matrix)
    }

    fn invalidate_subtree(&mut self, entity: Entity) {
        let mut stack = vec![entity];
        while let Some(node) = stack.pop() {
            if let Ok(mut transform) = self.world.get::<&mut Transform2D>(node) {
                transform.mark_world_dirty();
            }
            if let Ok(children) = self.world.get::<&Children>(node) {
                stack.extend(children.iter().copied());
            }
        }
    }

    // =========================================================================
    // Flags and payloads
    // =========================================================================

    /// Flags of a node
    #[must_use]
    pub fn node(&self, entity: Entity) -> Option<Node> {
        self.world.get::<&Node>(entity).ok().map(|n| *n)
    }

    #[must_use]
    pub fn kind(&self, entity: Entity) -> Option<NodeKind> {
        self.world.get::<&NodeKind>(entity).ok().map(|k| *k)
    }

    #[must_use]
    pub fn is_group(&self, entity: Entity) -> bool {
        self.kind(entity).is_some_and(|k| k.is_group())
    }

    /// Sprite payload, if the node is a sprite
    #[must_use]
    pub fn sprite(&self, entity: Entity) -> Option<Sprite> {
        match self.kind(entity)? {
            NodeKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    /// Set the cell a sprite shows. Returns false for non-sprites.
    pub fn set_cell(&mut self, entity: Entity, cell: usize) -> bool {
        let Ok(mut kind) = self.world.get::<&mut NodeKind>(entity) else {
            return false;
        };
        if let NodeKind::Sprite(sprite) = &mut *kind {
            sprite.cell = cell;
            true
        } else {
            false
        }
    }

    pub fn set_active(&mut self, entity: Entity, active: bool) -> bool {
        self.with_node(entity, |n| n.active = active)
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) -> bool {
        self.with_node(entity, |n| n.visible = visible)
    }

    pub fn set_will_render(&mut self, entity: Entity, will_render: bool) -> bool {
        self.with_node(entity, |n| n.will_render = will_render)
    }

    /// Set opacity, clamped to `[0, 1]`
    pub fn set_alpha(&mut self, entity: Entity, alpha: f32) -> bool {
        self.with_node(entity, |n| n.alpha = alpha.clamp(0.0, 1.0))
    }

    fn with_node(&mut self, entity: Entity, f: impl FnOnce(&mut Node)) -> bool {
        match self.world.get::<&mut Node>(entity) {
            Ok(mut node) => {
                f(&mut node);
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_name(&mut self, entity: Entity, name: impl Into<String>) -> bool {
        self.contains(entity) && self.world.insert_one(entity, Name::new(name)).is_ok()
    }

    #[must_use]
    pub fn name(&self, entity: Entity) -> Option<String> {
        self.world
            .get::<&Name>(entity)
            .ok()
            .map(|n| n.as_str().to_string())
    }

    /// First node carrying `name`
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.world
            .query::<&Name>()
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(e, _)| e)
    }

    // =========================================================================
    // Animation
    // =========================================================================

    /// Animation set of a sprite
    pub fn animations(&self, entity: Entity) -> Option<hecs::Ref<'_, AnimationManager>> {
        self.world.get::<&AnimationManager>(entity).ok()
    }

    /// Current animation of a sprite
    #[must_use]
    pub fn current_animation(&self, entity: Entity) -> Option<Animation> {
        self.animations(entity)?.current().cloned()
    }

    /// Play a named animation from its start
    pub fn play_animation(&mut self, entity: Entity, name: &str, now: f64) -> bool {
        self.with_animations(entity, |m| m.play(name, now))
    }

    /// Switch to a named animation, keeping play/pause state unless `restart`
    pub fn switch_animation(&mut self, entity: Entity, name: &str, now: f64, restart: bool) -> bool {
        self.with_animations(entity, |m| m.switch_to(name, now, restart))
    }

    pub fn pause_animation(&mut self, entity: Entity, now: f64) -> bool {
        self.with_animations(entity, |m| {
            m.pause(now);
            true
        })
    }

    pub fn resume_animation(&mut self, entity: Entity, now: f64) -> bool {
        self.with_animations(entity, |m| {
            m.resume(now);
            true
        })
    }

    pub fn stop_animation(&mut self, entity: Entity) -> bool {
        self.with_animations(entity, |m| {
            m.stop();
            true
        })
    }

    fn with_animations(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut AnimationManager) -> bool,
    ) -> bool {
        let applied = match self.world.get::<&mut AnimationManager>(entity) {
            Ok(mut manager) => f(&mut manager),
            Err(_) => {
                log::warn!("Node {entity:?} has no animations");
                return false;
            }
        };
        self.sync_animation(entity);
        applied
    }

    /// Copy the current animation cell onto the sprite and forward
    /// playback notifications to the event queue
    fn sync_animation(&mut self, entity: Entity) {
        let Ok((kind, manager)) = self
            .world
            .query_one_mut::<(&mut NodeKind, &mut AnimationManager)>(entity)
        else {
            return;
        };

        if let (NodeKind::Sprite(sprite), Some(cell)) = (kind, manager.current_cell()) {
            sprite.cell = cell;
        }
        for (name, event) in manager.drain_events() {
            if let Some(event) = SceneEvent::from_playback(entity, name, event) {
                self.events.push(event);
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Advance every active node reachable from the root.
    ///
    /// Inactive nodes are skipped together with their subtrees.
    pub fn update(&mut self, now: f64) {
        for entity in self.active_nodes() {
            {
                let Ok(mut manager) = self.world.get::<&mut AnimationManager>(entity) else {
                    continue;
                };
                manager.update(now);
            }
            self.sync_animation(entity);
        }
    }

    /// Active nodes reachable from the root, in pre-order
    #[must_use]
    pub fn active_nodes(&self) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if !self.node(node).is_some_and(|n| n.active) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).into_iter().rev());
        }
        out
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[must_use]
    pub fn events(&self) -> &EventQueue<SceneEvent> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventQueue<SceneEvent> {
        &mut self.events
    }

    fn check_node(&self, entity: Entity) -> Result<(), SceneError> {
        if self.contains(entity) {
            Ok(())
        } else {
            Err(SceneError::UnknownEntity(entity))
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
