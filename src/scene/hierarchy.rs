//! Parent/child components
//!
//! `Parent` is a non-owning back-reference into the node arena; `Children`
//! is the ordered member list of a group. The scene graph keeps the two in
//! sync, so neither is exposed for direct mutation outside the crate.

use hecs::Entity;
use smallvec::SmallVec;

/// Non-owning reference to the group that contains this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub(crate) Entity);

impl Parent {
    /// Get the parent entity
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.0
    }
}

/// Ordered members of a group. Index 0 is drawn first (furthest back).
#[derive(Debug, Clone, Default)]
pub struct Children(pub(crate) SmallVec<[Entity; 8]>);

impl Children {
    /// Create an empty children list
    #[must_use]
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Append a child, moving it to the end if already present
    pub(crate) fn push(&mut self, child: Entity) {
        self.remove(child);
        self.0.push(child);
    }

    /// Insert a child at `index` (clamped), moving it if already present
    pub(crate) fn insert(&mut self, index: usize, child: Entity) {
        self.remove(child);
        let index = index.min(self.0.len());
        self.0.insert(index, child);
    }

    /// Remove a child, returning whether it was present
    pub(crate) fn remove(&mut self, child: Entity) -> bool {
        if let Some(pos) = self.position(child) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }

    /// Z position of a child
    #[must_use]
    pub fn position(&self, child: Entity) -> Option<usize> {
        self.0.iter().position(|&e| e == child)
    }

    #[must_use]
    pub fn contains(&self, child: Entity) -> bool {
        self.0.contains(&child)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate in back-to-front order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }

    /// Members as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[Entity] {
        &self.0
    }
}
