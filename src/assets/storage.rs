//! Atlas storage
//!
//! Provides centralized storage for atlases with name-based lookup, plus the
//! dirty tracking the GPU backend uses to decide when to re-upload an image.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::animation::Atlas;

/// Stable id of an atlas in an [`AtlasStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtlasId(u32);

impl AtlasId {
    /// Raw index
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Centralized storage for all atlases
#[derive(Debug, Default)]
pub struct AtlasStore {
    /// Atlases indexed by id
    atlases: FxHashMap<AtlasId, Atlas>,
    /// Name to id mapping for deduplication
    name_to_id: FxHashMap<String, AtlasId>,
    /// Atlases whose image changed since the last upload
    dirty: FxHashSet<AtlasId>,
    next_id: u32,
}

impl AtlasStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an atlas and return its id
    pub fn add(&mut self, atlas: Atlas) -> AtlasId {
        let id = AtlasId(self.next_id);
        self.next_id += 1;
        log::debug!(
            "Atlas '{}' stored as {:?} ({}x{}, {} cells)",
            atlas.name(),
            id,
            atlas.width(),
            atlas.height(),
            atlas.cells().len()
        );
        self.atlases.insert(id, atlas);
        id
    }

    /// Add an atlas under its name, returning the existing id if an atlas
    /// with the same name is already stored
    pub fn add_named(&mut self, atlas: Atlas) -> AtlasId {
        if let Some(&id) = self.name_to_id.get(atlas.name())
            && self.atlases.contains_key(&id)
        {
            return id;
        }

        let name = atlas.name().to_string();
        let id = self.add(atlas);
        self.name_to_id.insert(name, id);
        id
    }

    #[must_use]
    pub fn get(&self, id: AtlasId) -> Option<&Atlas> {
        self.atlases.get(&id)
    }

    /// Get an atlas id by name
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<AtlasId> {
        self.name_to_id.get(name).copied()
    }

    /// Mutable access to an atlas image for live drawing. Marks it dirty.
    pub fn image_mut(&mut self, id: AtlasId) -> Option<&mut image::RgbaImage> {
        let atlas = self.atlases.get_mut(&id)?;
        self.dirty.insert(id);
        Some(atlas.image_mut())
    }

    /// Flag an atlas image as changed
    pub fn mark_dirty(&mut self, id: AtlasId) {
        if self.atlases.contains_key(&id) {
            self.dirty.insert(id);
        }
    }

    /// Clear and return the dirty flag
    pub fn take_dirty(&mut self, id: AtlasId) -> bool {
        self.dirty.remove(&id)
    }

    #[must_use]
    pub fn is_dirty(&self, id: AtlasId) -> bool {
        self.dirty.contains(&id)
    }

    /// Remove an atlas by id
    ///
    /// Returns the atlas if it was stored
    pub fn remove(&mut self, id: AtlasId) -> Option<Atlas> {
        let atlas = self.atlases.remove(&id)?;
        self.dirty.remove(&id);
        self.name_to_id.retain(|_, v| *v != id);
        Some(atlas)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }

    /// Iterate over all atlases
    pub fn iter(&self) -> impl Iterator<Item = (AtlasId, &Atlas)> {
        self.atlases.iter().map(|(&id, atlas)| (id, atlas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn atlas(name: &str) -> Atlas {
        Atlas::single_image(name, RgbaImage::new(8, 8)).unwrap()
    }

    #[test]
    fn test_add_and_get() {
        let mut store = AtlasStore::new();
        let a = store.add(atlas("a"));
        let b = store.add(atlas("a"));

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a).map(Atlas::name), Some("a"));
    }

    #[test]
    fn test_name_deduplication() {
        let mut store = AtlasStore::new();
        let first = store.add_named(atlas("hero"));
        let second = store.add_named(atlas("hero"));

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_name("hero"), Some(first));
        assert_eq!(store.get_by_name("villain"), None);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut store = AtlasStore::new();
        let id = store.add(atlas("canvas"));
        assert!(!store.is_dirty(id));

        if let Some(img) = store.image_mut(id) {
            img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        }
        assert!(store.is_dirty(id));
        assert!(store.take_dirty(id));
        assert!(!store.take_dirty(id));

        store.mark_dirty(id);
        assert!(store.is_dirty(id));
        assert!(store.remove(id).is_some());
        assert!(!store.is_dirty(id));
    }
}
