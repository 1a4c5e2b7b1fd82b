//! Per-sprite animation set
//!
//! Holds the named animations available to one sprite and which of them is
//! driving its cell.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::atlas::Atlas;
use super::player::{Animation, PlaybackEvent, PlaybackState};
use super::sequence::Sequence;

/// Named animations of a sprite plus the current one
#[derive(Debug, Clone, Default)]
pub struct AnimationManager {
    animations: FxHashMap<String, Animation>,
    current: Option<String>,
}

impl AnimationManager {
    /// Create an empty manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager holding one animation per sequence of `atlas`
    #[must_use]
    pub fn from_atlas(atlas: &Atlas) -> Self {
        let mut manager = Self::new();
        manager.add_from_atlas(atlas);
        manager
    }

    /// Add an animation for `sequence`, replacing any with the same name.
    /// The first animation added becomes current.
    pub fn add(&mut self, sequence: Arc<Sequence>) {
        let name = sequence.name.clone();
        if self.current.is_none() {
            self.current = Some(name.clone());
        }
        self.animations.insert(name, Animation::new(sequence));
    }

    /// Add every sequence of `atlas`, in name order
    pub fn add_from_atlas(&mut self, atlas: &Atlas) {
        let mut sequences: Vec<_> = atlas.sequences().cloned().collect();
        sequences.sort_by(|a, b| a.name.cmp(&b.name));
        for sequence in sequences {
            self.add(sequence);
        }
    }

    /// Make `name` current and play it from the start.
    ///
    /// Returns `false` (and logs) if there is no such animation.
    pub fn play(&mut self, name: &str, now: f64) -> bool {
        if !self.select(name) {
            return false;
        }
        if let Some(anim) = self.current_mut() {
            anim.play(now);
        }
        true
    }

    /// Make `name` current, carrying over the play/pause state of the
    /// previous current animation unless `restart` is set.
    pub fn switch_to(&mut self, name: &str, now: f64, restart: bool) -> bool {
        let Some(target) = self.animations.get(name).map(|a| Arc::clone(a.sequence())) else {
            log::warn!("switch_to: unknown animation '{name}'");
            return false;
        };

        let previous = self.current.replace(name.to_string());
        let cursor = previous
            .filter(|prev| prev != name)
            .and_then(|prev| self.animations.remove(&prev).map(|anim| (prev, anim)));

        match cursor {
            Some((prev, mut anim)) => {
                // The running cursor moves over to the target; the previous
                // name gets a fresh stopped animation over its own sequence.
                let own = Arc::clone(anim.sequence());
                anim.switch_to(target, now, restart);
                self.animations.insert(prev, Animation::new(own));
                self.animations.insert(name.to_string(), anim);
            }
            None => {
                if let Some(anim) = self.animations.get_mut(name) {
                    anim.switch_to(target, now, restart);
                }
            }
        }
        true
    }

    /// Pause the current animation
    pub fn pause(&mut self, now: f64) {
        if let Some(anim) = self.current_mut() {
            anim.pause(now);
        }
    }

    /// Resume the current animation
    pub fn resume(&mut self, now: f64) {
        match self.current_mut() {
            Some(anim) => anim.resume(now),
            None => log::warn!("resume ignored: no current animation"),
        }
    }

    /// Stop the current animation
    pub fn stop(&mut self) {
        if let Some(anim) = self.current_mut() {
            anim.stop();
        }
    }

    /// Advance the current animation
    pub fn update(&mut self, now: f64) {
        if let Some(anim) = self.current_mut() {
            anim.update(now);
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Animation> {
        self.current.as_deref().and_then(|n| self.animations.get(n))
    }

    pub fn current_mut(&mut self) -> Option<&mut Animation> {
        let name = self.current.as_deref()?;
        self.animations.get_mut(name)
    }

    /// Cell shown by the current animation
    #[must_use]
    pub fn current_cell(&self) -> Option<usize> {
        self.current().map(Animation::current_cell)
    }

    /// State of the current animation (`Stopped` if there is none)
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.current().map_or(PlaybackState::Stopped, Animation::state)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Animation> {
        self.animations.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Animation> {
        self.animations.get_mut(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Drain notifications from every animation, tagged with its name
    pub fn drain_events(&mut self) -> Vec<(String, PlaybackEvent)> {
        let mut events = Vec::new();
        for (name, anim) in &mut self.animations {
            events.extend(anim.drain_events().map(|event| (name.clone(), event)));
        }
        events
    }

    fn select(&mut self, name: &str) -> bool {
        if !self.animations.contains_key(name) {
            log::warn!("unknown animation '{name}'");
            return false;
        }
        self.current = Some(name.to_string());
        true
    }
}
