//! Scene event queue
//!
//! A double-buffered queue: events written during frame N become readable
//! after the swap at the end of frame N, so what a consumer sees does not
//! depend on where in the frame it looks.
//!
//! # Example
//!
//! ```ignore
//! // Frame N: the graph pushes while updating
//! scene.update(now);
//!
//! // Frame boundary
//! scene.events_mut().swap();
//!
//! // Frame N+1: consumers read
//! for event in scene.events().iter() {
//!     if let SceneEvent::AnimationCompleted { entity, .. } = event {
//!         despawn_later(*entity);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use hecs::Entity;

use crate::animation::PlaybackEvent;

// ============================================================================
// Event Types
// ============================================================================

/// Things that happened in the scene graph
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SceneEvent {
    // -------------------------------------------------------------------------
    // Hierarchy
    // -------------------------------------------------------------------------
    ChildAdded {
        parent: Entity,
        child: Entity,
    },
    ChildRemoved {
        parent: Entity,
        child: Entity,
    },
    /// The node was despawned
    NodeDestroyed {
        entity: Entity,
    },

    // -------------------------------------------------------------------------
    // Animation
    // -------------------------------------------------------------------------
    AnimationStarted {
        entity: Entity,
        animation: String,
    },
    AnimationStopped {
        entity: Entity,
        animation: String,
    },
    AnimationPaused {
        entity: Entity,
        animation: String,
    },
    AnimationResumed {
        entity: Entity,
        animation: String,
    },
    /// A looping animation wrapped `count` times in one update
    AnimationLooped {
        entity: Entity,
        animation: String,
        count: u64,
    },
    /// A non-looping animation reached its terminal cell
    AnimationCompleted {
        entity: Entity,
        animation: String,
    },
}

impl SceneEvent {
    /// Scene event for a playback notification. Cell changes are not
    /// forwarded; the sprite's cell already reflects them.
    #[must_use]
    pub fn from_playback(entity: Entity, animation: String, event: PlaybackEvent) -> Option<Self> {
        let event = match event {
            PlaybackEvent::Started => Self::AnimationStarted { entity, animation },
            PlaybackEvent::Stopped => Self::AnimationStopped { entity, animation },
            PlaybackEvent::Paused => Self::AnimationPaused { entity, animation },
            PlaybackEvent::Resumed => Self::AnimationResumed { entity, animation },
            PlaybackEvent::Looped { count } => Self::AnimationLooped {
                entity,
                animation,
                count,
            },
            PlaybackEvent::Completed => Self::AnimationCompleted { entity, animation },
            PlaybackEvent::CellChanged { .. } => return None,
        };
        Some(event)
    }
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered event queue for frame-consistent event processing.
///
/// Events pushed during frame N are available for reading during frame N+1.
#[derive(Debug)]
pub struct EventQueue<E> {
    /// Events being written this frame
    pending: VecDeque<E>,
    /// Events from previous frame, ready for processing
    processing: VecDeque<E>,
}

impl<E> EventQueue<E> {
    const DEFAULT_CAPACITY: usize = 64;

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            processing: VecDeque::with_capacity(capacity),
        }
    }

    /// Push an event to be processed after the next `swap()`.
    #[inline]
    pub fn push(&mut self, event: E) {
        self.pending.push_back(event);
    }

    /// Make this frame's events readable and start a fresh pending buffer.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Iterate over events from the previous frame.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.processing.iter()
    }

    /// Take ownership of the events from the previous frame.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.processing.drain(..)
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    /// Number of events ready for processing.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Number of events waiting for the next swap.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Iterate over events written this frame, before the swap.
    pub fn pending(&self) -> impl Iterator<Item = &E> {
        self.pending.iter()
    }

    /// Clear both buffers.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
