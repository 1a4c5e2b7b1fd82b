//! Sequence playback state machine
//!
//! An `Animation` is a cursor over one [`Sequence`]. It advances by whole cell
//! durations measured against a monotonic clock, so the cell shown at time
//! `t` depends only on when playback started, not on how often `update` ran.
//!
//! ```text
//! Stopped --play--> Playing --pause--> Paused --resume--> Playing
//!    ^                 |                                     |
//!    +------stop-------+---(non-looping, last cell)--> Complete
//! ```

use std::sync::Arc;

use super::sequence::Sequence;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Cursor parked at the sequence start
    #[default]
    Stopped,
    /// Advancing with the clock
    Playing,
    /// Frozen; clock time spent here is not counted
    Paused,
    /// Non-looping sequence reached its last cell
    Complete,
}

/// Notifications produced by playback, drained by the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Stopped,
    Paused,
    Resumed,
    /// The cursor moved to a new cell
    CellChanged { cell: usize },
    /// A looping sequence wrapped `count` times during one update
    Looped { count: u64 },
    /// A non-looping sequence finished; fires once per completion
    Completed,
}

/// Runtime playback cursor bound to one sequence
#[derive(Debug, Clone)]
pub struct Animation {
    sequence: Arc<Sequence>,
    /// Index into `sequence.cells`
    position: usize,
    state: PlaybackState,
    /// Live per-cell duration; read on every update
    speed: f64,
    looping: bool,
    reverse: bool,
    /// Clock time at which the next advance is due
    next_tick: f64,
    /// Clock time at which playback was paused
    paused_at: f64,
    outbox: Vec<PlaybackEvent>,
}

impl Animation {
    /// Create a stopped animation over `sequence`
    #[must_use]
    pub fn new(sequence: Arc<Sequence>) -> Self {
        Self {
            speed: sequence.speed,
            looping: sequence.looping,
            sequence,
            position: 0,
            state: PlaybackState::Stopped,
            reverse: false,
            next_tick: 0.0,
            paused_at: 0.0,
            outbox: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Play from the first cell
    pub fn play(&mut self, now: f64) {
        self.play_from(now, 0);
    }

    /// Play from a sequence position (clamped to the last one)
    pub fn play_from(&mut self, now: f64, position: usize) {
        self.position = position.min(self.last_position());
        self.state = PlaybackState::Playing;
        self.next_tick = now + self.speed;
        self.outbox.push(PlaybackEvent::Started);
    }

    /// Freeze the cursor. Only meaningful while playing.
    pub fn pause(&mut self, now: f64) {
        if self.state != PlaybackState::Playing {
            log::debug!("pause ignored: '{}' is {:?}", self.sequence.name, self.state);
            return;
        }
        self.state = PlaybackState::Paused;
        self.paused_at = now;
        self.outbox.push(PlaybackEvent::Paused);
    }

    /// Continue after `pause`. The paused interval is excluded from playback time.
    pub fn resume(&mut self, now: f64) {
        if self.state != PlaybackState::Paused {
            log::warn!(
                "resume ignored: '{}' was not paused (state {:?})",
                self.sequence.name,
                self.state
            );
            return;
        }
        self.next_tick += (now - self.paused_at).max(0.0);
        self.state = PlaybackState::Playing;
        self.outbox.push(PlaybackEvent::Resumed);
    }

    /// Stop and rewind to the sequence start
    pub fn stop(&mut self) {
        let was = self.state;
        self.state = PlaybackState::Stopped;
        self.position = 0;
        if was != PlaybackState::Stopped {
            self.outbox.push(PlaybackEvent::Stopped);
        }
    }

    /// Rebind to another sequence, keeping play/pause state unless `restart`.
    ///
    /// The cursor moves to the new sequence's start and the live speed and
    /// loop flag are taken from it. A completed animation becomes stopped.
    pub fn switch_to(&mut self, sequence: Arc<Sequence>, now: f64, restart: bool) {
        let prior = self.state;
        self.speed = sequence.speed;
        self.looping = sequence.looping;
        self.sequence = sequence;
        self.position = 0;

        if restart {
            self.play(now);
            return;
        }

        match prior {
            PlaybackState::Playing => self.next_tick = now + self.speed,
            PlaybackState::Paused => {
                self.paused_at = now;
                self.next_tick = now + self.speed;
            }
            PlaybackState::Complete => self.state = PlaybackState::Stopped,
            PlaybackState::Stopped => {}
        }
        self.outbox.push(PlaybackEvent::CellChanged {
            cell: self.current_cell(),
        });
    }

    // -------------------------------------------------------------------------
    // Per-frame update
    // -------------------------------------------------------------------------

    /// Advance the cursor by every cell duration that elapsed up to `now`.
    pub fn update(&mut self, now: f64) {
        if self.state != PlaybackState::Playing || self.sequence.is_empty() {
            return;
        }

        if now >= self.next_tick {
            if self.speed > 0.0 {
                let behind = now - self.next_tick;
                let due = (behind / self.speed).floor() + 1.0;
                self.next_tick += due * self.speed;
                self.advance_by(due);
            } else {
                // No usable duration: at most one cell per update
                self.next_tick = now;
                self.advance(1, 0);
            }
        }

        if !self.looping && self.position == self.terminal_position() {
            self.state = PlaybackState::Complete;
            self.outbox.push(PlaybackEvent::Completed);
        }
    }

    /// Advance by a step count that may exceed any integer range.
    ///
    /// Looping playback keeps only the phase within the sequence and counts
    /// the whole laps; one-shot playback cannot move past the end anyway.
    fn advance_by(&mut self, due: f64) {
        let len = self.sequence.len() as f64;
        if self.looping {
            let laps = (due / len).floor();
            self.advance((due % len) as u64, laps as u64);
        } else {
            self.advance(due.min(len) as u64, 0);
        }
    }

    /// Move `steps` positions plus `laps` whole turns of a looping sequence
    fn advance(&mut self, steps: u64, laps: u64) {
        let len = self.sequence.len() as u64;
        let pos = self.position as u64;
        let before = self.position;

        if self.looping {
            let steps = steps % len;
            let (new_pos, wraps) = if self.reverse {
                let new_pos = (pos + len - steps) % len;
                (new_pos, u64::from(steps > pos))
            } else {
                ((pos + steps) % len, (pos + steps) / len)
            };
            self.position = new_pos as usize;
            let wraps = wraps.saturating_add(laps);
            if wraps > 0 {
                self.outbox.push(PlaybackEvent::Looped { count: wraps });
            }
        } else if self.reverse {
            self.position = pos.saturating_sub(steps) as usize;
        } else {
            self.position = pos.saturating_add(steps).min(len - 1) as usize;
        }

        if self.position != before {
            self.outbox.push(PlaybackEvent::CellChanged {
                cell: self.current_cell(),
            });
        }
    }

    // -------------------------------------------------------------------------
    // Manual stepping
    // -------------------------------------------------------------------------

    /// Step one position forward, wrapping at the end
    pub fn next_frame(&mut self) {
        let len = self.sequence.len().max(1);
        self.set_position((self.position + 1) % len);
    }

    /// Step one position back, wrapping at the start
    pub fn prev_frame(&mut self) {
        let len = self.sequence.len().max(1);
        self.set_position((self.position + len - 1) % len);
    }

    /// Jump to a sequence position (clamped)
    pub fn set_position(&mut self, position: usize) {
        let position = position.min(self.last_position());
        if position != self.position {
            self.position = position;
            self.outbox.push(PlaybackEvent::CellChanged {
                cell: self.current_cell(),
            });
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Sequence name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.sequence.name
    }

    #[must_use]
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing)
    }

    /// Position within the sequence
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Atlas cell index at the cursor
    #[must_use]
    pub fn current_cell(&self) -> usize {
        self.sequence.cell_at(self.position).unwrap_or(0)
    }

    /// Per-cell duration in seconds
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the per-cell duration. The current cell keeps the time it has
    /// already been shown and is due `speed` after it started.
    pub fn set_speed(&mut self, speed: f64) {
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            // Keep the time already spent in the current cell
            let started = self.next_tick - self.speed;
            self.next_tick = started + speed;
        }
        self.speed = speed;
    }

    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    #[must_use]
    pub const fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    /// Take the notifications produced since the last drain
    pub fn drain_events(&mut self) -> impl Iterator<Item = PlaybackEvent> + '_ {
        self.outbox.drain(..)
    }

    fn last_position(&self) -> usize {
        self.sequence.len().saturating_sub(1)
    }

    fn terminal_position(&self) -> usize {
        if self.reverse { 0 } else { self.last_position() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: f64 = 0.25;

    fn anim(cells: Vec<usize>, looping: bool) -> Animation {
        Animation::new(Arc::new(Sequence::new("test", cells, D, looping)))
    }

    fn completions(a: &mut Animation) -> usize {
        a.drain_events()
            .filter(|e| *e == PlaybackEvent::Completed)
            .count()
    }

    #[test]
    fn test_non_looping_index_and_single_completion() {
        let mut a = anim(vec![0, 1, 2], false);
        a.play(0.0);

        let mut total_completions = 0;
        let mut completed_at = None;
        for step in 0..=20 {
            let t = step as f64 * 0.125;
            a.update(t);
            let expected = ((t / D).floor() as usize).min(2);
            assert_eq!(a.current_cell(), expected, "t = {t}");

            let n = completions(&mut a);
            if n > 0 && completed_at.is_none() {
                completed_at = Some(t);
            }
            total_completions += n;
        }

        assert_eq!(total_completions, 1);
        assert_eq!(completed_at, Some(2.0 * D));
        assert_eq!(a.state(), PlaybackState::Complete);
    }

    #[test]
    fn test_looping_index_never_completes() {
        let mut a = anim(vec![0, 1, 2, 3], true);
        a.play(0.0);

        for step in 0..100 {
            let t = step as f64 * 0.1;
            a.update(t);
            assert_eq!(a.current_cell(), (t / D).floor() as usize % 4, "t = {t}");
            assert_ne!(a.state(), PlaybackState::Complete);
        }
        assert_eq!(completions(&mut a), 0);
    }

    #[test]
    fn test_sparse_updates_catch_up() {
        let mut a = anim(vec![0, 1, 2, 3, 4], true);
        a.play(0.0);

        a.update(7.0 * D + 0.01);
        assert_eq!(a.current_cell(), 2);
        assert!(
            a.drain_events()
                .any(|e| e == PlaybackEvent::Looped { count: 1 })
        );
    }

    #[test]
    fn test_pause_resume_excludes_paused_time() {
        let mut reference = anim(vec![0, 1, 2, 3, 4, 5], true);
        let mut paused = anim(vec![0, 1, 2, 3, 4, 5], true);
        reference.play(0.0);
        paused.play(0.0);

        paused.update(0.3);
        paused.pause(0.3);
        paused.update(1.0); // frozen
        assert_eq!(paused.current_cell(), 1);
        paused.resume(1.3); // paused for 1.0s

        for step in 0..10 {
            let t = 0.3 + step as f64 * 0.2;
            reference.update(t);
            paused.update(t + 1.0);
            assert_eq!(paused.current_cell(), reference.current_cell());
        }
    }

    #[test]
    fn test_resume_without_play_is_ignored() {
        let mut a = anim(vec![0, 1], true);
        a.resume(1.0);

        assert_eq!(a.state(), PlaybackState::Stopped);
        assert_eq!(a.drain_events().count(), 0);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut a = anim(vec![4, 5, 6], true);
        a.play(0.0);
        a.update(0.6);
        assert_eq!(a.current_cell(), 6);

        a.stop();
        assert_eq!(a.state(), PlaybackState::Stopped);
        assert_eq!(a.current_cell(), 4);

        // Stopped animations do not advance
        a.update(10.0);
        assert_eq!(a.current_cell(), 4);
    }

    #[test]
    fn test_reverse_looping_wraps_to_last() {
        let mut a = anim(vec![0, 1, 2], true);
        a.set_reverse(true);
        a.play(0.0);

        a.update(D);
        assert_eq!(a.current_cell(), 2);
        a.update(2.0 * D);
        assert_eq!(a.current_cell(), 1);
    }

    #[test]
    fn test_reverse_non_looping_completes_at_start() {
        let mut a = anim(vec![0, 1, 2], false);
        a.set_reverse(true);
        a.play_from(0.0, 2);

        a.update(D);
        assert_eq!(a.state(), PlaybackState::Playing);
        a.update(5.0);
        assert_eq!(a.current_cell(), 0);
        assert_eq!(a.state(), PlaybackState::Complete);
        assert_eq!(completions(&mut a), 1);
    }

    #[test]
    fn test_live_speed_change() {
        let mut a = anim(vec![0, 1, 2, 3, 4, 5, 6, 7], true);
        a.play(0.0);
        a.update(0.5);
        assert_eq!(a.current_cell(), 2);

        // Halve the duration: the next cell is due 0.125s after it started
        a.set_speed(0.125);
        a.update(0.625);
        assert_eq!(a.current_cell(), 3);
        a.update(0.75);
        assert_eq!(a.current_cell(), 4);
    }

    #[test]
    fn test_speed_change_while_paused_applies_to_current_cell() {
        let mut live = anim(vec![0, 1, 2, 3, 4, 5, 6, 7], true);
        live.set_speed(1.0);
        live.play(0.0);
        live.update(0.5);
        live.set_speed(0.25);
        live.update(0.5);
        assert_eq!(live.current_cell(), 2);

        let mut paused = anim(vec![0, 1, 2, 3, 4, 5, 6, 7], true);
        paused.set_speed(1.0);
        paused.play(0.0);
        paused.update(0.5);
        paused.pause(0.5);
        paused.set_speed(0.25);
        paused.resume(1.5);
        // One second spent paused, otherwise the same timeline
        paused.update(1.5);
        assert_eq!(paused.current_cell(), 2);
        assert_eq!(paused.speed(), 0.25);
    }

    #[test]
    fn test_tiny_speed_does_not_overflow() {
        let seq = Arc::new(Sequence::new("blur", vec![0, 1, 2], 1e-30, true));
        let mut a = Animation::new(seq);
        a.play(0.0);
        a.update(1.0);
        a.update(2.0);

        assert_eq!(a.state(), PlaybackState::Playing);
        assert!(a.position() < 3);
        assert!(a.drain_events().any(|e| matches!(e, PlaybackEvent::Looped { .. })));

        let seq = Arc::new(Sequence::new("once", vec![0, 1, 2], 1e-30, false));
        let mut once = Animation::new(seq);
        once.play(0.0);
        once.update(1.0);
        assert_eq!(once.current_cell(), 2);
        assert_eq!(once.state(), PlaybackState::Complete);
        assert_eq!(completions(&mut once), 1);
    }

    #[test]
    fn test_zero_speed_steps_once_per_update() {
        let mut a = anim(vec![0, 1, 2, 3], true);
        a.set_speed(0.0);
        a.play(0.0);

        a.update(0.0);
        assert_eq!(a.current_cell(), 1);
        a.update(0.0);
        assert_eq!(a.current_cell(), 2);
        a.update(100.0);
        assert_eq!(a.current_cell(), 3);
    }

    #[test]
    fn test_switch_preserves_state_unless_restart() {
        let mut a = anim(vec![0, 1, 2], true);
        a.play(0.0);
        a.update(0.3);

        let run = Arc::new(Sequence::new("run", vec![7, 8], 0.5, true));
        a.switch_to(Arc::clone(&run), 0.3, false);
        assert_eq!(a.state(), PlaybackState::Playing);
        assert_eq!(a.current_cell(), 7);
        assert_eq!(a.speed(), 0.5);
        a.update(0.8);
        assert_eq!(a.current_cell(), 8);

        a.pause(1.0);
        let idle = Arc::new(Sequence::new("idle", vec![3], 0.1, false));
        a.switch_to(Arc::clone(&idle), 1.0, false);
        assert_eq!(a.state(), PlaybackState::Paused);

        a.switch_to(run, 2.0, true);
        assert_eq!(a.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_single_cell_non_looping_completes_immediately() {
        let mut a = anim(vec![9], false);
        a.play(0.0);
        a.update(0.0);

        assert_eq!(a.state(), PlaybackState::Complete);
        assert_eq!(completions(&mut a), 1);
        a.update(1.0);
        assert_eq!(completions(&mut a), 0);
    }

    #[test]
    fn test_manual_stepping_wraps() {
        let mut a = anim(vec![0, 1, 2], false);
        a.prev_frame();
        assert_eq!(a.current_cell(), 2);
        a.next_frame();
        assert_eq!(a.current_cell(), 0);
    }
}
