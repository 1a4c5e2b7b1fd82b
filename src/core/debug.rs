//! Frame statistics

use std::collections::VecDeque;
use std::time::Duration;

use crate::render::RenderStats;

/// Rolling frame timing plus the counters of the last render
#[derive(Debug)]
pub struct FrameStats {
    window: VecDeque<Duration>,
    capacity: usize,
    /// Sum of the durations in `window`
    window_total: Duration,
    total_frames: u64,
    last_render: RenderStats,
}

impl FrameStats {
    /// Create a tracker with a 120-frame window
    pub fn new() -> Self {
        Self::with_window(120)
    }

    /// Create a tracker averaging over `samples` frames
    pub fn with_window(samples: usize) -> Self {
        let capacity = samples.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            window_total: Duration::ZERO,
            total_frames: 0,
            last_render: RenderStats::default(),
        }
    }

    /// Record one frame
    pub fn record_frame(&mut self, delta: Duration, render: RenderStats) {
        self.total_frames += 1;
        self.last_render = render;

        if self.window.len() == self.capacity
            && let Some(oldest) = self.window.pop_front()
        {
            self.window_total = self.window_total.saturating_sub(oldest);
        }
        self.window.push_back(delta);
        self.window_total += delta;
    }

    /// Frames per second over the window; zero while no time has passed
    pub fn fps(&self) -> f32 {
        let secs = self.window_total.as_secs_f32();
        if secs > 0.0 {
            self.window.len() as f32 / secs
        } else {
            0.0
        }
    }

    /// Mean frame time over the window, in milliseconds
    pub fn avg_frame_time_ms(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window_total.as_secs_f32() * 1000.0 / self.window.len() as f32
    }

    /// Longest frame in the window, in milliseconds
    pub fn max_frame_time_ms(&self) -> f32 {
        self.window
            .iter()
            .max()
            .map_or(0.0, |d| d.as_secs_f32() * 1000.0)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn last_render(&self) -> RenderStats {
        self.last_render
    }

    /// One-line summary for logs
    pub fn format_stats(&self) -> String {
        format!(
            "{} frames | FPS: {:.1} | avg {:.2}ms, max {:.2}ms | {}",
            self.total_frames,
            self.fps(),
            self.avg_frame_time_ms(),
            self.max_frame_time_ms(),
            self.last_render.summary()
        )
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
