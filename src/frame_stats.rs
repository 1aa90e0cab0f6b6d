use std::time::Duration;

pub const DEFAULT_HISTORY_LEN: usize = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStatsSummary {
    pub fps: u32,
    pub ups: u32,
    pub last_frame_ms: f64,
    pub last_update_ms: f64,
    pub average_frame_ms: f64,
    pub average_update_ms: f64,
    pub dropped_backlog_total: f64,
}

/// Per-second counters plus a fixed-size ring of recent render/update durations.
#[derive(Clone, Debug)]
pub struct FrameStats {
    frame_history: Vec<f64>,
    update_history: Vec<f64>,
    cursor: usize,
    frame_count: u32,
    update_count: u32,
    current_fps: u32,
    current_ups: u32,
    last_frame_ms: f64,
    last_update_ms: f64,
    since_snapshot: Duration,
    dropped_backlog_total: f64,
}

impl FrameStats {
    pub fn new(history_len: usize) -> Self {
        let len = history_len.max(1);
        Self {
            frame_history: vec![0.0; len],
            update_history: vec![0.0; len],
            cursor: 0,
            frame_count: 0,
            update_count: 0,
            current_fps: 0,
            current_ups: 0,
            last_frame_ms: 0.0,
            last_update_ms: 0.0,
            since_snapshot: Duration::ZERO,
            dropped_backlog_total: 0.0,
        }
    }

    pub fn reset(&mut self) {
        let len = self.frame_history.len();
        *self = Self::new(len);
    }

    pub fn history_len(&self) -> usize {
        self.frame_history.len()
    }

    /// Accumulates wall time; once a full second has passed the counters become the current FPS/UPS.
    pub fn advance_wall_time(&mut self, frame_time: Duration) {
        self.since_snapshot += frame_time;
        if self.since_snapshot >= Duration::from_secs(1) {
            self.current_fps = self.frame_count;
            self.current_ups = self.update_count;
            self.frame_count = 0;
            self.update_count = 0;
            self.since_snapshot = Duration::ZERO;
        }
    }

    pub fn count_update(&mut self) {
        self.update_count += 1;
    }

    pub fn record_update_pass(&mut self, duration: Duration) {
        let ms = duration.as_secs_f64() * 1000.0;
        self.last_update_ms = ms;
        self.update_history[self.cursor] = ms;
    }

    /// Records the render duration and closes the history slot for this frame.
    pub fn record_render(&mut self, duration: Duration) {
        let ms = duration.as_secs_f64() * 1000.0;
        self.frame_count += 1;
        self.last_frame_ms = ms;
        self.frame_history[self.cursor] = ms;
        self.cursor = (self.cursor + 1) % self.frame_history.len();
    }

    pub fn record_dropped_backlog(&mut self, seconds: f64) {
        self.dropped_backlog_total += seconds;
    }

    pub fn current_fps(&self) -> u32 {
        self.current_fps
    }

    pub fn current_ups(&self) -> u32 {
        self.current_ups
    }

    pub fn last_frame_ms(&self) -> f64 {
        self.last_frame_ms
    }

    pub fn last_update_ms(&self) -> f64 {
        self.last_update_ms
    }

    pub fn average_frame_ms(&self) -> f64 {
        average_non_zero(&self.frame_history)
    }

    pub fn average_update_ms(&self) -> f64 {
        average_non_zero(&self.update_history)
    }

    pub fn summary(&self) -> FrameStatsSummary {
        FrameStatsSummary {
            fps: self.current_fps,
            ups: self.current_ups,
            last_frame_ms: self.last_frame_ms,
            last_update_ms: self.last_update_ms,
            average_frame_ms: self.average_frame_ms(),
            average_update_ms: self.average_update_ms(),
            dropped_backlog_total: self.dropped_backlog_total,
        }
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

fn average_non_zero(samples: &[f64]) -> f64 {
    let (total, count) =
        samples.iter().filter(|ms| **ms > 0.0).fold((0.0, 0usize), |(total, count), ms| (total + ms, count + 1));
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
