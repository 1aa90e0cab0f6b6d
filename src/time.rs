use std::time::{Duration, Instant};

/// Source of monotonic timestamps for the loop driver.
pub trait Clock {
    fn now(&mut self) -> Instant;

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Lets tests drive the loop with exact frame times.
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    now: Instant,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Instant::now() }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    pub fn advance_secs(&mut self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds.max(0.0)));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Instant {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}

pub struct Time<C: Clock = SystemClock> {
    clock: C,
    start: Instant,
    last: Instant,
    pub delta: Duration,
}

impl Time<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Time<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Time<C> {
    pub fn with_clock(mut clock: C) -> Self {
        let now = clock.now();
        Self { clock, start: now, last: now, delta: Duration::ZERO }
    }

    /// Restarts the timeline at the clock's current instant.
    pub fn reset(&mut self) {
        let now = self.clock.now();
        self.start = now;
        self.last = now;
        self.delta = Duration::ZERO;
    }

    /// Samples the clock and returns the wall time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        let now = self.clock.now();
        self.delta = now.saturating_duration_since(self.last);
        self.last = now;
        self.delta
    }

    /// Time elapsed since the last tick, without consuming it.
    pub fn since_last_tick(&mut self) -> Duration {
        let now = self.clock.now();
        now.saturating_duration_since(self.last)
    }

    pub fn now(&mut self) -> Instant {
        self.clock.now()
    }

    pub fn last(&self) -> Instant {
        self.last
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}
