use crate::config::LoopConfig;
use crate::frame_stats::{FrameStats, FrameStatsSummary};
use crate::time::{Clock, SystemClock, Time};
use std::time::Duration;

/// Largest delta time reported to callers, in seconds.
pub const MAX_DELTA_TIME: f32 = 0.05;

// Slack when comparing the accumulator against the step so a frame worth exactly N steps runs N updates.
const ACCUMULATOR_EPSILON: f64 = 1e-9;

/// Hooks the loop driver invokes once per iteration: input, zero or more fixed updates, then render.
pub trait LoopCallbacks {
    fn on_input(&mut self) {}

    fn on_update(&mut self, fixed_delta: f32);

    fn on_render(&mut self, interpolation: f32);

    /// Checked once between iterations by [`GameLoop::run`].
    fn should_exit(&self) -> bool {
        false
    }
}

/// Closure-backed callbacks for hosts that prefer registering functions over implementing a trait.
#[derive(Default)]
pub struct FnCallbacks<'a> {
    input: Option<Box<dyn FnMut() + 'a>>,
    update: Option<Box<dyn FnMut(f32) + 'a>>,
    render: Option<Box<dyn FnMut(f32) + 'a>>,
}

impl<'a> FnCallbacks<'a> {
    pub fn new() -> Self {
        Self { input: None, update: None, render: None }
    }

    pub fn set_input_function(&mut self, input: impl FnMut() + 'a) -> &mut Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn set_update_function(&mut self, update: impl FnMut(f32) + 'a) -> &mut Self {
        self.update = Some(Box::new(update));
        self
    }

    pub fn set_render_function(&mut self, render: impl FnMut(f32) + 'a) -> &mut Self {
        self.render = Some(Box::new(render));
        self
    }
}

impl LoopCallbacks for FnCallbacks<'_> {
    fn on_input(&mut self) {
        if let Some(input) = self.input.as_mut() {
            input();
        }
    }

    fn on_update(&mut self, fixed_delta: f32) {
        if let Some(update) = self.update.as_mut() {
            update(fixed_delta);
        }
    }

    fn on_render(&mut self, interpolation: f32) {
        if let Some(render) = self.render.as_mut() {
            render(interpolation);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// What happened during one loop iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    pub frame_time: Duration,
    pub delta_time: f32,
    pub updates: u32,
    pub interpolation: f32,
    /// Seconds of accumulated time discarded by the frame-time or update-count caps.
    pub dropped_backlog: Option<f64>,
    pub slept: Option<Duration>,
}

/// Fixed-timestep logic with variable-rate rendering.
pub struct GameLoop<C: Clock = SystemClock> {
    time: Time<C>,
    state: LoopState,
    target_ups: u32,
    target_fps: u32,
    vsync: bool,
    fixed_timestep: f64,
    frame_time_limit: Option<Duration>,
    max_frame_time: f64,
    max_updates_per_frame: u32,
    accumulator: f64,
    delta_time: f32,
    interpolation: f32,
    stats: FrameStats,
    current: FrameTiming,
    last_frame: FrameTiming,
}

impl GameLoop<SystemClock> {
    pub fn new(config: &LoopConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> GameLoop<C> {
    pub fn with_clock(config: &LoopConfig, clock: C) -> Self {
        let mut game_loop = Self {
            time: Time::with_clock(clock),
            state: LoopState::Stopped,
            target_ups: 60,
            target_fps: 0,
            vsync: config.vsync,
            fixed_timestep: 1.0 / 60.0,
            frame_time_limit: None,
            max_frame_time: config.max_frame_time,
            max_updates_per_frame: config.max_updates_per_frame,
            accumulator: 0.0,
            delta_time: 0.0,
            interpolation: 0.0,
            stats: FrameStats::new(config.stats_history),
            current: FrameTiming::default(),
            last_frame: FrameTiming::default(),
        };
        game_loop.set_target_ups(config.target_ups);
        game_loop.set_target_fps(config.target_fps);
        game_loop
    }

    pub fn set_target_ups(&mut self, updates_per_second: u32) {
        self.target_ups = updates_per_second.max(1);
        self.fixed_timestep = 1.0 / f64::from(self.target_ups);
    }

    /// 0 removes the frame cap.
    pub fn set_target_fps(&mut self, frames_per_second: u32) {
        self.target_fps = frames_per_second;
        self.frame_time_limit = if frames_per_second > 0 {
            Some(Duration::from_secs_f64(1.0 / f64::from(frames_per_second)))
        } else {
            None
        };
    }

    pub fn set_vsync_enabled(&mut self, enabled: bool) {
        self.vsync = enabled;
    }

    /// Non-positive values disable the clamp.
    pub fn set_max_frame_time(&mut self, seconds: f64) {
        self.max_frame_time = seconds;
    }

    /// 0 allows any number of catch-up steps.
    pub fn set_max_updates_per_frame(&mut self, max_updates: u32) {
        self.max_updates_per_frame = max_updates;
    }

    pub fn start(&mut self) {
        self.state = LoopState::Running;
        self.time.reset();
        self.accumulator = 0.0;
        self.delta_time = 0.0;
        self.interpolation = 0.0;
        self.current = FrameTiming::default();
        self.last_frame = FrameTiming::default();
        self.reset_stats();
        log::debug!("game loop started at {} ups (step {:.5}s)", self.target_ups, self.fixed_timestep);
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            log::debug!("game loop stopped");
        }
        self.state = LoopState::Stopped;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Runs iterations until [`GameLoop::stop`] is called or the callbacks request an exit.
    pub fn run(&mut self, callbacks: &mut impl LoopCallbacks) {
        self.start();
        while self.is_running() && !callbacks.should_exit() {
            self.run_one_iteration(callbacks);
        }
        self.stop();
    }

    pub fn run_one_iteration(&mut self, callbacks: &mut impl LoopCallbacks) -> FrameTiming {
        self.update_timing();
        self.process_input(callbacks);
        self.update_logic(callbacks);
        self.render(callbacks);
        self.current.slept = self.pace_frame();
        self.last_frame = self.current;
        self.last_frame
    }

    /// Samples the clock and feeds the elapsed wall time into the accumulator.
    pub fn update_timing(&mut self) -> Duration {
        let frame_time = self.time.tick();
        let seconds = frame_time.as_secs_f64();
        self.current = FrameTiming { frame_time, ..FrameTiming::default() };
        self.delta_time = (seconds as f32).min(MAX_DELTA_TIME);
        self.current.delta_time = self.delta_time;

        let mut fed = seconds;
        if self.max_frame_time > 0.0 && seconds > self.max_frame_time {
            fed = self.max_frame_time;
            self.drop_backlog(seconds - fed);
        }
        self.accumulator += fed;
        self.stats.advance_wall_time(frame_time);
        frame_time
    }

    pub fn process_input(&mut self, callbacks: &mut impl LoopCallbacks) {
        callbacks.on_input();
    }

    /// Consumes the accumulator in fixed steps, then derives the render interpolation factor.
    pub fn update_logic(&mut self, callbacks: &mut impl LoopCallbacks) -> u32 {
        let started = self.time.now();
        let fixed_delta = self.fixed_delta_time();
        let mut steps = 0u32;
        while let Some(step) = self.pop_fixed_step() {
            if self.max_updates_per_frame > 0 && steps >= self.max_updates_per_frame {
                // Give the step back, then discard whole steps and keep the fractional remainder.
                self.accumulator += step;
                let mut remainder = self.accumulator.rem_euclid(self.fixed_timestep);
                if remainder + ACCUMULATOR_EPSILON >= self.fixed_timestep {
                    remainder = 0.0;
                }
                let dropped = self.accumulator - remainder;
                self.accumulator = remainder;
                self.drop_backlog(dropped);
                break;
            }
            callbacks.on_update(fixed_delta);
            steps += 1;
            self.stats.count_update();
        }
        if self.accumulator < 0.0 {
            self.accumulator = 0.0;
        }
        self.interpolation = ((self.accumulator / self.fixed_timestep) as f32).clamp(0.0, 1.0 - f32::EPSILON);
        self.current.updates += steps;
        self.current.interpolation = self.interpolation;

        let elapsed = self.time.now().saturating_duration_since(started);
        self.stats.record_update_pass(elapsed);
        steps
    }

    pub fn render(&mut self, callbacks: &mut impl LoopCallbacks) {
        let started = self.time.now();
        callbacks.on_render(self.interpolation);
        let elapsed = self.time.now().saturating_duration_since(started);
        self.stats.record_render(elapsed);
    }

    /// Sleeps out the rest of the frame budget when a cap is set and vsync is off.
    pub fn pace_frame(&mut self) -> Option<Duration> {
        if self.vsync {
            return None;
        }
        let limit = self.frame_time_limit?;
        let elapsed = self.time.since_last_tick();
        if elapsed >= limit {
            return None;
        }
        let remaining = limit - elapsed;
        self.time.clock_mut().sleep(remaining);
        Some(remaining)
    }

    fn pop_fixed_step(&mut self) -> Option<f64> {
        if self.accumulator + ACCUMULATOR_EPSILON >= self.fixed_timestep {
            self.accumulator -= self.fixed_timestep;
            Some(self.fixed_timestep)
        } else {
            None
        }
    }

    fn drop_backlog(&mut self, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        log::warn!("game loop dropped {:.3}s of backlog", seconds);
        *self.current.dropped_backlog.get_or_insert(0.0) += seconds;
        self.stats.record_dropped_backlog(seconds);
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn fixed_delta_time(&self) -> f32 {
        self.fixed_timestep as f32
    }

    pub fn fixed_timestep(&self) -> f64 {
        self.fixed_timestep
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn interpolation(&self) -> f32 {
        self.interpolation
    }

    pub fn target_ups(&self) -> u32 {
        self.target_ups
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn vsync_enabled(&self) -> bool {
        self.vsync
    }

    pub fn current_fps(&self) -> u32 {
        self.stats.current_fps()
    }

    pub fn current_ups(&self) -> u32 {
        self.stats.current_ups()
    }

    /// Milliseconds spent in the last render callback.
    pub fn frame_time(&self) -> f64 {
        self.stats.last_frame_ms()
    }

    /// Milliseconds spent in the last fixed-update pass.
    pub fn update_time(&self) -> f64 {
        self.stats.last_update_ms()
    }

    pub fn average_frame_time(&self) -> f64 {
        self.stats.average_frame_ms()
    }

    pub fn average_update_time(&self) -> f64 {
        self.stats.average_update_ms()
    }

    pub fn stats(&self) -> FrameStatsSummary {
        self.stats.summary()
    }

    pub fn last_frame(&self) -> FrameTiming {
        self.last_frame
    }

    pub fn clock_mut(&mut self) -> &mut C {
        self.time.clock_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    #[derive(Default)]
    struct Recorder {
        inputs: u32,
        updates: Vec<f32>,
        renders: Vec<f32>,
    }

    impl LoopCallbacks for Recorder {
        fn on_input(&mut self) {
            self.inputs += 1;
        }

        fn on_update(&mut self, fixed_delta: f32) {
            self.updates.push(fixed_delta);
        }

        fn on_render(&mut self, interpolation: f32) {
            self.renders.push(interpolation);
        }
    }

    fn manual_loop() -> GameLoop<ManualClock> {
        let mut game_loop = GameLoop::with_clock(&LoopConfig::default(), ManualClock::new());
        game_loop.start();
        game_loop
    }

    #[test]
    fn burst_frame_runs_six_updates() {
        let mut game_loop = manual_loop();
        let mut recorder = Recorder::default();
        game_loop.clock_mut().advance_secs(0.1);
        let timing = game_loop.run_one_iteration(&mut recorder);
        assert_eq!(timing.updates, 6);
        assert_eq!(recorder.updates.len(), 6);
        assert!(recorder.updates.iter().all(|dt| (dt - 1.0 / 60.0).abs() < 1e-6));
        assert!(game_loop.accumulator() < 1e-6);
        assert_eq!(recorder.inputs, 1);
        assert_eq!(recorder.renders.len(), 1);
    }

    #[test]
    fn short_frame_only_interpolates() {
        let mut game_loop = manual_loop();
        let mut recorder = Recorder::default();
        game_loop.clock_mut().advance_secs(0.5 / 60.0);
        game_loop.run_one_iteration(&mut recorder);
        assert!(recorder.updates.is_empty());
        assert!((recorder.renders[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn delta_time_is_clamped_for_reporting() {
        let mut game_loop = manual_loop();
        game_loop.clock_mut().advance_secs(0.2);
        game_loop.update_timing();
        assert!((game_loop.delta_time() - MAX_DELTA_TIME).abs() < f32::EPSILON);
        assert!((game_loop.accumulator() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn long_stall_is_capped() {
        let mut game_loop = manual_loop();
        let mut recorder = Recorder::default();
        game_loop.clock_mut().advance_secs(5.0);
        let timing = game_loop.run_one_iteration(&mut recorder);
        assert_eq!(recorder.updates.len(), 10);
        let dropped = timing.dropped_backlog.expect("stall should drop backlog");
        assert!(dropped > 4.7, "dropped {dropped}");
        assert!(game_loop.accumulator() < game_loop.fixed_timestep());
    }

    #[test]
    fn fn_callbacks_forward_to_closures() {
        let mut game_loop = manual_loop();
        let mut updates = 0;
        let mut last_alpha = -1.0;
        {
            let mut callbacks = FnCallbacks::new();
            callbacks.set_update_function(|_| updates += 1).set_render_function(|alpha| last_alpha = alpha);
            game_loop.clock_mut().advance_secs(2.5 / 60.0);
            game_loop.run_one_iteration(&mut callbacks);
        }
        assert_eq!(updates, 2);
        assert!((last_alpha - 0.5).abs() < 1e-4);
    }

    #[test]
    fn start_and_stop_toggle_state() {
        let mut game_loop = GameLoop::with_clock(&LoopConfig::default(), ManualClock::new());
        assert_eq!(game_loop.state(), LoopState::Stopped);
        game_loop.start();
        assert!(game_loop.is_running());
        game_loop.stop();
        assert_eq!(game_loop.state(), LoopState::Stopped);
    }
}
