use osprey_engine::config::LoopConfig;
use osprey_engine::game_loop::{FnCallbacks, GameLoop, LoopCallbacks, LoopState, MAX_DELTA_TIME};
use osprey_engine::time::ManualClock;
use proptest::prelude::*;

#[derive(Default)]
struct Counter {
    updates: u64,
    step_sizes: Vec<f32>,
    interpolations: Vec<f32>,
    exit_after_renders: Option<usize>,
}

impl LoopCallbacks for Counter {
    fn on_update(&mut self, fixed_delta: f32) {
        self.updates += 1;
        self.step_sizes.push(fixed_delta);
    }

    fn on_render(&mut self, interpolation: f32) {
        self.interpolations.push(interpolation);
    }

    fn should_exit(&self) -> bool {
        self.exit_after_renders.is_some_and(|limit| self.interpolations.len() >= limit)
    }
}

fn uncapped_loop(target_ups: u32) -> GameLoop<ManualClock> {
    let config =
        LoopConfig { target_ups, max_frame_time: 0.0, max_updates_per_frame: 0, ..LoopConfig::default() };
    let mut game_loop = GameLoop::with_clock(&config, ManualClock::new());
    game_loop.start();
    game_loop
}

#[test]
fn fixed_step_burst_scenario() {
    let mut game_loop = uncapped_loop(60);
    let mut counter = Counter::default();
    game_loop.clock_mut().advance_secs(0.1);
    game_loop.update_timing();
    let steps = game_loop.update_logic(&mut counter);
    assert_eq!(steps, 6);
    assert!(counter.step_sizes.iter().all(|dt| (dt - 0.016_67).abs() < 1e-4));
    assert!(game_loop.accumulator().abs() < 1e-9);
}

#[test]
fn reported_delta_is_clamped_but_accumulator_cap_is_separate() {
    let config = LoopConfig { max_frame_time: 0.25, ..LoopConfig::default() };
    let mut game_loop = GameLoop::with_clock(&config, ManualClock::new());
    game_loop.start();
    game_loop.clock_mut().advance_secs(1.0);
    game_loop.update_timing();
    assert_eq!(game_loop.delta_time(), MAX_DELTA_TIME);
    assert!((game_loop.accumulator() - 0.25).abs() < 1e-9);
    let dropped = game_loop.stats().dropped_backlog_total;
    assert!((dropped - 0.75).abs() < 1e-9, "dropped {dropped}");
}

#[test]
fn update_cap_keeps_fractional_remainder() {
    let config = LoopConfig { max_frame_time: 0.0, max_updates_per_frame: 4, ..LoopConfig::default() };
    let mut game_loop = GameLoop::with_clock(&config, ManualClock::new());
    game_loop.start();
    let mut counter = Counter::default();
    game_loop.clock_mut().advance_secs(10.5 / 60.0);
    let timing = game_loop.run_one_iteration(&mut counter);
    assert_eq!(counter.updates, 4);
    assert!((game_loop.accumulator() - 0.5 / 60.0).abs() < 1e-9);
    assert!((timing.interpolation - 0.5).abs() < 1e-4);
    assert!(timing.dropped_backlog.is_some_and(|dropped| (dropped - 6.0 / 60.0).abs() < 1e-9));
}

#[test]
fn changing_target_ups_changes_the_step() {
    let mut game_loop = uncapped_loop(60);
    game_loop.set_target_ups(30);
    assert_eq!(game_loop.target_ups(), 30);
    assert!((game_loop.fixed_timestep() - 1.0 / 30.0).abs() < 1e-12);
    let mut counter = Counter::default();
    game_loop.clock_mut().advance_secs(0.1);
    game_loop.run_one_iteration(&mut counter);
    assert_eq!(counter.updates, 3);

    game_loop.set_target_ups(0);
    assert_eq!(game_loop.target_ups(), 1, "at least one update per second");
}

#[test]
fn pacing_only_applies_without_vsync() {
    let mut game_loop = uncapped_loop(60);
    game_loop.set_target_fps(500);
    game_loop.set_vsync_enabled(true);
    let mut counter = Counter::default();
    let timing = game_loop.run_one_iteration(&mut counter);
    assert_eq!(timing.slept, None);

    game_loop.set_vsync_enabled(false);
    let timing = game_loop.run_one_iteration(&mut counter);
    let slept = timing.slept.expect("a frozen clock leaves the whole frame budget to sleep");
    assert!((slept.as_secs_f64() - 1.0 / 500.0).abs() < 1e-6);
    // Sleeping on a manual clock advances it, so the next frame sees the paced time.
    game_loop.update_timing();
    assert!((f64::from(game_loop.delta_time()) - slept.as_secs_f64()).abs() < 1e-6);

    game_loop.set_target_fps(0);
    let timing = game_loop.run_one_iteration(&mut counter);
    assert_eq!(timing.slept, None);
}

#[test]
fn fps_and_ups_snapshot_each_second() {
    let mut game_loop = uncapped_loop(60);
    let mut counter = Counter::default();
    for _ in 0..5 {
        game_loop.clock_mut().advance_secs(0.25);
        game_loop.run_one_iteration(&mut counter);
    }
    // The snapshot taken at the 1s mark covers the three frames before it.
    assert_eq!(game_loop.current_fps(), 3);
    assert_eq!(game_loop.current_ups(), 45);
    game_loop.reset_stats();
    assert_eq!(game_loop.current_fps(), 0);
}

#[test]
fn run_stops_when_callbacks_request_exit() {
    let mut game_loop = GameLoop::with_clock(&LoopConfig::default(), ManualClock::new());
    let mut counter = Counter { exit_after_renders: Some(3), ..Counter::default() };
    game_loop.run(&mut counter);
    assert_eq!(counter.interpolations.len(), 3);
    assert_eq!(game_loop.state(), LoopState::Stopped);
}

#[test]
fn closures_can_be_registered_as_callbacks() {
    let mut game_loop = uncapped_loop(60);
    let mut inputs = 0;
    let mut total_dt = 0.0_f32;
    {
        let mut callbacks = FnCallbacks::new();
        callbacks.set_input_function(|| inputs += 1).set_update_function(|dt| total_dt += dt);
        for _ in 0..3 {
            game_loop.clock_mut().advance_secs(1.0 / 60.0);
            game_loop.run_one_iteration(&mut callbacks);
        }
    }
    assert_eq!(inputs, 3);
    assert!((total_dt - 3.0 / 60.0).abs() < 1e-5);
}

proptest! {
    #[test]
    fn update_count_matches_total_time(frame_ms in proptest::collection::vec(1u64..=100, 1..60)) {
        let mut game_loop = uncapped_loop(60);
        let mut counter = Counter::default();
        let mut total_ms = 0u64;
        for ms in &frame_ms {
            game_loop.clock_mut().advance(std::time::Duration::from_millis(*ms));
            total_ms += ms;
            game_loop.run_one_iteration(&mut counter);
            let accumulator = game_loop.accumulator();
            prop_assert!(accumulator >= 0.0);
            prop_assert!(accumulator < game_loop.fixed_timestep());
            let interpolation = game_loop.interpolation();
            prop_assert!((0.0..1.0).contains(&interpolation));
        }
        // 60 ups means one step per 50/3 ms.
        prop_assert_eq!(counter.updates, total_ms * 3 / 50);
    }
}
