use crate::animation::{Animation, AnimationChannel, AnimationController, Bone, BoneMatrix, SharedSkeleton, Skeleton};
use crate::assets::load_skeleton_from_gltf;
use crate::camera::{CameraMode, CameraRig};
use crate::config::{EngineConfig, EngineConfigOverrides};
use crate::events::{EngineEvent, EventBus};
use crate::frame_stats::FrameStatsSummary;
use crate::game_loop::{FrameTiming, GameLoop, LoopCallbacks};
use crate::input::{Input, InputEvent};
use crate::time::{Clock, SystemClock};
use anyhow::{bail, Result};
use glam::{Mat4, Quat, Vec3};
use std::cell::RefCell;
use std::f32::consts::{FRAC_PI_4, TAU};
use std::path::PathBuf;
use std::rc::Rc;

const BOOST_MULTIPLIER: f32 = 3.0;

/// A skinned model: its skeleton and the controller posing it.
pub struct Actor {
    pub name: String,
    pub skeleton: SharedSkeleton,
    pub controller: AnimationController,
}

/// Constant-rate rotation stepped at the fixed rate and drawn with interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spinner {
    pub previous: f32,
    pub current: f32,
    pub speed: f32,
}

impl Spinner {
    pub fn new(speed: f32) -> Self {
        Self { previous: 0.0, current: 0.0, speed }
    }

    pub fn step(&mut self, dt: f32) {
        self.previous = self.current;
        self.current += self.speed * dt;
        if self.current.abs() > TAU {
            let wrapped = self.current.rem_euclid(TAU);
            self.previous += wrapped - self.current;
            self.current = wrapped;
        }
    }

    pub fn interpolated(&self, alpha: f32) -> f32 {
        self.previous + (self.current - self.previous) * alpha.clamp(0.0, 1.0)
    }
}

/// Everything the renderer needs for one frame, captured after the fixed updates ran.
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    /// Orbit target, drawn as a marker in third person.
    pub target_marker: Option<Vec3>,
    pub interpolation: f32,
    pub spinner_angles: Vec<f32>,
    pub palettes: Vec<(String, Vec<BoneMatrix>)>,
    pub frames_rendered: u64,
}

/// Simulation state driven by the loop callbacks.
pub struct EngineState {
    pub config: EngineConfig,
    pub camera: CameraRig,
    pub input: Input,
    pub actors: Vec<Actor>,
    pub spinners: Vec<Spinner>,
    pub events: EventBus,
    snapshot: RenderSnapshot,
    exit_requested: bool,
    simulated_time: f64,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        let mut camera = CameraRig::new(&config.camera);
        camera.initialize(config.window.width, config.window.height);
        let input = match &config.input_bindings {
            Some(path) => Input::from_config(path),
            None => Input::new(),
        };
        Self {
            config,
            camera,
            input,
            actors: Vec::new(),
            spinners: Vec::new(),
            events: EventBus::default(),
            snapshot: RenderSnapshot::default(),
            exit_requested: false,
            simulated_time: 0.0,
        }
    }

    /// Binds a controller to `skeleton` and registers the clips. Returns the actor index, or `None`
    /// when the skeleton has no bones.
    pub fn add_actor(
        &mut self,
        name: impl Into<String>,
        skeleton: Skeleton,
        animations: impl IntoIterator<Item = Animation>,
    ) -> Option<usize> {
        let name = name.into();
        let skeleton: SharedSkeleton = Rc::new(RefCell::new(skeleton));
        let mut controller = AnimationController::new();
        controller.set_blend_mode(self.config.animation.blending);
        controller.set_blend_time(self.config.animation.blend_time);
        if !controller.initialize(Rc::clone(&skeleton)) {
            log::warn!("actor '{name}' has an empty skeleton; not added");
            return None;
        }
        for animation in animations {
            controller.add_animation(animation);
        }
        self.actors.push(Actor { name, skeleton, controller });
        Some(self.actors.len() - 1)
    }

    /// Plays `clip` on an actor with the configured loop flag.
    pub fn play(&mut self, actor: usize, clip: &str) -> bool {
        let looping = self.config.animation.looping;
        match self.actors.get_mut(actor) {
            Some(actor) => actor.controller.play_animation(clip, looping),
            None => false,
        }
    }

    pub fn request_exit(&mut self) {
        if !self.exit_requested {
            self.exit_requested = true;
            self.events.push(EngineEvent::ExitRequested);
        }
    }

    pub fn snapshot(&self) -> &RenderSnapshot {
        &self.snapshot
    }

    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    fn toggle_camera_mode(&mut self) {
        let mode = self.camera.camera_mode().toggled();
        self.camera.set_camera_mode(mode);
        log::info!("Camera mode: {}", mode.label());
        self.events.push(EngineEvent::CameraModeChanged { mode });
    }

    fn move_camera(&mut self, dt: f32) {
        let dt = if self.input.boost_held() { dt * BOOST_MULTIPLIER } else { dt };
        if self.input.move_forward() {
            self.camera.move_forward(dt);
        }
        if self.input.move_backward() {
            self.camera.move_backward(dt);
        }
        if self.input.move_left() {
            self.camera.move_left(dt);
        }
        if self.input.move_right() {
            self.camera.move_right(dt);
        }
        if self.input.move_up() {
            self.camera.move_up(dt);
        }
        if self.input.move_down() {
            self.camera.move_down(dt);
        }
    }
}

impl LoopCallbacks for EngineState {
    fn on_input(&mut self) {
        if self.input.quit_requested() {
            self.request_exit();
        }
        if self.input.take_mode_toggle() {
            self.toggle_camera_mode();
        }
        if let Some((dx, dy)) = self.input.take_look_delta() {
            let sensitivity = self.config.camera.mouse_sensitivity(self.camera.camera_mode());
            self.camera.rotate(dx * sensitivity, dy * sensitivity);
        }
        if let Some(wheel) = self.input.consume_wheel_delta() {
            if self.camera.camera_mode() == CameraMode::ThirdPerson {
                self.camera.zoom_to_target(wheel);
            }
        }
        self.input.clear_frame();
    }

    fn on_update(&mut self, fixed_delta: f32) {
        self.move_camera(fixed_delta);
        self.camera.update(fixed_delta);
        for spinner in &mut self.spinners {
            spinner.step(fixed_delta);
        }
        for actor in &mut self.actors {
            actor.controller.update(fixed_delta);
            let name = &actor.name;
            self.events.extend(
                actor
                    .controller
                    .drain_events()
                    .into_iter()
                    .map(|event| EngineEvent::Animation { actor: name.clone(), event }),
            );
        }
        self.simulated_time += f64::from(fixed_delta);
    }

    fn on_render(&mut self, interpolation: f32) {
        let snapshot = &mut self.snapshot;
        snapshot.view = self.camera.view_matrix();
        snapshot.projection = self.camera.projection_matrix();
        snapshot.camera_position = self.camera.position();
        snapshot.target_marker =
            (self.camera.camera_mode() == CameraMode::ThirdPerson).then(|| self.camera.target());
        snapshot.interpolation = interpolation;
        snapshot.spinner_angles.clear();
        snapshot.spinner_angles.extend(self.spinners.iter().map(|spinner| spinner.interpolated(interpolation)));
        snapshot.palettes.clear();
        snapshot
            .palettes
            .extend(self.actors.iter().map(|actor| (actor.name.clone(), actor.controller.palette())));
        snapshot.frames_rendered += 1;
    }

    fn should_exit(&self) -> bool {
        self.exit_requested
    }
}

/// Owns the loop driver and the state it drives. One engine per window; nothing global.
pub struct Engine<C: Clock = SystemClock> {
    game_loop: GameLoop<C>,
    state: EngineState,
}

impl Engine<SystemClock> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        let game_loop = GameLoop::with_clock(&config.game_loop, clock);
        Self { game_loop, state: EngineState::new(config) }
    }

    pub fn push_input(&mut self, event: InputEvent) {
        self.state.input.push(event);
    }

    pub fn start(&mut self) {
        self.game_loop.start();
    }

    pub fn stop(&mut self) {
        self.game_loop.stop();
    }

    /// Runs one input, update, render iteration. Starts the loop on first use.
    pub fn run_one_frame(&mut self) -> FrameTiming {
        if !self.game_loop.is_running() {
            self.game_loop.start();
        }
        let timing = self.game_loop.run_one_iteration(&mut self.state);
        if self.state.should_exit() {
            self.game_loop.stop();
        }
        timing
    }

    /// Runs until `frames` iterations completed or an exit was requested. Returns the iterations run.
    pub fn run_frames(&mut self, frames: u64) -> u64 {
        let mut completed = 0;
        while completed < frames && !self.state.should_exit() {
            self.run_one_frame();
            completed += 1;
        }
        completed
    }

    /// Runs until an exit is requested. Events not drained by the host stay capped by the [`EventBus`].
    pub fn run(&mut self) {
        self.game_loop.run(&mut self.state);
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    pub fn game_loop(&self) -> &GameLoop<C> {
        &self.game_loop
    }

    pub fn game_loop_mut(&mut self) -> &mut GameLoop<C> {
        &mut self.game_loop
    }

    pub fn stats(&self) -> FrameStatsSummary {
        self.game_loop.stats()
    }

    pub fn shutdown(&mut self) {
        self.game_loop.stop();
        for actor in &mut self.state.actors {
            actor.controller.shutdown();
        }
        self.state.actors.clear();
    }
}

/// Two-bone arm with an "idle" bob and a "wave" swing, used when no model is given.
pub fn demo_rig() -> (Skeleton, Vec<Animation>) {
    let bones = vec![
        Bone::new("root", None),
        Bone::new("arm", Some(0))
            .with_bind(Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)))
            .with_offset(Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0))),
    ];
    let skeleton = match Skeleton::new(bones) {
        Ok(skeleton) => skeleton,
        Err(err) => {
            log::error!("demo rig rejected: {err}");
            Skeleton::default()
        }
    };

    let idle = Animation::new("idle", 50.0, 25.0).with_channel(AnimationChannel::new("root").with_position_keys([
        (0.0, Vec3::ZERO),
        (25.0, Vec3::new(0.0, 0.2, 0.0)),
        (50.0, Vec3::ZERO),
    ]));
    let wave = Animation::new("wave", 25.0, 25.0).with_channel(
        AnimationChannel::new("arm")
            .with_position_keys([(0.0, Vec3::new(0.0, 2.0, 0.0))])
            .with_rotation_keys([
                (0.0, Quat::IDENTITY),
                (12.5, Quat::from_rotation_z(FRAC_PI_4)),
                (25.0, Quat::IDENTITY),
            ]),
    );
    (skeleton, vec![idle, wave])
}

#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub config_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub frames: Option<u64>,
    pub overrides: EngineConfigOverrides,
}

pub const DEFAULT_DEMO_FRAMES: u64 = 600;

/// Headless demo: loads config and a model, then drives a bounded number of frames with scripted input.
pub fn run_demo(options: DemoOptions) -> Result<FrameStatsSummary> {
    let mut config = match &options.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if !options.overrides.is_empty() {
        log::info!("Applying CLI overrides: {}", options.overrides.applied_fields().join(", "));
        config.apply_overrides(&options.overrides);
    }

    let (name, skeleton, animations) = match &options.model_path {
        Some(path) => {
            let import = load_skeleton_from_gltf(path)?;
            (import.name, import.skeleton, import.animations)
        }
        None => {
            let (skeleton, animations) = demo_rig();
            ("demo_rig".to_string(), skeleton, animations)
        }
    };
    let clip_names: Vec<String> = animations.iter().map(|clip| clip.name().to_string()).collect();

    let mut engine = Engine::new(config);
    let Some(actor) = engine.state_mut().add_actor(name, skeleton, animations) else {
        bail!("Model has no bones to animate");
    };
    if let Some(first) = clip_names.first() {
        engine.state_mut().play(actor, first);
    }
    engine.state_mut().spinners.push(Spinner::new(1.5));

    let frames = options.frames.unwrap_or(DEFAULT_DEMO_FRAMES).max(1);
    let toggle_frame = frames / 3;
    let switch_frame = frames * 2 / 3;
    engine.start();
    for frame in 0..frames {
        if frame == 0 {
            engine.push_input(InputEvent::character("w", true));
        }
        if frame == toggle_frame {
            engine.push_input(InputEvent::character("w", false));
            engine.push_input(InputEvent::character("c", true));
            engine.push_input(InputEvent::character("c", false));
        }
        if frame == switch_frame {
            if let Some(second) = clip_names.get(1) {
                engine.state_mut().play(actor, second);
            }
        }
        engine.run_one_frame();
        for event in engine.state_mut().events.drain() {
            log::debug!("event: {event}");
        }
        if engine.state().should_exit() {
            break;
        }
    }

    let stats = engine.stats();
    let simulated = engine.state().simulated_time();
    log::info!(
        "Demo finished: {} frames rendered, {:.2}s simulated, fps={} ups={} avg frame {:.3} ms, avg update {:.3} ms, dropped backlog {:.3}s",
        engine.state().snapshot().frames_rendered,
        simulated,
        stats.fps,
        stats.ups,
        stats.average_frame_ms,
        stats.average_update_ms,
        stats.dropped_backlog_total
    );
    engine.shutdown();
    Ok(stats)
}
