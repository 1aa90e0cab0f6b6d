use crate::config::CameraConfig;
use crate::wrap_yaw;
use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use serde::Deserialize;
use std::f32::consts::{FRAC_PI_2, PI};
use winit::dpi::PhysicalSize;

const WORLD_UP: Vec3 = Vec3::Y;

/// First-person pitch stays inside (-pi/2 + 0.1, pi/2 - 0.1).
pub const FIRST_PERSON_PITCH_LIMIT: f32 = FRAC_PI_2 - 0.1;
/// Orbit pitch is measured from the +Y axis and stays inside (0.1, pi - 0.1).
pub const ORBIT_PITCH_MIN: f32 = 0.1;
pub const ORBIT_PITCH_MAX: f32 = PI - 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    FirstPerson,
    #[default]
    ThirdPerson,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::FirstPerson => CameraMode::ThirdPerson,
            CameraMode::ThirdPerson => CameraMode::FirstPerson,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraMode::FirstPerson => "first person",
            CameraMode::ThirdPerson => "third person",
        }
    }
}

/// Authoritative state while in first-person mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstPersonState {
    pub position: Vec3,
    /// (pitch, yaw, roll) in radians.
    pub rotation: Vec3,
}

/// Authoritative state while orbiting a target. `position` is derived in [`CameraRig::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThirdPersonState {
    pub target: Vec3,
    pub distance: f32,
    pub orbit_yaw: f32,
    pub orbit_pitch: f32,
    pub position: Vec3,
}

impl ThirdPersonState {
    fn orbit_position(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.orbit_pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.orbit_yaw.sin_cos();
        self.target + self.distance * Vec3::new(sin_pitch * cos_yaw, cos_pitch, sin_pitch * sin_yaw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    pub rotation_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl From<&CameraConfig> for CameraSettings {
    fn from(config: &CameraConfig) -> Self {
        let min_distance = config.min_distance.max(0.01);
        Self {
            fov_y_radians: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
            move_speed: config.move_speed,
            rotation_speed: config.rotation_speed,
            zoom_speed: config.zoom_speed,
            min_distance,
            max_distance: config.max_distance.max(min_distance),
        }
    }
}

/// Dual-mode perspective camera. Both mode states are kept so switching back resumes where it left off;
/// only the active one is read or written by movement and matrix construction.
#[derive(Debug, Clone)]
pub struct CameraRig {
    mode: CameraMode,
    first_person: FirstPersonState,
    third_person: ThirdPersonState,
    settings: CameraSettings,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    viewport: PhysicalSize<u32>,
    view: Mat4,
    projection: Mat4,
}

impl CameraRig {
    pub fn new(config: &CameraConfig) -> Self {
        let settings = CameraSettings::from(config);
        let position = Vec3::from_array(config.position);
        let mut third_person = ThirdPersonState {
            target: Vec3::ZERO,
            distance: config.distance.clamp(settings.min_distance, settings.max_distance),
            orbit_yaw: 0.0,
            orbit_pitch: config.orbit_pitch.clamp(ORBIT_PITCH_MIN, ORBIT_PITCH_MAX),
            position,
        };
        third_person.position = third_person.orbit_position();
        Self {
            mode: config.mode,
            first_person: FirstPersonState { position, rotation: Vec3::ZERO },
            third_person,
            settings,
            forward: Vec3::Z,
            right: Vec3::X,
            up: Vec3::Y,
            viewport: PhysicalSize::new(0, 0),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    /// Builds the projection for the viewport and the initial view.
    pub fn initialize(&mut self, width: u32, height: u32) {
        self.set_viewport(PhysicalSize::new(width, height));
        self.update_view_matrix();
    }

    pub fn set_viewport(&mut self, viewport: PhysicalSize<u32>) {
        self.viewport = viewport;
        let aspect = if viewport.height > 0 { viewport.width as f32 / viewport.height as f32 } else { 1.0 };
        self.projection = Mat4::perspective_lh(
            self.settings.fov_y_radians,
            aspect.max(0.0001),
            self.settings.near,
            self.settings.far,
        );
    }

    pub fn update(&mut self, _dt: f32) {
        if self.mode == CameraMode::ThirdPerson {
            self.third_person.position = self.third_person.orbit_position();
        }
        self.update_view_matrix();
    }

    pub fn set_camera_mode(&mut self, mode: CameraMode) {
        if self.mode != mode {
            log::debug!("camera mode -> {}", mode.label());
        }
        self.mode = mode;
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.mode
    }

    pub fn move_forward(&mut self, dt: f32) {
        self.translate(self.forward, Vec3::Z, dt);
    }

    pub fn move_backward(&mut self, dt: f32) {
        self.translate(-self.forward, Vec3::NEG_Z, dt);
    }

    pub fn move_left(&mut self, dt: f32) {
        self.translate(-self.right, Vec3::NEG_X, dt);
    }

    pub fn move_right(&mut self, dt: f32) {
        self.translate(self.right, Vec3::X, dt);
    }

    pub fn move_up(&mut self, dt: f32) {
        self.translate(self.up, Vec3::Y, dt);
    }

    pub fn move_down(&mut self, dt: f32) {
        self.translate(-self.up, Vec3::NEG_Y, dt);
    }

    // First person moves the eye along its basis; third person moves the orbit target along world axes.
    fn translate(&mut self, basis: Vec3, world_axis: Vec3, dt: f32) {
        let amount = self.settings.move_speed * dt;
        match self.mode {
            CameraMode::FirstPerson => self.first_person.position += basis * amount,
            CameraMode::ThirdPerson => self.move_target(world_axis * amount),
        }
    }

    pub fn move_target(&mut self, delta: Vec3) {
        self.third_person.target += delta;
    }

    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        match self.mode {
            CameraMode::FirstPerson => {
                let rotation = &mut self.first_person.rotation;
                rotation.y = wrap_yaw(rotation.y + yaw);
                rotation.x = (rotation.x + pitch).clamp(-FIRST_PERSON_PITCH_LIMIT, FIRST_PERSON_PITCH_LIMIT);
            }
            CameraMode::ThirdPerson => self.orbit_around_target(yaw, pitch),
        }
    }

    pub fn orbit_around_target(&mut self, yaw: f32, pitch: f32) {
        let speed = self.settings.rotation_speed;
        let orbit = &mut self.third_person;
        orbit.orbit_yaw = wrap_yaw(orbit.orbit_yaw + yaw * speed);
        orbit.orbit_pitch = (orbit.orbit_pitch + pitch * speed).clamp(ORBIT_PITCH_MIN, ORBIT_PITCH_MAX);
    }

    pub fn set_orbit(&mut self, yaw: f32, pitch: f32) {
        self.third_person.orbit_yaw = wrap_yaw(yaw);
        self.third_person.orbit_pitch = pitch.clamp(ORBIT_PITCH_MIN, ORBIT_PITCH_MAX);
    }

    pub fn zoom_to_target(&mut self, delta: f32) {
        let distance = self.third_person.distance - delta * self.settings.zoom_speed;
        self.set_distance(distance);
    }

    pub fn set_distance(&mut self, distance: f32) {
        let distance = if distance.is_finite() { distance } else { self.settings.max_distance };
        self.third_person.distance = distance.clamp(self.settings.min_distance, self.settings.max_distance);
    }

    pub fn set_position(&mut self, position: Vec3) {
        match self.mode {
            CameraMode::FirstPerson => self.first_person.position = position,
            CameraMode::ThirdPerson => self.third_person.position = position,
        }
    }

    pub fn set_rotation(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.first_person.rotation = Vec3::new(pitch, yaw, roll);
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.third_person.target = target;
    }

    fn update_view_matrix(&mut self) {
        match self.mode {
            CameraMode::ThirdPerson => {
                let eye = self.third_person.position;
                let target = self.third_person.target;
                self.view = Mat4::look_at_lh(eye, target, WORLD_UP);
                let forward = (target - eye).normalize_or_zero();
                let right = WORLD_UP.cross(forward).normalize_or_zero();
                self.forward = forward;
                self.right = right;
                self.up = forward.cross(right);
            }
            CameraMode::FirstPerson => {
                let FirstPersonState { position, rotation } = self.first_person;
                let orientation = Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z);
                self.forward = orientation * Vec3::Z;
                self.up = orientation * Vec3::Y;
                self.right = orientation * Vec3::X;
                self.view = Mat4::look_at_lh(position, position + self.forward, self.up);
            }
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn position(&self) -> Vec3 {
        match self.mode {
            CameraMode::FirstPerson => self.first_person.position,
            CameraMode::ThirdPerson => self.third_person.position,
        }
    }

    /// First-person (pitch, yaw, roll).
    pub fn rotation(&self) -> Vec3 {
        self.first_person.rotation
    }

    pub fn target(&self) -> Vec3 {
        self.third_person.target
    }

    pub fn distance(&self) -> f32 {
        self.third_person.distance
    }

    pub fn orbit_yaw(&self) -> f32 {
        self.third_person.orbit_yaw
    }

    pub fn orbit_pitch(&self) -> f32 {
        self.third_person.orbit_pitch
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn first_person_state(&self) -> &FirstPersonState {
        &self.first_person
    }

    pub fn third_person_state(&self) -> &ThirdPersonState {
        &self.third_person
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn viewport(&self) -> PhysicalSize<u32> {
        self.viewport
    }

    /// Projects a world-space point to viewport pixels, e.g. for drawing the orbit target marker.
    pub fn project_point(&self, point: Vec3) -> Option<Vec2> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return None;
        }
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w.abs() < f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * self.viewport.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * self.viewport.height as f32;
        Some(Vec2::new(x, y))
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_projection_is_finite() {
        let mut camera = CameraRig::default();
        camera.initialize(1280, 720);
        camera.update(1.0 / 60.0);
        let vp = camera.view_projection();
        assert!(!vp.to_cols_array().iter().any(|v| v.is_nan() || v.is_infinite()));
    }

    #[test]
    fn zero_height_viewport_falls_back_to_square_aspect() {
        let mut camera = CameraRig::default();
        camera.initialize(800, 0);
        assert!(!camera.projection_matrix().to_cols_array().iter().any(|v| !v.is_finite()));
        assert!(camera.project_point(Vec3::ZERO).is_none());
    }

    #[test]
    fn target_projects_to_viewport_center() {
        let mut camera = CameraRig::default();
        camera.initialize(1280, 720);
        camera.update(0.0);
        let screen = camera.project_point(camera.target()).expect("target in front of the camera");
        assert!((screen - Vec2::new(640.0, 360.0)).length() < 0.5, "got {screen:?}");
    }

    #[test]
    fn first_person_basis_is_orthonormal() {
        let mut camera = CameraRig::default();
        camera.set_camera_mode(CameraMode::FirstPerson);
        camera.rotate(0.7, -0.3);
        camera.update(0.0);
        assert!(camera.forward().dot(camera.right()).abs() < 1e-5);
        assert!(camera.forward().dot(camera.up()).abs() < 1e-5);
        assert!((camera.forward().length() - 1.0).abs() < 1e-5);
    }
}
