use crate::camera::CameraMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "LoopConfig::default_target_ups")]
    pub target_ups: u32,
    /// 0 leaves the render rate unlimited.
    #[serde(default)]
    pub target_fps: u32,
    #[serde(default = "LoopConfig::default_vsync")]
    pub vsync: bool,
    /// Upper bound (seconds) on the wall time a single frame may add to the accumulator.
    #[serde(default = "LoopConfig::default_max_frame_time")]
    pub max_frame_time: f64,
    #[serde(default = "LoopConfig::default_max_updates_per_frame")]
    pub max_updates_per_frame: u32,
    #[serde(default = "LoopConfig::default_stats_history")]
    pub stats_history: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub mode: CameraMode,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub move_speed: f32,
    pub rotation_speed: f32,
    pub zoom_speed: f32,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub orbit_pitch: f32,
    pub first_person_sensitivity: f32,
    pub third_person_sensitivity: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub blending: bool,
    pub blend_time: f32,
    pub looping: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub game_loop: LoopConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    /// JSON file remapping input actions to keys.
    #[serde(default)]
    pub input_bindings: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
    pub target_ups: Option<u32>,
    pub target_fps: Option<u32>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Osprey Engine".to_string(), width: 1280, height: 720 }
    }
}

impl LoopConfig {
    const fn default_target_ups() -> u32 {
        60
    }

    const fn default_vsync() -> bool {
        true
    }

    const fn default_max_frame_time() -> f64 {
        0.25
    }

    const fn default_max_updates_per_frame() -> u32 {
        10
    }

    const fn default_stats_history() -> usize {
        crate::frame_stats::DEFAULT_HISTORY_LEN
    }

    pub fn fixed_timestep(&self) -> f64 {
        1.0 / f64::from(self.target_ups.max(1))
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_ups: Self::default_target_ups(),
            target_fps: 0,
            vsync: Self::default_vsync(),
            max_frame_time: Self::default_max_frame_time(),
            max_updates_per_frame: Self::default_max_updates_per_frame(),
            stats_history: Self::default_stats_history(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: CameraMode::ThirdPerson,
            fov_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 5.0, -10.0],
            move_speed: 10.0,
            rotation_speed: 1.0,
            zoom_speed: 2.0,
            distance: 10.0,
            min_distance: 2.0,
            max_distance: 50.0,
            orbit_pitch: 0.3,
            first_person_sensitivity: 0.005,
            third_person_sensitivity: 0.01,
        }
    }
}

impl CameraConfig {
    pub fn mouse_sensitivity(&self, mode: CameraMode) -> f32 {
        match mode {
            CameraMode::FirstPerson => self.first_person_sensitivity,
            CameraMode::ThirdPerson => self.third_person_sensitivity,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self { blending: true, blend_time: 0.5, looping: true }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &EngineConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.game_loop.vsync = vsync;
        }
        if let Some(ups) = overrides.target_ups {
            self.game_loop.target_ups = ups.max(1);
        }
        if let Some(fps) = overrides.target_fps {
            self.game_loop.target_fps = fps;
        }
    }
}

impl EngineConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.vsync.is_none()
            && self.target_ups.is_none()
            && self.target_fps.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.vsync.is_some() {
            fields.push("vsync");
        }
        if self.target_ups.is_some() {
            fields.push("ups");
        }
        if self.target_fps.is_some() {
            fields.push("fps");
        }
        fields
    }
}
