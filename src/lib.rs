pub mod animation;
pub mod assets;
pub mod camera;
pub mod cli;
pub mod config;
pub mod engine;
pub mod events;
pub mod frame_stats;
pub mod game_loop;
pub mod input;
pub mod time;

pub use engine::{run_demo, Engine};

/// Keeps a yaw angle inside [-2pi, 2pi] without changing its direction.
pub(crate) fn wrap_yaw(radians: f32) -> f32 {
    if !radians.is_finite() {
        return 0.0;
    }
    if radians.abs() > std::f32::consts::TAU {
        radians % std::f32::consts::TAU
    } else {
        radians
    }
}
