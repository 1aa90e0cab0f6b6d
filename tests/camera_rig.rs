use glam::Vec3;
use osprey_engine::camera::{CameraMode, CameraRig, FIRST_PERSON_PITCH_LIMIT, ORBIT_PITCH_MAX, ORBIT_PITCH_MIN};
use osprey_engine::config::CameraConfig;
use proptest::prelude::*;
use std::f32::consts::FRAC_PI_2;
use winit::dpi::PhysicalSize;

fn approx_vec3(actual: Vec3, expected: Vec3) {
    assert!((actual - expected).length() < 1e-4, "expected {expected:?}, got {actual:?}");
}

fn third_person() -> CameraRig {
    let mut camera = CameraRig::new(&CameraConfig::default());
    camera.initialize(1280, 720);
    camera
}

#[test]
fn orbit_scenario_places_camera_on_x_axis() {
    let mut camera = third_person();
    camera.set_target(Vec3::ZERO);
    camera.set_distance(10.0);
    camera.set_orbit(0.0, FRAC_PI_2);
    camera.update(0.0);
    approx_vec3(camera.position(), Vec3::new(10.0, 0.0, 0.0));
    approx_vec3(camera.forward(), Vec3::NEG_X);
}

#[test]
fn third_person_movement_drags_the_target() {
    let mut camera = third_person();
    let start = camera.position();
    camera.move_right(0.5);
    camera.update(0.0);
    approx_vec3(camera.target(), Vec3::new(5.0, 0.0, 0.0));
    approx_vec3(camera.position() - start, Vec3::new(5.0, 0.0, 0.0));
}

#[test]
fn first_person_moves_along_its_basis() {
    let mut camera = third_person();
    camera.set_camera_mode(CameraMode::FirstPerson);
    camera.set_position(Vec3::ZERO);
    camera.set_rotation(0.0, FRAC_PI_2, 0.0);
    camera.update(0.0);
    approx_vec3(camera.forward(), Vec3::X);
    camera.move_forward(0.1);
    approx_vec3(camera.position(), Vec3::new(1.0, 0.0, 0.0));
    camera.move_up(0.1);
    approx_vec3(camera.position(), Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn mode_switch_preserves_both_states() {
    let mut camera = third_person();
    camera.orbit_around_target(0.4, 0.2);
    camera.zoom_to_target(1.0);
    camera.update(0.0);
    let orbit_position = camera.position();
    let orbit_distance = camera.distance();

    camera.set_camera_mode(CameraMode::FirstPerson);
    camera.set_position(Vec3::new(1.0, 2.0, 3.0));
    camera.rotate(0.3, -0.2);
    camera.update(0.0);
    let eye = camera.position();
    let rotation = camera.rotation();

    camera.set_camera_mode(CameraMode::ThirdPerson);
    camera.update(0.0);
    approx_vec3(camera.position(), orbit_position);
    assert_eq!(camera.distance(), orbit_distance);

    camera.set_camera_mode(CameraMode::FirstPerson);
    camera.update(0.0);
    approx_vec3(camera.position(), eye);
    assert_eq!(camera.rotation(), rotation);
}

#[test]
fn first_person_pitch_is_clamped() {
    let mut camera = third_person();
    camera.set_camera_mode(CameraMode::FirstPerson);
    camera.rotate(0.0, 10.0);
    assert!((camera.rotation().x - FIRST_PERSON_PITCH_LIMIT).abs() < 1e-6);
    camera.rotate(0.0, -20.0);
    assert!((camera.rotation().x + FIRST_PERSON_PITCH_LIMIT).abs() < 1e-6);
}

#[test]
fn resize_recomputes_projection() {
    let mut camera = third_person();
    let wide = camera.projection_matrix();
    camera.set_viewport(PhysicalSize::new(720, 720));
    let square = camera.projection_matrix();
    assert_ne!(wide, square);
    assert!((square.x_axis.x - square.y_axis.y).abs() < 1e-5, "square viewport has equal x/y scale");
}

proptest! {
    #[test]
    fn zoom_and_orbit_stay_clamped(
        zooms in proptest::collection::vec(-100.0f32..100.0, 1..40),
        pitches in proptest::collection::vec(-5.0f32..5.0, 1..40),
    ) {
        let mut camera = third_person();
        let settings = *camera.settings();
        for delta in zooms {
            camera.zoom_to_target(delta);
            prop_assert!(camera.distance() >= settings.min_distance);
            prop_assert!(camera.distance() <= settings.max_distance);
        }
        for delta in pitches {
            camera.orbit_around_target(0.1, delta);
            prop_assert!(camera.orbit_pitch() >= ORBIT_PITCH_MIN);
            prop_assert!(camera.orbit_pitch() <= ORBIT_PITCH_MAX);
        }
        camera.update(0.0);
        prop_assert!(camera.view_matrix().is_finite());
    }
}
