use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

/// Per-frame input state fed by window events and polled by the engine each loop iteration.
pub struct Input {
    bindings: InputBindings,
    pub mouse_delta: (f32, f32),
    pub wheel: f32,
    forward_held: bool,
    backward_held: bool,
    left_held: bool,
    right_held: bool,
    up_held: bool,
    down_held: bool,
    boost_held: bool,
    toggle_held: bool,
    toggle_pressed: bool,
    quit_requested: bool,
    look_pressed: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(path: impl AsRef<Path>) -> Self {
        let bindings = InputBindings::load_or_default(path);
        Self::with_bindings(bindings)
    }

    fn with_bindings(bindings: InputBindings) -> Self {
        Self {
            bindings,
            mouse_delta: (0.0, 0.0),
            wheel: 0.0,
            forward_held: false,
            backward_held: false,
            left_held: false,
            right_held: false,
            up_held: false,
            down_held: false,
            boost_held: false,
            toggle_held: false,
            toggle_pressed: false,
            quit_requested: false,
            look_pressed: false,
        }
    }

    pub fn push(&mut self, ev: InputEvent) {
        match ev {
            InputEvent::Key { key, pressed } => {
                self.apply_key_binding(&key, pressed);
            }
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_delta.0 += dx;
                self.mouse_delta.1 += dy;
            }
            InputEvent::Wheel { delta } => {
                self.wheel += delta;
            }
            InputEvent::MouseButton { button, pressed } => {
                if button == MouseButton::Right {
                    self.look_pressed = pressed;
                }
            }
            InputEvent::CloseRequested => {
                self.quit_requested = true;
            }
            InputEvent::Other => {}
        }
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.wheel = 0.0;
        self.toggle_pressed = false;
    }

    pub fn consume_wheel_delta(&mut self) -> Option<f32> {
        if self.wheel.abs() > 0.0 {
            let d = self.wheel;
            self.wheel = 0.0;
            Some(d)
        } else {
            None
        }
    }

    /// Mouse motion accumulated this frame, only while the look button is held.
    pub fn take_look_delta(&mut self) -> Option<(f32, f32)> {
        let delta = std::mem::take(&mut self.mouse_delta);
        if self.look_pressed && (delta.0 != 0.0 || delta.1 != 0.0) {
            Some(delta)
        } else {
            None
        }
    }

    /// True once per press of the camera-mode key; held keys and key repeat do not retrigger.
    pub fn take_mode_toggle(&mut self) -> bool {
        let pressed = self.toggle_pressed;
        self.toggle_pressed = false;
        pressed
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn look_held(&self) -> bool {
        self.look_pressed
    }
    pub fn move_forward(&self) -> bool {
        self.forward_held
    }
    pub fn move_backward(&self) -> bool {
        self.backward_held
    }
    pub fn move_left(&self) -> bool {
        self.left_held
    }
    pub fn move_right(&self) -> bool {
        self.right_held
    }
    pub fn move_up(&self) -> bool {
        self.up_held
    }
    pub fn move_down(&self) -> bool {
        self.down_held
    }
    pub fn boost_held(&self) -> bool {
        self.boost_held
    }

    fn apply_key_binding(&mut self, key: &Key, pressed: bool) {
        if let Some(binding_key) = InputKeyBinding::from_event_key(key) {
            let actions: Vec<_> = self.bindings.actions_for_key(&binding_key).collect();
            for action in actions {
                self.update_action_state(action, pressed);
            }
        }
    }

    fn update_action_state(&mut self, action: InputAction, pressed: bool) {
        match action {
            InputAction::ToggleCameraMode => {
                if pressed && !self.toggle_held {
                    self.toggle_pressed = true;
                }
                self.toggle_held = pressed;
            }
            InputAction::Quit => {
                if pressed {
                    self.quit_requested = true;
                }
            }
            InputAction::CameraForward => self.forward_held = pressed,
            InputAction::CameraBackward => self.backward_held = pressed,
            InputAction::CameraLeft => self.left_held = pressed,
            InputAction::CameraRight => self.right_held = pressed,
            InputAction::CameraUp => self.up_held = pressed,
            InputAction::CameraDown => self.down_held = pressed,
            InputAction::CameraBoost => self.boost_held = pressed,
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::with_bindings(InputBindings::default())
    }
}

#[derive(Debug, Clone)]
struct InputBindings {
    key_to_actions: HashMap<InputKeyBinding, Vec<InputAction>>,
}

impl InputBindings {
    fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<InputConfigFile>(&contents) {
                Ok(config) => Self::from_config(config, &path.display().to_string()),
                Err(err) => {
                    log::warn!("Failed to parse {}: {err}. Falling back to default bindings.", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!("Failed to read {}: {err}. Falling back to default bindings.", path.display());
                Self::default()
            }
        }
    }

    fn from_config(config: InputConfigFile, origin: &str) -> Self {
        let overrides = config.into_overrides(origin);
        Self::with_overrides(overrides)
    }

    fn with_overrides(overrides: HashMap<InputAction, Vec<InputKeyBinding>>) -> Self {
        let mut action_map = Self::default_action_map();
        for (action, keys) in overrides {
            if keys.is_empty() {
                continue;
            }
            action_map.insert(action, keys);
        }
        Self::from_action_map(action_map)
    }

    fn default_action_map() -> HashMap<InputAction, Vec<InputKeyBinding>> {
        use InputAction::*;
        let mut map = HashMap::new();
        map.insert(CameraForward, vec![InputKeyBinding::character("w")]);
        map.insert(CameraBackward, vec![InputKeyBinding::character("s")]);
        map.insert(CameraLeft, vec![InputKeyBinding::character("a")]);
        map.insert(CameraRight, vec![InputKeyBinding::character("d")]);
        map.insert(CameraUp, vec![InputKeyBinding::character("e")]);
        map.insert(CameraDown, vec![InputKeyBinding::character("q")]);
        map.insert(CameraBoost, vec![InputKeyBinding::named(NamedKeyCode::Shift)]);
        map.insert(ToggleCameraMode, vec![InputKeyBinding::character("c")]);
        map.insert(Quit, vec![InputKeyBinding::named(NamedKeyCode::Escape)]);
        map
    }

    fn from_action_map(action_map: HashMap<InputAction, Vec<InputKeyBinding>>) -> Self {
        let mut key_to_actions: HashMap<InputKeyBinding, Vec<InputAction>> = HashMap::new();
        for (action, keys) in action_map {
            for key in keys {
                key_to_actions.entry(key).or_default().push(action);
            }
        }
        Self { key_to_actions }
    }

    fn actions_for_key(&self, key: &InputKeyBinding) -> impl Iterator<Item = InputAction> + '_ {
        self.key_to_actions.get(key).into_iter().flatten().copied()
    }
}

impl Default for InputBindings {
    fn default() -> Self {
        Self::from_action_map(Self::default_action_map())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InputKeyBinding {
    Character(String),
    Named(NamedKeyCode),
}

impl InputKeyBinding {
    fn character(ch: &str) -> Self {
        Self::Character(ch.to_lowercase())
    }

    fn named(named: NamedKeyCode) -> Self {
        Self::Named(named)
    }

    fn from_event_key(key: &Key) -> Option<Self> {
        match key {
            Key::Character(ch) => {
                let s = ch.to_string();
                if s.is_empty() {
                    None
                } else {
                    Some(Self::Character(s.to_lowercase()))
                }
            }
            Key::Named(named) => NamedKeyCode::from_named_key(named).map(Self::Named),
            _ => None,
        }
    }

    fn from_config_value(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if let Some(named) = NamedKeyCode::from_str(&normalized) {
            return Some(Self::Named(named));
        }
        if normalized.chars().count() == 1 {
            return Some(Self::Character(normalized));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NamedKeyCode {
    Shift,
    Escape,
    Tab,
}

impl NamedKeyCode {
    fn from_named_key(key: &NamedKey) -> Option<Self> {
        match key {
            NamedKey::Shift => Some(Self::Shift),
            NamedKey::Escape => Some(Self::Escape),
            NamedKey::Tab => Some(Self::Tab),
            _ => None,
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "shift" | "left_shift" | "right_shift" => Some(Self::Shift),
            "escape" | "esc" => Some(Self::Escape),
            "tab" => Some(Self::Tab),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InputAction {
    CameraForward,
    CameraBackward,
    CameraLeft,
    CameraRight,
    CameraUp,
    CameraDown,
    CameraBoost,
    ToggleCameraMode,
    Quit,
}

impl InputAction {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "camera_forward" => Some(Self::CameraForward),
            "camera_backward" => Some(Self::CameraBackward),
            "camera_left" => Some(Self::CameraLeft),
            "camera_right" => Some(Self::CameraRight),
            "camera_up" => Some(Self::CameraUp),
            "camera_down" => Some(Self::CameraDown),
            "camera_boost" => Some(Self::CameraBoost),
            "toggle_camera_mode" => Some(Self::ToggleCameraMode),
            "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputConfigFile {
    #[serde(default)]
    bindings: HashMap<String, Vec<String>>,
}

impl InputConfigFile {
    fn into_overrides(self, origin: &str) -> HashMap<InputAction, Vec<InputKeyBinding>> {
        let mut overrides = HashMap::new();
        for (action_name, keys) in self.bindings {
            let action_key = action_name.trim().to_lowercase();
            match InputAction::from_str(&action_key) {
                Some(action) => {
                    let mut parsed = Vec::new();
                    for key in keys {
                        match InputKeyBinding::from_config_value(&key) {
                            Some(binding) => parsed.push(binding),
                            None => log::warn!(
                                "{origin}: unknown key '{key}' for action '{action_name}', ignoring."
                            ),
                        }
                    }
                    if parsed.is_empty() {
                        log::warn!("{origin}: action '{action_name}' has no valid keys, keeping defaults.");
                        continue;
                    }
                    overrides.insert(action, parsed);
                }
                None => log::warn!("{origin}: unknown action '{action_name}', ignoring."),
            }
        }
        overrides
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key { key: Key, pressed: bool },
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    MouseButton { button: MouseButton, pressed: bool },
    CloseRequested,
    Other,
}

impl InputEvent {
    pub fn key(key: Key, pressed: bool) -> Self {
        InputEvent::Key { key, pressed }
    }

    pub fn character(ch: &str, pressed: bool) -> Self {
        InputEvent::Key { key: Key::Character(ch.into()), pressed }
    }

    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                InputEvent::Wheel { delta: d }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                InputEvent::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            WindowEvent::CloseRequested => InputEvent::CloseRequested,
            _ => InputEvent::Other,
        }
    }

    pub fn from_device_event(ev: &DeviceEvent) -> Self {
        match ev {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                InputEvent::MouseMove { dx: *dx as f32, dy: *dy as f32 }
            }
            _ => InputEvent::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_toggle_is_edge_triggered() {
        let mut input = Input::new();
        input.push(InputEvent::character("c", true));
        input.push(InputEvent::character("c", true));
        assert!(input.take_mode_toggle());
        assert!(!input.take_mode_toggle(), "repeat while held must not toggle again");
        input.push(InputEvent::character("c", false));
        input.push(InputEvent::character("C", true));
        assert!(input.take_mode_toggle());
    }

    #[test]
    fn look_delta_requires_right_button() {
        let mut input = Input::new();
        input.push(InputEvent::MouseMove { dx: 3.0, dy: -1.0 });
        assert_eq!(input.take_look_delta(), None);
        input.push(InputEvent::MouseButton { button: MouseButton::Right, pressed: true });
        input.push(InputEvent::MouseMove { dx: 2.0, dy: 1.0 });
        assert_eq!(input.take_look_delta(), Some((2.0, 1.0)));
    }

    #[test]
    fn overrides_replace_default_keys() {
        let config: InputConfigFile =
            serde_json::from_str(r#"{ "bindings": { "camera_forward": ["Up", "i"], "jump": ["space"] } }"#)
                .expect("parse bindings");
        let bindings = InputBindings::from_config(config, "test");
        let mut input = Input::with_bindings(bindings);
        input.push(InputEvent::character("w", true));
        assert!(!input.move_forward());
        input.push(InputEvent::character("i", true));
        assert!(input.move_forward());
        input.push(InputEvent::key(Key::Named(NamedKey::Escape), true));
        assert!(input.quit_requested());
    }

    #[test]
    fn unbound_named_keys_are_ignored() {
        let mut input = Input::new();
        input.push(InputEvent::key(Key::Named(NamedKey::Space), true));
        input.push(InputEvent::key(Key::Named(NamedKey::Control), true));
        assert!(!input.move_up() && !input.boost_held() && !input.quit_requested());
        assert_eq!(InputKeyBinding::from_config_value("space"), None);
        assert_eq!(InputKeyBinding::from_config_value("Esc"), Some(InputKeyBinding::Named(NamedKeyCode::Escape)));
    }

    #[test]
    fn window_events_map_to_input_events() {
        assert_eq!(InputEvent::from_window_event(&WindowEvent::CloseRequested), InputEvent::CloseRequested);
        assert_eq!(InputEvent::from_window_event(&WindowEvent::Focused(true)), InputEvent::Other);

        let motion = DeviceEvent::MouseMotion { delta: (3.0, -2.0) };
        let event = InputEvent::from_device_event(&motion);
        assert_eq!(event, InputEvent::MouseMove { dx: 3.0, dy: -2.0 });
        assert_eq!(InputEvent::from_device_event(&DeviceEvent::Added), InputEvent::Other);

        let mut input = Input::new();
        input.push(InputEvent::from_window_event(&WindowEvent::CloseRequested));
        assert!(input.quit_requested());
    }
}
