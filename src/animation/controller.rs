use super::clip::Animation;
use super::{blend_transforms, BoneMatrix, SharedSkeleton};
use glam::Mat4;
use std::collections::HashMap;
use std::fmt;

// Blend progress within this many seconds of the blend time counts as complete.
const BLEND_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Cross-fade from a pose snapshot toward the current clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub previous_animation: Option<usize>,
    pub elapsed: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationEvent {
    Started { clip: String },
    Finished { clip: String },
    BlendCompleted { clip: String },
}

impl fmt::Display for AnimationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimationEvent::Started { clip } => write!(f, "Started clip={clip}"),
            AnimationEvent::Finished { clip } => write!(f, "Finished clip={clip}"),
            AnimationEvent::BlendCompleted { clip } => write!(f, "BlendCompleted clip={clip}"),
        }
    }
}

/// Plays clips against a shared skeleton and produces final bone matrices.
pub struct AnimationController {
    skeleton: Option<SharedSkeleton>,
    animations: Vec<Animation>,
    name_to_index: HashMap<String, usize>,
    current: Option<usize>,
    current_time: f32,
    state: PlaybackState,
    looping: bool,
    blending_enabled: bool,
    blend_time: f32,
    blend: Option<BlendState>,
    local_poses: Vec<Mat4>,
    previous_poses: Vec<Mat4>,
    bone_transforms: Vec<Mat4>,
    events: Vec<AnimationEvent>,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationController {
    pub fn new() -> Self {
        Self {
            skeleton: None,
            animations: Vec::new(),
            name_to_index: HashMap::new(),
            current: None,
            current_time: 0.0,
            state: PlaybackState::Stopped,
            looping: true,
            blending_enabled: true,
            blend_time: 0.5,
            blend: None,
            local_poses: Vec::new(),
            previous_poses: Vec::new(),
            bone_transforms: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Binds the controller to a skeleton. Returns false for a skeleton without bones.
    pub fn initialize(&mut self, skeleton: SharedSkeleton) -> bool {
        {
            let bound = skeleton.borrow();
            if bound.is_empty() {
                log::warn!("animation controller: refusing to bind an empty skeleton");
                return false;
            }
            for animation in &mut self.animations {
                animation.resolve_bones(&bound);
            }
            self.local_poses = bound.bones().iter().map(|bone| bone.bind_matrix).collect();
            self.previous_poses.clear();
            bound.calculate_bone_transforms(&mut self.bone_transforms);
        }
        self.skeleton = Some(skeleton);
        self.blend = None;
        true
    }

    /// Registers a clip, replacing any clip with the same name. Returns its index.
    pub fn add_animation(&mut self, mut animation: Animation) -> usize {
        if let Some(skeleton) = &self.skeleton {
            animation.resolve_bones(&skeleton.borrow());
        }
        if let Some(&index) = self.name_to_index.get(animation.name()) {
            log::debug!("animation controller: replacing clip '{}'", animation.name());
            self.animations[index] = animation;
            return index;
        }
        let index = self.animations.len();
        self.name_to_index.insert(animation.name().to_string(), index);
        self.animations.push(animation);
        index
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.name_to_index.get(name).map(|&index| &self.animations[index])
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.animations.iter().map(Animation::name)
    }

    /// Starts `name` from time zero. Switching clips while one is active cross-fades from the current pose;
    /// replaying the active clip restarts it without a blend.
    pub fn play_animation(&mut self, name: &str, looping: bool) -> bool {
        let Some(&index) = self.name_to_index.get(name) else {
            log::warn!("animation controller: unknown clip '{name}'");
            return false;
        };

        let switching = self.current.is_some_and(|current| current != index);
        if switching {
            let active = self.state != PlaybackState::Stopped;
            if self.blending_enabled && self.blend_time > 0.0 && active && !self.local_poses.is_empty() {
                self.previous_poses.clone_from(&self.local_poses);
                self.blend = Some(BlendState { previous_animation: self.current, elapsed: 0.0 });
            } else {
                self.blend = None;
            }
        } else if self.current.is_none() {
            self.blend = None;
        }

        self.current = Some(index);
        self.current_time = 0.0;
        self.state = PlaybackState::Playing;
        self.looping = looping;
        log::debug!("animation controller: playing '{name}' (looping: {looping})");
        self.events.push(AnimationEvent::Started { clip: name.to_string() });
        true
    }

    pub fn stop_animation(&mut self) {
        self.state = PlaybackState::Stopped;
        self.current_time = 0.0;
        self.blend = None;
    }

    pub fn pause_animation(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume_animation(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    pub fn update(&mut self, dt: f32) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let (Some(shared), Some(index)) = (self.skeleton.clone(), self.current) else {
            return;
        };
        let Some(clip) = self.animations.get(index) else {
            return;
        };
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        let duration = clip.duration_seconds();
        let mut finished = false;
        self.current_time += dt;
        if duration <= 0.0 {
            self.current_time = 0.0;
            finished = !self.looping;
        } else if self.current_time >= duration {
            if self.looping {
                self.current_time = self.current_time.rem_euclid(duration);
            } else {
                self.current_time = duration;
                finished = true;
            }
        }

        let mut skeleton = shared.borrow_mut();
        self.local_poses.clear();
        self.local_poses.extend(skeleton.bones().iter().map(|bone| bone.bind_matrix));
        clip.evaluate(self.current_time, self.looping, &mut self.local_poses);

        let blend_time = self.blend_time;
        let blend_elapsed = self.blend.as_mut().map(|blend| {
            blend.elapsed = (blend.elapsed + dt).min(blend_time);
            blend.elapsed
        });
        if let Some(elapsed) = blend_elapsed {
            if elapsed >= blend_time - BLEND_EPSILON {
                self.blend = None;
                self.events.push(AnimationEvent::BlendCompleted { clip: clip.name().to_string() });
            } else {
                let factor = elapsed / blend_time;
                for (pose, previous) in self.local_poses.iter_mut().zip(&self.previous_poses) {
                    *pose = blend_transforms(*previous, *pose, factor);
                }
            }
        }

        for (bone_index, pose) in self.local_poses.iter().enumerate() {
            skeleton.set_bone_pose(bone_index, *pose);
        }
        skeleton.calculate_bone_transforms(&mut self.bone_transforms);

        if finished {
            self.state = PlaybackState::Stopped;
            log::debug!("animation controller: '{}' finished", clip.name());
            self.events.push(AnimationEvent::Finished { clip: clip.name().to_string() });
        }
    }

    pub fn set_blend_mode(&mut self, enabled: bool) {
        self.blending_enabled = enabled;
        if !enabled {
            self.blend = None;
        }
    }

    /// Negative or non-finite values disable cross-fading.
    pub fn set_blend_time(&mut self, seconds: f32) {
        self.blend_time = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    }

    pub fn blend_time(&self) -> f32 {
        self.blend_time
    }

    pub fn is_blending_enabled(&self) -> bool {
        self.blending_enabled
    }

    pub fn is_blending(&self) -> bool {
        self.blend.is_some()
    }

    pub fn blend_state(&self) -> Option<BlendState> {
        self.blend
    }

    /// Clip being faded out, if a blend is in progress.
    pub fn previous_animation(&self) -> Option<usize> {
        self.blend.and_then(|blend| blend.previous_animation)
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current.and_then(|index| self.animations.get(index)).map(Animation::name)
    }

    pub fn current_animation_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn skeleton(&self) -> Option<&SharedSkeleton> {
        self.skeleton.as_ref()
    }

    /// Local pose of every bone after the last update, blended when a cross-fade is active.
    pub fn local_poses(&self) -> &[Mat4] {
        &self.local_poses
    }

    /// Final skinning matrices, indexed like the bound skeleton's bones.
    pub fn bone_transforms(&self) -> &[Mat4] {
        &self.bone_transforms
    }

    pub fn palette(&self) -> Vec<BoneMatrix> {
        self.bone_transforms.iter().map(|matrix| BoneMatrix::from(*matrix)).collect()
    }

    /// Takes the queued state-change events. Hosts drain this after every update.
    pub fn drain_events(&mut self) -> Vec<AnimationEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drops the skeleton binding and every registered clip.
    pub fn shutdown(&mut self) {
        self.stop_animation();
        self.skeleton = None;
        self.animations.clear();
        self.name_to_index.clear();
        self.current = None;
        self.local_poses.clear();
        self.previous_poses.clear();
        self.bone_transforms.clear();
        self.events.clear();
    }
}
