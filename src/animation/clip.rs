use super::channel::AnimationChannel;
use super::skeleton::Skeleton;
use glam::Mat4;

/// Ticks per second assumed when a clip does not carry a usable rate.
pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

/// A named clip: one channel per animated bone, timed in ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    name: String,
    duration: f32,
    ticks_per_second: f32,
    channels: Vec<AnimationChannel>,
}

impl Animation {
    pub fn new(name: impl Into<String>, duration: f32, ticks_per_second: f32) -> Self {
        let name = name.into();
        let ticks_per_second = if ticks_per_second.is_finite() && ticks_per_second > 0.0 {
            ticks_per_second
        } else {
            log::warn!(
                "animation '{name}': ticks per second {ticks_per_second} is unusable; using {DEFAULT_TICKS_PER_SECOND}"
            );
            DEFAULT_TICKS_PER_SECOND
        };
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        Self { name, duration, ticks_per_second, channels: Vec::new() }
    }

    /// Replaces the length in ticks, e.g. once a loader knows the last keyframe time.
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_channel(mut self, channel: AnimationChannel) -> Self {
        self.add_channel(channel);
        self
    }

    pub fn add_channel(&mut self, channel: AnimationChannel) {
        self.channels.push(channel);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in ticks.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn ticks_per_second(&self) -> f32 {
        self.ticks_per_second
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration / self.ticks_per_second
    }

    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }

    pub fn channel(&self, bone_name: &str) -> Option<&AnimationChannel> {
        self.channels.iter().find(|channel| channel.bone_name == bone_name)
    }

    /// Fills every channel's bone index by name. Returns how many channels resolved.
    pub fn resolve_bones(&mut self, skeleton: &Skeleton) -> usize {
        let mut resolved = 0;
        for channel in &mut self.channels {
            channel.bone_index = skeleton.find_bone_index(&channel.bone_name);
            match channel.bone_index {
                Some(_) => resolved += 1,
                None => log::warn!(
                    "animation '{}': no bone named '{}' in skeleton; channel ignored",
                    self.name,
                    channel.bone_name
                ),
            }
        }
        resolved
    }

    /// Converts playback seconds to clip ticks. Looping wraps into `[0, duration)`, otherwise clamps.
    pub fn ticks_at(&self, seconds: f32, looping: bool) -> f32 {
        if self.duration <= 0.0 || !seconds.is_finite() {
            return 0.0;
        }
        let ticks = seconds * self.ticks_per_second;
        if looping {
            ticks.rem_euclid(self.duration)
        } else {
            ticks.clamp(0.0, self.duration)
        }
    }

    /// Writes local transforms for the bones this clip animates. Other entries are left untouched,
    /// as are channels whose bone index is unresolved or out of range.
    pub fn evaluate(&self, seconds: f32, looping: bool, local_poses: &mut [Mat4]) {
        let ticks = self.ticks_at(seconds, looping);
        for channel in &self.channels {
            let Some(index) = channel.bone_index else {
                continue;
            };
            let Some(pose) = local_poses.get_mut(index) else {
                log::debug!(
                    "animation '{}': channel '{}' targets bone {index} outside the pose",
                    self.name,
                    channel.bone_name
                );
                continue;
            };
            *pose = channel.local_transform(ticks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Bone;
    use glam::Vec3;

    fn slide() -> Animation {
        Animation::new("slide", 50.0, 25.0).with_channel(
            AnimationChannel::new("hip").with_position_keys([(0.0, Vec3::ZERO), (50.0, Vec3::new(10.0, 0.0, 0.0))]),
        )
    }

    #[test]
    fn ticks_wrap_or_clamp() {
        let clip = slide();
        assert!((clip.duration_seconds() - 2.0).abs() < 1e-6);
        assert!((clip.ticks_at(2.5, true) - 12.5).abs() < 1e-4);
        assert!((clip.ticks_at(2.5, false) - 50.0).abs() < 1e-6);
        assert_eq!(Animation::new("empty", 0.0, 30.0).ticks_at(4.0, true), 0.0);
    }

    #[test]
    fn bad_rate_falls_back() {
        let clip = Animation::new("still", 10.0, 0.0);
        assert_eq!(clip.ticks_per_second(), DEFAULT_TICKS_PER_SECOND);
    }

    #[test]
    fn evaluate_skips_unresolved_and_out_of_range() {
        let mut clip = slide().with_channel(AnimationChannel::new("ghost"));
        let skeleton = Skeleton::new(vec![Bone::new("hip", None)]).expect("skeleton");
        assert_eq!(clip.resolve_bones(&skeleton), 1);
        clip.add_channel(AnimationChannel::new("stale").with_bone_index(9));

        let mut poses = vec![Mat4::IDENTITY; 1];
        clip.evaluate(1.0, true, &mut poses);
        assert!((poses[0].w_axis.truncate() - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
    }
}
