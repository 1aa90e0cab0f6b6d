use glam::{Mat4, Quat, Vec3};
use std::cmp::Ordering;

/// A single keyframe. `time` is measured in clip ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationKey<T> {
    pub time: f32,
    pub value: T,
}

impl<T> AnimationKey<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Keyframe tracks for one bone. Each track is sorted by time; a missing track falls back to identity.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    pub bone_name: String,
    /// Filled in when the owning clip is resolved against a skeleton.
    pub bone_index: Option<usize>,
    position_keys: Vec<AnimationKey<Vec3>>,
    rotation_keys: Vec<AnimationKey<Quat>>,
    scale_keys: Vec<AnimationKey<Vec3>>,
}

impl AnimationChannel {
    pub fn new(bone_name: impl Into<String>) -> Self {
        Self {
            bone_name: bone_name.into(),
            bone_index: None,
            position_keys: Vec::new(),
            rotation_keys: Vec::new(),
            scale_keys: Vec::new(),
        }
    }

    pub fn with_bone_index(mut self, index: usize) -> Self {
        self.bone_index = Some(index);
        self
    }

    pub fn with_position_keys(mut self, keys: impl IntoIterator<Item = (f32, Vec3)>) -> Self {
        self.set_position_keys(keys);
        self
    }

    pub fn with_rotation_keys(mut self, keys: impl IntoIterator<Item = (f32, Quat)>) -> Self {
        self.set_rotation_keys(keys);
        self
    }

    pub fn with_scale_keys(mut self, keys: impl IntoIterator<Item = (f32, Vec3)>) -> Self {
        self.set_scale_keys(keys);
        self
    }

    pub fn set_position_keys(&mut self, keys: impl IntoIterator<Item = (f32, Vec3)>) {
        self.position_keys = build_keys(&self.bone_name, keys);
    }

    pub fn set_rotation_keys(&mut self, keys: impl IntoIterator<Item = (f32, Quat)>) {
        let normalized = keys.into_iter().map(|(time, rotation)| (time, normalize_rotation(rotation)));
        self.rotation_keys = build_keys(&self.bone_name, normalized);
    }

    pub fn set_scale_keys(&mut self, keys: impl IntoIterator<Item = (f32, Vec3)>) {
        self.scale_keys = build_keys(&self.bone_name, keys);
    }

    pub fn position_keys(&self) -> &[AnimationKey<Vec3>] {
        &self.position_keys
    }

    pub fn rotation_keys(&self) -> &[AnimationKey<Quat>] {
        &self.rotation_keys
    }

    pub fn scale_keys(&self) -> &[AnimationKey<Vec3>] {
        &self.scale_keys
    }

    /// Time of the latest key across all three tracks.
    pub fn last_key_time(&self) -> f32 {
        let last = |times: Option<f32>| times.unwrap_or(0.0);
        last(self.position_keys.last().map(|k| k.time))
            .max(last(self.rotation_keys.last().map(|k| k.time)))
            .max(last(self.scale_keys.last().map(|k| k.time)))
    }

    pub fn interpolate_position(&self, time: f32) -> Vec3 {
        sample_track(&self.position_keys, time, Vec3::ZERO, |a, b, t| a.lerp(b, t))
    }

    pub fn interpolate_rotation(&self, time: f32) -> Quat {
        sample_track(&self.rotation_keys, time, Quat::IDENTITY, |a, b, t| a.slerp(b, t).normalize())
    }

    pub fn interpolate_scale(&self, time: f32) -> Vec3 {
        sample_track(&self.scale_keys, time, Vec3::ONE, |a, b, t| a.lerp(b, t))
    }

    /// Local bone transform at `time` (ticks): scale, then rotation, then translation.
    pub fn local_transform(&self, time: f32) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.interpolate_scale(time),
            self.interpolate_rotation(time),
            self.interpolate_position(time),
        )
    }
}

/// Index of the key pair straddling `time`, or `None` once `time` is at or past the last key.
pub(crate) fn find_key_index<T>(keys: &[AnimationKey<T>], time: f32) -> Option<usize> {
    keys.windows(2).position(|pair| time < pair[1].time)
}

fn sample_track<T: Copy>(
    keys: &[AnimationKey<T>],
    time: f32,
    default: T,
    interpolate: impl Fn(T, T, f32) -> T,
) -> T {
    match keys {
        [] => default,
        [only] => only.value,
        [.., last] => {
            let Some(index) = find_key_index(keys, time) else {
                return last.value;
            };
            let start = &keys[index];
            let end = &keys[index + 1];
            let span = end.time - start.time;
            if span <= f32::EPSILON {
                return start.value;
            }
            let factor = ((time - start.time) / span).clamp(0.0, 1.0);
            interpolate(start.value, end.value, factor)
        }
    }
}

fn build_keys<T>(bone: &str, raw: impl IntoIterator<Item = (f32, T)>) -> Vec<AnimationKey<T>> {
    let mut keys: Vec<AnimationKey<T>> = Vec::new();
    for (time, value) in raw {
        if !time.is_finite() {
            log::warn!("bone '{bone}': dropping keyframe with non-finite time");
            continue;
        }
        keys.push(AnimationKey::new(time, value));
    }
    // Stable sort keeps insertion order for equal times; the later duplicate then wins below.
    keys.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(Ordering::Equal));
    let mut deduped: Vec<AnimationKey<T>> = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(last) = deduped.last_mut() {
            if (key.time - last.time).abs() <= f32::EPSILON {
                *last = key;
                continue;
            }
        }
        deduped.push(key);
    }
    deduped
}

fn normalize_rotation(rotation: Quat) -> Quat {
    if rotation.length_squared() > 0.0 {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn empty_tracks_fall_back_to_identity() {
        let channel = AnimationChannel::new("hip");
        assert_eq!(channel.interpolate_position(3.0), Vec3::ZERO);
        assert_eq!(channel.interpolate_rotation(3.0), Quat::IDENTITY);
        assert_eq!(channel.interpolate_scale(3.0), Vec3::ONE);
        assert_eq!(channel.local_transform(3.0), Mat4::IDENTITY);
    }

    #[test]
    fn unsorted_keys_are_ordered_and_deduplicated() {
        let channel = AnimationChannel::new("arm").with_position_keys([
            (2.0, Vec3::X),
            (0.0, Vec3::ZERO),
            (2.0, Vec3::Y),
            (f32::NAN, Vec3::Z),
        ]);
        let keys = channel.position_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].time, 0.0);
        assert_eq!(keys[1].value, Vec3::Y, "later duplicate wins");
    }

    #[test]
    fn key_index_lookup() {
        let keys = [AnimationKey::new(0.0, 0.0), AnimationKey::new(1.0, 1.0), AnimationKey::new(2.0, 2.0)];
        assert_eq!(find_key_index(&keys, -1.0), Some(0));
        assert_eq!(find_key_index(&keys, 0.0), Some(0));
        assert_eq!(find_key_index(&keys, 1.0), Some(1));
        assert_eq!(find_key_index(&keys, 1.5), Some(1));
        assert_eq!(find_key_index(&keys, 2.0), None);
    }

    #[test]
    fn zero_length_rotation_keys_become_identity() {
        let channel = AnimationChannel::new("neck")
            .with_rotation_keys([(0.0, Quat::from_xyzw(0.0, 0.0, 0.0, 0.0))]);
        assert_eq!(channel.interpolate_rotation(0.0), Quat::IDENTITY);
    }

    #[test]
    fn rotation_midpoint_uses_slerp() {
        let end = Quat::from_rotation_z(FRAC_PI_2);
        let channel = AnimationChannel::new("wrist").with_rotation_keys([(0.0, Quat::IDENTITY), (1.0, end)]);
        let mid = channel.interpolate_rotation(0.5);
        let expected = Quat::from_rotation_z(FRAC_PI_2 * 0.5);
        assert!(mid.dot(expected).abs() > 1.0 - 1e-5);
        assert!((mid.length() - 1.0).abs() < 1e-5);
    }
}
