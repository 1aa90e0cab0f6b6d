//! Skeletal animation: keyframe channels, clips, bone hierarchies and the playback controller.
//!
//! Matrices follow glam's column-vector convention. A channel's local transform is
//! `T * R * S`, a bone's model-space transform is `parent_global * local`, and the
//! skinning matrix handed to renderers is `global * offset`.

pub mod channel;
pub mod clip;
pub mod controller;
pub mod skeleton;

pub use channel::{AnimationChannel, AnimationKey};
pub use clip::{Animation, DEFAULT_TICKS_PER_SECOND};
pub use controller::{AnimationController, AnimationEvent, BlendState, PlaybackState};
pub use skeleton::{Bone, Skeleton, SkeletonError};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

/// A skeleton owned by one model and posed by any number of controllers on the same thread.
pub type SharedSkeleton = Rc<RefCell<Skeleton>>;

/// Column-major bone matrix laid out for upload into a storage or uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BoneMatrix(pub [f32; 16]);

impl From<Mat4> for BoneMatrix {
    fn from(matrix: Mat4) -> Self {
        Self(matrix.to_cols_array())
    }
}

pub fn palette_bytes(palette: &[BoneMatrix]) -> &[u8] {
    bytemuck::cast_slice(palette)
}

/// Interpolates two rigid transforms component-wise: scale and translation linearly, rotation by slerp.
pub fn blend_transforms(from: Mat4, to: Mat4, factor: f32) -> Mat4 {
    let t = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 1.0 };
    let (from_scale, from_rotation, from_translation) = decompose(from);
    let (to_scale, to_rotation, to_translation) = decompose(to);
    Mat4::from_scale_rotation_translation(
        from_scale.lerp(to_scale, t),
        from_rotation.slerp(to_rotation, t).normalize(),
        from_translation.lerp(to_translation, t),
    )
}

fn decompose(matrix: Mat4) -> (Vec3, Quat, Vec3) {
    let translation = matrix.w_axis.truncate();
    if !matrix.is_finite() || matrix.determinant().abs() <= f32::EPSILON {
        // Collapsed axes carry no usable rotation.
        let scale = Vec3::new(
            matrix.x_axis.truncate().length(),
            matrix.y_axis.truncate().length(),
            matrix.z_axis.truncate().length(),
        );
        return (scale, Quat::IDENTITY, translation);
    }
    let (scale, rotation, _) = matrix.to_scale_rotation_translation();
    (scale, rotation.normalize(), translation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn blend_endpoints_reproduce_inputs() {
        let from = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let to = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(FRAC_PI_2),
            Vec3::new(0.0, 3.0, 0.0),
        );
        assert!(blend_transforms(from, to, 0.0).abs_diff_eq(from, 1e-5));
        assert!(blend_transforms(from, to, 1.0).abs_diff_eq(to, 1e-5));
    }

    #[test]
    fn blend_midpoint_stays_rigid() {
        let from = Mat4::IDENTITY;
        let to = Mat4::from_rotation_z(FRAC_PI_2);
        let mid = blend_transforms(from, to, 0.5);
        let (scale, rotation, _) = mid.to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::ONE, 1e-5));
        assert!(rotation.angle_between(Quat::from_rotation_z(FRAC_PI_2 * 0.5)) < 1e-4);
    }

    #[test]
    fn degenerate_matrices_do_not_produce_nan() {
        let blended = blend_transforms(Mat4::ZERO, Mat4::IDENTITY, 0.5);
        assert!(blended.is_finite());
    }
}
