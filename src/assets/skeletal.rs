use crate::animation::{Animation, AnimationChannel, Bone, Skeleton};
use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::{ReadOutputs, Rotations};
use gltf::animation::{Interpolation, Property};
use std::collections::HashMap;
use std::path::Path;

/// glTF keyframe times are already seconds.
const GLTF_TICKS_PER_SECOND: f32 = 1.0;

pub struct SkeletonImport {
    pub name: String,
    pub skeleton: Skeleton,
    /// Clips with bone indices resolved against `skeleton`.
    pub animations: Vec<Animation>,
}

/// Imports the first skin of a glTF file as a [`Skeleton`] together with every animation targeting its joints.
pub fn load_skeleton_from_gltf(path: impl AsRef<Path>) -> Result<SkeletonImport> {
    let path_ref = path.as_ref();
    let (document, buffers, _) = gltf::import(path_ref)
        .with_context(|| format!("Failed to import GLTF skeleton from {}", path_ref.display()))?;

    let mut skins = document.skins();
    let skin =
        skins.next().ok_or_else(|| anyhow!("GLTF '{}' does not contain a skin", path_ref.display()))?;
    if skins.next().is_some() {
        log::warn!("GLTF '{}' contains multiple skins; only the first will be imported.", path_ref.display());
    }

    let skeleton_name = skin
        .name()
        .map(|s| s.to_string())
        .or_else(|| path_ref.file_stem().and_then(|stem| stem.to_str()).map(|stem| format!("{stem}_skeleton")))
        .unwrap_or_else(|| "skeleton".to_string());

    let joint_nodes: Vec<_> = skin.joints().collect();
    if joint_nodes.is_empty() {
        bail!("GLTF '{}' skin '{}' has no joints", path_ref.display(), skeleton_name);
    }

    let node_to_joint: HashMap<usize, usize> =
        joint_nodes.iter().enumerate().map(|(idx, node)| (node.index(), idx)).collect();

    let mut node_local: HashMap<usize, Mat4> = HashMap::new();
    let mut node_trs: HashMap<usize, (Vec3, Quat, Vec3)> = HashMap::new();
    let mut parent_of_node: HashMap<usize, usize> = HashMap::new();
    for node in document.nodes() {
        node_local.insert(node.index(), mat4_from_gltf(node.transform().matrix()));
        let (t, r, s) = node.transform().decomposed();
        node_trs.insert(
            node.index(),
            (Vec3::from_array(t), Quat::from_xyzw(r[0], r[1], r[2], r[3]), Vec3::from_array(s)),
        );
        for child in node.children() {
            parent_of_node.insert(child.index(), node.index());
        }
    }

    let skin_reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let mut inverse_bind = vec![Mat4::IDENTITY; joint_nodes.len()];
    if let Some(reader) = skin_reader.read_inverse_bind_matrices() {
        for (idx, matrix) in reader.enumerate() {
            if idx < inverse_bind.len() {
                inverse_bind[idx] = mat4_from_gltf(matrix);
            }
        }
    }

    let mut parent_by_joint: Vec<Option<usize>> = vec![None; joint_nodes.len()];
    for (parent_idx, node) in joint_nodes.iter().enumerate() {
        for child in node.children() {
            if let Some(&child_joint) = node_to_joint.get(&child.index()) {
                parent_by_joint[child_joint] = Some(parent_idx);
            }
        }
    }

    let mut bones = Vec::with_capacity(joint_nodes.len());
    let mut root_transform: Option<Mat4> = None;
    let mut world_cache: HashMap<usize, Mat4> = HashMap::new();
    for (index, node) in joint_nodes.iter().enumerate() {
        let local = node_local.get(&node.index()).copied().unwrap_or(Mat4::IDENTITY);
        let name = node.name().map(|n| n.to_string()).unwrap_or_else(|| format!("joint_{index}"));
        let parent = parent_by_joint[index];
        if parent.is_none() && root_transform.is_none() {
            // Non-joint ancestors of the skeleton root (armature nodes) become the root transform.
            root_transform = parent_of_node
                .get(&node.index())
                .map(|&parent_node| compute_world_matrix(parent_node, &node_local, &parent_of_node, &mut world_cache));
        }
        bones.push(Bone::new(name, parent).with_bind(local).with_offset(inverse_bind[index]));
    }

    let mut skeleton = Skeleton::new(bones)
        .with_context(|| format!("GLTF '{}' skin '{}' has an invalid joint hierarchy", path_ref.display(), skeleton_name))?;
    if let Some(transform) = root_transform {
        skeleton.set_root_transform(transform);
    }

    let mut animations: Vec<Animation> = Vec::new();
    for (anim_index, animation) in document.animations().enumerate() {
        let clip_name =
            animation.name().map(|n| n.to_string()).unwrap_or_else(|| format!("animation_{anim_index}"));

        let mut channel_builders: HashMap<usize, AnimationChannel> = HashMap::new();
        for channel in animation.channels() {
            let target_node = channel.target().node();
            let Some(joint_index) = node_to_joint.get(&target_node.index()).copied() else {
                continue;
            };

            match channel.sampler().interpolation() {
                Interpolation::Linear => {}
                Interpolation::Step => {
                    log::debug!(
                        "animation '{clip_name}' uses Step interpolation on node {}; importing as linear keys.",
                        target_node.index()
                    );
                }
                Interpolation::CubicSpline => {
                    log::warn!(
                        "animation '{clip_name}' uses CubicSpline interpolation; skipping channel (node {}).",
                        target_node.index()
                    );
                    continue;
                }
            }

            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            if times.is_empty() {
                continue;
            }
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            let bone_name = skeleton.bone(joint_index).map(|bone| bone.name.clone()).unwrap_or_default();
            let builder =
                channel_builders.entry(joint_index).or_insert_with(|| AnimationChannel::new(bone_name));
            match (channel.target().property(), outputs) {
                (Property::Translation, ReadOutputs::Translations(values)) => {
                    let values: Vec<Vec3> = values.map(Vec3::from_array).collect();
                    builder.set_position_keys(zip_keys(&clip_name, "translation", &times, values)?);
                }
                (Property::Scale, ReadOutputs::Scales(values)) => {
                    let values: Vec<Vec3> = values.map(Vec3::from_array).collect();
                    builder.set_scale_keys(zip_keys(&clip_name, "scale", &times, values)?);
                }
                (Property::Rotation, ReadOutputs::Rotations(rotations)) => {
                    let values = convert_rotations(rotations);
                    builder.set_rotation_keys(zip_keys(&clip_name, "rotation", &times, values)?);
                }
                _ => {}
            }
        }

        if channel_builders.is_empty() {
            continue;
        }
        let mut joint_order: Vec<usize> = channel_builders.keys().copied().collect();
        joint_order.sort_unstable();

        let mut clip = Animation::new(clip_name.as_str(), 0.0, GLTF_TICKS_PER_SECOND);
        let mut duration = 0.0_f32;
        for joint_index in joint_order {
            let Some(mut channel) = channel_builders.remove(&joint_index) else {
                continue;
            };
            duration = duration.max(channel.last_key_time());
            // Properties the clip leaves unanimated hold the joint's rest value.
            let node_index = joint_nodes[joint_index].index();
            let (translation, rotation, scale) =
                node_trs.get(&node_index).copied().unwrap_or((Vec3::ZERO, Quat::IDENTITY, Vec3::ONE));
            if channel.position_keys().is_empty() {
                channel.set_position_keys([(0.0, translation)]);
            }
            if channel.rotation_keys().is_empty() {
                channel.set_rotation_keys([(0.0, rotation)]);
            }
            if channel.scale_keys().is_empty() {
                channel.set_scale_keys([(0.0, scale)]);
            }
            clip.add_channel(channel);
        }
        let mut clip = clip.with_duration(duration);
        clip.resolve_bones(&skeleton);
        animations.push(clip);
    }

    log::info!(
        "Imported skeleton '{}' ({} bones, {} clips) from {}",
        skeleton_name,
        skeleton.bone_count(),
        animations.len(),
        path_ref.display()
    );
    Ok(SkeletonImport { name: skeleton_name, skeleton, animations })
}

fn zip_keys<T>(clip: &str, property: &str, times: &[f32], values: Vec<T>) -> Result<Vec<(f32, T)>> {
    if times.len() != values.len() {
        bail!(
            "Animation '{clip}' {property} channel time/value count mismatch ({} vs {})",
            times.len(),
            values.len()
        );
    }
    Ok(times.iter().copied().zip(values).collect())
}

fn convert_rotations(rotations: Rotations) -> Vec<Quat> {
    rotations
        .into_f32()
        .map(|components| Quat::from_xyzw(components[0], components[1], components[2], components[3]))
        .collect()
}

fn mat4_from_gltf(matrix: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&matrix)
}

fn compute_world_matrix(
    node_index: usize,
    node_local: &HashMap<usize, Mat4>,
    parent_map: &HashMap<usize, usize>,
    cache: &mut HashMap<usize, Mat4>,
) -> Mat4 {
    if let Some(world) = cache.get(&node_index) {
        return *world;
    }
    let mut chain = vec![node_index];
    let mut cursor = node_index;
    while let Some(&parent) = parent_map.get(&cursor) {
        if chain.contains(&parent) {
            break;
        }
        chain.push(parent);
        cursor = parent;
    }
    let mut world = Mat4::IDENTITY;
    for &node in chain.iter().rev() {
        world *= node_local.get(&node).copied().unwrap_or(Mat4::IDENTITY);
    }
    cache.insert(node_index, world);
    world
}
