//! Loaders that populate the animation types from files on disk.

pub mod skeletal;

pub use skeletal::{load_skeleton_from_gltf, SkeletonImport};
