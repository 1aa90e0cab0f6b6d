use glam::Mat4;
use smallvec::SmallVec;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkeletonError {
    #[error("bone name '{0}' is used more than once")]
    DuplicateBoneName(String),
    #[error("bone '{bone}' references parent {parent}, but the skeleton only has {count} bones")]
    ParentOutOfRange { bone: String, parent: usize, count: usize },
    #[error("bone '{0}' is its own ancestor")]
    Cycle(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub children: SmallVec<[u32; 4]>,
    /// Mesh space to bone space.
    pub offset_matrix: Mat4,
    pub bind_matrix: Mat4,
    /// Local transform written by animation before each composition pass.
    pub current_matrix: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: SmallVec::new(),
            offset_matrix: Mat4::IDENTITY,
            bind_matrix: Mat4::IDENTITY,
            current_matrix: Mat4::IDENTITY,
        }
    }

    pub fn with_offset(mut self, offset: Mat4) -> Self {
        self.offset_matrix = offset;
        self
    }

    /// Sets the bind pose and starts the bone at it.
    pub fn with_bind(mut self, bind: Mat4) -> Self {
        self.bind_matrix = bind;
        self.current_matrix = bind;
        self
    }
}

/// Bone forest. Indices handed out by [`Skeleton::new`] and [`Skeleton::add_bone`] never change.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    root_transform: Mat4,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self { bones: Vec::new(), name_to_index: HashMap::new(), root_transform: Mat4::IDENTITY }
    }
}

impl Skeleton {
    /// Validates the hierarchy and takes ownership of the bones. Child lists are rebuilt from parent links.
    pub fn new(bones: Vec<Bone>) -> Result<Self, SkeletonError> {
        let count = bones.len();
        let mut name_to_index = HashMap::with_capacity(count);
        for (index, bone) in bones.iter().enumerate() {
            if name_to_index.insert(bone.name.clone(), index).is_some() {
                return Err(SkeletonError::DuplicateBoneName(bone.name.clone()));
            }
            if let Some(parent) = bone.parent {
                if parent >= count {
                    return Err(SkeletonError::ParentOutOfRange { bone: bone.name.clone(), parent, count });
                }
            }
        }
        for (index, bone) in bones.iter().enumerate() {
            let mut cursor = bone.parent;
            let mut depth = 0usize;
            while let Some(parent) = cursor {
                depth += 1;
                if parent == index || depth > count {
                    return Err(SkeletonError::Cycle(bone.name.clone()));
                }
                cursor = bones[parent].parent;
            }
        }

        let mut bones = bones;
        for bone in bones.iter_mut() {
            bone.children.clear();
        }
        for index in 0..count {
            if let Some(parent) = bones[index].parent {
                bones[parent].children.push(index as u32);
            }
        }
        Ok(Self { bones, name_to_index, root_transform: Mat4::IDENTITY })
    }

    /// Appends a bone whose parent (if any) already exists, so the hierarchy stays acyclic.
    pub fn add_bone(&mut self, mut bone: Bone) -> Result<usize, SkeletonError> {
        let index = self.bones.len();
        if self.name_to_index.contains_key(&bone.name) {
            return Err(SkeletonError::DuplicateBoneName(bone.name));
        }
        if let Some(parent) = bone.parent {
            if parent >= index {
                return Err(SkeletonError::ParentOutOfRange { bone: bone.name, parent, count: index });
            }
            self.bones[parent].children.push(index as u32);
        }
        bone.children.clear();
        self.name_to_index.insert(bone.name.clone(), index);
        self.bones.push(bone);
        Ok(index)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones.iter().enumerate().filter(|(_, bone)| bone.parent.is_none()).map(|(index, _)| index)
    }

    /// Writes a bone's local transform. Returns false for an unknown index.
    pub fn set_bone_pose(&mut self, index: usize, transform: Mat4) -> bool {
        match self.bones.get_mut(index) {
            Some(bone) => {
                bone.current_matrix = transform;
                true
            }
            None => false,
        }
    }

    /// Puts every bone back at its bind pose.
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.current_matrix = bone.bind_matrix;
        }
    }

    pub fn set_root_transform(&mut self, transform: Mat4) {
        self.root_transform = transform;
    }

    pub fn root_transform(&self) -> Mat4 {
        self.root_transform
    }

    /// Final skinning matrices (`global * offset`) for the current pose, indexed like the bones.
    pub fn calculate_bone_transforms(&self, out: &mut Vec<Mat4>) {
        out.clear();
        out.resize(self.bones.len(), Mat4::IDENTITY);
        self.walk(|index, global| out[index] = global * self.bones[index].offset_matrix);
    }

    /// Model-space transform of every bone for the current pose.
    pub fn calculate_global_transforms(&self, out: &mut Vec<Mat4>) {
        out.clear();
        out.resize(self.bones.len(), Mat4::IDENTITY);
        self.walk(|index, global| out[index] = global);
    }

    // Depth-first pre-order walk from every root, parents always visited before their children.
    fn walk(&self, mut visit: impl FnMut(usize, Mat4)) {
        let mut stack: Vec<(usize, Mat4)> = Vec::with_capacity(self.bones.len());
        for root in self.roots() {
            stack.push((root, self.root_transform));
            while let Some((index, parent_global)) = stack.pop() {
                let Some(bone) = self.bones.get(index) else {
                    continue;
                };
                let global = parent_global * bone.current_matrix;
                visit(index, global);
                for &child in bone.children.iter().rev() {
                    stack.push((child as usize, global));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn chain() -> Skeleton {
        Skeleton::new(vec![
            Bone::new("root", None),
            Bone::new("spine", Some(0)).with_bind(Mat4::from_translation(Vec3::Y)),
            Bone::new("head", Some(1)).with_bind(Mat4::from_translation(Vec3::Y)),
        ])
        .expect("valid chain")
    }

    #[test]
    fn children_are_rebuilt_from_parents() {
        let skeleton = chain();
        assert_eq!(skeleton.bone(0).map(|b| b.children.as_slice()), Some(&[1u32][..]));
        assert_eq!(skeleton.bone(1).map(|b| b.children.as_slice()), Some(&[2u32][..]));
        assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(skeleton.find_bone_index("head"), Some(2));
        assert_eq!(skeleton.find_bone_index("tail"), None);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut a = Bone::new("a", Some(1));
        a.children.push(1);
        let result = Skeleton::new(vec![a, Bone::new("b", Some(0))]);
        assert_eq!(result, Err(SkeletonError::Cycle("a".to_string())));
        let self_parent = Skeleton::new(vec![Bone::new("loop", Some(0))]);
        assert!(matches!(self_parent, Err(SkeletonError::Cycle(_))));
    }

    #[test]
    fn bad_parents_and_duplicate_names_are_rejected() {
        let out_of_range = Skeleton::new(vec![Bone::new("a", Some(4))]);
        assert!(matches!(out_of_range, Err(SkeletonError::ParentOutOfRange { parent: 4, .. })));
        let duplicate = Skeleton::new(vec![Bone::new("a", None), Bone::new("a", None)]);
        assert_eq!(duplicate, Err(SkeletonError::DuplicateBoneName("a".to_string())));
    }

    #[test]
    fn add_bone_links_parent() {
        let mut skeleton = Skeleton::default();
        let root = skeleton.add_bone(Bone::new("root", None)).expect("root");
        let child = skeleton.add_bone(Bone::new("child", Some(root))).expect("child");
        assert_eq!(child, 1);
        assert_eq!(skeleton.bone(root).map(|b| b.children.to_vec()), Some(vec![1]));
        assert!(skeleton.add_bone(Bone::new("orphan", Some(7))).is_err());
        assert!(skeleton.add_bone(Bone::new("child", None)).is_err());
        assert_eq!(skeleton.bone_count(), 2);
    }

    #[test]
    fn composition_accumulates_down_the_chain() {
        let mut skeleton = chain();
        let mut globals = Vec::new();
        skeleton.calculate_global_transforms(&mut globals);
        assert!((globals[2].w_axis.truncate() - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);

        skeleton.set_root_transform(Mat4::from_translation(Vec3::X));
        skeleton.calculate_global_transforms(&mut globals);
        assert!((globals[2].w_axis.truncate() - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
        assert!(!skeleton.set_bone_pose(9, Mat4::IDENTITY));
    }
}
