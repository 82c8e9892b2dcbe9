use std::collections::HashMap;

use bevy::prelude::*;


/// read-only view of the transform system, polled every frame
pub trait SceneGraph {
    fn world_transform(&self, node: Entity) -> Option<Mat4>;

    fn tint(&self, _node: Entity) -> Vec4 {
        Vec4::ONE
    }
}


/// world matrices and tints captured once per frame
#[derive(Clone, Debug, Default)]
pub struct TransformSnapshot {
    transforms: HashMap<Entity, Mat4>,
    tints: HashMap<Entity, Vec4>,
}

impl TransformSnapshot {
    pub fn clear(&mut self) {
        self.transforms.clear();
        self.tints.clear();
    }

    pub fn set_transform(&mut self, node: Entity, world: Mat4) {
        self.transforms.insert(node, world);
    }

    pub fn set_tint(&mut self, node: Entity, tint: Vec4) {
        self.tints.insert(node, tint);
    }

    pub fn with_transform(mut self, node: Entity, world: Mat4) -> Self {
        self.set_transform(node, world);
        self
    }
}

impl SceneGraph for TransformSnapshot {
    fn world_transform(&self, node: Entity) -> Option<Mat4> {
        self.transforms.get(&node).copied()
    }

    fn tint(&self, node: Entity) -> Vec4 {
        self.tints.get(&node).copied().unwrap_or(Vec4::ONE)
    }
}
