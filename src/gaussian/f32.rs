use std::marker::Copy;

use bevy::prelude::*;
use bytemuck::{
    Pod,
    Zeroable,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::render::Texel;


pub type Position = [f32; 3];

pub fn position_texel(position: &Position) -> Texel {
    [
        position[0].to_bits(),
        position[1].to_bits(),
        position[2].to_bits(),
        0,
    ]
}

pub fn texel_position(texel: &Texel) -> Vec3 {
    Vec3::new(
        f32::from_bits(texel[0]),
        f32::from_bits(texel[1]),
        f32::from_bits(texel[2]),
    )
}


/// unit quaternion stored as `[w, x, y, z]`
#[derive(
    Clone,
    Debug,
    Copy,
    PartialEq,
    Reflect,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct Rotation {
    pub rotation: [f32; 4],
}

impl Default for Rotation {
    fn default() -> Self {
        Self { rotation: [1.0, 0.0, 0.0, 0.0] }
    }
}

impl From<[f32; 4]> for Rotation {
    fn from(rotation: [f32; 4]) -> Self {
        Self { rotation }
    }
}

impl From<Quat> for Rotation {
    fn from(quat: Quat) -> Self {
        Self { rotation: [quat.w, quat.x, quat.y, quat.z] }
    }
}

impl Rotation {
    pub fn quat(&self) -> Quat {
        let [w, x, y, z] = self.rotation;
        Quat::from_xyzw(x, y, z, w).normalize()
    }

    pub fn texel(&self) -> Texel {
        self.rotation.map(f32::to_bits)
    }

    pub fn from_texel(texel: &Texel) -> Self {
        Self { rotation: texel.map(f32::from_bits) }
    }
}


#[derive(
    Clone,
    Debug,
    Default,
    Copy,
    PartialEq,
    Reflect,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct ScaleOpacity {
    pub scale: [f32; 3],
    pub opacity: f32,
}

impl From<[f32; 4]> for ScaleOpacity {
    fn from(scale_opacity: [f32; 4]) -> Self {
        Self {
            scale: [
                scale_opacity[0],
                scale_opacity[1],
                scale_opacity[2],
            ],
            opacity: scale_opacity[3],
        }
    }
}

impl ScaleOpacity {
    pub fn texel(&self) -> Texel {
        [
            self.scale[0].to_bits(),
            self.scale[1].to_bits(),
            self.scale[2].to_bits(),
            self.opacity.to_bits(),
        ]
    }

    pub fn from_texel(texel: &Texel) -> Self {
        Self::from(texel.map(f32::from_bits))
    }
}
