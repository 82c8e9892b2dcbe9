use half::f16;

use bevy::prelude::*;

use crate::{
    gaussian::{
        f32::texel_position,
        settings::WorkBufferFormat,
    },
    render::Texel,
};


#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplatShape {
    Covariance([f32; 6]),
    RotationScale {
        rotation: Quat,
        scale: Vec3,
    },
}

/// one decoded work-buffer entry, split over the four color attachments
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkBufferSplat {
    pub color: Vec4,
    pub center: Vec3,
    pub shape: SplatShape,
}

impl WorkBufferSplat {
    pub fn color_texel(color: Vec4) -> Texel {
        [
            pack_half2(color.x, color.y),
            pack_half2(color.z, color.w),
            0,
            0,
        ]
    }

    pub fn texels(&self) -> [Texel; 4] {
        let center = [
            self.center.x.to_bits(),
            self.center.y.to_bits(),
            self.center.z.to_bits(),
            0,
        ];

        let (shape_a, shape_b) = match self.shape {
            SplatShape::Covariance(cov) => (
                [pack_half2(cov[0], cov[1]), pack_half2(cov[2], cov[3]), 0, 0],
                [pack_half2(cov[4], cov[5]), 0, 0, 0],
            ),
            SplatShape::RotationScale { rotation, scale } => {
                // w is reconstructed on read, so keep the hemisphere with w >= 0
                let rotation = if rotation.w < 0.0 { -rotation } else { rotation };
                (
                    [pack_half2(rotation.x, rotation.y), pack_half2(rotation.z, scale.x), 0, 0],
                    [pack_half2(scale.y, scale.z), 0, 0, 0],
                )
            }
        };

        [
            Self::color_texel(self.color),
            center,
            shape_a,
            shape_b,
        ]
    }

    pub fn from_texels(format: WorkBufferFormat, texels: &[Texel; 4]) -> Self {
        let (r, g) = unpack_half2(texels[0][0]);
        let (b, a) = unpack_half2(texels[0][1]);

        let (a0, a1) = unpack_half2(texels[2][0]);
        let (a2, a3) = unpack_half2(texels[2][1]);
        let (b0, b1) = unpack_half2(texels[3][0]);

        let shape = match format {
            WorkBufferFormat::Covariance => SplatShape::Covariance([a0, a1, a2, a3, b0, b1]),
            WorkBufferFormat::RotationScale => {
                let w = (1.0 - a0 * a0 - a1 * a1 - a2 * a2).max(0.0).sqrt();
                SplatShape::RotationScale {
                    rotation: Quat::from_xyzw(a0, a1, a2, w),
                    scale: Vec3::new(a3, b0, b1),
                }
            }
        };

        Self {
            color: Vec4::new(r, g, b, a),
            center: texel_position(&texels[1]),
            shape,
        }
    }
}


/// two halves in one word, `hi` in the upper sixteen bits
fn pack_half2(hi: f32, lo: f32) -> u32 {
    ((f16::from_f32(hi).to_bits() as u32) << 16) | f16::from_f32(lo).to_bits() as u32
}

fn unpack_half2(word: u32) -> (f32, f32) {
    (
        f16::from_bits((word >> 16) as u16).to_f32(),
        f16::from_bits(word as u16).to_f32(),
    )
}
