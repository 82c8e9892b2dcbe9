use bevy::prelude::*;

use crate::{
    error::DeviceError,
    gaussian::{
        covariance::{
            world_covariance,
            world_rotation_scale,
        },
        f16::{
            SplatShape,
            WorkBufferSplat,
        },
        f32::{
            Rotation,
            ScaleOpacity,
            texel_position,
        },
        settings::WorkBufferFormat,
    },
    material::spherical_harmonics::{
        SH_CHANNELS,
        evaluate_sh,
        num_sh_coefficients,
    },
    math::pad_4,
    render::{
        device::{
            QuadPass,
            QuadProgram,
            RenderTargetId,
            SplatDevice,
            Texel,
            TextureInputs,
        },
        registry::{
            GpuSplatResource,
            SOURCE_COLOR,
            SOURCE_POSITION,
            SOURCE_ROTATION,
            SOURCE_SCALE_OPACITY,
            ShTexture,
        },
        work_buffer::{
            WORK_BUFFER_CENTER,
            WORK_BUFFER_COLOR,
            WORK_BUFFER_SHAPE_A,
            WORK_BUFFER_SHAPE_B,
        },
    },
};


/// rest coefficients of the highest supported band
const MAX_SH_REST: usize = num_sh_coefficients(3) - 1;
const MAX_SH_TEXELS: usize = pad_4(MAX_SH_REST * SH_CHANNELS) / 4;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassMode {
    Full,
    ColorOnly,
}

impl PassMode {
    pub fn channels(&self) -> &'static [usize] {
        match self {
            PassMode::Full => &[
                WORK_BUFFER_COLOR,
                WORK_BUFFER_CENTER,
                WORK_BUFFER_SHAPE_A,
                WORK_BUFFER_SHAPE_B,
            ],
            PassMode::ColorOnly => &[WORK_BUFFER_COLOR],
        }
    }
}


/// one placement's slice of the work buffer and the state it is drawn with
#[derive(Clone, Copy, Debug)]
pub struct PlacementDraw {
    pub mode: PassMode,
    pub format: WorkBufferFormat,
    pub model: Mat4,
    pub camera: Mat4,
    pub tint: Vec4,
    pub line_start: u32,
    pub line_count: u32,
    pub width: u32,
    pub active: u32,
}


pub fn draw_placement(
    device: &mut dyn SplatDevice,
    target: RenderTargetId,
    gpu: &GpuSplatResource,
    remap: Option<RenderTargetId>,
    draw: &PlacementDraw,
) -> Result<(), DeviceError> {
    if draw.line_count == 0 {
        return Ok(());
    }

    let mut inputs = vec![gpu.source];

    let remap_binding = remap.map(|remap| {
        inputs.push(remap);
        inputs.len() - 1
    });

    let sh = gpu.sh.map(|sh| {
        inputs.push(sh.target);
        (inputs.len() - 1, sh)
    });

    let program = WorkBufferProgram {
        draw: *draw,
        camera_local: draw.model
            .inverse()
            .transform_point3(draw.camera.w_axis.truncate()),
        remap_binding,
        sh,
    };

    device.draw_quad(&QuadPass {
        target,
        rows: draw.line_start..draw.line_start + draw.line_count,
        channels: draw.mode.channels(),
        inputs: &inputs,
        program: &program,
    })
}


struct WorkBufferProgram {
    draw: PlacementDraw,
    camera_local: Vec3,
    remap_binding: Option<usize>,
    sh: Option<(usize, ShTexture)>,
}

impl WorkBufferProgram {
    fn color(&self, inputs: &TextureInputs, native: u32, center: Vec3, opacity: f32) -> Vec4 {
        let base = inputs.load_linear(0, SOURCE_COLOR, native).map(f32::from_bits);
        let mut rgb = Vec3::new(base[0], base[1], base[2]);

        if let Some((binding, sh)) = self.sh {
            let mut floats = [0.0; MAX_SH_TEXELS * 4];
            let texels = (sh.texels_per_point as usize).min(MAX_SH_TEXELS);
            for (texel, slot) in floats.chunks_exact_mut(4).take(texels).enumerate() {
                let index = native * sh.texels_per_point + texel as u32;
                slot.copy_from_slice(&inputs.load_linear(binding, 0, index).map(f32::from_bits));
            }

            let mut rest = [[0.0; SH_CHANNELS]; MAX_SH_REST];
            for (coefficient, rgb) in rest.iter_mut().zip(floats.chunks_exact(SH_CHANNELS)) {
                coefficient.copy_from_slice(rgb);
            }

            rgb += evaluate_sh(sh.degree, &rest, center - self.camera_local);
        }

        let rgb = rgb.max(Vec3::ZERO) * self.draw.tint.truncate();
        rgb.extend(opacity * self.draw.tint.w)
    }
}

impl QuadProgram for WorkBufferProgram {
    fn label(&self) -> &str {
        "work_buffer"
    }

    fn shade(&self, texel: UVec2, inputs: &TextureInputs, out: &mut [Texel]) {
        let local = (texel.y - self.draw.line_start) * self.draw.width + texel.x;
        if local >= self.draw.active {
            out.fill([0; 4]);
            return;
        }

        let native = match self.remap_binding {
            Some(binding) => inputs.load_linear(binding, 0, local)[0],
            None => local,
        };

        let center = texel_position(&inputs.load_linear(0, SOURCE_POSITION, native));
        let scale_opacity = ScaleOpacity::from_texel(&inputs.load_linear(0, SOURCE_SCALE_OPACITY, native));
        let color = self.color(inputs, native, center, scale_opacity.opacity);

        if self.draw.mode == PassMode::ColorOnly {
            out[0] = WorkBufferSplat::color_texel(color);
            return;
        }

        let rotation = Rotation::from_texel(&inputs.load_linear(0, SOURCE_ROTATION, native)).quat();
        let scale = Vec3::from(scale_opacity.scale);
        let model = &self.draw.model;

        let shape = match self.draw.format {
            WorkBufferFormat::Covariance => SplatShape::Covariance(world_covariance(model, rotation, scale)),
            WorkBufferFormat::RotationScale => {
                let (rotation, scale) = world_rotation_scale(model, rotation, scale);
                SplatShape::RotationScale { rotation, scale }
            }
        };

        let splat = WorkBufferSplat {
            color,
            center: model.transform_point3(center),
            shape,
        };

        out.copy_from_slice(&splat.texels());
    }
}
