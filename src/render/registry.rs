use std::collections::HashMap;

use bevy::{
    prelude::*,
    render::render_resource::TextureFormat,
};

use crate::{
    error::DeviceError,
    gaussian::{
        f32::position_texel,
        resource::{
            ResourceId,
            SplatResource,
        },
    },
    math::{
        pad_4,
        sqrt_ceil,
    },
    render::device::{
        RenderTargetDescriptor,
        RenderTargetId,
        SplatDevice,
        Texel,
    },
};


pub const SOURCE_POSITION: usize = 0;
pub const SOURCE_ROTATION: usize = 1;
pub const SOURCE_SCALE_OPACITY: usize = 2;
pub const SOURCE_COLOR: usize = 3;

const SOURCE_FORMATS: &[TextureFormat] = &[
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba32Float,
];
const SH_FORMATS: &[TextureFormat] = &[TextureFormat::Rgba32Float];


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShTexture {
    pub target: RenderTargetId,
    pub degree: u32,
    pub texels_per_point: u32,
}


/// native point streams of one resource, uploaded once per device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuSplatResource {
    pub source: RenderTargetId,
    pub sh: Option<ShTexture>,
    pub count: u32,
}


struct RegistryEntry {
    gpu: GpuSplatResource,
    users: usize,
}


/// device resources shared by every manager, keyed by resource
#[derive(Default)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceId, RegistryEntry>,
}

impl ResourceRegistry {
    pub fn get(&self, id: ResourceId) -> Option<&GpuSplatResource> {
        self.entries.get(&id).map(|entry| &entry.gpu)
    }

    pub fn users(&self, id: ResourceId) -> usize {
        self.entries.get(&id).map_or(0, |entry| entry.users)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn acquire(
        &mut self,
        device: &mut dyn SplatDevice,
        resource: &SplatResource,
    ) -> Result<GpuSplatResource, DeviceError> {
        if let Some(entry) = self.entries.get_mut(&resource.id()) {
            entry.users += 1;
            return Ok(entry.gpu);
        }

        let gpu = upload(device, resource)?;
        debug!(resource = ?resource.id(), points = gpu.count, "uploaded splat resource");

        self.entries.insert(resource.id(), RegistryEntry { gpu, users: 1 });
        Ok(gpu)
    }

    pub fn release(&mut self, device: &mut dyn SplatDevice, id: ResourceId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return;
        }

        if let Some(entry) = self.entries.remove(&id) {
            destroy_gpu(device, &entry.gpu);
            debug!(resource = ?id, "released splat resource");
        }
    }

    pub fn destroy(&mut self, device: &mut dyn SplatDevice) {
        for (_, entry) in self.entries.drain() {
            destroy_gpu(device, &entry.gpu);
        }
    }
}


fn destroy_gpu(device: &mut dyn SplatDevice, gpu: &GpuSplatResource) {
    device.destroy_render_target(gpu.source);
    if let Some(sh) = gpu.sh {
        device.destroy_render_target(sh.target);
    }
}

fn upload(device: &mut dyn SplatDevice, resource: &SplatResource) -> Result<GpuSplatResource, DeviceError> {
    let count = resource.points().len() as u32;

    let source = device.create_render_target(&RenderTargetDescriptor {
        label: "splat_source",
        formats: SOURCE_FORMATS,
        size: UVec2::splat(sqrt_ceil(count).max(1)),
    })?;

    let mut sh_target = None;
    match write_streams(device, resource, source, &mut sh_target) {
        Ok(sh) => Ok(GpuSplatResource { source, sh, count }),
        Err(err) => {
            device.destroy_render_target(source);
            if let Some(target) = sh_target {
                device.destroy_render_target(target);
            }
            Err(err)
        }
    }
}

/// fills `source` and creates the sh texture, `sh_target` is set as soon as it exists
fn write_streams(
    device: &mut dyn SplatDevice,
    resource: &SplatResource,
    source: RenderTargetId,
    sh_target: &mut Option<RenderTargetId>,
) -> Result<Option<ShTexture>, DeviceError> {
    let points = resource.points();

    let streams: [Vec<Texel>; 4] = [
        points.positions.iter().map(position_texel).collect(),
        points.rotations.iter().map(|rotation| rotation.texel()).collect(),
        points.scale_opacity.iter().map(|scale| scale.texel()).collect(),
        points.colors.iter().map(|c| [c[0].to_bits(), c[1].to_bits(), c[2].to_bits(), 0]).collect(),
    ];
    for (channel, texels) in streams.iter().enumerate() {
        device.write_texels(source, channel, 0, texels)?;
    }

    let Some(sh) = points.sh.as_ref().filter(|sh| sh.stride() > 0) else {
        return Ok(None);
    };

    let floats = pad_4(sh.stride() * 3);
    let texels_per_point = (floats / 4) as u32;

    let texels: Vec<Texel> = (0..points.len())
        .flat_map(|index| {
            let mut flat: Vec<u32> = sh.point(index)
                .iter()
                .flat_map(|rgb| rgb.map(f32::to_bits))
                .collect();
            flat.resize(floats, 0);
            flat.chunks_exact(4)
                .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
                .collect::<Vec<_>>()
        })
        .collect();

    let target = device.create_render_target(&RenderTargetDescriptor {
        label: "splat_sh",
        formats: SH_FORMATS,
        size: UVec2::splat(sqrt_ceil(texels.len() as u32).max(1)),
    })?;
    *sh_target = Some(target);

    device.write_texels(target, 0, 0, &texels)?;

    Ok(Some(ShTexture {
        target,
        degree: sh.degree,
        texels_per_point,
    }))
}
