use bevy::{
    prelude::*,
    render::render_resource::TextureFormat,
};

use crate::{
    error::{
        DeviceError,
        WorkBufferError,
    },
    gaussian::settings::WorkBufferFormat,
    render::{
        device::{
            RenderTargetDescriptor,
            RenderTargetId,
            SplatDevice,
            Texel,
        },
        pass::{
            PassMode,
            draw_placement,
        },
        registry::ResourceRegistry,
    },
    unified::info::PlacementInfo,
};


pub const WORK_BUFFER_COLOR: usize = 0;
pub const WORK_BUFFER_CENTER: usize = 1;
pub const WORK_BUFFER_SHAPE_A: usize = 2;
pub const WORK_BUFFER_SHAPE_B: usize = 3;

pub const WORK_BUFFER_FORMATS: &[TextureFormat] = &[
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba16Float,
    TextureFormat::Rg16Float,
];
const ORDER_FORMATS: &[TextureFormat] = &[TextureFormat::R32Uint];


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkBufferStats {
    pub resizes: u64,
    pub full_renders: u64,
    pub placement_renders: u64,
    pub color_renders: u64,
}


/// shared square table of transformed splats plus the sorted draw order
#[derive(Debug)]
pub struct WorkBuffer {
    format: WorkBufferFormat,
    target: Option<RenderTargetId>,
    order: Option<RenderTargetId>,
    texture_size: u32,
    needs_full_render: bool,
    stats: WorkBufferStats,
}

impl WorkBuffer {
    pub fn new(format: WorkBufferFormat) -> Self {
        Self {
            format,
            target: None,
            order: None,
            texture_size: 0,
            needs_full_render: true,
            stats: WorkBufferStats::default(),
        }
    }

    pub fn format(&self) -> WorkBufferFormat {
        self.format
    }

    pub fn target(&self) -> Option<RenderTargetId> {
        self.target
    }

    pub fn order_target(&self) -> Option<RenderTargetId> {
        self.order
    }

    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    pub fn capacity(&self) -> u64 {
        self.texture_size as u64 * self.texture_size as u64
    }

    pub fn needs_full_render(&self) -> bool {
        self.needs_full_render
    }

    pub fn stats(&self) -> WorkBufferStats {
        self.stats
    }

    /// reallocates every channel, contents are lost until the next full render
    pub fn resize(&mut self, device: &mut dyn SplatDevice, size: u32) -> Result<(), DeviceError> {
        let extent = UVec2::splat(size);

        match (self.target, self.order) {
            (Some(target), Some(order)) => {
                device.resize_render_target(target, extent)?;
                device.resize_render_target(order, extent)?;
            }
            _ => {
                self.destroy(device);

                let target = device.create_render_target(&RenderTargetDescriptor {
                    label: "work_buffer",
                    formats: WORK_BUFFER_FORMATS,
                    size: extent,
                })?;
                self.target = Some(target);

                self.order = Some(device.create_render_target(&RenderTargetDescriptor {
                    label: "work_buffer_order",
                    formats: ORDER_FORMATS,
                    size: extent,
                })?);
            }
        }

        info!(size, "resized work buffer");
        self.texture_size = size;
        self.needs_full_render = true;
        self.stats.resizes += 1;
        Ok(())
    }

    /// clears the buffer and draws every placement from its render state
    pub fn render(
        &mut self,
        device: &mut dyn SplatDevice,
        registry: &ResourceRegistry,
        infos: &[PlacementInfo],
        camera: &Mat4,
    ) -> Result<(), WorkBufferError> {
        let Some(target) = self.target else {
            return Ok(());
        };

        device.clear(target)?;
        for info in infos {
            self.draw(device, registry, info, camera, PassMode::Full)?;
        }

        debug!(placements = infos.len(), size = self.texture_size, "full work buffer render");
        self.needs_full_render = false;
        self.stats.full_renders += 1;
        Ok(())
    }

    /// redraws the placements matching `dirty`, or everything after a resize
    pub fn render_placements(
        &mut self,
        device: &mut dyn SplatDevice,
        registry: &ResourceRegistry,
        infos: &[PlacementInfo],
        camera: &Mat4,
        dirty: impl Fn(usize, &PlacementInfo) -> bool,
    ) -> Result<(), WorkBufferError> {
        if self.needs_full_render {
            return self.render(device, registry, infos, camera);
        }

        for (index, info) in infos.iter().enumerate() {
            if !dirty(index, info) {
                continue;
            }

            self.draw(device, registry, info, camera, PassMode::Full)?;
            self.stats.placement_renders += 1;
        }
        Ok(())
    }

    /// rewrites only the color channel of the placements matching `dirty`
    pub fn render_color(
        &mut self,
        device: &mut dyn SplatDevice,
        registry: &ResourceRegistry,
        infos: &[PlacementInfo],
        camera: &Mat4,
        dirty: impl Fn(usize, &PlacementInfo) -> bool,
    ) -> Result<(), WorkBufferError> {
        if self.needs_full_render {
            return self.render(device, registry, infos, camera);
        }

        for (index, info) in infos.iter().enumerate() {
            if !dirty(index, info) {
                continue;
            }

            self.draw(device, registry, info, camera, PassMode::ColorOnly)?;
            self.stats.color_renders += 1;
        }
        Ok(())
    }

    pub fn set_order_data(&mut self, device: &mut dyn SplatDevice, order: &[u32]) -> Result<(), DeviceError> {
        let Some(target) = self.order else {
            return Ok(());
        };

        let texels: Vec<Texel> = order.iter().map(|&index| [index, 0, 0, 0]).collect();
        device.write_texels(target, 0, 0, &texels)
    }

    pub fn destroy(&mut self, device: &mut dyn SplatDevice) {
        if let Some(target) = self.target.take() {
            device.destroy_render_target(target);
        }
        if let Some(order) = self.order.take() {
            device.destroy_render_target(order);
        }

        self.texture_size = 0;
        self.needs_full_render = true;
    }

    fn draw(
        &self,
        device: &mut dyn SplatDevice,
        registry: &ResourceRegistry,
        info: &PlacementInfo,
        camera: &Mat4,
        mode: PassMode,
    ) -> Result<(), WorkBufferError> {
        let Some(target) = self.target else {
            return Ok(());
        };

        let Some((draw, remap)) = info.draw(mode, self.format, self.texture_size, camera) else {
            return Ok(());
        };

        let resource = info.resource_id();
        let gpu = registry
            .get(resource)
            .ok_or(WorkBufferError::MissingResource(resource.0))?;

        draw_placement(device, target, gpu, remap, &draw)?;
        Ok(())
    }
}
