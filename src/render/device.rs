use std::{
    collections::HashMap,
    ops::Range,
};

use bevy::{
    prelude::*,
    render::render_resource::TextureFormat,
};

#[cfg(feature = "device_rayon")]
use rayon::prelude::*;

use crate::error::DeviceError;


/// one rgba32uint texel, every channel format is stored bit-cast into it
pub type Texel = [u32; 4];


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(u64);


/// a 2d target with one attachment per entry of `formats`
#[derive(Clone, Copy, Debug)]
pub struct RenderTargetDescriptor<'a> {
    pub label: &'a str,
    pub formats: &'a [TextureFormat],
    pub size: UVec2,
}


/// read access to the input bindings of a quad pass
pub struct TextureInputs<'a> {
    bindings: Vec<&'a CpuRenderTarget>,
}

impl TextureInputs<'_> {
    pub fn size(&self, binding: usize) -> UVec2 {
        self.bindings.get(binding).map_or(UVec2::ZERO, |target| target.size)
    }

    pub fn load(&self, binding: usize, channel: usize, texel: UVec2) -> Texel {
        let Some(target) = self.bindings.get(binding) else {
            return [0; 4];
        };

        if texel.x >= target.size.x || texel.y >= target.size.y {
            return [0; 4];
        }

        let index = (texel.y * target.size.x + texel.x) as usize;
        target.channels
            .get(channel)
            .and_then(|texels| texels.get(index))
            .copied()
            .unwrap_or([0; 4])
    }

    /// row-major lookup, as a shader does with `index % width, index / width`
    pub fn load_linear(&self, binding: usize, channel: usize, index: u32) -> Texel {
        let width = self.size(binding).x;
        if width == 0 {
            return [0; 4];
        }

        self.load(binding, channel, UVec2::new(index % width, index / width))
    }
}


/// fragment program run once per covered texel of a quad pass
pub trait QuadProgram: Sync {
    fn label(&self) -> &str;

    /// `out` holds one texel per written channel, in `QuadPass::channels` order
    fn shade(&self, texel: UVec2, inputs: &TextureInputs, out: &mut [Texel]);
}


/// full-width quad over `rows` of `target`
pub struct QuadPass<'a> {
    pub target: RenderTargetId,
    pub rows: Range<u32>,
    pub channels: &'a [usize],
    pub inputs: &'a [RenderTargetId],
    pub program: &'a dyn QuadProgram,
}


/// render-device collaborator: targets, uploads and quad passes
pub trait SplatDevice: Send + Sync {
    fn max_texture_size(&self) -> u32;

    fn create_render_target(&mut self, descriptor: &RenderTargetDescriptor) -> Result<RenderTargetId, DeviceError>;

    /// discards the previous contents
    fn resize_render_target(&mut self, target: RenderTargetId, size: UVec2) -> Result<(), DeviceError>;

    fn destroy_render_target(&mut self, target: RenderTargetId);

    fn render_target_size(&self, target: RenderTargetId) -> Option<UVec2>;

    fn write_texels(
        &mut self,
        target: RenderTargetId,
        channel: usize,
        offset: usize,
        texels: &[Texel],
    ) -> Result<(), DeviceError>;

    fn clear(&mut self, target: RenderTargetId) -> Result<(), DeviceError>;

    fn draw_quad(&mut self, pass: &QuadPass) -> Result<(), DeviceError>;
}


pub struct CpuRenderTarget {
    pub label: String,
    pub formats: Vec<TextureFormat>,
    pub size: UVec2,
    channels: Vec<Vec<Texel>>,
}

impl CpuRenderTarget {
    fn texel_count(&self) -> usize {
        (self.size.x * self.size.y) as usize
    }

    fn reset(&mut self) {
        let count = self.texel_count();
        for channel in self.channels.iter_mut() {
            channel.clear();
            channel.resize(count, [0; 4]);
        }
    }

    pub fn memory_bytes(&self) -> u64 {
        self.formats
            .iter()
            .map(|format| format.block_copy_size(None).unwrap_or(16) as u64)
            .sum::<u64>()
            * self.texel_count() as u64
    }
}


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuDeviceStats {
    pub passes: u64,
    pub texels_shaded: u64,
    pub uploads: u64,
}


/// reference backend executing quad programs on the cpu
pub struct CpuDevice {
    max_texture_size: u32,
    next_id: u64,
    targets: HashMap<RenderTargetId, CpuRenderTarget>,
    stats: CpuDeviceStats,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl CpuDevice {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            next_id: 0,
            targets: HashMap::new(),
            stats: CpuDeviceStats::default(),
        }
    }

    pub fn stats(&self) -> CpuDeviceStats {
        self.stats
    }

    pub fn target(&self, target: RenderTargetId) -> Option<&CpuRenderTarget> {
        self.targets.get(&target)
    }

    pub fn texels(&self, target: RenderTargetId, channel: usize) -> Option<&[Texel]> {
        self.targets
            .get(&target)?
            .channels
            .get(channel)
            .map(Vec::as_slice)
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn memory_bytes(&self) -> u64 {
        self.targets.values().map(CpuRenderTarget::memory_bytes).sum()
    }

    fn check_size(&self, size: UVec2) -> Result<(), DeviceError> {
        let largest = size.max_element();
        if largest > self.max_texture_size {
            return Err(DeviceError::SizeExceedsLimit {
                size: largest,
                max: self.max_texture_size,
            });
        }
        Ok(())
    }
}

impl SplatDevice for CpuDevice {
    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_render_target(&mut self, descriptor: &RenderTargetDescriptor) -> Result<RenderTargetId, DeviceError> {
        self.check_size(descriptor.size)?;

        let id = RenderTargetId(self.next_id);
        self.next_id += 1;

        let mut target = CpuRenderTarget {
            label: descriptor.label.to_string(),
            formats: descriptor.formats.to_vec(),
            size: descriptor.size,
            channels: vec![Vec::new(); descriptor.formats.len()],
        };
        target.reset();

        debug!(?id, label = descriptor.label, size = ?descriptor.size, "created render target");
        self.targets.insert(id, target);
        Ok(id)
    }

    fn resize_render_target(&mut self, target: RenderTargetId, size: UVec2) -> Result<(), DeviceError> {
        self.check_size(size)?;

        let render_target = self.targets
            .get_mut(&target)
            .ok_or(DeviceError::UnknownTarget(target))?;

        render_target.size = size;
        render_target.reset();
        Ok(())
    }

    fn destroy_render_target(&mut self, target: RenderTargetId) {
        if self.targets.remove(&target).is_some() {
            debug!(?target, "destroyed render target");
        }
    }

    fn render_target_size(&self, target: RenderTargetId) -> Option<UVec2> {
        self.targets.get(&target).map(|target| target.size)
    }

    fn write_texels(
        &mut self,
        target: RenderTargetId,
        channel: usize,
        offset: usize,
        texels: &[Texel],
    ) -> Result<(), DeviceError> {
        let render_target = self.targets
            .get_mut(&target)
            .ok_or(DeviceError::UnknownTarget(target))?;

        let channels = render_target.channels.len();
        let storage = render_target.channels
            .get_mut(channel)
            .ok_or(DeviceError::ChannelOutOfRange { channel, channels })?;

        let end = offset + texels.len();
        if end > storage.len() {
            return Err(DeviceError::WriteOutOfRange {
                offset,
                len: texels.len(),
                capacity: storage.len(),
            });
        }

        storage[offset..end].copy_from_slice(texels);
        self.stats.uploads += 1;
        Ok(())
    }

    fn clear(&mut self, target: RenderTargetId) -> Result<(), DeviceError> {
        self.targets
            .get_mut(&target)
            .ok_or(DeviceError::UnknownTarget(target))?
            .reset();
        Ok(())
    }

    fn draw_quad(&mut self, pass: &QuadPass) -> Result<(), DeviceError> {
        if pass.inputs.contains(&pass.target) {
            return Err(DeviceError::FeedbackLoop(pass.target));
        }

        let mut target = self.targets
            .remove(&pass.target)
            .ok_or(DeviceError::UnknownTarget(pass.target))?;

        let result = shade_quad(&self.targets, &mut target, pass);
        self.targets.insert(pass.target, target);

        let shaded = result?;
        self.stats.passes += 1;
        self.stats.texels_shaded += shaded;
        Ok(())
    }
}


fn shade_quad(
    targets: &HashMap<RenderTargetId, CpuRenderTarget>,
    target: &mut CpuRenderTarget,
    pass: &QuadPass,
) -> Result<u64, DeviceError> {
    let bindings = pass.inputs
        .iter()
        .map(|id| targets.get(id).ok_or(DeviceError::UnknownTarget(*id)))
        .collect::<Result<Vec<_>, _>>()?;
    let inputs = TextureInputs { bindings };

    let channels = target.channels.len();
    if let Some(&channel) = pass.channels.iter().find(|&&channel| channel >= channels) {
        return Err(DeviceError::ChannelOutOfRange { channel, channels });
    }

    let height = target.size.y;
    if pass.rows.start > pass.rows.end || pass.rows.end > height {
        return Err(DeviceError::RowsOutOfRange {
            start: pass.rows.start,
            end: pass.rows.end,
            height,
        });
    }

    let width = target.size.x as usize;
    let written = pass.channels.len();
    let row_len = width * written;
    let rows = pass.rows.len();
    if row_len == 0 || rows == 0 {
        return Ok(0);
    }

    let mut shaded = vec![[0u32; 4]; rows * row_len];
    let shade_row = |(row, out): (usize, &mut [Texel])| {
        let y = pass.rows.start + row as u32;
        for (x, texel) in out.chunks_mut(written).enumerate() {
            pass.program.shade(UVec2::new(x as u32, y), &inputs, texel);
        }
    };

    #[cfg(feature = "device_rayon")]
    shaded.par_chunks_mut(row_len).enumerate().for_each(shade_row);

    #[cfg(not(feature = "device_rayon"))]
    shaded.chunks_mut(row_len).enumerate().for_each(shade_row);

    let base = pass.rows.start as usize * width;
    for (slot, &channel) in pass.channels.iter().enumerate() {
        let storage = &mut target.channels[channel];
        for (cell, texels) in shaded.chunks(written).enumerate() {
            storage[base + cell] = texels[slot];
        }
    }

    Ok((rows * width) as u64)
}


#[cfg(test)]
mod tests {
    use super::*;

    struct RowIndex;

    impl QuadProgram for RowIndex {
        fn label(&self) -> &str {
            "row_index"
        }

        fn shade(&self, texel: UVec2, _inputs: &TextureInputs, out: &mut [Texel]) {
            out[0] = [texel.x, texel.y, 0, 0];
        }
    }

    fn target(device: &mut CpuDevice, size: u32) -> RenderTargetId {
        device.create_render_target(&RenderTargetDescriptor {
            label: "test",
            formats: &[TextureFormat::Rgba32Uint, TextureFormat::R32Uint],
            size: UVec2::splat(size),
        }).unwrap()
    }

    #[test]
    fn quad_writes_only_requested_rows_and_channels() {
        let mut device = CpuDevice::default();
        let id = target(&mut device, 4);

        device.draw_quad(&QuadPass {
            target: id,
            rows: 1..3,
            channels: &[0],
            inputs: &[],
            program: &RowIndex,
        }).unwrap();

        let texels = device.texels(id, 0).unwrap();
        assert_eq!(texels[0], [0; 4]);
        assert_eq!(texels[4 + 2], [2, 1, 0, 0]);
        assert_eq!(texels[15], [0; 4]);
        assert!(device.texels(id, 1).unwrap().iter().all(|t| *t == [0; 4]));
        assert_eq!(device.stats().texels_shaded, 8);
    }

    #[test]
    fn oversized_targets_are_rejected() {
        let mut device = CpuDevice::new(8);
        let result = device.create_render_target(&RenderTargetDescriptor {
            label: "big",
            formats: &[TextureFormat::R32Uint],
            size: UVec2::splat(9),
        });
        assert_eq!(result, Err(DeviceError::SizeExceedsLimit { size: 9, max: 8 }));
    }

    #[test]
    fn feedback_loops_are_rejected() {
        let mut device = CpuDevice::default();
        let id = target(&mut device, 2);

        let result = device.draw_quad(&QuadPass {
            target: id,
            rows: 0..2,
            channels: &[0],
            inputs: &[id],
            program: &RowIndex,
        });
        assert_eq!(result, Err(DeviceError::FeedbackLoop(id)));
        assert!(device.target(id).is_some());
    }

    #[test]
    fn every_row_lands_in_place() {
        let mut device = CpuDevice::default();
        let id = target(&mut device, 64);

        device.draw_quad(&QuadPass {
            target: id,
            rows: 0..64,
            channels: &[0],
            inputs: &[],
            program: &RowIndex,
        }).unwrap();

        let texels = device.texels(id, 0).unwrap();
        for (index, texel) in texels.iter().enumerate() {
            assert_eq!(*texel, [index as u32 % 64, index as u32 / 64, 0, 0]);
        }
    }
}
