use bevy::{
    prelude::*,
    render::render_resource::TextureFormat,
};

use crate::{
    error::DeviceError,
    lod::Interval,
    math::sqrt_ceil,
    render::device::{
        QuadPass,
        QuadProgram,
        RenderTargetDescriptor,
        RenderTargetId,
        SplatDevice,
        Texel,
        TextureInputs,
    },
};


const LOOKUP_FORMATS: &[TextureFormat] = &[TextureFormat::Rg32Uint];
const REMAP_FORMATS: &[TextureFormat] = &[TextureFormat::R32Uint];


/// dense pick list: texel `i` holds the native index of the `i`-th selected point
#[derive(Debug, Default)]
pub struct IntervalTexture {
    lookup: Option<RenderTargetId>,
    remap: Option<RenderTargetId>,
    intervals: u32,
    total: u32,
    size: u32,
}

impl IntervalTexture {
    pub fn remap_target(&self) -> Option<RenderTargetId> {
        self.remap
    }

    pub fn lookup_target(&self) -> Option<RenderTargetId> {
        self.lookup
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// edge length of the square remap target
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn update(&mut self, device: &mut dyn SplatDevice, intervals: &[Interval]) -> Result<(), DeviceError> {
        let mut running = 0u32;
        let lookup: Vec<Texel> = intervals
            .iter()
            .filter(|interval| !interval.is_empty())
            .map(|interval| {
                running += interval.len();
                [interval.start, running, 0, 0]
            })
            .collect();

        if running == 0 {
            self.destroy(device);
            return Ok(());
        }

        let lookup_size = sqrt_ceil(lookup.len() as u32);
        let lookup_target = ensure_target(device, &mut self.lookup, "interval_lookup", LOOKUP_FORMATS, lookup_size)?;
        device.write_texels(lookup_target, 0, 0, &lookup)?;

        let size = sqrt_ceil(running);
        let remap_target = ensure_target(device, &mut self.remap, "interval_remap", REMAP_FORMATS, size)?;

        self.intervals = lookup.len() as u32;
        self.total = running;
        self.size = size;

        let program = RemapProgram {
            intervals: self.intervals,
            total: self.total,
            width: size,
        };

        device.draw_quad(&QuadPass {
            target: remap_target,
            rows: 0..size,
            channels: &[0],
            inputs: &[lookup_target],
            program: &program,
        })
    }

    pub fn destroy(&mut self, device: &mut dyn SplatDevice) {
        if let Some(lookup) = self.lookup.take() {
            device.destroy_render_target(lookup);
        }
        if let Some(remap) = self.remap.take() {
            device.destroy_render_target(remap);
        }

        self.intervals = 0;
        self.total = 0;
        self.size = 0;
    }
}


fn ensure_target(
    device: &mut dyn SplatDevice,
    slot: &mut Option<RenderTargetId>,
    label: &str,
    formats: &[TextureFormat],
    size: u32,
) -> Result<RenderTargetId, DeviceError> {
    let size = UVec2::splat(size);

    match *slot {
        Some(target) if device.render_target_size(target) == Some(size) => Ok(target),
        Some(target) => {
            device.resize_render_target(target, size)?;
            Ok(target)
        }
        None => {
            let target = device.create_render_target(&RenderTargetDescriptor {
                label,
                formats,
                size,
            })?;
            *slot = Some(target);
            Ok(target)
        }
    }
}


struct RemapProgram {
    intervals: u32,
    total: u32,
    width: u32,
}

impl QuadProgram for RemapProgram {
    fn label(&self) -> &str {
        "interval_remap"
    }

    fn shade(&self, texel: UVec2, inputs: &TextureInputs, out: &mut [Texel]) {
        let index = texel.y * self.width + texel.x;
        if index >= self.total {
            out[0] = [0; 4];
            return;
        }

        // smallest interval whose inclusive cumulative count exceeds index
        let mut lo = 0;
        let mut hi = self.intervals;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if inputs.load_linear(0, 0, mid)[1] > index {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let start = inputs.load_linear(0, 0, lo)[0];
        let previous = if lo == 0 { 0 } else { inputs.load_linear(0, 0, lo - 1)[1] };

        out[0] = [start + index - previous, 0, 0, 0];
    }
}
