use crate::{
    error::WorkBufferError,
    math::{
        div_ceil,
        sqrt_ceil,
    },
    sort::{
        IntervalsPayload,
        PlacementIntervals,
    },
    unified::info::PlacementInfo,
};


/// versioned row layout of the work buffer, mirrored to the sorter
#[derive(Debug, Default)]
pub struct CentersBuffer {
    version: u64,
    texture_size: u32,
}

impl CentersBuffer {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    /// smallest square width whose rows fit every placement on whole lines
    pub fn estimate_texture_size(&mut self, actives: &[u32], max: u32) -> Result<u32, WorkBufferError> {
        let total: u64 = actives.iter().map(|&active| active as u64).sum();
        let mut size = sqrt_ceil(total.min(u32::MAX as u64) as u32).max(1);

        loop {
            let lines: u64 = actives
                .iter()
                .map(|&active| div_ceil(active, size) as u64)
                .sum();

            if lines <= size as u64 {
                break;
            }
            size += 1;
        }

        if size > max {
            return Err(WorkBufferError::CapacityExceeded {
                active: total,
                required: size,
                max,
            });
        }

        self.texture_size = size;
        Ok(size)
    }

    /// contiguous rows in placement order, starting at row 0
    pub fn assign_lines(&self, infos: &mut [PlacementInfo]) {
        let mut line = 0;
        for info in infos.iter_mut() {
            let active = info.prepare_state().map_or(0, |state| state.active());
            let count = div_ceil(active, self.texture_size);
            info.assign_lines(line, count);
            line += count;
        }
    }

    /// bumps the version and describes the prepared layout
    pub fn update(&mut self, infos: &[PlacementInfo]) -> IntervalsPayload {
        self.version += 1;

        let placements: Vec<PlacementIntervals> = infos
            .iter()
            .map(|info| {
                let (line_start, line_count, intervals) = match info.prepare_state() {
                    Some(state) => (state.line_start, state.line_count, state.intervals.clone()),
                    None => (0, 0, Default::default()),
                };

                let capacity = line_count * self.texture_size;
                PlacementIntervals {
                    resource: info.resource_id(),
                    line_start,
                    padding: capacity - intervals.total(),
                    intervals,
                }
            })
            .collect();

        let total_used_pixels = placements
            .iter()
            .map(|placement| placement.active() + placement.padding)
            .sum();

        IntervalsPayload {
            version: self.version,
            texture_size: self.texture_size,
            placements,
            total_used_pixels,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_fits_whole_lines() {
        let mut centers = CentersBuffer::default();

        assert_eq!(centers.estimate_texture_size(&[1000, 500], 4096), Ok(39));
        assert_eq!(centers.estimate_texture_size(&[], 4096), Ok(1));
        assert_eq!(centers.estimate_texture_size(&[1, 1, 1, 1, 1], 4096), Ok(5));
    }

    #[test]
    fn estimate_rejects_oversized_buffers() {
        let mut centers = CentersBuffer::default();
        assert!(matches!(
            centers.estimate_texture_size(&[10_000], 64),
            Err(WorkBufferError::CapacityExceeded { max: 64, .. }),
        ));
        assert_eq!(centers.texture_size(), 0);
    }
}
