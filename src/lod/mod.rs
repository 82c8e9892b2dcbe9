use bevy::prelude::*;

use crate::{
    gaussian::resource::{
        SplatData,
        SplatResource,
    },
    utils::WorkBufferSettings,
};


/// half-open range `[start, end)` of native point indices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}


/// ordered, disjoint intervals with contiguous neighbours merged
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalList {
    intervals: Vec<Interval>,
    total: u32,
}

impl IntervalList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn whole(count: u32) -> Self {
        let mut list = Self::new();
        list.push(0, count);
        list
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
        self.total = 0;
    }

    pub fn push(&mut self, start: u32, end: u32) {
        if end <= start {
            return;
        }

        debug_assert!(
            self.intervals.last().is_none_or(|last| last.end <= start),
            "intervals must be pushed in native order",
        );

        self.total += end - start;

        if let Some(last) = self.intervals.last_mut() {
            if last.end == start {
                last.end = end;
                return;
            }
        }

        self.intervals.push(Interval { start, end });
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn native_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.iter().flat_map(|interval| interval.start..interval.end)
    }
}

impl FromIterator<(u32, u32)> for IntervalList {
    fn from_iter<T: IntoIterator<Item = (u32, u32)>>(iter: T) -> Self {
        let mut list = Self::new();
        for (start, end) in iter {
            list.push(start, end);
        }
        list
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct LodParams {
    /// lod `k` is chosen when a block is closer than `distances[k]`, lod 0 is the finest
    pub distances: Vec<f32>,
    pub range_min: u32,
    pub range_max: u32,

    /// distance multiplier for blocks directly behind the camera, 1.0 disables it
    pub behind_penalty: f32,
}

impl Default for LodParams {
    fn default() -> Self {
        Self {
            distances: vec![5.0, 10.0, 15.0, 20.0, 25.0],
            range_min: 0,
            range_max: u32::MAX,
            behind_penalty: 1.0,
        }
    }
}

impl LodParams {
    pub fn from_settings(settings: &WorkBufferSettings, distances: Option<&[f32]>) -> Self {
        Self {
            distances: distances
                .map(<[f32]>::to_vec)
                .unwrap_or_else(|| settings.lod_distances.clone()),
            range_min: settings.lod_range_min,
            range_max: settings.lod_range_max,
            behind_penalty: settings.lod_behind_penalty,
        }
    }

    pub fn select(&self, distance: f32, max_lod: u32) -> u32 {
        let lod = self.distances
            .iter()
            .take(max_lod as usize)
            .position(|&threshold| distance < threshold)
            .map_or(max_lod, |k| k as u32);

        let min = self.range_min.min(max_lod);
        let max = self.range_max.min(max_lod).max(min);
        lod.clamp(min, max)
    }
}


/// selects, per lod block, the native prefix matching the camera distance
#[derive(Clone, Debug, Default)]
pub struct LodEvaluator {
    intervals: IntervalList,
    block_lods: Vec<u32>,
}

impl LodEvaluator {
    pub fn intervals(&self) -> &IntervalList {
        &self.intervals
    }

    pub fn active_splats(&self) -> u32 {
        self.intervals.total()
    }

    pub fn block_lods(&self) -> &[u32] {
        &self.block_lods
    }

    /// returns whether the selection changed
    pub fn evaluate(
        &mut self,
        resource: &SplatResource,
        model: &Mat4,
        camera: &Mat4,
        params: &LodParams,
    ) -> bool {
        let blocks = match resource.data() {
            SplatData::Simple(points) => {
                let whole = IntervalList::whole(points.len() as u32);
                let changed = self.intervals != whole;
                self.intervals = whole;
                return changed;
            }
            SplatData::Leveled(_, blocks) => blocks,
        };

        let inverse = model.inverse();
        let camera_position = inverse.transform_point3(camera.w_axis.truncate());
        let camera_forward = inverse
            .transform_vector3(-camera.z_axis.truncate())
            .normalize_or_zero();

        let max_lod = blocks.levels() as u32 - 1;
        let previous = std::mem::take(&mut self.block_lods);

        self.intervals.clear();
        self.block_lods.reserve(blocks.len());

        for block in 0..blocks.len() {
            let offset = blocks.center(block) - camera_position;
            let mut distance = offset.length();

            if params.behind_penalty != 1.0 && distance > 0.0 {
                let behind = (-offset.dot(camera_forward) / distance).max(0.0);
                distance *= 1.0 + behind * (params.behind_penalty - 1.0);
            }

            let lod = params.select(distance, max_lod);
            self.block_lods.push(lod);

            let start = blocks.offset(block);
            let count = blocks.prefix(block, (blocks.levels() as u32 - lod) as usize);
            self.intervals.push(start, start + count);
        }

        self.block_lods != previous
    }
}
