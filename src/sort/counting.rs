use std::{
    collections::HashMap,
    time::Instant,
};

use bevy::prelude::*;

use crate::{
    gaussian::{
        f32::Position,
        resource::ResourceId,
    },
    lod::Interval,
    sort::{
        IntervalsPayload,
        SortMetric,
        SortParams,
        SortReply,
        SplatCenters,
    },
};


pub const MIN_BUCKET_BITS: u32 = 10;
pub const MAX_BUCKET_BITS: u32 = 20;

pub fn bucket_bits(count: u32) -> u32 {
    let bits = (count.max(1) as f64 / 4.0).log2().round();
    (bits.max(0.0) as u32).clamp(MIN_BUCKET_BITS, MAX_BUCKET_BITS)
}


/// maps a local-space center to a bucket, ascending buckets are back to front
#[derive(Clone, Copy, Debug)]
pub struct SortKey {
    pub metric: SortMetric,
    pub params: SortParams,
    pub min: f32,
    pub max: f32,
    pub buckets: u32,
}

impl SortKey {
    pub fn distance(metric: SortMetric, params: &SortParams, center: Vec3) -> f32 {
        match metric {
            SortMetric::Linear => params.scale * center.dot(params.direction) + params.offset,
            SortMetric::Radial => params.scale * (center - params.camera_position).length(),
        }
    }

    pub fn key(&self, center: Vec3) -> u32 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0;
        }

        let distance = Self::distance(self.metric, &self.params, center);
        let normalized = match self.metric {
            SortMetric::Linear => distance - self.min,
            SortMetric::Radial => self.max - distance,
        };

        let bucket = (normalized * (self.buckets - 1) as f32 / range).floor();
        (bucket.max(0.0) as u32).min(self.buckets - 1)
    }
}


/// keys of one placement: `padding` zero keys follow the selected points
pub struct KeySegment<'a> {
    pub positions: &'a [Position],
    pub intervals: &'a [Interval],
    pub padding: u32,
    pub key: SortKey,
}

impl KeySegment<'_> {
    pub fn len(&self) -> usize {
        self.intervals.iter().map(|i| i.len() as usize).sum::<usize>() + self.padding as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fill(&self, keys: &mut [u32]) {
        let mut cursor = 0;
        for interval in self.intervals {
            for native in interval.start..interval.end {
                let center = self.positions
                    .get(native as usize)
                    .map_or(Vec3::ZERO, |p| Vec3::from(*p));
                keys[cursor] = self.key.key(center);
                cursor += 1;
            }
        }

        keys[cursor..].fill(0);
    }
}

pub type FillKeys = fn(&[KeySegment<'_>], &mut [u32]);

pub fn fill_keys_sequential(segments: &[KeySegment<'_>], keys: &mut [u32]) {
    let mut rest = keys;
    for segment in segments {
        let (head, tail) = rest.split_at_mut(segment.len());
        segment.fill(head);
        rest = tail;
    }
}


/// sorter state mirrored from the manager's requests
pub struct SortCore {
    centers: HashMap<ResourceId, SplatCenters>,
    intervals: Option<IntervalsPayload>,
    fill: FillKeys,
    keys: Vec<u32>,
    counts: Vec<u32>,
}

impl SortCore {
    pub fn new(fill: FillKeys) -> Self {
        Self {
            centers: HashMap::new(),
            intervals: None,
            fill,
            keys: Vec::new(),
            counts: Vec::new(),
        }
    }

    pub fn set_centers(&mut self, id: ResourceId, centers: Option<SplatCenters>) {
        match centers {
            Some(centers) => {
                self.centers.insert(id, centers);
            }
            None => {
                self.centers.remove(&id);
            }
        }
    }

    pub fn set_intervals(&mut self, payload: IntervalsPayload) {
        self.intervals = Some(payload);
    }

    pub fn registered(&self) -> usize {
        self.centers.len()
    }

    pub fn sort(&mut self, params: &[SortParams], metric: SortMetric) -> Option<SortReply> {
        let payload = self.intervals.as_ref()?;

        if params.len() != payload.placements.len() {
            debug!(
                params = params.len(),
                placements = payload.placements.len(),
                version = payload.version,
                "sort params do not match the intervals payload",
            );
            return None;
        }

        let start = Instant::now();
        let total = payload.total_used_pixels;
        let buckets = (1u32 << bucket_bits(total)) + 1;

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for (placement, params) in payload.placements.iter().zip(params) {
            let Some(centers) = self.centers.get(&placement.resource) else {
                warn!(resource = ?placement.resource, "sort requested for unregistered centers");
                return None;
            };

            let Some(aabb) = centers.aabb() else {
                continue;
            };

            let (lo, hi): (Vec3, Vec3) = (aabb.min.into(), aabb.max.into());
            for corner in 0..8 {
                let point = Vec3::new(
                    if corner & 1 == 0 { lo.x } else { hi.x },
                    if corner & 2 == 0 { lo.y } else { hi.y },
                    if corner & 4 == 0 { lo.z } else { hi.z },
                );
                let distance = SortKey::distance(metric, params, point);
                min = min.min(distance);
                max = max.max(distance);
            }
        }

        if metric == SortMetric::Radial {
            min = 0.0;
        }
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 0.0;
        }

        let segments: Vec<KeySegment<'_>> = payload.placements
            .iter()
            .zip(params)
            .filter_map(|(placement, params)| {
                let centers = self.centers.get(&placement.resource)?;
                Some(KeySegment {
                    positions: &centers.points().positions,
                    intervals: placement.intervals.as_slice(),
                    padding: placement.padding,
                    key: SortKey {
                        metric,
                        params: *params,
                        min,
                        max,
                        buckets,
                    },
                })
            })
            .collect();

        let used: usize = segments.iter().map(KeySegment::len).sum();
        if used != total as usize {
            warn!(used, total, "intervals payload does not cover its used pixels");
            return None;
        }

        self.keys.clear();
        self.keys.resize(used, 0);
        (self.fill)(&segments, &mut self.keys);

        self.counts.clear();
        self.counts.resize(buckets as usize, 0);
        for &key in &self.keys {
            self.counts[key as usize] += 1;
        }

        let mut running = 0;
        for count in self.counts.iter_mut() {
            let bucket = *count;
            *count = running;
            running += bucket;
        }

        let mut order = vec![0u32; self.keys.len()];
        for (index, &key) in self.keys.iter().enumerate() {
            let slot = &mut self.counts[key as usize];
            order[*slot as usize] = index as u32;
            *slot += 1;
        }

        debug!(
            version = payload.version,
            total,
            buckets,
            elapsed = ?start.elapsed(),
            "sorted work buffer",
        );

        Some(SortReply {
            count: total,
            version: payload.version,
            order,
        })
    }
}
