use bevy::math::Vec3;
use rayon::prelude::*;

use crate::sort::counting::{
    KeySegment,
    SortKey,
};


struct IntervalJob<'a, 'k> {
    keys: &'k mut [u32],
    native_start: u32,
    positions: &'a [[f32; 3]],
    key: SortKey,
}

pub fn fill_keys_parallel(segments: &[KeySegment<'_>], keys: &mut [u32]) {
    let mut jobs = Vec::new();
    let mut padding = Vec::new();

    let mut rest = keys;
    for segment in segments {
        for interval in segment.intervals {
            let (head, tail) = rest.split_at_mut(interval.len() as usize);
            jobs.push(IntervalJob {
                keys: head,
                native_start: interval.start,
                positions: segment.positions,
                key: segment.key,
            });
            rest = tail;
        }

        let (head, tail) = rest.split_at_mut(segment.padding as usize);
        padding.push(head);
        rest = tail;
    }

    jobs.into_par_iter().for_each(|job| {
        job.keys
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, key)| {
                let native = job.native_start as usize + offset;
                let center = job.positions
                    .get(native)
                    .map_or(Vec3::ZERO, |p| Vec3::from(*p));
                *key = job.key.key(center);
            });
    });

    for cells in padding {
        cells.fill(0);
    }
}


#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use super::*;
    use crate::{
        lod::Interval,
        sort::{
            counting::fill_keys_sequential,
            SortMetric,
            SortParams,
        },
    };

    #[test]
    fn parallel_keys_match_sequential() {
        let positions: Vec<[f32; 3]> = (0..64).map(|i| [0.0, 0.0, -(i as f32)]).collect();
        let camera = Transform::from_xyz(0.0, 0.0, 1.0).compute_matrix();
        let key = SortKey {
            metric: SortMetric::Linear,
            params: SortParams::new(&Mat4::IDENTITY, &camera),
            min: -70.0,
            max: 0.0,
            buckets: 1025,
        };
        let intervals = [Interval { start: 2, end: 10 }, Interval { start: 20, end: 64 }];
        let segments = [
            KeySegment { positions: &positions, intervals: &intervals, padding: 4, key },
            KeySegment { positions: &positions, intervals: &intervals[..1], padding: 0, key },
        ];

        let len: usize = segments.iter().map(KeySegment::len).sum();
        let mut sequential = vec![7; len];
        let mut parallel = vec![7; len];
        fill_keys_sequential(&segments, &mut sequential);
        fill_keys_parallel(&segments, &mut parallel);

        assert_eq!(sequential, parallel);
    }
}
