use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};

use bevy::prelude::*;

use bevy_unified_splatting::{
    SortMetric,
    SplatPoints,
    SplatResource,
    gaussian::f32::Rotation,
    lod::IntervalList,
    sort::{
        IntervalsPayload,
        PlacementIntervals,
        SortParams,
        SortReply,
        SortService,
        inline::InlineSorter,
    },
};

use _harness::camera_at;

mod _harness;


/// points on the z axis at the given depths
fn line_resource(depths: &[f32]) -> Arc<SplatResource> {
    let mut points = SplatPoints::default();
    for &z in depths {
        points.positions.push([0.0, 0.0, z]);
        points.rotations.push(Rotation::default());
        points.scale_opacity.push([0.1, 0.1, 0.1, 1.0].into());
        points.colors.push([1.0, 1.0, 1.0]);
    }
    Arc::new(SplatResource::simple(points).unwrap())
}

fn whole_payload(version: u64, resources: &[&Arc<SplatResource>], texture_size: u32) -> IntervalsPayload {
    let mut line = 0;
    let placements: Vec<PlacementIntervals> = resources
        .iter()
        .map(|resource| {
            let active = resource.len() as u32;
            let lines = active.div_ceil(texture_size);
            let placement = PlacementIntervals {
                resource: resource.id(),
                line_start: line,
                padding: lines * texture_size - active,
                intervals: IntervalList::whole(active),
            };
            line += lines;
            placement
        })
        .collect();

    let total_used_pixels = placements.iter().map(|p| p.active() + p.padding).sum();
    IntervalsPayload {
        version,
        texture_size,
        placements,
        total_used_pixels,
    }
}

fn sort_once(sorter: &mut dyn SortService, params: Vec<SortParams>, metric: SortMetric) -> SortReply {
    sorter.set_sort_params(params, metric);
    let mut replies = sorter.poll_sorted();
    assert_eq!(replies.len(), 1);
    replies.remove(0)
}

fn is_permutation(order: &[u32]) -> bool {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    sorted.iter().copied().eq(0..order.len() as u32)
}


#[test]
fn linear_order_is_back_to_front() {
    let resource = line_resource(&[-5.0, 3.0, -20.0, 0.0]);
    let camera = camera_at(Vec3::new(0.0, 0.0, 10.0));

    let mut sorter = InlineSorter::sequential();
    sorter.set_centers(resource.id(), Some(resource.clone()));
    sorter.set_intervals(whole_payload(7, &[&resource], 2));

    let reply = sort_once(&mut sorter, vec![SortParams::new(&Mat4::IDENTITY, &camera)], SortMetric::Linear);

    assert_eq!(reply.version, 7);
    assert_eq!(reply.count, 4);
    assert_eq!(reply.order, vec![2, 0, 3, 1]);
}

#[test]
fn radial_order_is_back_to_front() {
    let resource = line_resource(&[-5.0, 3.0, -20.0, 9.0]);
    let camera = camera_at(Vec3::new(0.0, 0.0, 10.0));

    let mut sorter = InlineSorter::sequential();
    sorter.set_centers(resource.id(), Some(resource.clone()));
    sorter.set_intervals(whole_payload(1, &[&resource], 2));

    let reply = sort_once(&mut sorter, vec![SortParams::new(&Mat4::IDENTITY, &camera)], SortMetric::Radial);

    assert_eq!(reply.order, vec![2, 0, 1, 3]);
}

#[test]
fn padding_cells_sort_first_and_order_is_a_permutation() {
    let a = line_resource(&[1.0, 2.0, 3.0]);
    let b = line_resource(&[-1.0, -2.0]);
    let camera = camera_at(Vec3::new(0.0, 0.0, 10.0));

    let mut sorter = InlineSorter::sequential();
    sorter.set_centers(a.id(), Some(a.clone()));
    sorter.set_centers(b.id(), Some(b.clone()));

    // a covers cells 0..3 plus padding cell 3, b covers cells 4..6 plus padding 6..8
    let payload = whole_payload(2, &[&a, &b], 4);
    assert_eq!(payload.total_used_pixels, 8);
    sorter.set_intervals(payload);

    let params = vec![SortParams::new(&Mat4::IDENTITY, &camera); 2];
    let reply = sort_once(&mut sorter, params, SortMetric::Linear);

    assert_eq!(reply.count, 8);
    assert!(is_permutation(&reply.order));

    // padding shares key zero with the farthest point, equal keys keep cell order
    assert_eq!(reply.order, vec![3, 5, 6, 7, 4, 0, 1, 2]);
}

#[test]
fn placement_transform_moves_sort_keys() {
    let a = line_resource(&[0.0]);
    let b = line_resource(&[0.0]);
    let camera = camera_at(Vec3::new(0.0, 0.0, 10.0));

    let mut sorter = InlineSorter::sequential();
    sorter.set_centers(a.id(), Some(a.clone()));
    sorter.set_centers(b.id(), Some(b.clone()));
    sorter.set_intervals(whole_payload(1, &[&a, &b], 1));

    // b is placed behind a
    let params = vec![
        SortParams::new(&Mat4::IDENTITY, &camera),
        SortParams::new(&Mat4::from_translation(Vec3::new(0.0, 0.0, -8.0)), &camera),
    ];
    let reply = sort_once(&mut sorter, params, SortMetric::Linear);

    assert_eq!(reply.order, vec![1, 0]);
}

#[test]
fn mismatched_requests_produce_no_reply() {
    let resource = line_resource(&[0.0, 1.0]);
    let camera = camera_at(Vec3::new(0.0, 0.0, 10.0));
    let params = SortParams::new(&Mat4::IDENTITY, &camera);

    let mut sorter = InlineSorter::sequential();

    // no intervals yet
    sorter.set_sort_params(vec![params], SortMetric::Linear);
    assert!(sorter.poll_sorted().is_empty());

    // centers never registered
    sorter.set_intervals(whole_payload(1, &[&resource], 2));
    sorter.set_sort_params(vec![params], SortMetric::Linear);
    assert!(sorter.poll_sorted().is_empty());

    // parameter count differs from the payload
    sorter.set_centers(resource.id(), Some(resource.clone()));
    sorter.set_sort_params(vec![params, params], SortMetric::Linear);
    assert!(sorter.poll_sorted().is_empty());

    sorter.set_sort_params(vec![params], SortMetric::Linear);
    assert_eq!(sorter.poll_sorted().len(), 1);

    sorter.set_centers(resource.id(), None);
    assert_eq!(sorter.registered(), 0);
}

#[cfg(feature = "sort_rayon")]
#[test]
fn parallel_fill_matches_sequential() {
    let resources: Vec<Arc<SplatResource>> = (0..4)
        .map(|_| Arc::new(SplatResource::simple(bevy_unified_splatting::random_points(777, None)).unwrap()))
        .collect();
    let refs: Vec<&Arc<SplatResource>> = resources.iter().collect();
    let camera = camera_at(Vec3::new(3.0, 4.0, 30.0));
    let params: Vec<SortParams> = resources
        .iter()
        .enumerate()
        .map(|(index, _)| SortParams::new(&Mat4::from_translation(Vec3::X * index as f32), &camera))
        .collect();

    let mut sequential = InlineSorter::sequential();
    let mut parallel = InlineSorter::parallel();
    for sorter in [&mut sequential, &mut parallel] {
        for resource in &resources {
            sorter.set_centers(resource.id(), Some(resource.clone()));
        }
        sorter.set_intervals(whole_payload(1, &refs, 56));
    }

    let expected = sort_once(&mut sequential, params.clone(), SortMetric::Radial);
    let actual = sort_once(&mut parallel, params, SortMetric::Radial);
    assert_eq!(expected, actual);
}

#[cfg(feature = "sort_worker")]
#[test]
fn worker_replies_asynchronously() {
    use bevy_unified_splatting::sort::worker::WorkerSorter;

    let resource = line_resource(&[-5.0, 3.0, -20.0, 0.0]);
    let camera = camera_at(Vec3::new(0.0, 0.0, 10.0));

    let mut worker = WorkerSorter::spawn().unwrap();
    worker.set_centers(resource.id(), Some(resource.clone()));
    worker.set_intervals(whole_payload(3, &[&resource], 2));
    worker.set_sort_params(vec![SortParams::new(&Mat4::IDENTITY, &camera)], SortMetric::Linear);

    let deadline = Instant::now() + Duration::from_secs(5);
    let reply = loop {
        if let Some(reply) = worker.poll_sorted().pop() {
            break reply;
        }
        assert!(Instant::now() < deadline, "sort worker did not reply");
        std::thread::sleep(Duration::from_millis(1));
    };

    assert_eq!(reply.version, 3);
    assert_eq!(reply.order, vec![2, 0, 3, 1]);
}

#[cfg(feature = "sort_worker")]
#[test]
fn dropping_the_worker_does_not_wait_for_queued_sorts() {
    use bevy_unified_splatting::sort::worker::WorkerSorter;

    let resource = Arc::new(SplatResource::simple(bevy_unified_splatting::random_points(200_000, None)).unwrap());
    let camera = camera_at(Vec3::new(0.0, 0.0, 40.0));
    let params = vec![SortParams::new(&Mat4::IDENTITY, &camera)];

    let sort_time = {
        let mut inline = InlineSorter::sequential();
        inline.set_centers(resource.id(), Some(resource.clone()));
        inline.set_intervals(whole_payload(1, &[&resource], 448));

        let started = Instant::now();
        sort_once(&mut inline, params.clone(), SortMetric::Linear);
        started.elapsed()
    };

    let mut worker = WorkerSorter::spawn().unwrap();
    worker.set_centers(resource.id(), Some(resource.clone()));
    worker.set_intervals(whole_payload(1, &[&resource], 448));
    for _ in 0..4 {
        worker.set_sort_params(params.clone(), SortMetric::Linear);
    }

    let started = Instant::now();
    drop(worker);
    assert!(started.elapsed() < sort_time);

    // the detached thread exits and lets go of the centers
    let deadline = Instant::now() + Duration::from_secs(5);
    while Arc::strong_count(&resource) > 1 {
        assert!(Instant::now() < deadline, "sort worker kept the centers alive");
        std::thread::sleep(Duration::from_millis(1));
    }
}
