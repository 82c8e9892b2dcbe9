use bevy::prelude::*;

use bevy_unified_splatting::{
    SplatResource,
    lod::{
        LodEvaluator,
        LodParams,
    },
    random_leveled,
    random_points,
};

use _harness::{
    camera_at,
    leveled_resource,
};

mod _harness;


fn params() -> LodParams {
    LodParams {
        distances: vec![5.0],
        ..default()
    }
}


#[test]
fn far_camera_selects_coarse_level_only() {
    let resource = leveled_resource();
    let mut lod = LodEvaluator::default();

    lod.evaluate(&resource, &Mat4::IDENTITY, &camera_at(Vec3::new(0.0, 0.0, 100.0)), &params());

    assert_eq!(lod.active_splats(), 100);
    assert_eq!(lod.block_lods(), &[1]);
    assert_eq!(lod.intervals().len(), 1);
}

#[test]
fn close_camera_selects_every_level() {
    let resource = leveled_resource();
    let mut lod = LodEvaluator::default();

    lod.evaluate(&resource, &Mat4::IDENTITY, &camera_at(Vec3::new(0.0, 0.0, 100.0)), &params());
    let changed = lod.evaluate(&resource, &Mat4::IDENTITY, &camera_at(Vec3::new(0.0, 0.0, 1.0)), &params());

    assert!(changed);
    assert_eq!(lod.active_splats(), 1000);
    assert_eq!(lod.block_lods(), &[0]);
}

#[test]
fn unchanged_selection_reports_clean() {
    let resource = leveled_resource();
    let mut lod = LodEvaluator::default();
    let camera = camera_at(Vec3::new(0.0, 0.0, 100.0));

    assert!(lod.evaluate(&resource, &Mat4::IDENTITY, &camera, &params()));
    assert!(!lod.evaluate(&resource, &Mat4::IDENTITY, &camera, &params()));
}

#[test]
fn distance_is_measured_in_placement_space() {
    let resource = leveled_resource();
    let mut lod = LodEvaluator::default();

    // the placement moved next to a camera sitting far from the origin
    let model = Mat4::from_translation(Vec3::new(0.0, 0.0, 99.0));
    lod.evaluate(&resource, &model, &camera_at(Vec3::new(0.0, 0.0, 100.0)), &params());

    assert_eq!(lod.active_splats(), 1000);
}

#[test]
fn resources_without_blocks_select_everything() {
    let resource = SplatResource::simple(random_points(250, None)).unwrap();
    let mut lod = LodEvaluator::default();

    lod.evaluate(&resource, &Mat4::IDENTITY, &camera_at(Vec3::splat(1000.0)), &params());

    assert_eq!(lod.active_splats(), 250);
    assert_eq!(lod.intervals().len(), 1);
    assert!(lod.intervals().native_indices().eq(0..250));
}

#[test]
fn each_block_selects_its_own_prefix() {
    let (points, blocks) = random_leveled(3, &[10, 20, 30], 4.0).unwrap();
    let resource = SplatResource::leveled(points, blocks).unwrap();
    let mut lod = LodEvaluator::default();

    // blocks at x = 0, 4, 8
    let params = LodParams {
        distances: vec![2.0, 6.0],
        ..default()
    };
    lod.evaluate(&resource, &Mat4::IDENTITY, &camera_at(Vec3::ZERO), &params);

    assert_eq!(lod.block_lods(), &[0, 1, 2]);

    let intervals: Vec<(u32, u32)> = lod.intervals()
        .iter()
        .map(|interval| (interval.start, interval.end))
        .collect();
    // the first two prefixes are contiguous and merge
    assert_eq!(intervals, vec![(0, 90), (120, 130)]);
    assert_eq!(lod.active_splats(), 100);
}

#[test]
fn behind_penalty_coarsens_blocks_behind_the_camera() {
    let resource = leveled_resource();
    let mut lod = LodEvaluator::default();

    // camera looks down -z from z = -3, the block sits behind it
    let camera = camera_at(Vec3::new(0.0, 0.0, -3.0));
    let params = LodParams {
        distances: vec![5.0],
        behind_penalty: 3.0,
        ..default()
    };

    lod.evaluate(&resource, &Mat4::IDENTITY, &camera, &params);
    assert_eq!(lod.active_splats(), 100);

    lod.evaluate(&resource, &Mat4::IDENTITY, &camera, &LodParams { behind_penalty: 1.0, ..params });
    assert_eq!(lod.active_splats(), 1000);
}
