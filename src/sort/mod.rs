use std::sync::Arc;

use bevy::prelude::*;
use clap::ValueEnum;
use serde::{
    Deserialize,
    Serialize,
};
use static_assertions::assert_cfg;

use crate::{
    gaussian::resource::{
        ResourceId,
        SplatResource,
    },
    lod::IntervalList,
};


pub mod counting;
pub mod inline;

#[cfg(feature = "sort_rayon")]
pub mod rayon_sort;

#[cfg(feature = "sort_worker")]
pub mod worker;


assert_cfg!(
    any(
        feature = "sort_rayon",
        feature = "sort_std",
        feature = "sort_worker",
    ),
    "no sort mode enabled",
);


#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Reflect,
    Serialize,
    Deserialize,
    ValueEnum,
)]
pub enum SortMode {
    #[cfg(feature = "sort_std")]
    Std,

    #[cfg(feature = "sort_rayon")]
    Rayon,

    #[cfg(feature = "sort_worker")]
    Worker,
}

impl Default for SortMode {
    #[allow(unreachable_code)]
    fn default() -> Self {
        #[cfg(feature = "sort_worker")]
        return Self::Worker;

        #[cfg(feature = "sort_rayon")]
        return Self::Rayon;

        #[cfg(feature = "sort_std")]
        return Self::Std;
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}


#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Reflect,
    Serialize,
    Deserialize,
    ValueEnum,
)]
pub enum SortMetric {
    /// depth along the camera axis
    #[default]
    Linear,

    /// distance from the camera position
    Radial,
}

impl std::fmt::Display for SortMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}


/// native points of a resource, shared read-only with the sorter
pub type SplatCenters = Arc<SplatResource>;


/// rows of the work buffer owned by one placement, in payload order
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementIntervals {
    pub resource: ResourceId,
    pub line_start: u32,
    pub padding: u32,
    pub intervals: IntervalList,
}

impl PlacementIntervals {
    pub fn active(&self) -> u32 {
        self.intervals.total()
    }
}


/// selected native ranges for every placement under one centers version
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalsPayload {
    pub version: u64,
    pub texture_size: u32,
    pub placements: Vec<PlacementIntervals>,
    pub total_used_pixels: u32,
}


/// camera-relative sort parameters of one placement, in its local space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SortParams {
    /// camera backward axis, transformed by the inverse model matrix and normalized
    pub direction: Vec3,
    pub camera_position: Vec3,

    /// world depth of the placement origin along the camera backward axis
    pub offset: f32,
    pub scale: f32,
}

impl SortParams {
    pub fn new(model: &Mat4, camera: &Mat4) -> Self {
        let inverse = model.inverse();
        let camera_position = camera.w_axis.truncate();
        let camera_back = camera.z_axis.truncate().normalize_or_zero();

        let (scale, _, translation) = model.to_scale_rotation_translation();

        Self {
            direction: inverse.transform_vector3(camera_back).normalize_or_zero(),
            camera_position: inverse.transform_point3(camera_position),
            offset: (translation - camera_position).dot(camera_back),
            scale: scale.x,
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct SortReply {
    /// used cells covered by `order`, padding included
    pub count: u32,
    pub version: u64,

    /// work-buffer cell indices, back to front
    pub order: Vec<u32>,
}


/// message contract of the asynchronous depth-sort oracle
pub trait SortService: Send + Sync {
    fn set_centers(&mut self, id: ResourceId, centers: Option<SplatCenters>);
    fn set_intervals(&mut self, payload: IntervalsPayload);
    fn set_sort_params(&mut self, params: Vec<SortParams>, metric: SortMetric);

    /// replies delivered since the last poll, in arrival order
    fn poll_sorted(&mut self) -> Vec<SortReply>;
}


pub fn create_sorter(mode: SortMode) -> Box<dyn SortService> {
    match mode {
        #[cfg(feature = "sort_std")]
        SortMode::Std => Box::new(inline::InlineSorter::sequential()),

        #[cfg(feature = "sort_rayon")]
        SortMode::Rayon => Box::new(inline::InlineSorter::parallel()),

        #[cfg(feature = "sort_worker")]
        SortMode::Worker => match worker::WorkerSorter::spawn() {
            Ok(sorter) => Box::new(sorter),
            Err(err) => {
                warn!(?err, "failed to spawn sort worker, sorting inline");
                Box::new(inline::InlineSorter::default())
            }
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_for_identity_model_use_world_axes() {
        let camera = Transform::from_xyz(0.0, 0.0, 10.0).compute_matrix();
        let params = SortParams::new(&Mat4::IDENTITY, &camera);

        assert_eq!(params.direction, Vec3::Z);
        assert_eq!(params.camera_position, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(params.offset, -10.0);
        assert_eq!(params.scale, 1.0);
    }

    #[test]
    fn display_matches_cli_names() {
        assert_eq!(SortMetric::Radial.to_string(), "radial");
    }
}
