use bevy::prelude::*;
use bevy_args::{
    Deserialize,
    Parser,
    Serialize,
};

use crate::{
    gaussian::settings::WorkBufferFormat,
    sort::{
        SortMetric,
        SortMode,
    },
};


#[derive(
    Clone,
    Debug,
    PartialEq,
    Resource,
    Reflect,
    Serialize,
    Deserialize,
    Parser,
)]
#[reflect(Resource)]
#[serde(default)]
#[command(about = "bevy_unified_splatting work buffer", version, long_about = None)]
pub struct WorkBufferSettings {
    /// updates a placement counts as recently moved after its last transform change
    #[arg(long, default_value = "100")]
    pub activity_window: u64,

    /// camera travel that triggers lod and row recomputation
    #[arg(long, default_value = "1.0")]
    pub camera_move_threshold: f32,

    /// camera travel that refreshes view-dependent color
    #[arg(long, default_value = "0.25")]
    pub color_update_threshold: f32,

    #[arg(long, default_value = "4096")]
    pub max_texture_size: u32,

    #[arg(long, value_delimiter = ',', default_values_t = vec![5.0, 10.0, 15.0, 20.0, 25.0])]
    pub lod_distances: Vec<f32>,

    /// finest lod index a block may select
    #[arg(long, default_value = "0")]
    pub lod_range_min: u32,

    /// coarsest lod index a block may select
    #[arg(long, default_value = "4294967295")]
    pub lod_range_max: u32,

    #[arg(long, default_value = "1.0")]
    pub lod_behind_penalty: f32,

    #[arg(long, value_enum, default_value_t)]
    pub sort_mode: SortMode,

    #[arg(long, value_enum, default_value_t)]
    pub sort_metric: SortMetric,

    #[arg(long, value_enum, default_value_t)]
    pub format: WorkBufferFormat,
}

impl Default for WorkBufferSettings {
    fn default() -> WorkBufferSettings {
        WorkBufferSettings {
            activity_window: 100,
            camera_move_threshold: 1.0,
            color_update_threshold: 0.25,
            max_texture_size: 4096,
            lod_distances: vec![5.0, 10.0, 15.0, 20.0, 25.0],
            lod_range_min: 0,
            lod_range_max: u32::MAX,
            lod_behind_penalty: 1.0,
            sort_mode: SortMode::default(),
            sort_metric: SortMetric::default(),
            format: WorkBufferFormat::default(),
        }
    }
}

impl WorkBufferSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
