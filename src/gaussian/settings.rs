use bevy::prelude::*;
use clap::ValueEnum;
use serde::{
    Deserialize,
    Serialize,
};


/// per-splat geometry layout written to the work buffer
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
pub enum WorkBufferFormat {
    #[default]
    Covariance,
    RotationScale,
}

impl std::fmt::Display for WorkBufferFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}


/// per-placement overrides, attached next to `SplatPlacementHandle`
#[derive(Component, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct PlacementSettings {
    /// replaces `WorkBufferSettings::lod_distances` for this placement
    pub lod_distances: Option<Vec<f32>>,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            lod_distances: None,
        }
    }
}


/// color multiplier applied to every splat of a placement
#[derive(Component, Reflect, Clone, Copy, Debug, PartialEq)]
#[reflect(Component)]
pub struct SplatTint(pub Vec4);

impl Default for SplatTint {
    fn default() -> Self {
        Self(Vec4::ONE)
    }
}
