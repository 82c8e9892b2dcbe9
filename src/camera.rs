use bevy::prelude::*;


/// cameras carrying this marker get one work buffer per enabled render layer
#[derive(
    Clone,
    Component,
    Debug,
    Default,
    Reflect,
)]
#[reflect(Component)]
pub struct WorkBufferCamera;
