use thiserror::Error;

use crate::render::RenderTargetId;


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("render target {0:?} does not exist")]
    UnknownTarget(RenderTargetId),

    #[error("render target size {size} exceeds the device limit of {max}")]
    SizeExceedsLimit { size: u32, max: u32 },

    #[error("channel {channel} is out of range for a target with {channels} channels")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error("rows {start}..{end} exceed target height {height}")]
    RowsOutOfRange { start: u32, end: u32, height: u32 },

    #[error("writing {len} texels at offset {offset} overflows a target of {capacity} texels")]
    WriteOutOfRange { offset: usize, len: usize, capacity: usize },

    #[error("render target {0:?} is both an input and the output of a pass")]
    FeedbackLoop(RenderTargetId),
}


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("point stream `{stream}` has {len} entries, expected {expected}")]
    StreamLength { stream: &'static str, len: usize, expected: usize },

    #[error("lod blocks expect {expected} counts ({blocks} blocks x {levels} levels), got {len}")]
    BlockShape { blocks: usize, levels: usize, expected: usize, len: usize },

    #[error("lod block counts cover {covered} points, resource has {points}")]
    BlockCoverage { covered: usize, points: usize },

    #[error("lod blocks need at least one level")]
    NoLevels,
}


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkBufferError {
    #[error("{active} active splats need a {required}x{required} work buffer, the device allows {max}")]
    CapacityExceeded { active: u64, required: u32, max: u32 },

    #[error("source textures for resource {0} are not registered")]
    MissingResource(u64),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
