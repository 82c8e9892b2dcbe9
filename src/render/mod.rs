pub mod device;
pub mod interval;
pub mod pass;
pub mod registry;
pub mod work_buffer;

pub use device::{
    CpuDevice,
    RenderTargetId,
    SplatDevice,
    Texel,
};
