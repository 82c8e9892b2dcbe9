pub mod centers;
pub mod director;
pub mod info;
pub mod manager;
pub mod scene;

pub use director::{
    CameraComposition,
    Composition,
    Director,
    LayerComposition,
};
pub use manager::{
    Manager,
    WorkBufferView,
};
pub use scene::{
    SceneGraph,
    TransformSnapshot,
};
