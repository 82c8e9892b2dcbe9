pub mod covariance;
pub mod f16;
pub mod f32;
pub mod rand;
pub mod resource;
pub mod settings;
