use bevy::math::{Mat3, Mat4, Quat, Vec3};

/// upper triangle `[xx, xy, xz, yy, yz, zz]` of a symmetric 3x3 matrix
pub fn upper_triangle(sigma: &Mat3) -> [f32; 6] {
    [
        sigma.x_axis.x,
        sigma.y_axis.x,
        sigma.z_axis.x,
        sigma.y_axis.y,
        sigma.z_axis.y,
        sigma.z_axis.z,
    ]
}

#[allow(non_snake_case)]
pub fn compute_covariance_3d(rotation: Quat, scale: Vec3) -> Mat3 {
    let R = Mat3::from_quat(rotation.normalize());
    let S = Mat3::from_diagonal(scale);

    let M = R * S;
    M * M.transpose()
}

/// covariance of a splat after the placement's model transform
#[allow(non_snake_case)]
pub fn world_covariance(model: &Mat4, rotation: Quat, scale: Vec3) -> [f32; 6] {
    let L = Mat3::from_mat4(*model);
    let Sigma = compute_covariance_3d(rotation, scale);

    upper_triangle(&(L * Sigma * L.transpose()))
}

/// rotation and scale of a splat after the placement's model transform,
/// with the rotation's scalar part kept non-negative
pub fn world_rotation_scale(model: &Mat4, rotation: Quat, scale: Vec3) -> (Quat, Vec3) {
    let (model_scale, model_rotation, _) = model.to_scale_rotation_translation();

    let mut world_rotation = (model_rotation * rotation).normalize();
    if world_rotation.w < 0.0 {
        world_rotation = -world_rotation;
    }

    (world_rotation, model_scale * scale)
}
