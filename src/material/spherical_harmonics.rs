use bevy::math::Vec3;


pub const fn num_sh_coefficients(degree: usize) -> usize {
    if degree == 0 {
        1
    } else {
        2 * degree + 1 + num_sh_coefficients(degree - 1)
    }
}

// the highest enabled band wins when several sh features are on
#[cfg(feature = "sh3")]
pub const SH_DEGREE: usize = 3;

#[cfg(all(feature = "sh2", not(feature = "sh3")))]
pub const SH_DEGREE: usize = 2;

#[cfg(all(feature = "sh1", not(any(feature = "sh2", feature = "sh3"))))]
pub const SH_DEGREE: usize = 1;

#[cfg(not(any(feature = "sh1", feature = "sh2", feature = "sh3")))]
pub const SH_DEGREE: usize = 0;

pub const SH_CHANNELS: usize = 3;

const SH_C1: f32 = 0.488_602_51;
const SH_C2: [f32; 5] = [
    1.092_548_4,
    -1.092_548_4,
    0.315_391_57,
    -1.092_548_4,
    0.546_274_2,
];
const SH_C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_34,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];


/// view-dependent color offset from bands 1..=degree
///
/// `rest` holds the coefficients after band 0 in coefficient-major rgb
/// order, `direction` points from the camera to the splat. bands above
/// `SH_DEGREE` or beyond `rest` are ignored.
pub fn evaluate_sh(degree: u32, rest: &[[f32; 3]], direction: Vec3) -> Vec3 {
    let degree = (degree as usize).min(SH_DEGREE);
    let coefficient = |i: usize| rest.get(i).map_or(Vec3::ZERO, |c| Vec3::from(*c));

    let mut color = Vec3::ZERO;
    if degree == 0 {
        return color;
    }

    let Vec3 { x, y, z } = direction.normalize_or_zero();

    color += -SH_C1 * y * coefficient(0)
        + SH_C1 * z * coefficient(1)
        - SH_C1 * x * coefficient(2);

    if degree == 1 {
        return color;
    }

    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, yz, xz) = (x * y, y * z, x * z);

    color += SH_C2[0] * xy * coefficient(3)
        + SH_C2[1] * yz * coefficient(4)
        + SH_C2[2] * (2.0 * zz - xx - yy) * coefficient(5)
        + SH_C2[3] * xz * coefficient(6)
        + SH_C2[4] * (xx - yy) * coefficient(7);

    if degree == 2 {
        return color;
    }

    color += SH_C3[0] * y * (3.0 * xx - yy) * coefficient(8)
        + SH_C3[1] * xy * z * coefficient(9)
        + SH_C3[2] * y * (4.0 * zz - xx - yy) * coefficient(10)
        + SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy) * coefficient(11)
        + SH_C3[4] * x * (4.0 * zz - xx - yy) * coefficient(12)
        + SH_C3[5] * z * (xx - yy) * coefficient(13)
        + SH_C3[6] * x * (xx - 3.0 * yy) * coefficient(14);

    color
}
