use bevy::math::Vec3;
use rand::{
    prelude::Distribution,
    Rng,
};

use crate::{
    error::ResourceError,
    gaussian::{
        f32::{
            Position,
            Rotation,
            ScaleOpacity,
        },
        resource::{
            LodBlocks,
            ShRest,
            SplatPoints,
        },
    },
};


pub struct SplatSample {
    pub position: Position,
    pub rotation: Rotation,
    pub scale_opacity: ScaleOpacity,
    pub color: [f32; 3],
}

impl Distribution<SplatSample> for rand::distributions::Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SplatSample {
        let rotation = bevy::math::Quat::from_xyzw(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(0.1..1.0),
        ).normalize();

        SplatSample {
            position: [
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            ],
            rotation: rotation.into(),
            scale_opacity: [
                rng.gen_range(0.01..1.0),
                rng.gen_range(0.01..1.0),
                rng.gen_range(0.01..1.0),
                rng.gen_range(0.0..0.8),
            ].into(),
            color: [
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            ],
        }
    }
}


pub fn random_points(n: usize, sh_degree: Option<u32>) -> SplatPoints {
    let mut rng = rand::thread_rng();
    let mut points = SplatPoints::default();

    for _ in 0..n {
        let sample: SplatSample = rng.r#gen();
        points.positions.push(sample.position);
        points.rotations.push(sample.rotation);
        points.scale_opacity.push(sample.scale_opacity);
        points.colors.push(sample.color);
    }

    points.sh = sh_degree.map(|degree| ShRest {
        degree,
        coefficients: (0..n * ShRest::rest_count(degree))
            .map(|_| [
                rng.gen_range(-0.3..0.3),
                rng.gen_range(-0.3..0.3),
                rng.gen_range(-0.3..0.3),
            ])
            .collect(),
    });

    points
}


/// `blocks` blocks on a line along x, each with `level_counts` points per level
pub fn random_leveled(
    blocks: usize,
    level_counts: &[u32],
    block_size: f32,
) -> Result<(SplatPoints, LodBlocks), ResourceError> {
    let mut rng = rand::thread_rng();
    let per_block: u32 = level_counts.iter().sum();

    let centers: Vec<Vec3> = (0..blocks)
        .map(|block| Vec3::new(block as f32 * block_size, 0.0, 0.0))
        .collect();

    let mut points = random_points(blocks * per_block as usize, None);
    for (index, position) in points.positions.iter_mut().enumerate() {
        let center = centers[index / per_block.max(1) as usize];
        let half = block_size * 0.5;
        *position = [
            center.x + rng.gen_range(-half..=half),
            center.y + rng.gen_range(-half..=half),
            center.z + rng.gen_range(-half..=half),
        ];
    }

    let counts = centers
        .iter()
        .flat_map(|_| level_counts.iter().copied())
        .collect();

    let lod = LodBlocks::new(centers, counts, level_counts.len(), block_size)?;

    Ok((points, lod))
}
