use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bevy::{
    math::bounding::Aabb3d,
    prelude::*,
};

#[cfg(feature = "sort_rayon")]
use rayon::prelude::*;

use crate::{
    error::ResourceError,
    gaussian::f32::{
        Position,
        Rotation,
        ScaleOpacity,
    },
    material::spherical_harmonics::num_sh_coefficients,
};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}


/// higher-order spherical harmonic terms, `rest_count(degree)` rgb triples per point
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShRest {
    pub degree: u32,
    pub coefficients: Vec<[f32; 3]>,
}

impl ShRest {
    pub fn rest_count(degree: u32) -> usize {
        num_sh_coefficients(degree as usize).saturating_sub(1)
    }

    pub fn stride(&self) -> usize {
        Self::rest_count(self.degree)
    }

    pub fn point(&self, index: usize) -> &[[f32; 3]] {
        let stride = self.stride();
        &self.coefficients[index * stride..(index + 1) * stride]
    }
}


/// native per-point streams of one splat resource
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplatPoints {
    pub positions: Vec<Position>,
    pub rotations: Vec<Rotation>,
    pub scale_opacity: Vec<ScaleOpacity>,

    /// base rgb (sh band 0 already applied)
    pub colors: Vec<[f32; 3]>,
    pub sh: Option<ShRest>,
}

impl SplatPoints {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn validate(&self) -> Result<(), ResourceError> {
        let expected = self.len();
        let lengths = [
            ("rotations", self.rotations.len()),
            ("scale_opacity", self.scale_opacity.len()),
            ("colors", self.colors.len()),
        ];

        for (stream, len) in lengths {
            if len != expected {
                return Err(ResourceError::StreamLength { stream, len, expected });
            }
        }

        if let Some(sh) = &self.sh {
            let expected = expected * sh.stride();
            if sh.coefficients.len() != expected {
                return Err(ResourceError::StreamLength {
                    stream: "sh",
                    len: sh.coefficients.len(),
                    expected,
                });
            }
        }

        Ok(())
    }

    pub fn compute_aabb(&self) -> Option<Aabb3d> {
        if self.is_empty() {
            return None;
        }

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        #[cfg(feature = "sort_rayon")]
        {
            (min, max) = self.positions
                .par_iter()
                .fold(
                    || (min, max),
                    |(curr_min, curr_max), position| {
                        let pos = Vec3::from(*position);
                        (curr_min.min(pos), curr_max.max(pos))
                    },
                )
                .reduce(
                    || (min, max),
                    |(a_min, a_max), (b_min, b_max)| (a_min.min(b_min), a_max.max(b_max)),
                );
        }

        #[cfg(not(feature = "sort_rayon"))]
        {
            for position in self.positions.iter() {
                min = min.min(Vec3::from(*position));
                max = max.max(Vec3::from(*position));
            }
        }

        Some(Aabb3d { min: min.into(), max: max.into() })
    }
}


/// spatial lod metadata: native points are grouped by block, then by level, coarse level first
#[derive(Clone, Debug, PartialEq)]
pub struct LodBlocks {
    centers: Vec<Vec3>,
    counts: Vec<u32>,
    levels: usize,
    block_size: f32,
    offsets: Vec<u32>,
}

impl LodBlocks {
    pub fn new(
        centers: Vec<Vec3>,
        counts: Vec<u32>,
        levels: usize,
        block_size: f32,
    ) -> Result<Self, ResourceError> {
        if levels == 0 {
            return Err(ResourceError::NoLevels);
        }

        let expected = centers.len() * levels;
        if counts.len() != expected {
            return Err(ResourceError::BlockShape {
                blocks: centers.len(),
                levels,
                expected,
                len: counts.len(),
            });
        }

        let mut offsets = Vec::with_capacity(centers.len());
        let mut offset = 0u32;
        for block in counts.chunks(levels) {
            offsets.push(offset);
            offset += block.iter().sum::<u32>();
        }

        Ok(Self {
            centers,
            counts,
            levels,
            block_size,
            offsets,
        })
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn center(&self, block: usize) -> Vec3 {
        self.centers[block]
    }

    pub fn level_counts(&self, block: usize) -> &[u32] {
        &self.counts[block * self.levels..(block + 1) * self.levels]
    }

    /// native index of the first point of `block`
    pub fn offset(&self, block: usize) -> u32 {
        self.offsets[block]
    }

    /// points of `block` covered by its `levels` coarsest levels
    pub fn prefix(&self, block: usize, levels: usize) -> u32 {
        self.level_counts(block)
            .iter()
            .take(levels)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|&count| count as usize).sum()
    }
}


#[derive(Clone, Debug, PartialEq)]
pub enum SplatData {
    Simple(SplatPoints),
    Leveled(SplatPoints, LodBlocks),
}


/// immutable splat resource shared between placements
#[derive(Debug)]
pub struct SplatResource {
    id: ResourceId,
    data: SplatData,
    aabb: Option<Aabb3d>,
}

impl SplatResource {
    pub fn simple(points: SplatPoints) -> Result<Self, ResourceError> {
        points.validate()?;
        Ok(Self::build(SplatData::Simple(points)))
    }

    pub fn leveled(points: SplatPoints, blocks: LodBlocks) -> Result<Self, ResourceError> {
        points.validate()?;

        let covered = blocks.total();
        if covered != points.len() {
            return Err(ResourceError::BlockCoverage {
                covered,
                points: points.len(),
            });
        }

        Ok(Self::build(SplatData::Leveled(points, blocks)))
    }

    fn build(data: SplatData) -> Self {
        let points = match &data {
            SplatData::Simple(points) | SplatData::Leveled(points, _) => points,
        };
        let aabb = points.compute_aabb();

        Self {
            id: ResourceId::next(),
            data,
            aabb,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn data(&self) -> &SplatData {
        &self.data
    }

    pub fn points(&self) -> &SplatPoints {
        match &self.data {
            SplatData::Simple(points) | SplatData::Leveled(points, _) => points,
        }
    }

    pub fn blocks(&self) -> Option<&LodBlocks> {
        match &self.data {
            SplatData::Simple(_) => None,
            SplatData::Leveled(_, blocks) => Some(blocks),
        }
    }

    pub fn len(&self) -> usize {
        self.points().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }

    pub fn aabb(&self) -> Option<Aabb3d> {
        self.aabb
    }

    pub fn sh_degree(&self) -> u32 {
        self.points().sh.as_ref().map_or(0, |sh| sh.degree)
    }
}


#[derive(Asset, TypePath, Clone, Debug)]
pub struct SplatCloud(pub Arc<SplatResource>);


/// identity of a placement inside a manager
pub type PlacementKey = (Entity, ResourceId);

/// one resource positioned in the scene by a transform node
#[derive(Clone, Debug)]
pub struct Placement {
    pub node: Entity,
    pub resource: Arc<SplatResource>,
    pub lod_distances: Option<Vec<f32>>,
}

impl Placement {
    pub fn new(node: Entity, resource: Arc<SplatResource>) -> Self {
        Self {
            node,
            resource,
            lod_distances: None,
        }
    }

    pub fn with_lod_distances(mut self, distances: Vec<f32>) -> Self {
        self.lod_distances = Some(distances);
        self
    }

    pub fn key(&self) -> PlacementKey {
        (self.node, self.resource.id())
    }
}
