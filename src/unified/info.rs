use std::sync::Arc;

use bevy::prelude::*;

use crate::{
    error::DeviceError,
    gaussian::{
        resource::{
            Placement,
            PlacementKey,
            ResourceId,
            SplatResource,
        },
        settings::WorkBufferFormat,
    },
    lod::{
        IntervalList,
        LodEvaluator,
        LodParams,
    },
    render::{
        device::{
            RenderTargetId,
            SplatDevice,
        },
        interval::IntervalTexture,
        pass::{
            PassMode,
            PlacementDraw,
        },
    },
    unified::scene::SceneGraph,
};


/// lod selection and work-buffer rows of a placement for one centers version
#[derive(Debug, Default)]
pub struct PlacementState {
    pub line_start: u32,
    pub line_count: u32,
    pub intervals: IntervalList,
    remap: IntervalTexture,
}

impl PlacementState {
    pub fn active(&self) -> u32 {
        self.intervals.total()
    }

    pub fn remap(&self) -> &IntervalTexture {
        &self.remap
    }

    pub fn rows(&self) -> std::ops::Range<u32> {
        self.line_start..self.line_start + self.line_count
    }

    fn destroy(&mut self, device: &mut dyn SplatDevice) {
        self.remap.destroy(device);
    }
}


/// per-placement bookkeeping owned by a manager
pub struct PlacementInfo {
    placement: Placement,
    lod: LodEvaluator,
    update_version: u64,
    world: Mat4,
    tint: Vec4,
    observed: bool,
    tint_dirty: bool,
    prepare: Option<PlacementState>,
    render: Option<PlacementState>,
    spare: Option<PlacementState>,
}

impl PlacementInfo {
    pub fn new(placement: Placement) -> Self {
        Self {
            placement,
            lod: LodEvaluator::default(),
            update_version: 0,
            world: Mat4::IDENTITY,
            tint: Vec4::ONE,
            observed: false,
            tint_dirty: false,
            prepare: None,
            render: None,
            spare: None,
        }
    }

    pub fn key(&self) -> PlacementKey {
        self.placement.key()
    }

    pub fn node(&self) -> Entity {
        self.placement.node
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub fn resource(&self) -> &Arc<SplatResource> {
        &self.placement.resource
    }

    pub fn resource_id(&self) -> ResourceId {
        self.placement.resource.id()
    }

    pub fn update_version(&self) -> u64 {
        self.update_version
    }

    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    pub fn tint(&self) -> Vec4 {
        self.tint
    }

    pub fn has_sh(&self) -> bool {
        self.placement.resource.sh_degree() > 0
    }

    pub fn prepare_state(&self) -> Option<&PlacementState> {
        self.prepare.as_ref()
    }

    pub fn render_state(&self) -> Option<&PlacementState> {
        self.render.as_ref()
    }

    /// polls the scene, stamps `version` and returns true when the world transform changed
    pub fn update(&mut self, version: u64, scene: &dyn SceneGraph) -> bool {
        let node = self.node();

        let world = scene.world_transform(node).unwrap_or_else(|| {
            debug!(?node, "placement node has no world transform");
            Mat4::IDENTITY
        });

        let tint = scene.tint(node);
        if tint != self.tint {
            self.tint = tint;
            self.tint_dirty = true;
        }

        if self.observed && world == self.world {
            return false;
        }

        self.observed = true;
        self.world = world;
        self.update_version = version;
        true
    }

    pub fn take_tint_dirty(&mut self) -> bool {
        std::mem::take(&mut self.tint_dirty)
    }

    /// evaluates lod into a fresh prepare state, rows are assigned later
    pub fn start_prepare_state(
        &mut self,
        device: &mut dyn SplatDevice,
        camera: &Mat4,
        params: &LodParams,
    ) -> Result<(), DeviceError> {
        self.cancel_prepare_state(device);

        let mut state = self.spare.take().unwrap_or_default();
        state.line_start = 0;
        state.line_count = 0;

        self.lod.evaluate(&self.placement.resource, &self.world, camera, params);
        state.intervals.clone_from(self.lod.intervals());

        let result = if self.placement.resource.blocks().is_some() {
            state.remap.update(device, state.intervals.as_slice())
        } else {
            state.remap.destroy(device);
            Ok(())
        };

        if result.is_err() {
            state.intervals.clear();
        }

        self.prepare = Some(state);
        result
    }

    pub fn assign_lines(&mut self, line_start: u32, line_count: u32) {
        if let Some(state) = self.prepare.as_mut() {
            state.line_start = line_start;
            state.line_count = line_count;
        }
    }

    /// promotes the prepare state, the previous render state is recycled
    pub fn activate_prepare_state(&mut self, device: &mut dyn SplatDevice) -> bool {
        let Some(prepare) = self.prepare.take() else {
            return false;
        };

        if let Some(previous) = self.render.replace(prepare) {
            self.recycle(device, previous);
        }
        true
    }

    pub fn cancel_prepare_state(&mut self, device: &mut dyn SplatDevice) {
        if let Some(prepare) = self.prepare.take() {
            self.recycle(device, prepare);
        }
    }

    fn recycle(&mut self, device: &mut dyn SplatDevice, mut state: PlacementState) {
        if self.spare.is_none() {
            self.spare = Some(state);
        } else {
            state.destroy(device);
        }
    }

    /// draw parameters for the render state, `None` before the first commit
    pub fn draw(
        &self,
        mode: PassMode,
        format: WorkBufferFormat,
        width: u32,
        camera: &Mat4,
    ) -> Option<(PlacementDraw, Option<RenderTargetId>)> {
        let state = self.render.as_ref()?;

        let draw = PlacementDraw {
            mode,
            format,
            model: self.world,
            camera: *camera,
            tint: self.tint,
            line_start: state.line_start,
            line_count: state.line_count,
            width,
            active: state.active(),
        };

        Some((draw, state.remap.remap_target()))
    }

    pub fn destroy(&mut self, device: &mut dyn SplatDevice) {
        let states = [self.prepare.take(), self.render.take(), self.spare.take()];
        for mut state in states.into_iter().flatten() {
            state.destroy(device);
        }
    }
}
