use std::collections::{
    HashMap,
    HashSet,
};

use bevy::prelude::*;

use crate::{
    gaussian::{
        resource::{
            Placement,
            PlacementKey,
            ResourceId,
        },
        settings::WorkBufferFormat,
    },
    lod::LodParams,
    render::{
        device::{
            RenderTargetId,
            SplatDevice,
        },
        registry::ResourceRegistry,
        work_buffer::{
            WorkBuffer,
            WorkBufferStats,
        },
    },
    sort::{
        SortParams,
        SortReply,
        SortService,
    },
    unified::{
        centers::CentersBuffer,
        info::PlacementInfo,
        scene::SceneGraph,
    },
    utils::WorkBufferSettings,
};


/// what the splat draw step needs from one manager
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkBufferView {
    pub work_buffer: Option<RenderTargetId>,
    pub order: Option<RenderTargetId>,
    pub texture_size: u32,
    pub splat_count: u32,
    pub max_splats: u64,
    pub sorted_version: u64,
}


/// per camera and layer orchestrator of lod, rows, sorting and the work buffer
pub struct Manager {
    camera: Entity,
    layer: usize,
    infos: Vec<PlacementInfo>,
    work_buffer: WorkBuffer,
    centers: CentersBuffer,
    sorter: Box<dyn SortService>,

    resource_users: HashMap<ResourceId, usize>,
    pending_removals: HashMap<ResourceId, u64>,

    sorted_version: u64,
    sorted_version_min: u64,
    update_version: u64,
    refreshed_version: u64,
    force_update: bool,

    last_camera_position: Vec3,
    last_color_position: Vec3,
    rendered_splats: u32,
    discarded_replies: u64,
}

impl Manager {
    pub fn new(
        camera: Entity,
        layer: usize,
        format: WorkBufferFormat,
        sorter: Box<dyn SortService>,
    ) -> Self {
        Self {
            camera,
            layer,
            infos: Vec::new(),
            work_buffer: WorkBuffer::new(format),
            centers: CentersBuffer::default(),
            sorter,
            resource_users: HashMap::new(),
            pending_removals: HashMap::new(),
            sorted_version: 0,
            sorted_version_min: 1,
            update_version: 0,
            refreshed_version: 0,
            force_update: false,
            last_camera_position: Vec3::INFINITY,
            last_color_position: Vec3::INFINITY,
            rendered_splats: 0,
            discarded_replies: 0,
        }
    }

    pub fn camera(&self) -> Entity {
        self.camera
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn placements(&self) -> &[PlacementInfo] {
        &self.infos
    }

    pub fn work_buffer(&self) -> &WorkBuffer {
        &self.work_buffer
    }

    pub fn work_buffer_stats(&self) -> WorkBufferStats {
        self.work_buffer.stats()
    }

    pub fn centers_version(&self) -> u64 {
        self.centers.version()
    }

    pub fn sorted_version(&self) -> u64 {
        self.sorted_version
    }

    pub fn sorted_version_min(&self) -> u64 {
        self.sorted_version_min
    }

    pub fn rendered_splats(&self) -> u32 {
        self.rendered_splats
    }

    pub fn discarded_replies(&self) -> u64 {
        self.discarded_replies
    }

    pub fn pending_removals(&self) -> usize {
        self.pending_removals.len()
    }

    pub fn is_committed(&self) -> bool {
        self.sorted_version >= self.sorted_version_min
    }

    pub fn view(&self) -> WorkBufferView {
        WorkBufferView {
            work_buffer: self.work_buffer.target(),
            order: self.work_buffer.order_target(),
            texture_size: self.work_buffer.texture_size(),
            splat_count: if self.is_committed() { self.rendered_splats } else { 0 },
            max_splats: self.work_buffer.capacity(),
            sorted_version: self.sorted_version,
        }
    }

    /// diffs the placement set, creating and destroying infos
    pub fn reconcile(
        &mut self,
        device: &mut dyn SplatDevice,
        registry: &mut ResourceRegistry,
        placements: &[Placement],
    ) {
        let mut wanted: HashMap<PlacementKey, &Placement> = HashMap::with_capacity(placements.len());
        for placement in placements {
            wanted.entry(placement.key()).or_insert(placement);
        }

        let existing: HashSet<PlacementKey> = self.infos.iter().map(PlacementInfo::key).collect();
        for info in self.infos.iter_mut() {
            if let Some(placement) = wanted.get(&info.key()) {
                info.set_placement((*placement).clone());
            }
        }

        let mut changed = false;

        // additions first, so a resource moving between nodes stays registered
        let mut added = HashSet::new();
        for placement in placements {
            let key = placement.key();
            if existing.contains(&key) || !added.insert(key) {
                continue;
            }

            if let Err(err) = registry.acquire(device, &placement.resource) {
                warn!(?err, node = ?placement.node, "skipping placement, resource upload failed");
                continue;
            }

            let users = self.resource_users.entry(key.1).or_insert(0);
            *users += 1;
            if *users == 1 && self.pending_removals.remove(&key.1).is_none() {
                self.sorter.set_centers(key.1, Some(placement.resource.clone()));
            }

            self.infos.push(PlacementInfo::new(placement.clone()));
            debug!(camera = ?self.camera, layer = self.layer, node = ?key.0, "added placement");
            changed = true;
        }

        let mut index = 0;
        while index < self.infos.len() {
            let key = self.infos[index].key();
            if wanted.contains_key(&key) {
                index += 1;
                continue;
            }

            let mut info = self.infos.remove(index);
            info.destroy(device);
            self.release_resource(device, registry, key.1);
            debug!(camera = ?self.camera, layer = self.layer, node = ?key.0, "removed placement");
            changed = true;
        }

        if changed {
            self.on_change(device);
        }
    }

    fn release_resource(&mut self, device: &mut dyn SplatDevice, registry: &mut ResourceRegistry, id: ResourceId) {
        registry.release(device, id);

        let Some(users) = self.resource_users.get_mut(&id) else {
            return;
        };

        *users -= 1;
        if *users == 0 {
            self.resource_users.remove(&id);
            // in-flight sorts may still read these centers
            self.pending_removals.insert(id, self.centers.version() + 1);
        }
    }

    fn on_change(&mut self, device: &mut dyn SplatDevice) {
        self.sorted_version_min = self.centers.version() + 1;

        if !self.force_update {
            self.force_update = true;
            for info in self.infos.iter_mut() {
                info.cancel_prepare_state(device);
            }
        }
    }

    pub fn update(
        &mut self,
        device: &mut dyn SplatDevice,
        registry: &ResourceRegistry,
        scene: &dyn SceneGraph,
        camera: &Mat4,
        settings: &WorkBufferSettings,
    ) {
        for reply in self.sorter.poll_sorted() {
            self.on_sorted(device, registry, reply, camera);
        }

        let camera_position = camera.w_axis.truncate();

        // no layout changes until the sorter caught up with the current centers
        if self.sorted_version == self.centers.version() || self.force_update {
            let lod_dirty = self.update_splat_order(scene, settings.activity_window);

            let moved = camera_position.distance(self.last_camera_position) > settings.camera_move_threshold;
            if moved || lod_dirty || self.force_update {
                self.force_update = false;
                self.last_camera_position = camera_position;
                self.prepare_layout(device, camera, settings);
            }

            self.sort(camera, settings);
        }

        if !self.is_committed() {
            return;
        }

        let version = self.update_version;
        let refresh = version != self.refreshed_version;
        if refresh {
            self.refreshed_version = version;

            if let Err(err) = self.work_buffer.render_placements(
                device,
                registry,
                &self.infos,
                camera,
                |_, info| info.update_version() == version,
            ) {
                warn!(?err, "work buffer placement refresh failed");
            }
        }

        let color_moved = camera_position.distance(self.last_color_position) > settings.color_update_threshold;
        if color_moved {
            self.last_color_position = camera_position;
        }

        let recolor: Vec<bool> = self.infos
            .iter_mut()
            .map(|info| {
                let tinted = info.take_tint_dirty();
                let redrawn = refresh && info.update_version() == version;
                !redrawn && (tinted || (color_moved && info.has_sh()))
            })
            .collect();

        if recolor.contains(&true) {
            if let Err(err) = self.work_buffer.render_color(
                device,
                registry,
                &self.infos,
                camera,
                |index, _| recolor[index],
            ) {
                warn!(?err, "work buffer color refresh failed");
            }
        }
    }

    /// stamps moved placements and keeps recently moved ones at the end
    fn update_splat_order(&mut self, scene: &dyn SceneGraph, activity_window: u64) -> bool {
        self.update_version += 1;
        let version = self.update_version;

        let mut lod_dirty = false;
        for info in self.infos.iter_mut() {
            lod_dirty |= info.update(version, scene);
        }

        let before: Vec<PlacementKey> = self.infos.iter().map(PlacementInfo::key).collect();

        self.infos.sort_by_key(|info| {
            let active = version - info.update_version() <= activity_window;
            (active, info.update_version())
        });

        let reordered = self.infos
            .iter()
            .zip(&before)
            .any(|(info, key)| info.key() != *key);

        lod_dirty || reordered
    }

    /// recomputes lod and rows, then publishes them under a new centers version
    fn prepare_layout(&mut self, device: &mut dyn SplatDevice, camera: &Mat4, settings: &WorkBufferSettings) {
        for info in self.infos.iter_mut() {
            let params = LodParams::from_settings(settings, info.placement().lod_distances.as_deref());
            if let Err(err) = info.start_prepare_state(device, camera, &params) {
                warn!(?err, node = ?info.node(), "interval texture update failed, placement hidden");
            }
        }

        let actives: Vec<u32> = self.infos
            .iter()
            .map(|info| info.prepare_state().map_or(0, |state| state.active()))
            .collect();

        let max = settings.max_texture_size.min(device.max_texture_size());
        if let Err(err) = self.centers.estimate_texture_size(&actives, max) {
            error!(?err, camera = ?self.camera, layer = self.layer, "work buffer capacity exceeded, keeping previous frame");
            for info in self.infos.iter_mut() {
                info.cancel_prepare_state(device);
            }
            return;
        }

        self.centers.assign_lines(&mut self.infos);
        let payload = self.centers.update(&self.infos);

        debug!(
            camera = ?self.camera,
            layer = self.layer,
            version = payload.version,
            size = payload.texture_size,
            used = payload.total_used_pixels,
            "submitted intervals",
        );
        self.sorter.set_intervals(payload);
    }

    fn sort(&mut self, camera: &Mat4, settings: &WorkBufferSettings) {
        let params = self.infos
            .iter()
            .map(|info| SortParams::new(info.world(), camera))
            .collect();

        self.sorter.set_sort_params(params, settings.sort_metric);
    }

    fn on_sorted(
        &mut self,
        device: &mut dyn SplatDevice,
        registry: &ResourceRegistry,
        reply: SortReply,
        camera: &Mat4,
    ) {
        if reply.version < self.sorted_version_min {
            self.discarded_replies += 1;
            debug!(
                version = reply.version,
                min = self.sorted_version_min,
                "discarded stale sort reply",
            );
            return;
        }

        if self.sorted_version != reply.version && reply.version == self.centers.version() {
            self.sorted_version = reply.version;

            let size = self.centers.texture_size();
            if size != self.work_buffer.texture_size() {
                if let Err(err) = self.work_buffer.resize(device, size) {
                    warn!(?err, size, "work buffer resize failed");
                }
            }

            for info in self.infos.iter_mut() {
                info.activate_prepare_state(device);
            }

            if let Err(err) = self.work_buffer.render(device, registry, &self.infos, camera) {
                warn!(?err, "full work buffer render failed");
            }
        }

        // order data indexes the committed layout only
        if reply.version == self.sorted_version {
            match self.work_buffer.set_order_data(device, &reply.order) {
                Ok(()) => self.rendered_splats = reply.count,
                Err(err) => warn!(?err, "order upload failed"),
            }
        }

        let sorter = &mut self.sorter;
        self.pending_removals.retain(|id, removal_version| {
            if reply.version >= *removal_version {
                sorter.set_centers(*id, None);
                false
            } else {
                true
            }
        });
    }

    pub fn destroy(&mut self, device: &mut dyn SplatDevice, registry: &mut ResourceRegistry) {
        for mut info in self.infos.drain(..) {
            info.destroy(device);
            registry.release(device, info.resource_id());
        }

        self.work_buffer.destroy(device);
        self.resource_users.clear();
        self.pending_removals.clear();
    }
}
