#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

use bevy::prelude::*;

use bevy_unified_splatting::{
    CpuDevice,
    Placement,
    ResourceId,
    SplatResource,
    TransformSnapshot,
    WorkBufferSettings,
    random_leveled,
    random_points,
    render::registry::ResourceRegistry,
    sort::{
        IntervalsPayload,
        SortMetric,
        SortParams,
        SortReply,
        SortService,
        SplatCenters,
    },
};


/// everything a scripted sorter received, plus replies waiting to be delivered
#[derive(Default)]
pub struct SorterLog {
    pub registered: HashMap<ResourceId, usize>,
    pub unregistered: Vec<ResourceId>,
    pub payloads: Vec<IntervalsPayload>,
    pub sort_requests: Vec<Vec<SortParams>>,
    pub pending: Vec<SortReply>,
}

impl SorterLog {
    pub fn latest_version(&self) -> u64 {
        self.payloads.last().map_or(0, |payload| payload.version)
    }
}


/// sorter that only replies when a test injects a reply
#[derive(Clone, Default)]
pub struct ScriptedSorter {
    pub log: Arc<Mutex<SorterLog>>,
}

impl ScriptedSorter {
    /// identity order over the used cells of the payload submitted under `version`
    pub fn reply(&self, version: u64) -> SortReply {
        let log = self.log.lock().unwrap();
        let payload = log.payloads
            .iter()
            .find(|payload| payload.version == version)
            .expect("no payload submitted under this version");

        SortReply {
            count: payload.total_used_pixels,
            version,
            order: (0..payload.total_used_pixels).collect(),
        }
    }

    pub fn inject(&self, reply: SortReply) {
        self.log.lock().unwrap().pending.push(reply);
    }

    pub fn inject_version(&self, version: u64) {
        let reply = self.reply(version);
        self.inject(reply);
    }

    pub fn latest_version(&self) -> u64 {
        self.log.lock().unwrap().latest_version()
    }

    pub fn registrations(&self, id: ResourceId) -> usize {
        self.log.lock().unwrap().registered.get(&id).copied().unwrap_or(0)
    }

    pub fn unregistered(&self) -> Vec<ResourceId> {
        self.log.lock().unwrap().unregistered.clone()
    }
}

impl SortService for ScriptedSorter {
    fn set_centers(&mut self, id: ResourceId, centers: Option<SplatCenters>) {
        let mut log = self.log.lock().unwrap();
        match centers {
            Some(_) => *log.registered.entry(id).or_insert(0) += 1,
            None => log.unregistered.push(id),
        }
    }

    fn set_intervals(&mut self, payload: IntervalsPayload) {
        self.log.lock().unwrap().payloads.push(payload);
    }

    fn set_sort_params(&mut self, params: Vec<SortParams>, _metric: SortMetric) {
        self.log.lock().unwrap().sort_requests.push(params);
    }

    fn poll_sorted(&mut self) -> Vec<SortReply> {
        std::mem::take(&mut self.log.lock().unwrap().pending)
    }
}


pub struct TestScene {
    pub device: CpuDevice,
    pub registry: ResourceRegistry,
    pub scene: TransformSnapshot,
    pub settings: WorkBufferSettings,
}

impl Default for TestScene {
    fn default() -> Self {
        Self {
            device: CpuDevice::default(),
            registry: ResourceRegistry::default(),
            scene: TransformSnapshot::default(),
            settings: WorkBufferSettings::default(),
        }
    }
}


pub fn simple_resource(count: usize) -> Arc<SplatResource> {
    Arc::new(SplatResource::simple(random_points(count, None)).unwrap())
}

pub fn sh_resource(count: usize, degree: u32) -> Arc<SplatResource> {
    Arc::new(SplatResource::simple(random_points(count, Some(degree))).unwrap())
}

/// one block at the origin, 100 coarse points then 900 finer ones
pub fn leveled_resource() -> Arc<SplatResource> {
    let (points, blocks) = random_leveled(1, &[100, 900], 2.0).unwrap();
    Arc::new(SplatResource::leveled(points, blocks).unwrap())
}

pub fn node(index: u32) -> Entity {
    Entity::from_raw(index + 1)
}

pub fn placement(index: u32, resource: &Arc<SplatResource>) -> Placement {
    Placement::new(node(index), resource.clone())
}

pub fn camera_at(position: Vec3) -> Mat4 {
    Mat4::from_translation(position)
}
