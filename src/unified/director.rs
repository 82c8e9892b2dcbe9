use std::collections::{
    HashMap,
    HashSet,
};

use bevy::prelude::*;

use crate::{
    gaussian::resource::Placement,
    render::{
        device::SplatDevice,
        registry::ResourceRegistry,
    },
    sort::{
        SortService,
        create_sorter,
    },
    unified::{
        manager::{
            Manager,
            WorkBufferView,
        },
        scene::SceneGraph,
    },
    utils::WorkBufferSettings,
};


#[derive(Clone, Debug, Default)]
pub struct LayerComposition {
    pub layer: usize,
    pub placements: Vec<Placement>,

    /// the placement set differs from the previous frame
    pub dirty: bool,
}

#[derive(Clone, Debug)]
pub struct CameraComposition {
    pub camera: Entity,
    pub world: Mat4,
    pub layers: Vec<LayerComposition>,
}

/// cameras, their enabled layers and the placements visible on each
#[derive(Clone, Debug, Default)]
pub struct Composition {
    pub cameras: Vec<CameraComposition>,
}


pub type SorterFactory = Box<dyn Fn(&WorkBufferSettings) -> Box<dyn SortService> + Send + Sync>;

pub type ManagerKey = (Entity, usize);


/// owns one manager per (camera, layer) with placements, and the shared resource registry
pub struct Director {
    managers: HashMap<ManagerKey, Manager>,
    registry: ResourceRegistry,
    sorter_factory: SorterFactory,
}

impl Default for Director {
    fn default() -> Self {
        Self::new(Box::new(|settings: &WorkBufferSettings| create_sorter(settings.sort_mode)))
    }
}

impl Director {
    pub fn new(sorter_factory: SorterFactory) -> Self {
        Self {
            managers: HashMap::new(),
            registry: ResourceRegistry::default(),
            sorter_factory,
        }
    }

    pub fn manager(&self, camera: Entity, layer: usize) -> Option<&Manager> {
        self.managers.get(&(camera, layer))
    }

    pub fn managers(&self) -> impl Iterator<Item = &Manager> {
        self.managers.values()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn views(&self) -> HashMap<ManagerKey, WorkBufferView> {
        self.managers
            .iter()
            .map(|(key, manager)| (*key, manager.view()))
            .collect()
    }

    pub fn update(
        &mut self,
        device: &mut dyn SplatDevice,
        scene: &dyn SceneGraph,
        composition: &Composition,
        settings: &WorkBufferSettings,
    ) {
        let mut live = HashSet::new();
        let mut camera_worlds = HashMap::new();

        for camera in &composition.cameras {
            camera_worlds.insert(camera.camera, camera.world);

            for layer in &camera.layers {
                if layer.placements.is_empty() {
                    continue;
                }

                let key = (camera.camera, layer.layer);
                live.insert(key);

                let created = !self.managers.contains_key(&key);
                let manager = self.managers.entry(key).or_insert_with(|| {
                    info!(camera = ?camera.camera, layer = layer.layer, "created work buffer manager");
                    Manager::new(camera.camera, layer.layer, settings.format, (self.sorter_factory)(settings))
                });

                if created || layer.dirty {
                    manager.reconcile(device, &mut self.registry, &layer.placements);
                }
            }
        }

        let stale: Vec<ManagerKey> = self.managers
            .keys()
            .filter(|key| !live.contains(*key))
            .copied()
            .collect();

        for key in stale {
            if let Some(mut manager) = self.managers.remove(&key) {
                manager.destroy(device, &mut self.registry);
                info!(camera = ?key.0, layer = key.1, "destroyed work buffer manager");
            }
        }

        for (key, manager) in self.managers.iter_mut() {
            let Some(world) = camera_worlds.get(&key.0) else {
                continue;
            };

            manager.update(device, &self.registry, scene, world, settings);
        }
    }

    pub fn destroy(&mut self, device: &mut dyn SplatDevice) {
        for (_, mut manager) in self.managers.drain() {
            manager.destroy(device, &mut self.registry);
        }
        self.registry.destroy(device);
    }
}
