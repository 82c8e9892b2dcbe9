use std::collections::HashMap;

use bevy::{
    prelude::*,
    render::view::RenderLayers,
    transform::TransformSystem,
};

pub use camera::WorkBufferCamera;

pub use gaussian::{
    rand::{
        random_leveled,
        random_points,
    },
    resource::{
        LodBlocks,
        Placement,
        PlacementKey,
        ResourceId,
        SplatCloud,
        SplatData,
        SplatPoints,
        SplatResource,
    },
    settings::{
        PlacementSettings,
        SplatTint,
        WorkBufferFormat,
    },
};

pub use render::{
    CpuDevice,
    RenderTargetId,
    SplatDevice,
};

pub use sort::{
    SortMetric,
    SortMode,
};

pub use unified::{
    CameraComposition,
    Composition,
    Director,
    LayerComposition,
    Manager,
    WorkBufferView,
    director::ManagerKey,
    scene::TransformSnapshot,
};

pub use utils::WorkBufferSettings;

pub mod camera;
pub mod error;
pub mod gaussian;
pub mod lod;
pub mod material;
pub mod math;
pub mod render;
pub mod sort;
pub mod unified;
pub mod utils;


#[derive(Component, Clone, Debug, Default)]
pub struct SplatPlacementHandle(pub Handle<SplatCloud>);


/// the director with the device its work buffers live on
#[derive(Resource)]
pub struct SplatDirector {
    pub director: Director,
    pub device: Box<dyn SplatDevice>,
}

impl FromWorld for SplatDirector {
    fn from_world(world: &mut World) -> Self {
        let settings = world
            .get_resource::<WorkBufferSettings>()
            .cloned()
            .unwrap_or_default();

        Self {
            director: Director::default(),
            device: Box::new(CpuDevice::new(settings.max_texture_size)),
        }
    }
}


/// per (camera, layer) draw inputs, refreshed every frame
#[derive(Resource, Clone, Debug, Default)]
pub struct WorkBufferViews(pub HashMap<ManagerKey, WorkBufferView>);


pub struct UnifiedSplattingPlugin;

impl Plugin for UnifiedSplattingPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<SplatCloud>();

        app.register_type::<PlacementSettings>();
        app.register_type::<SplatTint>();
        app.register_type::<WorkBufferCamera>();
        app.register_type::<WorkBufferSettings>();

        app.init_resource::<WorkBufferSettings>();
        app.init_resource::<SplatDirector>();
        app.init_resource::<WorkBufferViews>();

        app.add_systems(
            PostUpdate,
            update_director.after(TransformSystem::TransformPropagate),
        );
    }
}


fn layers_of(layers: Option<&RenderLayers>) -> Vec<usize> {
    layers
        .cloned()
        .unwrap_or_default()
        .iter()
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn update_director(
    cameras: Query<
        (Entity, &GlobalTransform, Option<&RenderLayers>),
        With<WorkBufferCamera>,
    >,
    placements: Query<(
        Entity,
        &SplatPlacementHandle,
        &GlobalTransform,
        Option<&RenderLayers>,
        Option<&PlacementSettings>,
        Option<&SplatTint>,
    )>,
    clouds: Res<Assets<SplatCloud>>,
    settings: Res<WorkBufferSettings>,
    mut director: ResMut<SplatDirector>,
    mut views: ResMut<WorkBufferViews>,
    mut scene: Local<TransformSnapshot>,
    mut previous: Local<HashMap<ManagerKey, Vec<PlacementKey>>>,
) {
    scene.clear();

    let mut by_layer: HashMap<usize, Vec<Placement>> = HashMap::new();
    for (entity, handle, transform, layers, placement_settings, tint) in placements.iter() {
        // not loaded yet
        let Some(cloud) = clouds.get(&handle.0) else {
            continue;
        };

        scene.set_transform(entity, transform.compute_matrix());
        scene.set_tint(entity, tint.copied().unwrap_or_default().0);

        let mut placement = Placement::new(entity, cloud.0.clone());
        if let Some(distances) = placement_settings.and_then(|settings| settings.lod_distances.clone()) {
            placement = placement.with_lod_distances(distances);
        }

        for layer in layers_of(layers) {
            by_layer.entry(layer).or_default().push(placement.clone());
        }
    }

    let mut seen = HashMap::new();
    let composition = Composition {
        cameras: cameras
            .iter()
            .map(|(camera, transform, layers)| CameraComposition {
                camera,
                world: transform.compute_matrix(),
                layers: layers_of(layers)
                    .into_iter()
                    .map(|layer| {
                        let placements = by_layer.get(&layer).cloned().unwrap_or_default();

                        let mut keys: Vec<PlacementKey> = placements.iter().map(Placement::key).collect();
                        keys.sort();

                        let dirty = previous.get(&(camera, layer)) != Some(&keys);
                        seen.insert((camera, layer), keys);

                        LayerComposition {
                            layer,
                            placements,
                            dirty,
                        }
                    })
                    .collect(),
            })
            .collect(),
    };
    *previous = seen;

    let SplatDirector { director, device } = &mut *director;
    director.update(device.as_mut(), &*scene, &composition, &settings);

    views.0 = director.views();
}
