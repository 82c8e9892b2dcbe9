use std::sync::Arc;

use bevy::prelude::*;
use bevy_args::parse_args;
use byte_unit::{Byte, UnitType};

use bevy_unified_splatting::{
    CameraComposition,
    Composition,
    CpuDevice,
    Director,
    LayerComposition,
    Placement,
    SplatResource,
    TransformSnapshot,
    WorkBufferSettings,
    random_leveled,
    random_points,
};


const FRAMES: usize = 120;
const LEVELED_PLACEMENTS: u32 = 4;
const SIMPLE_PLACEMENTS: u32 = 2;


fn main() {
    let settings = parse_args::<WorkBufferSettings>();
    println!(
        "work buffer settings: {}",
        settings.to_json().expect("failed to serialize settings"),
    );

    let mut device = CpuDevice::new(settings.max_texture_size);
    let mut director = Director::default();
    let mut scene = TransformSnapshot::default();

    let (points, blocks) = random_leveled(64, &[32, 96, 384], 4.0).expect("failed to generate lod blocks");
    let leveled = Arc::new(SplatResource::leveled(points, blocks).expect("invalid leveled resource"));
    let simple = Arc::new(SplatResource::simple(random_points(20_000, Some(1))).expect("invalid resource"));

    let mut placements = Vec::new();
    for index in 0..LEVELED_PLACEMENTS {
        let node = Entity::from_raw(index + 1);
        scene.set_transform(node, Mat4::from_translation(Vec3::new(0.0, index as f32 * 10.0, 0.0)));
        placements.push(Placement::new(node, leveled.clone()));
    }
    for index in 0..SIMPLE_PLACEMENTS {
        let node = Entity::from_raw(LEVELED_PLACEMENTS + index + 1);
        scene.set_transform(node, Mat4::from_translation(Vec3::new(0.0, 0.0, -30.0 - index as f32 * 10.0)));
        placements.push(Placement::new(node, simple.clone()));
    }

    let camera = Entity::from_raw(0);
    for frame in 0..FRAMES {
        // orbit the leveled blocks so lod changes over time
        let angle = frame as f32 / FRAMES as f32 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos() * 150.0, 20.0, angle.sin() * 150.0);
        let world = Transform::from_translation(position)
            .looking_at(Vec3::new(128.0, 15.0, 0.0), Vec3::Y)
            .compute_matrix();

        let composition = Composition {
            cameras: vec![CameraComposition {
                camera,
                world,
                layers: vec![LayerComposition {
                    layer: 0,
                    placements: placements.clone(),
                    dirty: frame == 0,
                }],
            }],
        };

        director.update(&mut device, &scene, &composition, &settings);

        let Some(manager) = director.manager(camera, 0) else {
            continue;
        };
        let view = manager.view();
        let stats = manager.work_buffer_stats();

        println!(
            "frame {frame:>3}: centers v{} sorted v{} splats {:>8} size {:>4} full renders {} placement renders {} color renders {}",
            manager.centers_version(),
            view.sorted_version,
            view.splat_count,
            view.texture_size,
            stats.full_renders,
            stats.placement_renders,
            stats.color_renders,
        );
    }

    let memory = Byte::from_u64(device.memory_bytes());
    println!(
        "device memory: {} across {} render targets, {} texels shaded",
        memory.get_appropriate_unit(UnitType::Decimal),
        device.target_count(),
        device.stats().texels_shaded,
    );

    director.destroy(&mut device);
}
