use bevy::prelude::*;

use bevy_unified_splatting::{
    CameraComposition,
    Composition,
    Director,
    LayerComposition,
    Placement,
    WorkBufferSettings,
    sort::{
        SortService,
        inline::InlineSorter,
    },
};

use _harness::{
    TestScene,
    camera_at,
    placement,
    simple_resource,
};

mod _harness;


fn inline_director() -> Director {
    Director::new(Box::new(|_: &WorkBufferSettings| -> Box<dyn SortService> {
        Box::new(InlineSorter::sequential())
    }))
}

fn camera(entity: Entity, layers: Vec<(usize, Vec<Placement>, bool)>) -> CameraComposition {
    CameraComposition {
        camera: entity,
        world: camera_at(Vec3::new(0.0, 0.0, 10.0)),
        layers: layers
            .into_iter()
            .map(|(layer, placements, dirty)| LayerComposition {
                layer,
                placements,
                dirty,
            })
            .collect(),
    }
}

fn update(director: &mut Director, test: &mut TestScene, composition: &Composition) {
    director.update(&mut test.device, &test.scene, composition, &test.settings);
}


#[test]
fn managers_exist_per_camera_and_non_empty_layer() {
    let mut test = TestScene::default();
    let mut director = inline_director();

    let cam_a = Entity::from_raw(100);
    let cam_b = Entity::from_raw(101);
    let resource = simple_resource(200);

    let composition = Composition {
        cameras: vec![
            camera(cam_a, vec![
                (0, vec![placement(0, &resource)], true),
                (1, vec![], true),
            ]),
            camera(cam_b, vec![
                (0, vec![placement(0, &resource)], true),
                (2, vec![placement(1, &resource)], true),
            ]),
        ],
    };
    update(&mut director, &mut test, &composition);

    assert_eq!(director.len(), 3);
    assert!(director.manager(cam_a, 0).is_some());
    assert!(director.manager(cam_a, 1).is_none());
    assert!(director.manager(cam_b, 2).is_some());

    // every manager shares one upload of the resource
    assert_eq!(director.registry().len(), 1);
    assert_eq!(director.registry().users(resource.id()), 3);
}

#[test]
fn managers_commit_and_expose_views() {
    let mut test = TestScene::default();
    let mut director = inline_director();

    let cam = Entity::from_raw(100);
    let resource = simple_resource(500);
    let composition = Composition {
        cameras: vec![camera(cam, vec![(0, vec![placement(0, &resource)], true)])],
    };

    update(&mut director, &mut test, &composition);
    update(&mut director, &mut test, &composition);

    let views = director.views();
    let view = views[&(cam, 0)];
    assert_eq!(view.sorted_version, 1);
    assert_eq!(view.texture_size, 23);
    assert!(view.work_buffer.is_some());
    assert!(view.order.is_some());
    assert_eq!(view.splat_count, 23 * 22);
}

#[test]
fn clean_layers_are_not_reconciled() {
    let mut test = TestScene::default();
    let mut director = inline_director();

    let cam = Entity::from_raw(100);
    let a = simple_resource(100);
    let b = simple_resource(100);

    update(&mut director, &mut test, &Composition {
        cameras: vec![camera(cam, vec![(0, vec![placement(0, &a)], true)])],
    });

    // the placement list changed but the layer is not flagged dirty
    update(&mut director, &mut test, &Composition {
        cameras: vec![camera(cam, vec![(0, vec![placement(0, &a), placement(1, &b)], false)])],
    });
    assert_eq!(director.manager(cam, 0).unwrap().placements().len(), 1);

    update(&mut director, &mut test, &Composition {
        cameras: vec![camera(cam, vec![(0, vec![placement(0, &a), placement(1, &b)], true)])],
    });
    assert_eq!(director.manager(cam, 0).unwrap().placements().len(), 2);
}

#[test]
fn absent_managers_are_destroyed() {
    let mut test = TestScene::default();
    let mut director = inline_director();

    let cam = Entity::from_raw(100);
    let resource = simple_resource(100);

    let populated = Composition {
        cameras: vec![camera(cam, vec![(0, vec![placement(0, &resource)], true)])],
    };
    update(&mut director, &mut test, &populated);
    update(&mut director, &mut test, &populated);
    assert!(test.device.target_count() > 0);

    // layer emptied
    update(&mut director, &mut test, &Composition {
        cameras: vec![camera(cam, vec![(0, vec![], true)])],
    });
    assert!(director.is_empty());
    assert!(director.registry().is_empty());
    assert_eq!(test.device.target_count(), 0);

    // camera gone
    update(&mut director, &mut test, &populated);
    assert_eq!(director.len(), 1);
    update(&mut director, &mut test, &Composition::default());
    assert!(director.is_empty());
    assert_eq!(test.device.target_count(), 0);
}

#[test]
fn destroy_releases_everything() {
    let mut test = TestScene::default();
    let mut director = inline_director();

    let resource = simple_resource(100);
    let composition = Composition {
        cameras: vec![
            camera(Entity::from_raw(100), vec![(0, vec![placement(0, &resource)], true)]),
            camera(Entity::from_raw(101), vec![(0, vec![placement(0, &resource)], true)]),
        ],
    };
    update(&mut director, &mut test, &composition);
    update(&mut director, &mut test, &composition);

    director.destroy(&mut test.device);

    assert!(director.is_empty());
    assert!(director.registry().is_empty());
    assert_eq!(test.device.target_count(), 0);
}
