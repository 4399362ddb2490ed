//! Sprite placement, dirty tracking and mutation tests.

use lattice_core::math::{Affine2, Vec2};
use lattice_render::{Color, Texture, TextureArrayId};
use lattice_scene::{Coord, RenderClass, SceneConfig, SceneGraph, SpriteParams};
use lattice_test_utils::{BufferCall, MockDevice, MockInstanceBuffer};

type Scene = SceneGraph<MockInstanceBuffer>;

const T1: TextureArrayId = TextureArrayId(1);

/// View transform mapping the world rectangle `[min, max]` onto NDC.
fn view_of(min: Vec2, max: Vec2) -> Affine2 {
    let half = (max - min) * 0.5;
    let center = min + half;
    Affine2::from_scale_angle_translation(1.0 / half, 0.0, -center / half)
}

fn scene(grid: f32) -> Scene {
    Scene::with_config(SceneConfig::new(Vec2::splat(grid)).with_objects_per_bucket(64))
}

#[test]
fn test_move_between_cells_dirties_both_groups() {
    let device = MockDevice::new();
    let mut scene = scene(32.0);
    let textured = SpriteParams::at(Vec2::new(10.0, 10.0)).with_texture(Texture::new(T1, 0));

    let a = scene.create_object(&textured).unwrap();
    let b = scene.create_object(&textured).unwrap();

    let origin = Coord::new(0, 0);
    {
        let cell = scene.index().cell(origin).unwrap();
        let group = cell.standard().group(Some(T1)).unwrap();
        assert_eq!(scene.index().cell_count(), 1);
        assert_eq!(group.len(), 2);
        assert!(group.contains(a) && group.contains(b));
        assert!(group.is_dirty());
    }

    let view = view_of(Vec2::ZERO, Vec2::splat(64.0));
    scene.prepare_rendering(&device, &view).unwrap();
    assert_eq!(device.upload_sizes(), vec![2]);
    assert!(
        !scene
            .index()
            .cell(origin)
            .unwrap()
            .standard()
            .group(Some(T1))
            .unwrap()
            .is_dirty()
    );

    scene.set_position(a, Vec2::new(50.0, 10.0));

    let moved = scene.index().cell(Coord::new(1, 0)).unwrap();
    let group = moved.standard().group(Some(T1)).unwrap();
    assert!(group.contains(a));
    assert!(group.is_dirty());

    let stayed = scene.index().cell(origin).unwrap();
    let group = stayed.standard().group(Some(T1)).unwrap();
    assert_eq!(group.len(), 1);
    assert!(group.contains(b));
    assert!(group.is_dirty());
    assert_eq!(scene.sprite(a).cell(), Coord::new(1, 0));
}

#[test]
fn test_second_prepare_uploads_nothing() {
    let device = MockDevice::new();
    let mut scene = scene(32.0);
    for i in 0..10 {
        scene
            .create_object(&SpriteParams::at(Vec2::new(i as f32 * 7.0, 3.0)))
            .unwrap();
    }

    let view = view_of(Vec2::ZERO, Vec2::splat(96.0));
    scene.prepare_rendering(&device, &view).unwrap();
    assert_eq!(scene.stats().uploaded_instances, 10);

    device.clear_calls();
    scene.prepare_rendering(&device, &view).unwrap();
    assert_eq!(device.count_uploads(), 0);
    assert_eq!(scene.stats().uploads, 0);
}

#[test]
fn test_grid_placement_includes_negative_coordinates() {
    let mut scene = scene(16.0);
    let grid = 16.0;

    let mut y = -100.0;
    while y < 100.0 {
        let mut x = -100.0;
        while x < 100.0 {
            let position = Vec2::new(x, y);
            let handle = scene.create_object(&SpriteParams::at(position)).unwrap();
            let coord = scene.sprite(handle).cell();

            let origin = Vec2::new(coord.x as f32, coord.y as f32) * grid;
            assert!(position.cmpge(origin).all(), "{position} below cell {coord}");
            assert!(position.cmplt(origin + grid).all(), "{position} past cell {coord}");
            assert!(scene.index().cell_at(position).is_some());
            x += 5.5;
        }
        y += 5.5;
    }
}

#[test]
fn test_attribute_changes_mark_group_dirty() {
    let device = MockDevice::new();
    let mut scene = scene(32.0);
    let view = view_of(Vec2::ZERO, Vec2::splat(32.0));
    let handle = scene.create_object(&SpriteParams::at(Vec2::splat(4.0))).unwrap();
    scene.prepare_rendering(&device, &view).unwrap();

    scene.set_tint(handle, Color::RED);
    scene.prepare_rendering(&device, &view).unwrap();
    assert_eq!(scene.stats().uploads, 1);

    scene.set_uv(handle, Vec2::new(0.5, 0.0), Vec2::new(1.0, 0.5));
    scene.prepare_rendering(&device, &view).unwrap();
    assert_eq!(scene.stats().uploads, 1);

    scene.set_layer(handle, 3.0);
    scene.set_position(handle, Vec2::splat(8.0));
    scene.prepare_rendering(&device, &view).unwrap();
    assert_eq!(scene.stats().uploads, 1);

    let sprite = scene.sprite(handle);
    assert_eq!(sprite.tint(), Color::RED);
    assert_eq!(sprite.uv(), (Vec2::new(0.5, 0.0), Vec2::new(1.0, 0.5)));
    assert_eq!(sprite.layer(), 3.0);
    assert_eq!(sprite.position(), Vec2::splat(8.0));

    let Some(BufferCall::Upload { instances, .. }) = device.calls().into_iter().last() else {
        panic!("expected a final upload");
    };
    assert_eq!(instances[0].tint, Color::RED);
    assert_eq!(instances[0].layer, 3.0);
}

#[test]
fn test_translucent_layer_change_resorts() {
    let device = MockDevice::new();
    let mut scene = scene(32.0);
    let translucent = SpriteParams::at(Vec2::splat(1.0)).with_class(RenderClass::Translucent);

    let handles: Vec<_> = [2.0, 0.0, 1.0]
        .into_iter()
        .map(|layer| scene.create_object(&translucent.clone().with_layer(layer)).unwrap())
        .collect();

    scene.set_layer(handles[1], 5.0);
    let pool = scene.index().cell(Coord::new(0, 0)).unwrap().translucent();
    assert_eq!(pool.sprites(), &[handles[2], handles[0], handles[1]]);

    scene
        .prepare_rendering(&device, &view_of(Vec2::ZERO, Vec2::splat(32.0)))
        .unwrap();
    let Some(BufferCall::Upload { instances, .. }) = device.calls().into_iter().next() else {
        panic!("expected an upload");
    };
    let layers: Vec<f32> = instances.iter().map(|i| i.layer).collect();
    assert_eq!(layers, vec![1.0, 2.0, 5.0]);
}

#[test]
fn test_destroy_releases_batch_and_cell() {
    let device = MockDevice::new();
    let mut scene = scene(32.0);
    let handle = scene.create_object(&SpriteParams::at(Vec2::splat(4.0))).unwrap();
    scene
        .prepare_rendering(&device, &view_of(Vec2::ZERO, Vec2::splat(32.0)))
        .unwrap();

    let object = scene.destroy_object(handle);
    assert_eq!(object.position(), Vec2::splat(4.0));
    assert!(!scene.contains(handle));
    assert!(scene.try_sprite(handle).is_none());
    assert_eq!(scene.sprite_count(), 0);
    assert_eq!(device.count_releases(), 1);
    assert_eq!(scene.stats().cells, 0);
}

#[test]
fn test_handles_survive_unrelated_destruction() {
    let mut scene = scene(32.0);
    let handles: Vec<_> = (0..200)
        .map(|i| {
            scene
                .create_object(&SpriteParams::at(Vec2::new(i as f32, 0.0)).with_layer(i as f32))
                .unwrap()
        })
        .collect();

    for handle in handles.iter().step_by(2) {
        scene.destroy_object(*handle);
    }
    for _ in 0..50 {
        scene.create_object(&SpriteParams::default()).unwrap();
    }

    for (i, handle) in handles.iter().enumerate().skip(1).step_by(2) {
        assert_eq!(scene.sprite(*handle).layer(), i as f32);
    }
    assert_eq!(scene.sprite_count(), 150);
}
