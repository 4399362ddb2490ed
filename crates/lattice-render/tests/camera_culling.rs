//! Camera view transforms as consumed by the scene graph's culling step.

use lattice_core::math::{Affine2, Rect, Vec2};
use lattice_render::{Camera2D, ViewSource, is_invertible};

fn visible_world_rect(view: &dyn ViewSource) -> Rect {
    let inverse = view.view_transform().inverse();
    Rect::from_points(
        [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(1.0, 1.0),
        ]
        .map(|corner| inverse.transform_point2(corner)),
    )
    .unwrap()
}

#[test]
fn test_visible_rect_follows_camera() {
    let mut camera = Camera2D::new(16.0 / 9.0);
    camera
        .set_transform(Affine2::from_scale_angle_translation(
            Vec2::splat(90.0),
            0.0,
            Vec2::new(1000.0, -200.0),
        ))
        .unwrap();

    let rect = visible_world_rect(&camera);
    assert!((rect.min - Vec2::new(1000.0 - 160.0, -290.0)).length() < 1e-3);
    assert!((rect.max - Vec2::new(1000.0 + 160.0, -110.0)).length() < 1e-3);
}

#[test]
fn test_rotated_camera_bounds_cover_corners() {
    let mut camera = Camera2D::new(1.0);
    camera
        .set_transform(Affine2::from_angle(std::f32::consts::FRAC_PI_4))
        .unwrap();

    let rect = visible_world_rect(&camera);
    let half_diagonal = std::f32::consts::SQRT_2;
    assert!((rect.max.x - half_diagonal).abs() < 1e-5);
    assert!((rect.min.y + half_diagonal).abs() < 1e-5);
}

#[test]
fn test_raw_affine_is_a_view_source() {
    let view = Affine2::from_scale(Vec2::splat(0.5));
    assert!(is_invertible(&view));
    let rect = visible_world_rect(&view);
    assert_eq!(rect.min, Vec2::splat(-2.0));
    assert_eq!(rect.max, Vec2::splat(2.0));
}
