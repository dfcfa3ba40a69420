use pmstereo::{DisparityPlane, Vector3};

#[test]
fn disparity_is_affine_in_pixel_coordinates() {
    let plane = DisparityPlane::new(0.125, -0.75, 10.0);
    let base = plane.to_disparity(0, 0);
    assert!((base - 10.0).abs() < 1e-6);
    for (x, y) in [(1, 0), (0, 1), (13, 27), (200, 150)] {
        let expected = 0.125 * x as f32 - 0.75 * y as f32 + 10.0;
        assert!((plane.to_disparity(x, y) - expected).abs() < 1e-4);
    }
}

#[test]
fn normal_plane_round_trip_for_non_degenerate_normals() {
    let normals = [
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.5, 0.5, 0.707),
        Vector3::new(-0.3, 0.9, -0.4),
        Vector3::new(0.01, -0.02, 0.99),
    ];
    for n in normals {
        let unit = n.normalized();
        let plane = DisparityPlane::from_normal(7, 11, unit, 3.25);
        // The anchor disparity survives the conversion.
        assert!((plane.to_disparity(7, 11) - 3.25).abs() < 1e-3);
        // The normal comes back up to sign.
        let back = plane.to_normal();
        let dot = back.dot(unit).abs();
        assert!(dot > 1.0 - 1e-4, "normal {unit:?} came back as {back:?}");
    }
}

#[test]
fn other_view_transform_round_trips() {
    let plane = DisparityPlane::new(-0.4, 0.2, 8.0);
    let there = plane.to_other_view();
    let back = there.to_other_view();
    assert!((back.a - plane.a).abs() < 1e-5);
    assert!((back.b - plane.b).abs() < 1e-5);
    assert!((back.c - plane.c).abs() < 1e-4);
}

#[test]
fn transformed_plane_agrees_with_the_matched_pixel() {
    // d_left at (x, y) and d_right at (x - d, y) must be negatives of each
    // other for the same physical surface.
    let plane = DisparityPlane::new(0.25, 0.0, 2.0);
    let x = 8;
    let y = 3;
    let d = plane.to_disparity(x, y);
    let xr = (x as f32 - d).round() as i32;
    let other = plane.to_other_view();
    assert!((other.to_disparity(xr, y) + d).abs() < 1e-4);
}

#[test]
fn plane_equality_is_coefficient_equality() {
    let a = DisparityPlane::new(1.0, 2.0, 3.0);
    let b = DisparityPlane::new(1.0, 2.0, 3.0);
    let c = DisparityPlane::new(1.0, 2.0, 3.5);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
