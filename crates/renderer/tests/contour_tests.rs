//! Tests for contour tracing and level-binned fill.

use renderer::colormap::Colormap;
use renderer::contour::{connect_segments, level_label, march_squares, trace_contours};
use renderer::gradient::{bin_index, render_level_fill, Color};
use test_utils::{create_bump_grid, create_constant_grid, create_grid_with_nans, create_test_grid};

// ============================================================================
// Marching squares
// ============================================================================

#[test]
fn test_constant_grid_has_no_contours() {
    let data = create_constant_grid(10, 10, 5.0);
    assert!(march_squares(&data, 10, 10, 2.0).is_empty());
    assert!(march_squares(&data, 10, 10, 8.0).is_empty());
}

#[test]
fn test_gradient_grid_crosses_every_row() {
    // value = col + row * 10, so level 4.5 crosses each row between cols 4 and 5
    let data = create_test_grid(10, 1).repeat(6);
    let segments = march_squares(&data, 10, 6, 4.5);
    assert_eq!(segments.len(), 5);
    for seg in &segments {
        assert!((seg.start.x - 4.5).abs() < 1e-4);
        assert!((seg.end.x - 4.5).abs() < 1e-4);
    }
}

#[test]
fn test_open_line_connects_into_one_contour() {
    let data = create_test_grid(10, 1).repeat(6);
    let contours = connect_segments(march_squares(&data, 10, 6, 4.5), 4.5);
    assert_eq!(contours.len(), 1);
    assert!(!contours[0].closed);
    assert_eq!(contours[0].points.len(), 6);
}

#[test]
fn test_bump_gives_closed_ring() {
    let data = create_bump_grid(21, 21, 10.0);
    let contours = trace_contours(&data, 21, 21, &[5.5], 0);
    assert_eq!(contours.len(), 1);
    assert!(contours[0].closed);
    assert_eq!(contours[0].level, 5.5);
}

#[test]
fn test_nan_cells_are_skipped() {
    let mut data = create_bump_grid(21, 21, 10.0);
    let holes = create_grid_with_nans(21, 21, &[(10, 4), (10, 16)]);
    for (value, hole) in data.iter_mut().zip(&holes) {
        if hole.is_nan() {
            *value = f32::NAN;
        }
    }
    let contours = trace_contours(&data, 21, 21, &[5.5], 0);
    assert!(!contours.is_empty());
    assert!(contours.iter().all(|c| c.points.iter().all(|p| p.x.is_finite())));
}

#[test]
fn test_smoothing_adds_points() {
    let data = create_bump_grid(21, 21, 10.0);
    let raw = trace_contours(&data, 21, 21, &[5.5], 0);
    let smooth = trace_contours(&data, 21, 21, &[5.5], 2);
    assert!(smooth[0].points.len() > raw[0].points.len());
}

#[test]
fn test_level_label_is_integer() {
    assert_eq!(level_label(5640.0), "5640");
    assert_eq!(level_label(-2.4), "-2");
}

// ============================================================================
// Level-binned fill
// ============================================================================

#[test]
fn test_bins_extend_both_ends() {
    let levels = [0.0, 10.0, 20.0];
    assert_eq!(bin_index(&levels, -100.0), Some(0));
    assert_eq!(bin_index(&levels, 0.0), Some(1));
    assert_eq!(bin_index(&levels, 15.0), Some(2));
    assert_eq!(bin_index(&levels, 20.0), Some(3));
    assert_eq!(bin_index(&levels, 1e9), Some(3));
    assert_eq!(bin_index(&levels, f32::NAN), None);
}

#[test]
fn test_fill_uses_bin_colors() {
    let levels = [0.0, 10.0];
    let colors = [
        Color::rgb(0, 0, 255),
        Color::rgb(0, 255, 0),
        Color::rgb(255, 0, 0),
    ];
    // Three columns: below, between, above
    let pixels = render_level_fill(3, 1, &levels, &colors, |x, _| {
        Some([-5.0, 5.0, 50.0][x])
    })
    .unwrap();
    assert_eq!(&pixels[0..4], &[0, 0, 255, 255]);
    assert_eq!(&pixels[4..8], &[0, 255, 0, 255]);
    assert_eq!(&pixels[8..12], &[255, 0, 0, 255]);
}

#[test]
fn test_fill_leaves_missing_transparent() {
    let colors = Colormap::by_name("viridis").unwrap().bin_colors(1);
    let pixels = render_level_fill(2, 1, &[0.0], &colors, |x, _| (x == 1).then_some(1.0)).unwrap();
    assert_eq!(&pixels[0..4], &[0, 0, 0, 0]);
    assert_eq!(pixels[7], 255);
}

#[test]
fn test_fill_rejects_wrong_color_count() {
    let colors = [Color::rgb(0, 0, 0)];
    assert!(render_level_fill(1, 1, &[0.0, 1.0], &colors, |_, _| Some(0.5)).is_err());
}

// ============================================================================
// Colormaps
// ============================================================================

#[test]
fn test_every_configured_colormap_resolves() {
    for name in [
        "Spectral_r",
        "YlOrRd",
        "RdBu_r",
        "YlGnBu",
        "Blues",
        "coolwarm",
        "inferno",
        "viridis",
        "jet",
        "nipy_spectral_r",
        "coolwarm_r",
    ] {
        assert!(Colormap::by_name(name).is_ok(), "{} should resolve", name);
    }
}

#[test]
fn test_reversed_colormap_swaps_ends() {
    let forward = Colormap::by_name("RdBu").unwrap();
    let reversed = Colormap::by_name("RdBu_r").unwrap();
    assert_eq!(forward.sample(0.0), reversed.sample(1.0));
    assert_eq!(forward.sample(1.0), reversed.sample(0.0));
}
