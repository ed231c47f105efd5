//! End-to-end map rendering tests driven by sample render tasks.

use renderer::png::read_text_chunks;
use renderer::{MapRenderer, MapStyle, OverlayLayer, RenderError};
use test_utils::{sample_contour_task, sample_render_task};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn small_renderer() -> MapRenderer {
    MapRenderer::new(MapStyle {
        width: 400,
        height: 320,
        ..MapStyle::default()
    })
}

// ============================================================================
// PNG output
// ============================================================================

#[test]
fn test_render_png_signature() {
    let task = sample_render_task("temp_2mf000turkey_FOUR.png").unwrap();
    let bytes = small_renderer().render_png(&task).unwrap();
    assert_eq!(&bytes[..8], &PNG_SIGNATURE);
}

#[test]
fn test_render_png_carries_titles() {
    let task = sample_render_task("temp_2mf000turkey_FOUR.png").unwrap();
    let bytes = small_renderer().render_png(&task).unwrap();
    let chunks = read_text_chunks(&bytes);

    assert!(chunks.contains(&("Title".to_string(), "FOUR AI Model - 20240115 00Z".to_string())));
    assert!(chunks.contains(&(
        "Description".to_string(),
        "2m Temperature (f000) - Valid: 15 Jan 03:00 (Local)".to_string()
    )));
}

#[test]
fn test_render_to_dir_writes_task_filename() {
    let dir = tempfile::tempdir().unwrap();
    let task = sample_render_task("temp_2mf024turkey_FOUR.png").unwrap();

    let path = small_renderer().render_to_dir(&task, dir.path()).unwrap();

    assert_eq!(path, dir.path().join("temp_2mf024turkey_FOUR.png"));
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..8], &PNG_SIGNATURE);
}

#[test]
fn test_render_is_deterministic() {
    let task = sample_render_task("a.png").unwrap();
    let renderer = small_renderer();
    assert_eq!(
        renderer.render_png(&task).unwrap(),
        renderer.render_png(&task).unwrap()
    );
}

// ============================================================================
// Layers
// ============================================================================

#[test]
fn test_contour_lines_change_the_canvas() {
    let renderer = small_renderer();
    let plain = renderer
        .render_pixmap(&sample_render_task("a.png").unwrap())
        .unwrap();
    let lined = renderer
        .render_pixmap(&sample_contour_task("a.png").unwrap())
        .unwrap();

    assert_eq!(plain.width(), lined.width());
    assert_ne!(plain.data(), lined.data());
}

#[test]
fn test_overlay_changes_the_canvas() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coast.geojson");
    std::fs::write(
        &path,
        r#"{"type": "LineString", "coordinates": [[26.0, 36.0], [44.0, 41.0]]}"#,
    )
    .unwrap();
    let layer = OverlayLayer::from_geojson_file("coast", &path, [200, 0, 0, 255], 2.0).unwrap();

    let task = sample_render_task("a.png").unwrap();
    let plain = small_renderer().render_pixmap(&task).unwrap();
    let with_coast = small_renderer()
        .with_overlay(layer)
        .render_pixmap(&task)
        .unwrap();

    assert_ne!(plain.data(), with_coast.data());
}

#[test]
fn test_graticule_can_be_disabled() {
    let task = sample_render_task("a.png").unwrap();
    let with_grid = small_renderer().render_pixmap(&task).unwrap();
    let without = MapRenderer::new(MapStyle {
        width: 400,
        height: 320,
        graticule: false,
        ..MapStyle::default()
    })
    .render_pixmap(&task)
    .unwrap();

    assert_ne!(with_grid.data(), without.data());
}

#[test]
fn test_field_with_missing_cells_still_renders() {
    let mut task = sample_render_task("a.png").unwrap();
    for value in task.field.values.iter_mut().step_by(7) {
        *value = f32::NAN;
    }
    assert!(small_renderer().render_png(&task).is_ok());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_colormap_fails() {
    let mut task = sample_render_task("a.png").unwrap();
    task.colormap = "not_a_colormap".to_string();
    let err = small_renderer().render_png(&task).unwrap_err();
    assert!(matches!(err, RenderError::UnknownColormap(_)));
}

#[test]
fn test_empty_fill_levels_fail() {
    let mut task = sample_render_task("a.png").unwrap();
    task.fill_levels.clear();
    assert!(small_renderer().render_png(&task).is_err());
}

#[test]
fn test_decreasing_fill_levels_fail() {
    let mut task = sample_render_task("a.png").unwrap();
    task.fill_levels = vec![10.0, 5.0, 0.0];
    let err = small_renderer().render_png(&task).unwrap_err();
    assert!(matches!(err, RenderError::InvalidLevels(_)));
}

#[test]
fn test_shape_mismatch_fails() {
    let mut task = sample_render_task("a.png").unwrap();
    task.field.values.pop();
    assert!(small_renderer().render_png(&task).is_err());
}

#[test]
fn test_render_to_missing_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let task = sample_render_task("a.png").unwrap();
    let result = small_renderer().render_to_dir(&task, &dir.path().join("absent"));
    assert!(matches!(result, Err(RenderError::Io(_))));
}
