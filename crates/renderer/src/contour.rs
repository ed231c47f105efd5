//! Contour line (isoline) rendering using marching squares algorithm.
//!
//! Contours are traced in grid index space, mapped to canvas pixels by the
//! caller and stroked with tiny-skia. Labels use a small segment font so no
//! TrueType font is needed for numbers.

use tiny_skia::{
    FillRule, LineCap, LineJoin, Mask, Paint, PathBuilder, Pixmap, Stroke, Transform,
};

/// A point in 2D space (grid index or pixel coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A line segment between two points
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// A complete contour line (polyline)
#[derive(Debug, Clone)]
pub struct Contour {
    pub level: f64,
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Stroke and label styling for contour lines.
#[derive(Debug, Clone)]
pub struct ContourStyle {
    /// Line width in pixels
    pub line_width: f32,
    /// Line color [R, G, B, A]
    pub line_color: [u8; 4],
    /// Number of smoothing passes (0 = no smoothing)
    pub smoothing_passes: u32,
    pub labels_enabled: bool,
    pub label_font_size: f32,
    /// Minimum spacing between labels (in pixels)
    pub label_spacing: f32,
}

impl Default for ContourStyle {
    fn default() -> Self {
        Self {
            line_width: 1.2,
            line_color: [0, 0, 0, 255],
            smoothing_passes: 1,
            labels_enabled: true,
            label_font_size: 10.0,
            label_spacing: 220.0,
        }
    }
}

/// Inline label text for a contour level.
pub fn level_label(level: f64) -> String {
    format!("{:.0}", level)
}

/// Marching squares algorithm to generate contour lines
///
/// # Arguments
/// * `data` - Grid data in row-major order
/// * `width` - Grid width
/// * `height` - Grid height
/// * `level` - Contour level to extract
///
/// # Returns
/// Vector of line segments in grid index coordinates
pub fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();

    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            // Cell index (0-15) from the corners at or above the level
            let mut cell_index = 0;
            if tl >= level {
                cell_index |= 1;
            }
            if tr >= level {
                cell_index |= 2;
            }
            if br >= level {
                cell_index |= 4;
            }
            if bl >= level {
                cell_index |= 8;
            }

            segments.extend(cell_segments(
                cell_index, x as f32, y as f32, tl, tr, br, bl, level,
            ));
        }
    }

    segments
}

/// Line segments for one marching squares cell, with edge crossings found
/// by linear interpolation.
#[allow(clippy::too_many_arguments)]
fn cell_segments(
    cell_index: u8,
    x: f32,
    y: f32,
    tl: f32,
    tr: f32,
    br: f32,
    bl: f32,
    level: f32,
) -> Vec<Segment> {
    let top = interpolate_edge(x, y, x + 1.0, y, tl, tr, level);
    let right = interpolate_edge(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
    let bottom = interpolate_edge(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
    let left = interpolate_edge(x, y, x, y + 1.0, tl, bl, level);

    match cell_index {
        0 | 15 => vec![],
        1 | 14 => vec![Segment { start: left, end: top }],
        2 | 13 => vec![Segment { start: top, end: right }],
        3 | 12 => vec![Segment { start: left, end: right }],
        4 | 11 => vec![Segment { start: right, end: bottom }],
        // Saddles: two separate segments
        5 => vec![
            Segment { start: left, end: top },
            Segment { start: right, end: bottom },
        ],
        6 | 9 => vec![Segment { start: top, end: bottom }],
        7 | 8 => vec![Segment { start: left, end: bottom }],
        10 => vec![
            Segment { start: top, end: right },
            Segment { start: left, end: bottom },
        ],
        _ => vec![],
    }
}

fn interpolate_edge(x1: f32, y1: f32, x2: f32, y2: f32, val1: f32, val2: f32, level: f32) -> Point {
    if (val2 - val1).abs() < 1e-6 {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }

    let t = ((level - val1) / (val2 - val1)).clamp(0.0, 1.0);
    Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Connect unordered segments into continuous polylines.
pub fn connect_segments(segments: Vec<Segment>, level: f64) -> Vec<Contour> {
    let mut contours = Vec::new();
    let mut used = vec![false; segments.len()];
    let epsilon = 0.001;

    for start_idx in 0..segments.len() {
        if used[start_idx] {
            continue;
        }

        let mut points = vec![segments[start_idx].start, segments[start_idx].end];
        used[start_idx] = true;

        let mut current_end = segments[start_idx].end;
        while let Some((i, point)) = next_segment(&segments, &used, current_end, epsilon) {
            used[i] = true;
            points.push(point);
            current_end = point;
        }

        let mut closed = points[0].distance(&current_end) < epsilon;
        if !closed {
            // Grow the open line backwards from its first point too
            let mut head = points[0];
            let mut prefix = Vec::new();
            while let Some((i, point)) = next_segment(&segments, &used, head, epsilon) {
                used[i] = true;
                prefix.push(point);
                head = point;
            }
            if !prefix.is_empty() {
                prefix.reverse();
                prefix.extend(points);
                points = prefix;
                closed = points[0].distance(&current_end) < epsilon;
            }
        }
        contours.push(Contour {
            level,
            points,
            closed,
        });
    }

    contours
}

/// First unused segment touching `point`, with its far end.
fn next_segment(
    segments: &[Segment],
    used: &[bool],
    point: Point,
    epsilon: f32,
) -> Option<(usize, Point)> {
    segments.iter().enumerate().find_map(|(i, seg)| {
        if used[i] {
            None
        } else if seg.start.distance(&point) < epsilon {
            Some((i, seg.end))
        } else if seg.end.distance(&point) < epsilon {
            Some((i, seg.start))
        } else {
            None
        }
    })
}

/// Apply Chaikin's corner cutting algorithm for smoothing
pub fn smooth_contour(contour: &Contour, iterations: u32) -> Contour {
    if iterations == 0 || contour.points.len() < 3 {
        return contour.clone();
    }

    let mut points = contour.points.clone();

    for _ in 0..iterations {
        let mut new_points = Vec::with_capacity(points.len() * 2 + 2);
        let n = points.len();
        let pairs = if contour.closed { n } else { n - 1 };

        if !contour.closed {
            new_points.push(points[0]);
        }
        for i in 0..pairs {
            let p1 = points[i];
            let p2 = points[(i + 1) % n];
            new_points.push(Point::new(0.75 * p1.x + 0.25 * p2.x, 0.75 * p1.y + 0.25 * p2.y));
            new_points.push(Point::new(0.25 * p1.x + 0.75 * p2.x, 0.25 * p1.y + 0.75 * p2.y));
        }
        if !contour.closed {
            new_points.push(points[n - 1]);
        }

        points = new_points;
    }

    Contour {
        level: contour.level,
        points,
        closed: contour.closed,
    }
}

/// Trace every level over a grid, in grid index coordinates.
pub fn trace_contours(
    data: &[f32],
    width: usize,
    height: usize,
    levels: &[f64],
    smoothing_passes: u32,
) -> Vec<Contour> {
    let mut all = Vec::new();
    for &level in levels {
        let segments = march_squares(data, width, height, level as f32);
        all.extend(
            connect_segments(segments, level)
                .iter()
                .map(|c| smooth_contour(c, smoothing_passes)),
        );
    }
    all
}

/// Stroke contours (already in pixel coordinates) and their labels.
pub fn stroke_contours(
    pixmap: &mut Pixmap,
    contours: &[Contour],
    style: &ContourStyle,
    clip: Option<&Mask>,
) {
    let mut paint = Paint::default();
    let [r, g, b, a] = style.line_color;
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;

    let stroke = Stroke {
        width: style.line_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    let (width, height) = (pixmap.width() as f32, pixmap.height() as f32);
    let mut labels: Vec<LabelPosition> = Vec::new();

    for contour in contours.iter().filter(|c| c.points.len() >= 2) {
        let mut pb = PathBuilder::new();
        pb.move_to(contour.points[0].x, contour.points[0].y);
        for point in &contour.points[1..] {
            pb.line_to(point.x, point.y);
        }
        if contour.closed {
            pb.close();
        }
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), clip);
        }

        if style.labels_enabled {
            collect_label_positions(contour, style, &mut labels, width, height);
        }
    }

    for pos in &labels {
        draw_text_label(
            pixmap,
            pos.x,
            pos.y,
            pos.angle,
            &pos.text,
            style.label_font_size,
            style.line_color,
            true,
        );
    }
}

#[derive(Debug, Clone)]
struct LabelPosition {
    x: f32,
    y: f32,
    angle: f32,
    text: String,
}

fn contour_length(contour: &Contour) -> f32 {
    contour
        .points
        .windows(2)
        .map(|w| w[0].distance(&w[1]))
        .sum()
}

/// Place labels evenly along a contour, away from the edges and from each
/// other.
fn collect_label_positions(
    contour: &Contour,
    style: &ContourStyle,
    positions: &mut Vec<LabelPosition>,
    width: f32,
    height: f32,
) {
    let total_length = contour_length(contour);
    if total_length < style.label_spacing * 0.5 {
        return;
    }

    let text = level_label(contour.level);
    let margin = style.label_font_size * 2.0;
    let num_labels = ((total_length / style.label_spacing).floor() as usize).max(1);
    let spacing = total_length / (num_labels as f32 + 1.0);
    let min_distance = style.label_font_size * 4.0;

    let mut accumulated = 0.0;
    let mut next_label_at = spacing;
    let mut placed = 0;

    for w in contour.points.windows(2) {
        if placed >= num_labels {
            break;
        }
        let (p1, p2) = (w[0], w[1]);
        let dx = p2.x - p1.x;
        let dy = p2.y - p1.y;
        let segment_length = (dx * dx + dy * dy).sqrt();

        while accumulated + segment_length >= next_label_at && placed < num_labels {
            let t = (next_label_at - accumulated) / segment_length.max(f32::EPSILON);
            let x = p1.x + t * dx;
            let y = p1.y + t * dy;

            let inside = x > margin && x < width - margin && y > margin && y < height - margin;
            let overlaps = positions
                .iter()
                .any(|pos| (pos.x - x).powi(2) + (pos.y - y).powi(2) < min_distance * min_distance);

            if inside && !overlaps {
                // Keep text upright
                let mut angle = dy.atan2(dx);
                if angle.abs() > std::f32::consts::FRAC_PI_2 {
                    angle += std::f32::consts::PI;
                }
                positions.push(LabelPosition {
                    x,
                    y,
                    angle,
                    text: text.clone(),
                });
            }

            next_label_at += spacing;
            placed += 1;
        }

        accumulated += segment_length;
    }
}

/// Pixel width of `text` drawn with the segment font.
pub(crate) fn segment_text_width(text: &str, font_size: f32) -> f32 {
    let char_width = font_size * 0.6;
    let char_spacing = font_size * 0.25;
    let n = text.chars().count() as f32;
    (n * (char_width + char_spacing) - char_spacing).max(0.0)
}

/// Draw a text label centered at the given position with rotation,
/// optionally on a white box.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_text_label(
    pixmap: &mut Pixmap,
    x: f32,
    y: f32,
    angle: f32,
    text: &str,
    font_size: f32,
    color: [u8; 4],
    background: bool,
) {
    let char_width = font_size * 0.6;
    let char_height = font_size;
    let char_spacing = font_size * 0.25;
    let text_width = segment_text_width(text, font_size);

    let cos_a = angle.cos();
    let sin_a = angle.sin();

    if background {
        let mut bg_paint = Paint::default();
        bg_paint.set_color_rgba8(255, 255, 255, 220);
        bg_paint.anti_alias = true;

        let pad = font_size * 0.2;
        let half_w = text_width / 2.0 + pad;
        let half_h = char_height / 2.0 + pad;
        let corners = [(-half_w, -half_h), (half_w, -half_h), (half_w, half_h), (-half_w, half_h)];

        let mut pb = PathBuilder::new();
        for (i, (cx, cy)) in corners.iter().enumerate() {
            let rx = cx * cos_a - cy * sin_a + x;
            let ry = cx * sin_a + cy * cos_a + y;
            if i == 0 {
                pb.move_to(rx, ry);
            } else {
                pb.line_to(rx, ry);
            }
        }
        pb.close();
        if let Some(path) = pb.finish() {
            pixmap.fill_path(&path, &bg_paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    let mut text_paint = Paint::default();
    text_paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    text_paint.anti_alias = true;

    let start_x = -text_width / 2.0;
    for (i, ch) in text.chars().enumerate() {
        let char_x = start_x + i as f32 * (char_width + char_spacing) + char_width / 2.0;
        let rx = char_x * cos_a + x;
        let ry = char_x * sin_a + y;
        draw_character(pixmap, rx, ry, angle, ch, char_width, char_height, &text_paint);
    }
}

/// Draw a single character as 7-segment strokes.
#[allow(clippy::too_many_arguments)]
fn draw_character(
    pixmap: &mut Pixmap,
    x: f32,
    y: f32,
    angle: f32,
    ch: char,
    width: f32,
    height: f32,
    paint: &Paint,
) {
    let cos_a = angle.cos();
    let sin_a = angle.sin();
    let hw = width / 2.0;
    let hh = height / 2.0;

    let stroke = Stroke {
        width: (width * 0.18).max(1.0),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    let rotate = |px: f32, py: f32| -> (f32, f32) {
        (px * cos_a - py * sin_a + x, px * sin_a + py * cos_a + y)
    };

    let top = ((-hw, -hh), (hw, -hh));
    let middle = ((-hw, 0.0), (hw, 0.0));
    let bottom = ((-hw, hh), (hw, hh));
    let upper_left = ((-hw, -hh), (-hw, 0.0));
    let lower_left = ((-hw, 0.0), (-hw, hh));
    let upper_right = ((hw, -hh), (hw, 0.0));
    let lower_right = ((hw, 0.0), (hw, hh));

    let segments: Vec<((f32, f32), (f32, f32))> = match ch {
        '0' => vec![top, upper_right, lower_right, bottom, lower_left, upper_left],
        '1' => vec![((0.0, -hh), (0.0, hh))],
        '2' => vec![top, upper_right, middle, lower_left, bottom],
        '3' => vec![top, upper_right, lower_right, bottom, middle],
        '4' => vec![upper_left, middle, upper_right, lower_right],
        '5' => vec![top, upper_left, middle, lower_right, bottom],
        '6' => vec![top, upper_left, lower_left, bottom, lower_right, middle],
        '7' => vec![top, ((hw, -hh), (0.0, hh))],
        '8' => vec![top, upper_right, lower_right, bottom, lower_left, upper_left, middle],
        '9' => vec![middle, upper_right, top, upper_left, lower_right],
        '-' => vec![middle],
        '.' => vec![((0.0, hh * 0.7), (0.0, hh * 0.8))],
        _ => vec![],
    };

    for ((x1, y1), (x2, y2)) in segments {
        let (rx1, ry1) = rotate(x1, y1);
        let (rx2, ry2) = rotate(x2, y2);

        let mut pb = PathBuilder::new();
        pb.move_to(rx1, ry1);
        pb.line_to(rx2, ry2);
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, paint, &stroke, Transform::identity(), None);
        }
    }
}
