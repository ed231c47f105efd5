//! Static geographic line overlays (coastlines, borders) from GeoJSON.

use std::path::Path;

use serde_json::Value;
use tiny_skia::{LineCap, LineJoin, Mask, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::error::{RenderError, RenderResult};
use crate::projection::MercatorView;

/// A named set of polylines in lon/lat degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    pub name: String,
    pub lines: Vec<Vec<(f64, f64)>>,
    pub color: [u8; 4],
    pub width: f32,
}

impl OverlayLayer {
    /// Load every line and ring from a GeoJSON file.
    pub fn from_geojson_file(
        name: impl Into<String>,
        path: &Path,
        color: [u8; 4],
        width: f32,
    ) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Overlay(format!("{}: {}", path.display(), e)))?;
        let lines = parse_geojson_lines(&text)?;
        Ok(Self {
            name: name.into(),
            lines,
            color,
            width,
        })
    }

    /// Stroke the layer through a map view, clipped to `clip`.
    pub fn draw(&self, pixmap: &mut Pixmap, view: &MercatorView, clip: Option<&Mask>) {
        let mut paint = Paint::default();
        let [r, g, b, a] = self.color;
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;

        let stroke = Stroke {
            width: self.width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };

        // Skip lines that cannot touch the view
        let window = view.bbox.expand(1.0, 1.0);

        for line in &self.lines {
            if !line.iter().any(|&(lon, lat)| window.contains_point(lon, lat)) {
                continue;
            }
            let mut pb = PathBuilder::new();
            let mut previous: Option<f64> = None;
            for &(lon, lat) in line {
                let (x, y) = view.project(lon, lat);
                match previous {
                    // A jump across the antimeridian starts a new run
                    Some(prev) if (lon - prev).abs() <= 180.0 => pb.line_to(x, y),
                    _ => pb.move_to(x, y),
                }
                previous = Some(lon);
            }
            if let Some(path) = pb.finish() {
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), clip);
            }
        }
    }
}

/// Extract polylines from any GeoJSON object: `FeatureCollection`,
/// `Feature`, `GeometryCollection` or a bare geometry. Points are ignored.
pub fn parse_geojson_lines(text: &str) -> RenderResult<Vec<Vec<(f64, f64)>>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| RenderError::Overlay(e.to_string()))?;
    let mut lines = Vec::new();
    collect_lines(&value, &mut lines)?;
    Ok(lines)
}

fn collect_lines(value: &Value, out: &mut Vec<Vec<(f64, f64)>>) -> RenderResult<()> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Overlay("object without a type".to_string()))?;

    match kind {
        "FeatureCollection" => {
            for feature in array(value, "features")? {
                collect_lines(feature, out)?;
            }
        }
        "Feature" => {
            if let Some(geometry) = value.get("geometry").filter(|g| !g.is_null()) {
                collect_lines(geometry, out)?;
            }
        }
        "GeometryCollection" => {
            for geometry in array(value, "geometries")? {
                collect_lines(geometry, out)?;
            }
        }
        "LineString" => out.push(positions(coordinates(value)?)?),
        "MultiLineString" | "Polygon" => {
            for line in as_array(coordinates(value)?)? {
                out.push(positions(line)?);
            }
        }
        "MultiPolygon" => {
            for polygon in as_array(coordinates(value)?)? {
                for ring in as_array(polygon)? {
                    out.push(positions(ring)?);
                }
            }
        }
        "Point" | "MultiPoint" => {}
        other => {
            return Err(RenderError::Overlay(format!(
                "unsupported GeoJSON type '{}'",
                other
            )))
        }
    }
    Ok(())
}

fn array<'v>(value: &'v Value, key: &str) -> RenderResult<&'v Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| RenderError::Overlay(format!("missing '{}' array", key)))
}

fn coordinates(value: &Value) -> RenderResult<&Value> {
    value
        .get("coordinates")
        .ok_or_else(|| RenderError::Overlay("geometry without coordinates".to_string()))
}

fn as_array(value: &Value) -> RenderResult<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| RenderError::Overlay("expected a coordinate array".to_string()))
}

fn positions(value: &Value) -> RenderResult<Vec<(f64, f64)>> {
    as_array(value)?
        .iter()
        .map(|p| match p.as_array().map(|a| a.as_slice()) {
            Some([lon, lat, ..]) => match (lon.as_f64(), lat.as_f64()) {
                (Some(lon), Some(lat)) => Ok((lon, lat)),
                _ => Err(RenderError::Overlay("non-numeric position".to_string())),
            },
            _ => Err(RenderError::Overlay("malformed position".to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_collection_lines_and_rings() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[26.0, 40.0], [27.0, 41.0]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[28.0, 40.0], [29.0, 40.0], [29.0, 41.0], [28.0, 40.0]]],
                    [[[30.0, 40.0], [31.0, 40.0], [30.0, 41.0], [30.0, 40.0]]]
                 ]}},
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [29.0, 41.0]}}
            ]
        }"#;
        let lines = parse_geojson_lines(text).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], vec![(26.0, 40.0), (27.0, 41.0)]);
        assert_eq!(lines[1].len(), 4);
    }

    #[test]
    fn test_rejects_malformed_geojson() {
        assert!(parse_geojson_lines("{").is_err());
        assert!(parse_geojson_lines(r#"{"coordinates": []}"#).is_err());
        assert!(parse_geojson_lines(r#"{"type": "LineString", "coordinates": [[1.0]]}"#).is_err());
    }
}
