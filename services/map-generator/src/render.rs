//! The per-task renderer seam.

use std::path::{Path, PathBuf};

use forecast_common::{RenderTask, TaskResult};
use renderer::{MapRenderer, MapStyle, OverlayLayer};
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::{PipelineError, PipelineResult};

/// Draws one task. Implementations depend on nothing but the task payload
/// and their own immutable settings, and report every drawing failure as a
/// failure result rather than an error.
pub trait Renderer: Send + Sync {
    fn render(&self, task: &RenderTask) -> TaskResult;
}

/// Writes PNG maps into an output directory.
pub struct PngRenderer {
    map: MapRenderer,
    output_dir: PathBuf,
}

impl PngRenderer {
    pub fn new(map: MapRenderer, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            map,
            output_dir: output_dir.into(),
        }
    }

    /// Build from image settings, loading the font and overlays up front.
    pub fn from_config(image: &ImageConfig, output_dir: &Path) -> PipelineResult<Self> {
        let style = MapStyle {
            width: image.width,
            height: image.height,
            ..MapStyle::default()
        };
        let mut map = MapRenderer::new(style);

        if let Some(font_path) = &image.font_path {
            map = map
                .with_font_file(font_path)
                .map_err(|e| PipelineError::Config(e.to_string()))?;
            info!(font = %font_path.display(), "Loaded title font");
        }
        for overlay in &image.overlays {
            let layer = OverlayLayer::from_geojson_file(
                overlay.name.as_str(),
                &overlay.path,
                overlay.color,
                overlay.width,
            )
            .map_err(|e| PipelineError::Config(e.to_string()))?;
            info!(overlay = %overlay.name, lines = layer.lines.len(), "Loaded overlay");
            map = map.with_overlay(layer);
        }

        Ok(Self::new(map, output_dir))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn try_render(&self, task: &RenderTask) -> PipelineResult<PathBuf> {
        self.map
            .render_to_dir(task, &self.output_dir)
            .map_err(|e| PipelineError::RenderFailure {
                filename: task.filename.clone(),
                message: e.to_string(),
            })
    }
}

impl Renderer for PngRenderer {
    fn render(&self, task: &RenderTask) -> TaskResult {
        match self.try_render(task) {
            Ok(path) => {
                debug!(path = %path.display(), "Map written");
                TaskResult::success(&task.filename)
            }
            Err(e) => TaskResult::failure(&task.filename, e.to_string()),
        }
    }
}
