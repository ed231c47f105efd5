//! Map rendering for gridded forecast fields.
//!
//! Implements:
//! - Level-binned color fill with extended ends
//! - Contour lines (marching squares) with inline labels
//! - Mercator plot layout, graticule, GeoJSON line overlays, colorbar
//! - TrueType titles and PNG encoding with text metadata

pub mod colormap;
pub mod contour;
pub mod error;
pub mod gradient;
pub mod map;
pub mod overlay;
pub mod png;
pub mod projection;
pub mod text;

pub use colormap::Colormap;
pub use contour::ContourStyle;
pub use error::{RenderError, RenderResult};
pub use map::{MapRenderer, MapStyle};
pub use overlay::OverlayLayer;
