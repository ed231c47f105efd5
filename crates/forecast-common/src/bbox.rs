//! Bounding box and map domain types.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
///
/// `min_x`/`max_x` are the west/east longitudes, `min_y`/`max_y` the
/// south/north latitudes. A box crossing the prime meridian is written with
/// a negative west edge (e.g. -20..60), never as a wrapped pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build from a map extent in `[west, east, south, north]` order.
    pub fn from_extent(extent: [f64; 4]) -> Self {
        let [west, east, south, north] = extent;
        Self::new(west, south, east, north)
    }

    /// The box as `[west, east, south, north]`.
    pub fn extent(&self) -> [f64; 4] {
        [self.min_x, self.max_x, self.min_y, self.max_y]
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the box by `dx` degrees east/west and `dy` degrees north/south.
    pub fn expand(&self, dx: f64, dy: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - dx,
            min_y: (self.min_y - dy).max(-90.0),
            max_x: self.max_x + dx,
            max_y: (self.max_y + dy).min(90.0),
        }
    }

    /// Check that the box is usable as a map extent.
    pub fn validate(&self) -> Result<(), BboxError> {
        if !(self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite())
        {
            return Err(BboxError::NonFinite);
        }
        if self.min_x >= self.max_x {
            return Err(BboxError::Inverted("west must be less than east"));
        }
        if self.min_y >= self.max_y {
            return Err(BboxError::Inverted("south must be less than north"));
        }
        if self.min_y < -90.0 || self.max_y > 90.0 {
            return Err(BboxError::LatitudeRange);
        }
        if self.width() > 360.0 {
            return Err(BboxError::LongitudeSpan);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BboxError {
    #[error("Bounding box has non-finite coordinates")]
    NonFinite,

    #[error("Inverted bounding box: {0}")]
    Inverted(&'static str),

    #[error("Latitudes must lie within -90..90")]
    LatitudeRange,

    #[error("Longitude span exceeds 360 degrees")]
    LongitudeSpan,
}

/// A named geographic box used to crop one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub name: String,
    pub bbox: BoundingBox,
}

impl DomainSpec {
    pub fn new(name: impl Into<String>, extent: [f64; 4]) -> Self {
        Self {
            name: name.into(),
            bbox: BoundingBox::from_extent(extent),
        }
    }
}
