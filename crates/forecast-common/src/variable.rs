//! Variable definitions: what to read from a dataset and how to derive
//! the plotted field.

use serde::{Deserialize, Serialize};

use crate::levels::LevelRange;

/// Standard gravity, used to turn geopotential (m²/s²) into geopotential metres.
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Kelvin offset for °C conversion.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Unit transformation for converting raw data values to display values.
/// Supports subtraction (K→C), division (Pa→hPa), and linear (scale + offset).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitTransform {
    /// No transformation
    #[default]
    None,
    /// Subtract a value (e.g., K→C: subtract 273.15)
    Subtract(f64),
    /// Divide by a value (e.g., Pa→hPa: divide by 100)
    Divide(f64),
    /// Linear transform: value * scale + offset
    Linear { scale: f64, offset: f64 },
}

impl UnitTransform {
    pub fn kelvin_to_celsius() -> Self {
        Self::Subtract(KELVIN_OFFSET)
    }

    pub fn pascal_to_hectopascal() -> Self {
        Self::Divide(100.0)
    }

    pub fn geopotential_to_height() -> Self {
        Self::Divide(STANDARD_GRAVITY)
    }

    /// Apply the transformation to a value
    pub fn apply(&self, value: f32) -> f32 {
        match *self {
            Self::None => value,
            Self::Subtract(offset) => (value as f64 - offset) as f32,
            Self::Divide(divisor) => (value as f64 / divisor) as f32,
            Self::Linear { scale, offset } => (value as f64 * scale + offset) as f32,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// One input of a derived combination: a variable, an optional pressure
/// level and its own unit transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub variable: String,
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub transform: UnitTransform,
}

impl Component {
    pub fn new(variable: impl Into<String>, level: Option<f64>, transform: UnitTransform) -> Self {
        Self {
            variable: variable.into(),
            level,
            transform,
        }
    }
}

/// How a plotted field is extracted from the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extraction {
    /// The variable as stored.
    Direct { variable: String },
    /// One pressure level (hPa) of a variable with a vertical dimension.
    LevelSelect { variable: String, level: f64 },
    /// A filled field plus a contour-line field, each with its own transform.
    /// The variable-level transform is not applied on top.
    Combination {
        fill: Component,
        lines: Component,
        line_levels: LevelRange,
    },
    /// Magnitude of two orthogonal vector components, `sqrt(x² + y²)`.
    Magnitude { x: String, y: String },
}

impl Extraction {
    /// Names of every dataset variable this extraction reads.
    pub fn required_variables(&self) -> Vec<&str> {
        match self {
            Extraction::Direct { variable } | Extraction::LevelSelect { variable, .. } => {
                vec![variable.as_str()]
            }
            Extraction::Combination { fill, lines, .. } => {
                vec![fill.variable.as_str(), lines.variable.as_str()]
            }
            Extraction::Magnitude { x, y } => vec![x.as_str(), y.as_str()],
        }
    }

    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Extraction::Direct { .. } => "direct",
            Extraction::LevelSelect { .. } => "level_select",
            Extraction::Combination { .. } => "combination",
            Extraction::Magnitude { .. } => "magnitude",
        }
    }
}

/// A plotted variable: display metadata plus its extraction recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Key used in log lines and config overrides.
    pub key: String,
    pub title: String,
    /// Output filename prefix, also the key into the fill-level table.
    pub prefix: String,
    pub unit: String,
    pub colormap: String,
    #[serde(default)]
    pub transform: UnitTransform,
    pub extraction: Extraction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_apply() {
        assert!((UnitTransform::kelvin_to_celsius().apply(273.15)).abs() < 1e-4);
        assert_eq!(UnitTransform::pascal_to_hectopascal().apply(101325.0), 1013.25);
        assert_eq!(UnitTransform::None.apply(4.5), 4.5);
        let linear = UnitTransform::Linear {
            scale: 2.0,
            offset: 1.0,
        };
        assert_eq!(linear.apply(3.0), 7.0);
    }

    #[test]
    fn test_geopotential_height() {
        let height = UnitTransform::geopotential_to_height().apply(55_000.0);
        assert!((height - 5608.44).abs() < 0.1);
    }

    #[test]
    fn test_required_variables() {
        let magnitude = Extraction::Magnitude {
            x: "u10".into(),
            y: "v10".into(),
        };
        assert_eq!(magnitude.required_variables(), vec!["u10", "v10"]);

        let combo = Extraction::Combination {
            fill: Component::new("t", Some(500.0), UnitTransform::kelvin_to_celsius()),
            lines: Component::new("z", Some(500.0), UnitTransform::geopotential_to_height()),
            line_levels: LevelRange::new(4800.0, 6000.0, 60.0),
        };
        assert_eq!(combo.required_variables(), vec!["t", "z"]);
        assert_eq!(combo.kind(), "combination");
    }

    #[test]
    fn test_extraction_yaml_tagging() {
        let yaml = "kind: level_select\nvariable: r\nlevel: 700\n";
        let extraction: Extraction = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            extraction,
            Extraction::LevelSelect {
                variable: "r".into(),
                level: 700.0
            }
        );
    }

    #[test]
    fn test_transform_yaml_forms() {
        let none: UnitTransform = serde_yaml::from_str("none").unwrap();
        assert_eq!(none, UnitTransform::None);
        let divide: UnitTransform = serde_yaml::from_str("divide: 100.0").unwrap();
        assert_eq!(divide, UnitTransform::Divide(100.0));
    }
}
