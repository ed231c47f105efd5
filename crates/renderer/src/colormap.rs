//! Named colormaps.
//!
//! Each map is a list of evenly spaced anchor colors, linearly interpolated.
//! Anchors follow the matplotlib / ColorBrewer definitions closely enough for
//! weather charts. A `_r` suffix reverses any map.

use crate::error::{RenderError, RenderResult};
use crate::gradient::{interpolate_color, Color};

const SPECTRAL: &[Color] = &[
    Color::rgb(158, 1, 66),
    Color::rgb(213, 62, 79),
    Color::rgb(244, 109, 67),
    Color::rgb(253, 174, 97),
    Color::rgb(254, 224, 139),
    Color::rgb(255, 255, 191),
    Color::rgb(230, 245, 152),
    Color::rgb(171, 221, 164),
    Color::rgb(102, 194, 165),
    Color::rgb(50, 136, 189),
    Color::rgb(94, 79, 162),
];

const YL_OR_RD: &[Color] = &[
    Color::rgb(255, 255, 204),
    Color::rgb(255, 237, 160),
    Color::rgb(254, 217, 118),
    Color::rgb(254, 178, 76),
    Color::rgb(253, 141, 60),
    Color::rgb(252, 78, 42),
    Color::rgb(227, 26, 28),
    Color::rgb(189, 0, 38),
    Color::rgb(128, 0, 38),
];

const RD_BU: &[Color] = &[
    Color::rgb(103, 0, 31),
    Color::rgb(178, 24, 43),
    Color::rgb(214, 96, 77),
    Color::rgb(244, 165, 130),
    Color::rgb(253, 219, 199),
    Color::rgb(247, 247, 247),
    Color::rgb(209, 229, 240),
    Color::rgb(146, 197, 222),
    Color::rgb(67, 147, 195),
    Color::rgb(33, 102, 172),
    Color::rgb(5, 48, 97),
];

const YL_GN_BU: &[Color] = &[
    Color::rgb(255, 255, 217),
    Color::rgb(237, 248, 177),
    Color::rgb(199, 233, 180),
    Color::rgb(127, 205, 187),
    Color::rgb(65, 182, 196),
    Color::rgb(29, 145, 192),
    Color::rgb(34, 94, 168),
    Color::rgb(37, 52, 148),
    Color::rgb(8, 29, 88),
];

const BLUES: &[Color] = &[
    Color::rgb(247, 251, 255),
    Color::rgb(222, 235, 247),
    Color::rgb(198, 219, 239),
    Color::rgb(158, 202, 225),
    Color::rgb(107, 174, 214),
    Color::rgb(66, 146, 198),
    Color::rgb(33, 113, 181),
    Color::rgb(8, 81, 156),
    Color::rgb(8, 48, 107),
];

const COOLWARM: &[Color] = &[
    Color::rgb(59, 76, 192),
    Color::rgb(98, 130, 234),
    Color::rgb(141, 176, 254),
    Color::rgb(184, 208, 249),
    Color::rgb(221, 221, 221),
    Color::rgb(245, 196, 173),
    Color::rgb(244, 154, 123),
    Color::rgb(222, 96, 77),
    Color::rgb(180, 4, 38),
];

const INFERNO: &[Color] = &[
    Color::rgb(0, 0, 4),
    Color::rgb(31, 12, 72),
    Color::rgb(85, 15, 109),
    Color::rgb(136, 34, 106),
    Color::rgb(186, 54, 85),
    Color::rgb(227, 89, 51),
    Color::rgb(249, 140, 10),
    Color::rgb(249, 201, 50),
    Color::rgb(252, 255, 164),
];

const VIRIDIS: &[Color] = &[
    Color::rgb(68, 1, 84),
    Color::rgb(72, 40, 120),
    Color::rgb(62, 74, 137),
    Color::rgb(49, 104, 142),
    Color::rgb(38, 130, 142),
    Color::rgb(31, 158, 137),
    Color::rgb(53, 183, 121),
    Color::rgb(109, 205, 89),
    Color::rgb(180, 222, 44),
    Color::rgb(253, 231, 37),
];

const JET: &[Color] = &[
    Color::rgb(0, 0, 127),
    Color::rgb(0, 0, 255),
    Color::rgb(0, 127, 255),
    Color::rgb(0, 255, 255),
    Color::rgb(127, 255, 127),
    Color::rgb(255, 255, 0),
    Color::rgb(255, 127, 0),
    Color::rgb(255, 0, 0),
    Color::rgb(127, 0, 0),
];

const NIPY_SPECTRAL: &[Color] = &[
    Color::rgb(0, 0, 0),
    Color::rgb(119, 0, 136),
    Color::rgb(0, 0, 170),
    Color::rgb(0, 119, 221),
    Color::rgb(0, 170, 170),
    Color::rgb(0, 153, 0),
    Color::rgb(0, 221, 0),
    Color::rgb(204, 255, 0),
    Color::rgb(255, 204, 0),
    Color::rgb(255, 0, 0),
    Color::rgb(204, 0, 0),
    Color::rgb(204, 204, 204),
];

fn base_anchors(name: &str) -> Option<&'static [Color]> {
    Some(match name {
        "Spectral" => SPECTRAL,
        "YlOrRd" => YL_OR_RD,
        "RdBu" => RD_BU,
        "YlGnBu" => YL_GN_BU,
        "Blues" => BLUES,
        "coolwarm" => COOLWARM,
        "inferno" => INFERNO,
        "viridis" => VIRIDIS,
        "jet" => JET,
        "nipy_spectral" => NIPY_SPECTRAL,
        _ => return None,
    })
}

/// A continuous colormap over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    pub name: String,
    anchors: Vec<Color>,
}

impl Colormap {
    /// Look up a colormap by its matplotlib-style name.
    pub fn by_name(name: &str) -> RenderResult<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let anchors = base_anchors(base)
            .ok_or_else(|| RenderError::UnknownColormap(name.to_string()))?;
        let mut anchors = anchors.to_vec();
        if reversed {
            anchors.reverse();
        }
        Ok(Self {
            name: name.to_string(),
            anchors,
        })
    }

    /// Color at position `t` in `[0, 1]` (clamped).
    pub fn sample(&self, t: f32) -> Color {
        let n = self.anchors.len();
        if n == 1 {
            return self.anchors[0];
        }
        let pos = t.clamp(0.0, 1.0) * (n - 1) as f32;
        let i = (pos.floor() as usize).min(n - 2);
        interpolate_color(self.anchors[i], self.anchors[i + 1], pos - i as f32)
    }

    /// Colors for `level_count` fill levels with both ends extended:
    /// `level_count + 1` colors spread evenly over the map.
    pub fn bin_colors(&self, level_count: usize) -> Vec<Color> {
        if level_count == 0 {
            return vec![self.sample(0.5)];
        }
        (0..=level_count)
            .map(|i| self.sample(i as f32 / level_count as f32))
            .collect()
    }
}

/// Names accepted by [`Colormap::by_name`] without the `_r` suffix.
pub fn base_names() -> &'static [&'static str] {
    &[
        "Spectral",
        "YlOrRd",
        "RdBu",
        "YlGnBu",
        "Blues",
        "coolwarm",
        "inferno",
        "viridis",
        "jet",
        "nipy_spectral",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_resolve() {
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
    fn test_unknown_name_is_error() {
        assert!(matches!(
            Colormap::by_name("plasma_rr"),
            Err(RenderError::UnknownColormap(_))
        ));
    }

    #[test]
    fn test_reversed_map_swaps_ends() {
        let forward = Colormap::by_name("Spectral").unwrap();
        let reversed = Colormap::by_name("Spectral_r").unwrap();
        assert_eq!(forward.sample(0.0), reversed.sample(1.0));
        assert_eq!(forward.sample(1.0), reversed.sample(0.0));
    }

    #[test]
    fn test_bin_colors_count() {
        let map = Colormap::by_name("Blues").unwrap();
        let colors = map.bin_colors(17);
        assert_eq!(colors.len(), 18);
        assert_eq!(colors[0], Color::rgb(247, 251, 255));
        assert_eq!(colors[17], Color::rgb(8, 48, 107));
    }

    #[test]
    fn test_every_base_name_resolves() {
        for name in base_names() {
            assert!(Colormap::by_name(name).is_ok());
        }
    }
}
