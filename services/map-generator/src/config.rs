//! Run configuration.
//!
//! `MapConfig::default()` is the complete baseline: models, leads, domains,
//! variables and fill levels. A YAML file may override any subset of fields;
//! command-line flags override the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forecast_common::{
    validate_time_format, Component, DomainLevels, DomainSpec, Extraction, FillLevelTable,
    LeadSpec, LevelRange, UnitTransform, VariableSpec,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Top-level configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub output_dir: PathBuf,
    pub download_dir: PathBuf,
    pub workers: usize,
    /// Per-task render timeout; `None` waits indefinitely.
    pub task_timeout_secs: Option<u64>,
    /// UTC hour before which the previous day's run is used.
    pub cutoff_hour: u32,
    pub valid_time_offset_hours: i64,
    pub valid_time_format: String,
    pub source: SourceConfig,
    pub download: DownloadSettings,
    pub models: Vec<String>,
    pub leads: Vec<LeadSpec>,
    pub domains: Vec<DomainSpec>,
    pub variables: Vec<VariableSpec>,
    pub fill_levels: FillLevelTable,
    pub image: ImageConfig,
}

/// Where source files live and how they are named.
///
/// Patterns accept `{model}`, `{yyyy}`, `{mmdd}` and `{yyyymmdd}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub path_pattern: String,
    pub file_pattern: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://noaa-oar-mlwp-data.s3.amazonaws.com".to_string(),
            path_pattern: "{model}/{yyyy}/{mmdd}".to_string(),
            file_pattern: "{model}_{yyyymmdd}00_f000_f240_06.nc".to_string(),
        }
    }
}

/// HTTP download behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub max_retries: u32,
    pub initial_retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay_secs: 2,
            max_retry_delay_secs: 60,
            request_timeout_secs: 1800,
            connect_timeout_secs: 30,
            user_agent: format!("forecast-maps/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output image settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    /// TrueType font for titles; without one only PNG metadata carries them.
    pub font_path: Option<PathBuf>,
    pub overlays: Vec<OverlayConfig>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            font_path: None,
            overlays: Vec::new(),
        }
    }
}

/// A GeoJSON line layer (coastlines, borders).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_overlay_color")]
    pub color: [u8; 4],
    #[serde(default = "default_overlay_width")]
    pub width: f32,
}

fn default_overlay_color() -> [u8; 4] {
    [40, 40, 40, 255]
}

fn default_overlay_width() -> f32 {
    0.8
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            download_dir: PathBuf::from("downloads"),
            workers: 4,
            task_timeout_secs: None,
            cutoff_hour: 6,
            valid_time_offset_hours: 3,
            valid_time_format: "%d %b %H:00".to_string(),
            source: SourceConfig::default(),
            download: DownloadSettings::default(),
            models: default_models(),
            leads: default_leads(),
            domains: default_domains(),
            variables: default_variables(),
            fill_levels: default_fill_levels(),
            image: ImageConfig::default(),
        }
    }
}

fn default_models() -> Vec<String> {
    ["FOUR_v200_GFS", "GRAP_v100_GFS", "PANG_v100_GFS", "AURO_v100_GFS"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_leads() -> Vec<LeadSpec> {
    vec![
        LeadSpec::new(0, "f000"),
        LeadSpec::new(4, "f024"),
        LeadSpec::new(8, "f048"),
    ]
}

fn default_domains() -> Vec<DomainSpec> {
    vec![
        DomainSpec::new("europe", [-20.0, 60.0, 25.0, 65.0]),
        DomainSpec::new("turkey", [25.0, 45.0, 34.0, 43.0]),
        DomainSpec::new("marmara", [26.0, 32.0, 39.0, 42.5]),
    ]
}

fn spec(
    key: &str,
    title: &str,
    prefix: &str,
    unit: &str,
    colormap: &str,
    transform: UnitTransform,
    extraction: Extraction,
) -> VariableSpec {
    VariableSpec {
        key: key.to_string(),
        title: title.to_string(),
        prefix: prefix.to_string(),
        unit: unit.to_string(),
        colormap: colormap.to_string(),
        transform,
        extraction,
    }
}

fn direct(variable: &str) -> Extraction {
    Extraction::Direct {
        variable: variable.to_string(),
    }
}

fn at_level(variable: &str, level: f64) -> Extraction {
    Extraction::LevelSelect {
        variable: variable.to_string(),
        level,
    }
}

fn default_variables() -> Vec<VariableSpec> {
    let celsius = UnitTransform::kelvin_to_celsius();
    vec![
        spec("t2", "2m Temperature", "temp_2m", "°C", "Spectral_r", celsius, direct("t2")),
        spec(
            "wind10",
            "10m Wind Speed",
            "wind_10m",
            "m/s",
            "YlOrRd",
            UnitTransform::None,
            Extraction::Magnitude {
                x: "u10".to_string(),
                y: "v10".to_string(),
            },
        ),
        spec(
            "msl",
            "MSLP",
            "mslp",
            "hPa",
            "RdBu_r",
            UnitTransform::pascal_to_hectopascal(),
            direct("msl"),
        ),
        spec(
            "tcwv",
            "Precipitable Water",
            "pr_wtr",
            "mm",
            "YlGnBu",
            UnitTransform::None,
            direct("tcwv"),
        ),
        spec(
            "r",
            "700 hPa Humidity",
            "rh_700",
            "%",
            "Blues",
            UnitTransform::None,
            at_level("r", 700.0),
        ),
        spec("t", "850 hPa Temp", "temp_850", "°C", "coolwarm", celsius, at_level("t", 850.0)),
        spec("skt", "Skin Temperature", "skt", "°C", "inferno", celsius, direct("skt")),
        spec(
            "w",
            "500 hPa Vert. Vel.",
            "w_500",
            "Pa/s",
            "RdBu_r",
            UnitTransform::None,
            at_level("w", 500.0),
        ),
        spec(
            "z",
            "500 hPa Geopotential",
            "hgt_500",
            "°C",
            "RdBu_r",
            UnitTransform::None,
            Extraction::Combination {
                fill: Component::new("t", Some(500.0), celsius),
                lines: Component::new("z", Some(500.0), UnitTransform::geopotential_to_height()),
                line_levels: LevelRange::new(4800.0, 6000.0, 60.0),
            },
        ),
    ]
}

fn default_fill_levels() -> FillLevelTable {
    let temperature = DomainLevels::uniform(LevelRange::new(-30.0, 46.0, 2.0))
        .with_domain("turkey", LevelRange::new(-15.0, 41.0, 1.0))
        .with_domain("marmara", LevelRange::new(-5.0, 35.5, 0.5));

    let mut table = FillLevelTable::new();
    table.insert("temp_2m", temperature.clone());
    table.insert("skt", temperature);
    table.insert("wind_10m", DomainLevels::uniform(LevelRange::new(0.0, 31.0, 2.0)));
    table.insert("mslp", DomainLevels::uniform(LevelRange::new(980.0, 1045.0, 4.0)));
    table.insert("pr_wtr", DomainLevels::uniform(LevelRange::new(0.0, 70.0, 2.0)));
    table.insert("rh_700", DomainLevels::uniform(LevelRange::new(0.0, 101.0, 5.0)));
    table.insert("temp_850", DomainLevels::uniform(LevelRange::new(-25.0, 26.0, 2.0)));
    table.insert("w_500", DomainLevels::uniform(LevelRange::new(-2.0, 2.1, 0.2)));
    table.insert("hgt_500", DomainLevels::uniform(LevelRange::new(-40.0, 0.0, 2.0)));
    table
}

/// Output filename for one (variable, lead, domain, model) combination.
pub fn output_filename(prefix: &str, lead_label: &str, domain: &str, model_short: &str) -> String {
    format!("{}{}{}_{}.png", prefix, lead_label, domain, model_short)
}

/// Model short name: the text before the first `_`.
pub fn model_short_name(model: &str) -> &str {
    model.split('_').next().unwrap_or(model)
}

impl MapConfig {
    /// Load from a YAML file, or the baseline defaults when no path is given.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let Some(path) = path else {
            debug!("No config file given, using built-in tables");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    /// Restrict the run to the named models, keeping configured order.
    pub fn select_models(&mut self, names: &[String]) -> PipelineResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = names.iter().find(|n| !self.models.contains(n)) {
            return Err(PipelineError::Config(format!(
                "unknown model '{}' (configured: {})",
                unknown,
                self.models.join(", ")
            )));
        }
        self.models.retain(|m| names.contains(m));
        Ok(())
    }

    /// Pre-loop sanity check. A failure here is the only run-wide abort.
    pub fn validate(&self) -> PipelineResult<()> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        if self.workers == 0 {
            return fail("workers must be at least 1".to_string());
        }
        if self.cutoff_hour >= 24 {
            return fail(format!("cutoff_hour {} is not an hour of day", self.cutoff_hour));
        }
        if self.task_timeout_secs == Some(0) {
            return fail("task_timeout_secs must be positive when set".to_string());
        }
        validate_time_format(&self.valid_time_format)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if self.source.file_pattern.trim().is_empty() {
            return fail("source.file_pattern is empty".to_string());
        }
        if self.image.width == 0 || self.image.height == 0 {
            return fail("image width and height must be positive".to_string());
        }

        for (what, empty) in [
            ("model", self.models.is_empty()),
            ("lead", self.leads.is_empty()),
            ("domain", self.domains.is_empty()),
            ("variable", self.variables.is_empty()),
        ] {
            if empty {
                return fail(format!("at least one {} must be configured", what));
            }
        }

        unique("model", self.models.iter().map(String::as_str))?;
        unique("model short name", self.models.iter().map(|m| model_short_name(m)))?;
        unique("lead label", self.leads.iter().map(|l| l.label.as_str()))?;
        unique("domain", self.domains.iter().map(|d| d.name.as_str()))?;
        unique("variable key", self.variables.iter().map(|v| v.key.as_str()))?;
        unique("filename prefix", self.variables.iter().map(|v| v.prefix.as_str()))?;

        for domain in &self.domains {
            domain
                .bbox
                .validate()
                .map_err(|e| PipelineError::Config(format!("domain '{}': {}", domain.name, e)))?;
        }

        for variable in &self.variables {
            if let Extraction::Combination { line_levels, .. } = &variable.extraction {
                if line_levels.is_empty() {
                    return fail(format!("variable '{}' has no contour line levels", variable.key));
                }
            }
            for domain in &self.domains {
                if self.fill_levels.lookup(&variable.prefix, &domain.name).is_none() {
                    return fail(format!(
                        "no fill levels for prefix '{}' in domain '{}'",
                        variable.prefix, domain.name
                    ));
                }
            }
        }

        // Concatenated names can collide even when each part is unique
        let mut names = HashSet::new();
        for model in &self.models {
            let short = model_short_name(model);
            for variable in &self.variables {
                for lead in &self.leads {
                    for domain in &self.domains {
                        let name =
                            output_filename(&variable.prefix, &lead.label, &domain.name, short);
                        if !names.insert(name.clone()) {
                            return fail(format!("output filename '{}' is produced twice", name));
                        }
                    }
                }
            }
            names.clear();
        }

        Ok(())
    }
}

fn unique<'a>(what: &str, items: impl Iterator<Item = &'a str>) -> PipelineResult<()> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item) {
            return Err(PipelineError::Config(format!("duplicate {} '{}'", what, item)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        MapConfig::default().validate().unwrap();
    }

    #[test]
    fn test_baseline_tables() {
        let config = MapConfig::default();
        assert_eq!(config.variables.len(), 9);
        assert_eq!(config.domains.len(), 3);
        assert_eq!(config.leads.iter().map(|l| l.index).collect::<Vec<_>>(), vec![0, 4, 8]);
        assert_eq!(config.fill_levels.lookup("temp_2m", "marmara").unwrap().len(), 81);
        assert_eq!(config.fill_levels.lookup("temp_2m", "turkey").unwrap().len(), 56);
        assert_eq!(config.fill_levels.lookup("temp_2m", "europe").unwrap().len(), 38);
        assert_eq!(config.fill_levels.lookup("mslp", "turkey").unwrap().len(), 17);

        let hgt = config.variables.iter().find(|v| v.prefix == "hgt_500").unwrap();
        assert_eq!(hgt.colormap, "RdBu_r");
        assert_eq!(hgt.unit, "°C");
    }

    #[test]
    fn test_short_name_and_filename() {
        assert_eq!(model_short_name("FOUR_v200_GFS"), "FOUR");
        assert_eq!(model_short_name("PLAIN"), "PLAIN");
        assert_eq!(
            output_filename("temp_2m", "f024", "marmara", "FOUR"),
            "temp_2mf024marmara_FOUR.png"
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = MapConfig {
            workers: 0,
            ..MapConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_filename_collision_rejected() {
        let mut config = MapConfig::default();
        // "ab" + "c" and "a" + "bc" concatenate to the same stem
        config.leads = vec![LeadSpec::new(0, "c"), LeadSpec::new(1, "bc")];
        config.variables.truncate(2);
        config.variables[0].prefix = "ab".to_string();
        config.variables[1].prefix = "a".to_string();
        let mut fill = FillLevelTable::new();
        fill.insert("a", DomainLevels::uniform(LevelRange::new(0.0, 10.0, 1.0)));
        fill.insert("ab", DomainLevels::uniform(LevelRange::new(0.0, 10.0, 1.0)));
        config.fill_levels = fill;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("produced twice"), "{}", err);
    }

    #[test]
    fn test_missing_fill_levels_rejected() {
        let mut config = MapConfig::default();
        config.fill_levels = FillLevelTable::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_models() {
        let mut config = MapConfig::default();
        config
            .select_models(&["PANG_v100_GFS".to_string(), "FOUR_v200_GFS".to_string()])
            .unwrap();
        assert_eq!(config.models, vec!["FOUR_v200_GFS", "PANG_v100_GFS"]);
        assert!(config.select_models(&["NOPE".to_string()]).is_err());
    }
}
