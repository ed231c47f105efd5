//! Source file naming: which file a model run lives in and where to get it.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::config::SourceConfig;

/// One model run's source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub model: String,
    pub date: NaiveDate,
    pub filename: String,
    pub url: String,
}

impl SourceFile {
    /// Local path under `dir`.
    pub fn local_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.filename)
    }
}

impl SourceConfig {
    /// Name and URL for `model`'s 00Z run on `date`.
    pub fn resolve(&self, model: &str, date: NaiveDate) -> SourceFile {
        let filename = expand(&self.file_pattern, model, date);
        let path = expand(&self.path_pattern, model, date);
        let base = self.base_url.trim_end_matches('/');
        let url = if path.is_empty() {
            format!("{}/{}", base, filename)
        } else {
            format!("{}/{}/{}", base, path.trim_matches('/'), filename)
        };
        SourceFile {
            model: model.to_string(),
            date,
            filename,
            url,
        }
    }
}

fn expand(pattern: &str, model: &str, date: NaiveDate) -> String {
    pattern
        .replace("{model}", model)
        .replace("{yyyymmdd}", &date.format("%Y%m%d").to_string())
        .replace("{yyyy}", &date.format("%Y").to_string())
        .replace("{mmdd}", &date.format("%m%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_naming() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let source = SourceConfig::default().resolve("FOUR_v200_GFS", date);
        assert_eq!(source.filename, "FOUR_v200_GFS_2024011500_f000_f240_06.nc");
        assert_eq!(
            source.url,
            "https://noaa-oar-mlwp-data.s3.amazonaws.com/FOUR_v200_GFS/2024/0115/FOUR_v200_GFS_2024011500_f000_f240_06.nc"
        );
    }

    #[test]
    fn test_flat_layout() {
        let config = SourceConfig {
            base_url: "http://localhost:9000/".to_string(),
            path_pattern: String::new(),
            file_pattern: "{model}-{yyyymmdd}.nc".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let source = config.resolve("GRAP", date);
        assert_eq!(source.url, "http://localhost:9000/GRAP-20231231.nc");
        assert_eq!(
            source.local_path(Path::new("/data")),
            PathBuf::from("/data/GRAP-20231231.nc")
        );
    }
}
