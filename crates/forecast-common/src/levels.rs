//! Fill and contour level tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An evenly spaced level range with half-open `[start, stop)` semantics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl LevelRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Number of levels in the range.
    pub fn len(&self) -> usize {
        if !(self.step > 0.0) || !(self.stop > self.start) {
            return 0;
        }
        ((self.stop - self.start) / self.step).ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the levels. Values are computed as `start + i * step`
    /// so repeated calls return bit-identical arrays.
    pub fn values(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

/// Fill levels for one filename prefix: an optional default plus
/// per-domain overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainLevels {
    #[serde(default)]
    pub default: Option<LevelRange>,
    #[serde(default)]
    pub domains: BTreeMap<String, LevelRange>,
}

impl DomainLevels {
    pub fn uniform(range: LevelRange) -> Self {
        Self {
            default: Some(range),
            domains: BTreeMap::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>, range: LevelRange) -> Self {
        self.domains.insert(domain.into(), range);
        self
    }
}

/// Lookup table keyed by (filename prefix, domain name).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FillLevelTable {
    entries: BTreeMap<String, DomainLevels>,
}

impl FillLevelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, levels: DomainLevels) {
        self.entries.insert(prefix.into(), levels);
    }

    /// Range for a (prefix, domain) pair: the domain override if present,
    /// otherwise the prefix default.
    pub fn range(&self, prefix: &str, domain: &str) -> Option<LevelRange> {
        let entry = self.entries.get(prefix)?;
        entry.domains.get(domain).copied().or(entry.default)
    }

    /// Fill levels for a (prefix, domain) pair; `None` when unresolved or empty.
    pub fn lookup(&self, prefix: &str, domain: &str) -> Option<Vec<f64>> {
        let levels = self.range(prefix, domain)?.values();
        if levels.is_empty() {
            None
        } else {
            Some(levels)
        }
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_matches_half_open_semantics() {
        assert_eq!(LevelRange::new(980.0, 1045.0, 4.0).len(), 17);
        assert_eq!(LevelRange::new(0.0, 101.0, 5.0).values().last(), Some(&100.0));
        assert_eq!(LevelRange::new(-5.0, 35.5, 0.5).len(), 81);
        assert_eq!(LevelRange::new(-40.0, 0.0, 2.0).values().last(), Some(&-2.0));
    }

    #[test]
    fn test_fractional_step_includes_upper_bound() {
        let levels = LevelRange::new(-2.0, 2.1, 0.2).values();
        assert_eq!(levels.len(), 21);
        assert!((levels[20] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_ranges_are_empty() {
        assert!(LevelRange::new(0.0, 10.0, 0.0).is_empty());
        assert!(LevelRange::new(10.0, 0.0, 1.0).is_empty());
        assert!(LevelRange::new(0.0, 10.0, f64::NAN).is_empty());
    }

    #[test]
    fn test_lookup_prefers_domain_override() {
        let mut table = FillLevelTable::new();
        table.insert(
            "temp_2m",
            DomainLevels::uniform(LevelRange::new(-30.0, 46.0, 2.0))
                .with_domain("marmara", LevelRange::new(-5.0, 35.5, 0.5)),
        );

        assert_eq!(table.lookup("temp_2m", "marmara").unwrap().len(), 81);
        assert_eq!(table.lookup("temp_2m", "europe").unwrap().len(), 38);
        assert!(table.lookup("mslp", "europe").is_none());
    }

    #[test]
    fn test_lookup_is_stable() {
        let mut table = FillLevelTable::new();
        table.insert("w_500", DomainLevels::uniform(LevelRange::new(-2.0, 2.1, 0.2)));
        let first = table.lookup("w_500", "turkey");
        for _ in 0..10 {
            assert_eq!(table.lookup("w_500", "turkey"), first);
        }
    }
}
