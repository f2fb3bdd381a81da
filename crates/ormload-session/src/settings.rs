//! Load session configuration.

use ormload_core::{CacheMode, ConfigError, Error, RepresentationMode};
use serde::{Deserialize, Serialize};

/// Configuration for collection loading behavior.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    /// How the unit of work interacts with the second-level cache.
    pub cache_mode: CacheMode,
    /// Ask cache regions to skip puts for keys they already hold.
    pub minimal_puts: bool,
    /// Whether load statistics are recorded.
    pub statistics_enabled: bool,
    /// In-memory representation of entities and collections.
    pub representation_mode: RepresentationMode,
}

impl LoadSettings {
    /// Create new default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid load settings: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }

    /// Set the cache mode (builder pattern).
    #[must_use]
    pub fn cache_mode(mut self, value: CacheMode) -> Self {
        self.cache_mode = value;
        self
    }

    /// Set the `minimal_puts` option (builder pattern).
    #[must_use]
    pub fn minimal_puts(mut self, value: bool) -> Self {
        self.minimal_puts = value;
        self
    }

    /// Set the `statistics_enabled` option (builder pattern).
    #[must_use]
    pub fn statistics_enabled(mut self, value: bool) -> Self {
        self.statistics_enabled = value;
        self
    }

    /// Set the representation mode (builder pattern).
    #[must_use]
    pub fn representation_mode(mut self, value: RepresentationMode) -> Self {
        self.representation_mode = value;
        self
    }

    /// Whether puts should be minimal under the current cache mode.
    pub fn effective_minimal_puts(&self) -> bool {
        self.minimal_puts && self.cache_mode != CacheMode::Refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = LoadSettings::default();
        assert_eq!(settings.cache_mode, CacheMode::Normal);
        assert!(!settings.minimal_puts);
        assert!(!settings.statistics_enabled);
        assert_eq!(settings.representation_mode, RepresentationMode::Typed);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings =
            LoadSettings::from_json(r#"{ "cache_mode": "get", "statistics_enabled": true }"#)
                .unwrap();
        assert_eq!(settings.cache_mode, CacheMode::Get);
        assert!(settings.statistics_enabled);
        assert!(!settings.minimal_puts);
    }

    #[test]
    fn test_settings_from_invalid_json() {
        let err = LoadSettings::from_json(r#"{ "cache_mode": "sometimes" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_minimal_puts_off_under_refresh() {
        let settings = LoadSettings::new().minimal_puts(true);
        assert!(settings.effective_minimal_puts());
        let refresh = settings.cache_mode(CacheMode::Refresh);
        assert!(!refresh.effective_minimal_puts());
    }
}
