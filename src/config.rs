//! Per-location processing configuration.
//!
//! `processing.toml` maps pattern tokens to object names, one table per
//! location directory:
//!
//! ```toml
//! ["/data/astro/2026-08-20"]
//! M31stack = "M31"
//! ngc7000a = "NGC7000"
//! ```
//!
//! The configuration is loaded once at startup and is immutable for the run.
//! Object-name lookup always has an answer: a pattern with no entry (or a
//! location with no table) falls back to the pattern token itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors loading the location configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    Missing(PathBuf),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Mapping from location directories to (pattern → object name) tables.
#[derive(Debug, Clone, Default)]
pub struct LocationConfig {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl LocationConfig {
    /// Load the configuration from a TOML file.
    ///
    /// A missing file is reported as [`ConfigError::Missing`] so the caller
    /// can abort before any processing starts.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let sections = toml::from_str(text)?;
        Ok(Self { sections })
    }

    /// Whether a table exists for the given location.
    pub fn has_location(&self, location: &Path) -> bool {
        self.sections.contains_key(location.to_string_lossy().as_ref())
    }

    /// Resolve the object name for a pattern at a location.
    ///
    /// Falls back to the pattern token when the location or pattern has no
    /// entry, so every stack always has a usable directory name.
    pub fn object_name(&self, location: &Path, pattern: &str) -> String {
        self.sections
            .get(location.to_string_lossy().as_ref())
            .and_then(|patterns| patterns.get(pattern))
            .cloned()
            .unwrap_or_else(|| pattern.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
["/data/astro/2026-08-20"]
M31stack = "M31"
ngc7000a = "NGC7000"

["/data/astro/2026-08-21"]
M31stack = "M31_night2"
"#;

    #[test]
    fn configured_pattern_resolves_to_object_name() {
        let config = LocationConfig::parse(SAMPLE).unwrap();
        let loc = Path::new("/data/astro/2026-08-20");
        assert_eq!(config.object_name(loc, "M31stack"), "M31");
        assert_eq!(config.object_name(loc, "ngc7000a"), "NGC7000");
    }

    #[test]
    fn unknown_pattern_falls_back_to_token() {
        let config = LocationConfig::parse(SAMPLE).unwrap();
        let loc = Path::new("/data/astro/2026-08-20");
        assert_eq!(config.object_name(loc, "veil_east"), "veil_east");
    }

    #[test]
    fn unknown_location_falls_back_to_token() {
        let config = LocationConfig::parse(SAMPLE).unwrap();
        let loc = Path::new("/data/astro/2026-09-01");
        assert!(!config.has_location(loc));
        assert_eq!(config.object_name(loc, "M31stack"), "M31stack");
    }

    #[test]
    fn same_pattern_differs_per_location() {
        let config = LocationConfig::parse(SAMPLE).unwrap();
        assert_eq!(
            config.object_name(Path::new("/data/astro/2026-08-21"), "M31stack"),
            "M31_night2"
        );
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let err = LocationConfig::load(Path::new("/nonexistent/processing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }
}
