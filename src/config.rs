//! Configuration file handling.
//!
//! Settings come from `call-analytics.toml` (or the path given with
//! `--config`). Every key is optional and falls back to the defaults below.
//! The database URL is deliberately not part of the file; it is read from
//! `DATABASE_URL`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::normalize::FieldLimits;

pub const DEFAULT_CONFIG_FILE: &str = "call-analytics.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Shorter values are treated as missing ("N/A", "-", "TBD").
    #[serde(default = "default_min_value_chars")]
    pub min_value_chars: usize,

    /// Extracted text fields are cut to this many characters.
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,

    /// Extra rules tried before the built-in ones.
    #[serde(default)]
    pub patterns: ExtraPatterns,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_value_chars: default_min_value_chars(),
            max_field_chars: default_max_field_chars(),
            patterns: ExtraPatterns::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn limits(&self) -> FieldLimits {
        FieldLimits {
            min_value_chars: self.min_value_chars,
            max_field_chars: self.max_field_chars,
        }
    }
}

fn default_min_value_chars() -> usize {
    FieldLimits::default().min_value_chars
}

fn default_max_field_chars() -> usize {
    FieldLimits::default().max_field_chars
}

/// Regexes with one capture group holding the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraPatterns {
    #[serde(default)]
    pub heat: Vec<String>,
    #[serde(default)]
    pub need: Vec<String>,
    #[serde(default)]
    pub objection: Vec<String>,
    #[serde(default)]
    pub outcome: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Case-insensitive substrings that mark an outcome as a conversion.
    #[serde(default = "default_conversion_keywords")]
    pub conversion_keywords: Vec<String>,

    /// How many needs/objections the report lists.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Minimum heat score for the "top performing calls" section.
    #[serde(default = "default_high_performer_threshold")]
    pub high_performer_threshold: i32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            conversion_keywords: default_conversion_keywords(),
            top_n: default_top_n(),
            high_performer_threshold: default_high_performer_threshold(),
        }
    }
}

fn default_conversion_keywords() -> Vec<String> {
    vec!["converted", "closed", "signed", "contract", "demo"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_top_n() -> usize {
    3
}

fn default_high_performer_threshold() -> i32 {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Fraction of unassigned calls handed out in projected views.
    #[serde(default = "default_redistribution_share")]
    pub redistribution_share: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            redistribution_share: default_redistribution_share(),
        }
    }
}

fn default_redistribution_share() -> f64 {
    0.7
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|message| Error::Config {
            path: path.display().to_string(),
            message,
        })
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|err| err.to_string())
    }

    pub fn default_toml() -> String {
        r#"# Call analytics configuration

[database]
max_connections = 5

[extraction]
# Values shorter than this are treated as missing
min_value_chars = 4
# Extracted text fields are truncated to this length
max_field_chars = 150

# Extra regexes tried before the built-in rules; group 1 captures the value
[extraction.patterns]
heat = []
need = []
objection = []
outcome = []

[aggregation]
conversion_keywords = ["converted", "closed", "signed", "contract", "demo"]
top_n = 3
high_performer_threshold = 6

[projection]
# Share of unassigned calls redistributed in projected (estimate) views
redistribution_share = 0.7
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.extraction.max_field_chars, 150);
        assert_eq!(config.aggregation.top_n, 3);
        assert_eq!(config.aggregation.conversion_keywords.len(), 5);
        assert!((config.projection.redistribution_share - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn default_toml_round_trips_to_defaults() {
        let config = Config::parse(&Config::default_toml()).unwrap();
        assert_eq!(config.extraction.limits(), FieldLimits::default());
        assert_eq!(
            config.aggregation.conversion_keywords,
            AggregationConfig::default().conversion_keywords
        );
        assert!(config.extraction.patterns.need.is_empty());
    }

    #[test]
    fn partial_sections_override_only_given_keys() {
        let config = Config::parse(
            r#"
            [aggregation]
            conversion_keywords = ["booked"]

            [extraction.patterns]
            outcome = ['Intent:\s*([^.]+)']
            "#,
        )
        .unwrap();
        assert_eq!(config.aggregation.conversion_keywords, vec!["booked"]);
        assert_eq!(config.aggregation.top_n, 3);
        assert_eq!(config.extraction.patterns.outcome.len(), 1);
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(Config::parse("[aggregation\ntop_n = ").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            Config::load_or_default(Path::new("/nonexistent/call-analytics.toml")).unwrap();
        assert_eq!(config.aggregation.high_performer_threshold, 6);
    }
}
