//! Analysis configuration, loaded from TOML.
//!
//! The defaults live in `config/default.toml`, embedded at compile time via
//! [`include_str!`]. A user file only needs the keys it changes.

use std::collections::BTreeMap;
use std::path::Path;

use deforest_map_analytics_models::{GapFillOptions, TemporalOptions};
use deforest_map_geography::cluster::DEFAULT_BINS;
use deforest_map_observation_models::Field;
use deforest_map_table::coerce::ColumnMapping;
use deforest_map_table::loader::LoadOptions;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default configuration, embedded at compile time.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// How the input text is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Field delimiter; must be a single ASCII character.
    pub delimiter: char,
    /// Whether the input is gzip-compressed.
    pub gzip: bool,
    /// Optional cap on parsed records.
    pub max_records: Option<u64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            gzip: false,
            max_records: None,
        }
    }
}

/// Header alias overrides layered on the built-in [`ColumnMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    /// Replacement aliases for the listed fields.
    pub aliases: BTreeMap<Field, Vec<String>>,
    /// Fields that must be present.
    pub required: Vec<Field>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            required: ColumnMapping::default().required,
        }
    }
}

/// Correlation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Column whose drivers are ranked in the report.
    pub target: String,
    /// Columns to correlate. Names absent from the table are skipped.
    pub columns: Vec<String>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            target: Field::DeforestedArea.to_string(),
            columns: [
                Field::Latitude,
                Field::Longitude,
                Field::Altitude,
                Field::Slope,
                Field::DistanceToRoad,
                Field::Precipitation,
                Field::Temperature,
                Field::DeforestedArea,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// Severity clustering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Magnitude column.
    pub column: String,
    /// Number of equal-width bins.
    pub bins: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            column: Field::DeforestedArea.to_string(),
            bins: DEFAULT_BINS,
        }
    }
}

/// Filter widget settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Columns offered as filters. Names absent from the table are skipped.
    pub variables: Vec<String>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            variables: [
                Field::Latitude,
                Field::Longitude,
                Field::VegetationType,
                Field::Altitude,
                Field::Precipitation,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Input parsing.
    pub input: InputConfig,
    /// Header mapping.
    pub columns: ColumnsConfig,
    /// Gap filling.
    pub gap_fill: GapFillOptions,
    /// Temporal aggregation.
    pub temporal: TemporalOptions,
    /// Correlation.
    pub correlation: CorrelationConfig,
    /// Severity clustering.
    pub clustering: ClusteringConfig,
    /// Filter widgets.
    pub filters: FiltersConfig,
}

impl AnalysisConfig {
    /// Parses a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value is invalid.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded file is invalid.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG_TOML)
    }

    /// Reads a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded analysis config from {}", path.display());
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter {
                delimiter: self.input.delimiter,
            });
        }
        if self.clustering.bins == 0 {
            return Err(ConfigError::InvalidValue {
                key: "clustering.bins",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Column mapping: built-in aliases with this config's overrides.
    #[must_use]
    pub fn mapping(&self) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        for (field, aliases) in &self.columns.aliases {
            mapping.aliases.insert(*field, aliases.clone());
        }
        mapping.required.clone_from(&self.columns.required);
        mapping
    }

    /// Loader options for the input section.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        let mut options = LoadOptions::new().with_gzip(self.input.gzip);
        if let Ok(delimiter) = u8::try_from(self.input.delimiter) {
            options = options.with_delimiter(delimiter);
        }
        if let Some(max) = self.input.max_records {
            options = options.with_max_records(max);
        }
        options
    }
}
