#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end deforestation analysis.
//!
//! [`prepare`] runs the shared stages once (schema coercion and gap
//! filling) and then both branches:
//!
//! - statistics: summary, temporal aggregation, correlations
//! - map: projection to WGS 84 points and default filter controls
//!
//! A failure in one branch output is recorded as
//! [`Outcome::Unavailable`] and never affects the other outputs. Only
//! loading and schema errors abort the run. [`Prepared::explore`] then
//! answers filter/cluster requests against the prepared map data without
//! modifying it.

pub mod config;
pub mod prepare;
pub mod report;

use std::fmt;
use std::path::PathBuf;

use deforest_map_geography::FilterError;
use deforest_map_observation_models::SchemaError;
use deforest_map_table::IngestError;
use deforest_map_table::loader::RawTable;
use serde::Serialize;
use thiserror::Error;

pub use config::AnalysisConfig;
pub use prepare::{MapView, Prepared, prepare};
pub use report::AnalysisReport;

/// Errors that can occur while loading the analysis configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML is malformed or has a value of the wrong type.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The delimiter is not a single ASCII character.
    #[error("Delimiter {delimiter:?} is not an ASCII character")]
    InvalidDelimiter {
        /// The configured delimiter.
        delimiter: char,
    },

    /// A value is out of range.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue {
        /// Dotted config key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input could not be read or parsed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The header row or a timestamp does not satisfy the schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors from [`Prepared::explore`]. The prepared data is left untouched.
#[derive(Debug, Error)]
pub enum ExploreError {
    /// The map branch failed during preparation.
    #[error("Map is unavailable: {reason}")]
    MapUnavailable {
        /// Why projection failed.
        reason: String,
    },

    /// The filter request was rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// One branch output: either a value, or the reason it could not be
/// produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The output was produced.
    Available {
        /// The output.
        value: T,
    },
    /// The output could not be produced; the rest of the run is unaffected.
    Unavailable {
        /// Error message.
        reason: String,
    },
}

impl<T> Outcome<T> {
    /// Records a branch result, logging failures as warnings.
    pub fn from_result<E: fmt::Display>(what: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Available { value },
            Err(e) => {
                log::warn!("{what} unavailable: {e}");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// The value, if available.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Available { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Whether the output was produced.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Maps the value, keeping an unavailable reason as is.
    pub fn map<U, F: FnOnce(&T) -> U>(&self, f: F) -> Outcome<U> {
        match self {
            Self::Available { value } => Outcome::Available { value: f(value) },
            Self::Unavailable { reason } => Outcome::Unavailable {
                reason: reason.clone(),
            },
        }
    }
}

/// Where to read the observation table from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A local file.
    File(PathBuf),
    /// An HTTP(S) URL, fetched once.
    Url(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Reads the raw table from `source` using the config's input settings.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if the source is unreachable, empty or
/// not delimited text.
pub async fn load(source: &Source, config: &AnalysisConfig) -> Result<RawTable, PipelineError> {
    let options = config.load_options();
    log::info!("Loading observations from {source}");
    let raw = match source {
        Source::File(path) => RawTable::from_path(path, &options)?,
        Source::Url(url) => RawTable::fetch(url, &options).await?,
    };
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ok: Outcome<u32> = Outcome::from_result("count", Ok::<_, String>(3));
        let err: Outcome<u32> = Outcome::from_result("count", Err("no data"));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "available", "value": 3})
        );
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"status": "unavailable", "reason": "no data"})
        );
        assert_eq!(ok.map(|v| v * 2).value(), Some(&6));
        assert!(!err.is_available());
    }

    #[tokio::test]
    async fn load_reports_missing_files() {
        let err = load(
            &Source::File(PathBuf::from("/nonexistent/observations.csv")),
            &AnalysisConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Ingest(IngestError::Io(_))));
    }
}
