#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map branch of the deforestation pipeline.
//!
//! Projects cleaned observations to WGS 84 points, narrows them with
//! range and category filters, and labels each point with an equal-width
//! severity cluster. The result can be rendered as a `GeoJSON`
//! `FeatureCollection`.

pub mod cluster;
pub mod filter;
pub mod geojson_out;
pub mod project;

use deforest_map_observation_models::{ColumnKind, Field};
use thiserror::Error;

/// Errors that can occur while projecting observations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// The schema lacks latitude and/or longitude.
    #[error("Coordinate columns missing from the table: {}", .missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    MissingCoordinateColumns {
        /// Which coordinate fields are absent.
        missing: Vec<Field>,
    },
}

/// Errors that reject a filter request. The collection is left untouched.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The column is not in the schema.
    #[error("Unknown filter column '{column}'")]
    UnknownColumn {
        /// The requested name.
        column: String,
    },

    /// The predicate does not fit the column's kind.
    #[error("Cannot apply a {predicate} filter to {kind} column '{column}'")]
    KindMismatch {
        /// The requested name.
        column: String,
        /// The column's kind.
        kind: ColumnKind,
        /// The predicate that was attempted.
        predicate: &'static str,
    },

    /// A range whose lower bound exceeds its upper bound.
    #[error("Filter range for '{column}' is inverted: {low} > {high}")]
    InvertedRange {
        /// The requested name.
        column: String,
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
}

/// Errors that can occur while clustering. Only the cluster output is
/// affected; the filtered collection is still usable.
#[derive(Debug, Error)]
pub enum ClusteringError {
    /// Zero bins were requested.
    #[error("Number of clusters must be at least 1, got {bins}")]
    InvalidBinCount {
        /// The requested bin count.
        bins: usize,
    },

    /// The magnitude column is not in the schema.
    #[error("Unknown magnitude column '{column}'")]
    UnknownColumn {
        /// The requested name.
        column: String,
    },

    /// The magnitude column is not numeric.
    #[error("Magnitude column '{column}' is not numeric")]
    NotNumeric {
        /// The requested name.
        column: String,
    },

    /// No record has a magnitude value.
    #[error("Magnitude column '{column}' has no values")]
    AllMissing {
        /// The requested name.
        column: String,
    },

    /// Fewer than two distinct magnitudes, so bins cannot be formed.
    #[error("Magnitude column '{column}' has {distinct} distinct value(s); need at least 2")]
    Degenerate {
        /// The requested name.
        column: String,
        /// Distinct values found.
        distinct: usize,
    },
}
