#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistics branch of the deforestation pipeline.
//!
//! Every function takes a borrowed [`deforest_map_observation_models::Table`]
//! and returns newly owned results; nothing here mutates its input.
//!
//! - [`gap_fill`] repairs missing numeric values column by column.
//! - [`temporal`] buckets rows by date and sums or averages one column.
//! - [`correlation`] computes pairwise-complete Pearson correlations.
//! - [`summary`] produces headline totals and per-column profiles.

pub mod correlation;
pub mod gap_fill;
pub mod interpolate;
pub mod summary;
pub mod temporal;

use deforest_map_observation_models::Field;
use thiserror::Error;

/// Errors that can occur during temporal aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The table has no date column to bucket by.
    #[error("No temporal column; cannot aggregate by time")]
    NoTemporalColumn,

    /// The column to aggregate is not part of the table.
    #[error("Column for '{field}' is not present in the table")]
    MissingColumn {
        /// The requested field.
        field: Field,
    },

    /// The column to aggregate is not numeric.
    #[error("Column for '{field}' is not numeric")]
    NotNumeric {
        /// The requested field.
        field: Field,
    },

    /// The table has no rows.
    #[error("Table has no rows to aggregate")]
    EmptyTable,
}

/// Errors that can occur while computing correlations.
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// Fewer than two columns were requested.
    #[error("Correlation needs at least 2 columns, got {requested}")]
    TooFewColumns {
        /// Number of columns requested.
        requested: usize,
    },

    /// A requested column is not in the schema.
    #[error("Unknown column '{column}'")]
    UnknownColumn {
        /// The requested name.
        column: String,
    },

    /// A requested column is not numeric.
    #[error("Column '{column}' is not numeric")]
    NotNumeric {
        /// The requested name.
        column: String,
    },

    /// Too few complete observations for a pair of columns.
    #[error(
        "Not enough data to correlate '{left}' with '{right}': {observations} complete observations"
    )]
    InsufficientData {
        /// First column.
        left: String,
        /// Second column.
        right: String,
        /// Complete observations available.
        observations: usize,
    },
}
