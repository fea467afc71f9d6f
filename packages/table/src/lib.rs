#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading, coercing and exporting deforestation observation tables.
//!
//! [`loader`] reads delimited text (from bytes, a file or a URL) into an
//! untyped [`loader::RawTable`]. [`coerce`] validates the header row once
//! against a [`coerce::ColumnMapping`] and converts every cell into the
//! typed [`Table`] shape. [`export`] writes a table back out as CSV in a
//! reproducible format.

pub mod coerce;
pub mod export;
pub mod loader;

pub use deforest_map_observation_models::{SchemaError, Table};

/// Errors that can occur while reading or writing delimited text.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The source contained no data at all.
    #[error("Source '{origin}' is empty")]
    Empty {
        /// Where the data came from.
        origin: String,
    },

    /// The first line did not contain any column names.
    #[error("Source '{origin}' has no header row")]
    NoHeader {
        /// Where the data came from.
        origin: String,
    },

    /// A data line has more fields than the header row.
    #[error("Source '{origin}' line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        /// Where the data came from.
        origin: String,
        /// One-based line number in the source text.
        line: u64,
        /// Number of header columns.
        expected: usize,
        /// Number of fields on the offending line.
        found: usize,
    },
}
