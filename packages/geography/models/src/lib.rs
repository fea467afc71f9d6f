#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map-branch types: georeferenced observations, filter requests and
//! severity clusters.
//!
//! These types are independent of how the map is drawn. A presentation
//! layer receives a [`GeoCollection`] (or its `GeoJSON` rendering) plus a
//! [`ClusterSummary`] and decides on colors and legends itself.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use deforest_map_observation_models::{Record, Schema};
use geo::{BoundingRect as _, MultiPoint, Point, Rect};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Coordinate reference system carried by a [`GeoCollection`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum SpatialReference {
    /// WGS 84 geographic coordinates, longitude/latitude in degrees.
    #[default]
    #[serde(rename = "EPSG:4326")]
    #[strum(serialize = "EPSG:4326")]
    Wgs84,
}

impl SpatialReference {
    /// EPSG code.
    #[must_use]
    pub const fn srid(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
        }
    }
}

/// An observation with a point geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    /// Zero-based data row in the source table.
    pub row: usize,
    /// The observation's values.
    pub record: Record,
    /// Location, `x` = longitude and `y` = latitude.
    pub point: Point<f64>,
    /// Severity cluster, once assigned.
    pub cluster: Option<usize>,
}

impl GeoRecord {
    /// Longitude in degrees.
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.point.x()
    }

    /// Latitude in degrees.
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.point.y()
    }
}

/// Georeferenced observations sharing one schema and reference system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoCollection {
    /// Column layout of the source table.
    pub schema: Schema,
    /// Records in source order.
    pub records: Vec<GeoRecord>,
    /// Reference system of every point.
    pub reference: SpatialReference,
}

impl GeoCollection {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(longitude, latitude)` of every record.
    pub fn coordinates(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.records.iter().map(|r| (r.longitude(), r.latitude()))
    }

    /// Bounding box of every point.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let points: MultiPoint<f64> = self.records.iter().map(|r| r.point).collect();
        points.bounding_rect()
    }
}

/// A condition on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Inclusive numeric range.
    Range {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Accepted category labels.
    Categories {
        /// Labels compared by exact equality.
        values: BTreeSet<String>,
    },
}

impl Predicate {
    /// Whether a numeric value satisfies the range.
    #[must_use]
    pub fn matches_number(&self, value: f64) -> bool {
        match self {
            Self::Range { low, high } => *low <= value && value <= *high,
            Self::Categories { .. } => false,
        }
    }

    /// Whether a label is in the accepted set.
    #[must_use]
    pub fn matches_text(&self, value: &str) -> bool {
        match self {
            Self::Categories { values } => values.contains(value),
            Self::Range { .. } => false,
        }
    }
}

/// Errors from parsing the textual filter form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    /// No `=` between column and condition.
    #[error("Filter '{clause}' must look like 'column=low..high' or 'column=a,b'")]
    MissingSeparator {
        /// The clause as given.
        clause: String,
    },

    /// Nothing before the `=`.
    #[error("Filter '{clause}' has no column name")]
    EmptyColumn {
        /// The clause as given.
        clause: String,
    },

    /// A range bound is not a finite number.
    #[error("Filter '{clause}': '{value}' is not a number")]
    InvalidBound {
        /// The clause as given.
        clause: String,
        /// The offending bound.
        value: String,
    },

    /// No categories after the `=`.
    #[error("Filter '{clause}' lists no categories")]
    EmptyCategories {
        /// The clause as given.
        clause: String,
    },
}

/// One `column → predicate` pair, parsed from `column=low..high` or
/// `column=a,b,c`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Header name or canonical field key.
    pub column: String,
    /// Condition on that column.
    pub predicate: Predicate,
}

impl FromStr for FilterClause {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clause = || s.to_string();

        let (column, condition) = s
            .split_once('=')
            .ok_or_else(|| FilterParseError::MissingSeparator { clause: clause() })?;
        let column = column.trim();
        if column.is_empty() {
            return Err(FilterParseError::EmptyColumn { clause: clause() });
        }

        let predicate = if let Some((low, high)) = condition.split_once("..") {
            let bound = |text: &str| {
                let text = text.trim();
                text.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| FilterParseError::InvalidBound {
                        clause: clause(),
                        value: text.to_string(),
                    })
            };
            Predicate::Range {
                low: bound(low)?,
                high: bound(high)?,
            }
        } else {
            let values: BTreeSet<String> = condition
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            if values.is_empty() {
                return Err(FilterParseError::EmptyCategories { clause: clause() });
            }
            Predicate::Categories { values }
        };

        Ok(Self {
            column: column.to_string(),
            predicate,
        })
    }
}

/// A filter request: every predicate must hold (AND across columns).
///
/// Built with the consuming `with_*` methods and not changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    predicates: BTreeMap<String, Predicate>,
}

impl FilterSpec {
    /// An empty filter, which keeps every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an inclusive range on `column`.
    #[must_use]
    pub fn with_range(mut self, column: impl Into<String>, low: f64, high: f64) -> Self {
        self.predicates
            .insert(column.into(), Predicate::Range { low, high });
        self
    }

    /// Adds an accepted-category set on `column`.
    #[must_use]
    pub fn with_categories<I, S>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.insert(
            column.into(),
            Predicate::Categories {
                values: values.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Adds a parsed clause. A later clause on the same column replaces an
    /// earlier one.
    #[must_use]
    pub fn with_clause(mut self, clause: FilterClause) -> Self {
        self.predicates.insert(clause.column, clause.predicate);
        self
    }

    /// Whether no predicates are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Number of constrained columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Predicates keyed by column name.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<FilterClause> for FilterSpec {
    fn from_iter<T: IntoIterator<Item = FilterClause>>(iter: T) -> Self {
        iter.into_iter().fold(Self::new(), Self::with_clause)
    }
}

/// Default state of one filter widget, derived from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterControl {
    /// A slider spanning the observed values.
    Range {
        /// Column header.
        column: String,
        /// Smallest observed value.
        low: f64,
        /// Largest observed value.
        high: f64,
    },
    /// A multiselect over every observed label, sorted.
    Categories {
        /// Column header.
        column: String,
        /// Distinct labels.
        options: Vec<String>,
    },
}

impl FilterControl {
    /// Column this control constrains.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Range { column, .. } | Self::Categories { column, .. } => column,
        }
    }

    /// The clause the control represents in its default state.
    #[must_use]
    pub fn to_clause(&self) -> FilterClause {
        match self {
            Self::Range { column, low, high } => FilterClause {
                column: column.clone(),
                predicate: Predicate::Range {
                    low: *low,
                    high: *high,
                },
            },
            Self::Categories { column, options } => FilterClause {
                column: column.clone(),
                predicate: Predicate::Categories {
                    values: options.iter().cloned().collect(),
                },
            },
        }
    }
}

/// Equal-width bins used to label severity clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    /// Column the magnitudes came from.
    pub column: String,
    /// `k + 1` ascending edges; bin `i` is `[edges[i], edges[i + 1])`, the
    /// last bin also includes the maximum.
    pub edges: Vec<f64>,
    /// Records per bin.
    pub counts: Vec<usize>,
    /// Records left unlabeled because their magnitude is missing.
    pub unlabeled: usize,
}

impl ClusterSummary {
    /// Number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// `(low, high)` edges of a bin.
    #[must_use]
    pub fn range_of(&self, label: usize) -> Option<(f64, f64)> {
        Some((*self.edges.get(label)?, *self.edges.get(label + 1)?))
    }
}
