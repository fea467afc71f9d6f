#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deforestation observation records and the typed table they live in.
//!
//! Raw delimited input is validated once against a [`Schema`] and turned
//! into a [`Table`] of strongly-typed [`Record`]s. Every downstream stage
//! (gap filling, statistics, projection, filtering, clustering) works on
//! these types instead of looking columns up by name at each call site.
//! Columns the schema does not recognize are carried verbatim in a small
//! side table so they survive export.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Semantic type of a column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColumnKind {
    /// Floating point measurement.
    Numeric,
    /// Free-form label compared by equality.
    Categorical,
    /// Date or date-time.
    Temporal,
}

/// A statically known observation field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    /// Observation date.
    Timestamp,
    /// WGS84 latitude in degrees.
    Latitude,
    /// WGS84 longitude in degrees.
    Longitude,
    /// Deforested surface in hectares.
    DeforestedArea,
    /// Deforestation rate.
    DeforestationRate,
    /// Altitude above sea level.
    Altitude,
    /// Terrain slope.
    Slope,
    /// Distance to the nearest road.
    DistanceToRoad,
    /// Precipitation.
    Precipitation,
    /// Temperature in degrees Celsius.
    Temperature,
    /// Land-cover category.
    VegetationType,
}

impl Field {
    /// Every field, in canonical order.
    pub const ALL: &[Self] = &[
        Self::Timestamp,
        Self::Latitude,
        Self::Longitude,
        Self::DeforestedArea,
        Self::DeforestationRate,
        Self::Altitude,
        Self::Slope,
        Self::DistanceToRoad,
        Self::Precipitation,
        Self::Temperature,
        Self::VegetationType,
    ];

    /// Fields stored as `f64`.
    pub const NUMERIC: &[Self] = &[
        Self::Latitude,
        Self::Longitude,
        Self::DeforestedArea,
        Self::DeforestationRate,
        Self::Altitude,
        Self::Slope,
        Self::DistanceToRoad,
        Self::Precipitation,
        Self::Temperature,
    ];

    /// Returns the semantic kind of this field.
    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::Timestamp => ColumnKind::Temporal,
            Self::VegetationType => ColumnKind::Categorical,
            Self::Latitude
            | Self::Longitude
            | Self::DeforestedArea
            | Self::DeforestationRate
            | Self::Altitude
            | Self::Slope
            | Self::DistanceToRoad
            | Self::Precipitation
            | Self::Temperature => ColumnKind::Numeric,
        }
    }

    /// Whether this field holds numeric values.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self.kind(), ColumnKind::Numeric)
    }
}

/// What a schema column is bound to inside a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnBinding {
    /// A typed record field.
    Field(Field),
    /// Index into [`Record::extra`].
    Extra(usize),
}

/// One column of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Header name exactly as it appeared in the source.
    pub name: String,
    /// Semantic kind.
    pub kind: ColumnKind,
    /// Where the column's values are stored.
    pub binding: ColumnBinding,
}

impl Column {
    /// Returns the bound field, if this is not an extra column.
    #[must_use]
    pub const fn field(&self) -> Option<Field> {
        match self.binding {
            ColumnBinding::Field(field) => Some(field),
            ColumnBinding::Extra(_) => None,
        }
    }
}

/// Ordered column layout of a [`Table`].
///
/// Column order is the order of the source header row and is preserved by
/// export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema from columns in source order.
    #[must_use]
    pub const fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Columns in source order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Header names in source order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the column bound to `field`, if the source had one.
    #[must_use]
    pub fn column_for(&self, field: Field) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.binding == ColumnBinding::Field(field))
    }

    /// Whether the source had a column for `field`.
    #[must_use]
    pub fn has_field(&self, field: Field) -> bool {
        self.column_for(field).is_some()
    }

    /// Resolves a column by exact header name, falling back to the
    /// canonical field key (e.g. `"altitude"` for an `Altitud` header).
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name).or_else(|| {
            name.parse::<Field>()
                .ok()
                .and_then(|field| self.column_for(field))
        })
    }

    /// Number of unrecognized columns carried in [`Record::extra`].
    #[must_use]
    pub fn extra_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| matches!(c.binding, ColumnBinding::Extra(_)))
            .count()
    }

    /// Numeric fields present in this schema, in column order.
    #[must_use]
    pub fn numeric_fields(&self) -> Vec<Field> {
        self.columns
            .iter()
            .filter_map(Column::field)
            .filter(|f| f.is_numeric())
            .collect()
    }
}

/// One deforestation observation.
///
/// Every typed field is optional: a column may be absent from the source,
/// or a cell may be missing before gap filling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Observation date.
    pub timestamp: Option<NaiveDateTime>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Deforested area (hectares).
    pub deforested_area: Option<f64>,
    /// Deforestation rate.
    pub deforestation_rate: Option<f64>,
    /// Altitude.
    pub altitude: Option<f64>,
    /// Slope.
    pub slope: Option<f64>,
    /// Distance to road.
    pub distance_to_road: Option<f64>,
    /// Precipitation.
    pub precipitation: Option<f64>,
    /// Temperature.
    pub temperature: Option<f64>,
    /// Land-cover category.
    pub vegetation_type: Option<String>,
    /// Raw values of unrecognized columns, indexed by [`ColumnBinding::Extra`].
    pub extra: Vec<Option<String>>,
}

impl Record {
    /// Returns the value of a numeric field. Non-numeric fields yield `None`.
    #[must_use]
    pub const fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
            Field::DeforestedArea => self.deforested_area,
            Field::DeforestationRate => self.deforestation_rate,
            Field::Altitude => self.altitude,
            Field::Slope => self.slope,
            Field::DistanceToRoad => self.distance_to_road,
            Field::Precipitation => self.precipitation,
            Field::Temperature => self.temperature,
            Field::Timestamp | Field::VegetationType => None,
        }
    }

    /// Mutable slot for a numeric field, `None` for non-numeric fields.
    pub fn numeric_slot(&mut self, field: Field) -> Option<&mut Option<f64>> {
        match field {
            Field::Latitude => Some(&mut self.latitude),
            Field::Longitude => Some(&mut self.longitude),
            Field::DeforestedArea => Some(&mut self.deforested_area),
            Field::DeforestationRate => Some(&mut self.deforestation_rate),
            Field::Altitude => Some(&mut self.altitude),
            Field::Slope => Some(&mut self.slope),
            Field::DistanceToRoad => Some(&mut self.distance_to_road),
            Field::Precipitation => Some(&mut self.precipitation),
            Field::Temperature => Some(&mut self.temperature),
            Field::Timestamp | Field::VegetationType => None,
        }
    }

    /// Numeric value of any column. Extra columns are parsed from their raw
    /// text; unparseable or non-finite text counts as missing.
    #[must_use]
    pub fn numeric_value(&self, column: &Column) -> Option<f64> {
        match column.binding {
            ColumnBinding::Field(field) => self.numeric(field),
            ColumnBinding::Extra(idx) => self
                .extra
                .get(idx)?
                .as_deref()?
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite()),
        }
    }

    /// Text value of a categorical column (the vegetation type or any extra
    /// column).
    #[must_use]
    pub fn text_value(&self, column: &Column) -> Option<&str> {
        match column.binding {
            ColumnBinding::Field(Field::VegetationType) => self.vegetation_type.as_deref(),
            ColumnBinding::Field(_) => None,
            ColumnBinding::Extra(idx) => self.extra.get(idx)?.as_deref(),
        }
    }
}

/// An ordered collection of records sharing one schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column layout.
    pub schema: Schema,
    /// Rows in ingestion order.
    pub records: Vec<Record>,
}

impl Table {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the table carries a temporal column.
    #[must_use]
    pub fn is_time_indexed(&self) -> bool {
        self.schema.has_field(Field::Timestamp)
    }

    /// Values of a numeric field in row order.
    #[must_use]
    pub fn numeric_column(&self, field: Field) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.numeric(field)).collect()
    }

    /// Header name used for `field`, or its canonical key if unmapped.
    #[must_use]
    pub fn column_name(&self, field: Field) -> String {
        self.schema
            .column_for(field)
            .map_or_else(|| field.to_string(), |c| c.name.clone())
    }
}

/// A non-fatal data quality observation surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// A cell could not be converted and was treated as missing.
    MalformedValue {
        /// Column header.
        column: String,
        /// Zero-based data row.
        row: usize,
        /// The offending text.
        value: String,
    },
    /// A numeric column has no values at all, so it was left unfilled.
    ColumnEntirelyMissing {
        /// Column header.
        column: String,
    },
    /// Timestamp-indexed interpolation was requested without a temporal
    /// column; row positions were used instead.
    TimestampIndexUnavailable,
    /// A row was excluded from the map branch.
    DroppedRow {
        /// Zero-based data row.
        row: usize,
        /// Why it was dropped.
        reason: String,
    },
    /// Projected points that fall outside every reference polygon.
    OutsideOutline {
        /// Number of points.
        count: usize,
    },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedValue { column, row, value } => {
                write!(f, "column '{column}' row {row}: '{value}' is not a number")
            }
            Self::ColumnEntirelyMissing { column } => {
                write!(f, "column '{column}' has no values; left unfilled")
            }
            Self::TimestampIndexUnavailable => write!(
                f,
                "no temporal column; interpolated by row position instead of timestamp"
            ),
            Self::DroppedRow { row, reason } => write!(f, "row {row} dropped: {reason}"),
            Self::OutsideOutline { count } => {
                write!(f, "{count} points fall outside the reference outline")
            }
        }
    }
}

/// Schema validation failures. These abort the run.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A required field has no matching header.
    #[error("Required column for '{field}' not found (looked for: {})", .aliases.join(", "))]
    MissingColumn {
        /// The required field.
        field: Field,
        /// Header names that would have matched.
        aliases: Vec<String>,
    },

    /// Two headers map to the same field.
    #[error("Columns '{first}' and '{second}' both map to '{field}'")]
    DuplicateColumn {
        /// The field claimed twice.
        field: Field,
        /// First matching header.
        first: String,
        /// Second matching header.
        second: String,
    },

    /// The header row repeats a name.
    #[error("Header '{name}' appears more than once")]
    DuplicateHeader {
        /// The repeated header.
        name: String,
    },

    /// A timestamp cell is empty or not a recognized date.
    #[error("Column '{column}' row {row}: '{value}' is not a valid date")]
    UnparseableTimestamp {
        /// Column header.
        column: String,
        /// Zero-based data row.
        row: usize,
        /// The offending text.
        value: String,
    },
}
