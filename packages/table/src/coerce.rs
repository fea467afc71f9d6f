//! Schema validation and cell-level type coercion.
//!
//! The header row is matched once against a [`ColumnMapping`]; after that
//! every cell is converted into the typed [`Record`] field it belongs to.
//! Unconvertible numeric cells become missing (with a warning) while an
//! unconvertible timestamp fails the whole table, since temporal bucketing
//! assumes every row carries a valid date.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use deforest_map_observation_models::{
    Column, ColumnBinding, ColumnKind, DataWarning, Field, Record, Schema, SchemaError, Table,
};
use serde::{Deserialize, Serialize};

use crate::loader::RawTable;

/// Cell values that mean "no data" rather than "bad data".
const NA_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Date-time layouts tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Date-only layouts tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Which source headers feed which [`Field`].
///
/// Header matching is exact and case-sensitive. When a field lists several
/// aliases, the first one present in the header row is used; fields absent
/// from `aliases` fall back to their canonical key (e.g. `"altitude"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Accepted header names per field.
    pub aliases: BTreeMap<Field, Vec<String>>,
    /// Fields whose absence is a [`SchemaError::MissingColumn`].
    pub required: Vec<Field>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let aliases = [
            (Field::Timestamp, &["Fecha", "Date", "fecha", "date"][..]),
            (Field::Latitude, &["Latitud", "Latitude", "latitude", "lat"]),
            (
                Field::Longitude,
                &["Longitud", "Longitude", "longitude", "lon"],
            ),
            (
                Field::DeforestedArea,
                &["Superficie_Deforestada", "Deforested_Area", "deforested_area"],
            ),
            (
                Field::DeforestationRate,
                &[
                    "Tasa_Deforestacion",
                    "Deforestation_Rate",
                    "deforestation_rate",
                ],
            ),
            (Field::Altitude, &["Altitud", "Altitude", "altitude"]),
            (Field::Slope, &["Pendiente", "Slope", "slope"]),
            (
                Field::DistanceToRoad,
                &["Distancia_Carretera", "Distance_To_Road", "distance_to_road"],
            ),
            (
                Field::Precipitation,
                &["Precipitacion", "Precipitation", "precipitation"],
            ),
            (
                Field::Temperature,
                &["Temperatura", "Temperature", "temperature"],
            ),
            (
                Field::VegetationType,
                &["Tipo_Vegetacion", "Vegetation_Type", "vegetation_type"],
            ),
        ]
        .into_iter()
        .map(|(field, names)| (field, names.iter().map(|&n| n.to_owned()).collect()))
        .collect();

        Self {
            aliases,
            required: vec![Field::DeforestedArea],
        }
    }
}

impl ColumnMapping {
    /// Header names accepted for `field`.
    #[must_use]
    pub fn aliases_for(&self, field: Field) -> Vec<String> {
        self.aliases
            .get(&field)
            .cloned()
            .unwrap_or_else(|| vec![field.to_string()])
    }

    /// Returns the field a header maps to, if any.
    #[must_use]
    pub fn field_for_header(&self, header: &str) -> Option<Field> {
        Field::ALL
            .iter()
            .copied()
            .find(|&field| self.aliases_for(field).iter().any(|a| a == header))
    }

    /// Builds the [`Schema`] for a header row.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if a header repeats, two headers claim the
    /// same field, or a required field is absent.
    pub fn schema_for(&self, headers: &[String]) -> Result<Schema, SchemaError> {
        let mut seen = BTreeSet::new();
        let mut bound: BTreeMap<Field, &str> = BTreeMap::new();
        let mut columns = Vec::with_capacity(headers.len());
        let mut extra = 0;

        for header in headers {
            if !seen.insert(header.as_str()) {
                return Err(SchemaError::DuplicateHeader {
                    name: header.clone(),
                });
            }

            let column = if let Some(field) = self.field_for_header(header) {
                if let Some(first) = bound.insert(field, header) {
                    return Err(SchemaError::DuplicateColumn {
                        field,
                        first: first.to_owned(),
                        second: header.clone(),
                    });
                }
                Column {
                    name: header.clone(),
                    kind: field.kind(),
                    binding: ColumnBinding::Field(field),
                }
            } else {
                let idx = extra;
                extra += 1;
                Column {
                    name: header.clone(),
                    kind: ColumnKind::Categorical,
                    binding: ColumnBinding::Extra(idx),
                }
            };
            columns.push(column);
        }

        for &field in &self.required {
            if !bound.contains_key(&field) {
                return Err(SchemaError::MissingColumn {
                    field,
                    aliases: self.aliases_for(field),
                });
            }
        }

        Ok(Schema::new(columns))
    }
}

/// Outcome of numeric cell conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCell {
    /// A finite number.
    Value(f64),
    /// Empty cell or an explicit NA marker.
    Missing,
    /// Text that is not a locale-agnostic decimal number.
    Malformed,
}

/// Parses a numeric cell. Only `.` is accepted as decimal separator, and
/// non-finite values are rejected.
#[must_use]
pub fn parse_numeric(s: &str) -> NumericCell {
    let s = s.trim();
    if s.is_empty() || NA_MARKERS.contains(&s) {
        return NumericCell::Missing;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => NumericCell::Value(v),
        _ => NumericCell::Malformed,
    }
}

/// Parses a date or date-time cell. Date-only values land at midnight, and
/// a bare four-digit year means January 1st of that year.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0);
    }
    None
}

/// A typed table plus the non-fatal issues found while building it.
#[derive(Debug, Clone)]
pub struct Coerced {
    /// The typed table.
    pub table: Table,
    /// Cells that could not be converted.
    pub warnings: Vec<DataWarning>,
}

/// Converts a [`RawTable`] into a typed [`Table`].
///
/// # Errors
///
/// Returns [`SchemaError`] if the header row does not satisfy `mapping` or
/// any timestamp cell is empty or unparseable.
pub fn coerce(raw: &RawTable, mapping: &ColumnMapping) -> Result<Coerced, SchemaError> {
    let schema = mapping.schema_for(raw.headers())?;
    let extra_count = schema.extra_count();
    let mut warnings = Vec::new();
    let mut records = Vec::with_capacity(raw.len());

    for (row_idx, row) in raw.rows().iter().enumerate() {
        let mut record = Record {
            extra: vec![None; extra_count],
            ..Record::default()
        };

        for (column, cell) in schema.columns().iter().zip(row) {
            match column.binding {
                ColumnBinding::Field(Field::Timestamp) => {
                    let Some(ts) = parse_timestamp(cell) else {
                        return Err(SchemaError::UnparseableTimestamp {
                            column: column.name.clone(),
                            row: row_idx,
                            value: cell.clone(),
                        });
                    };
                    record.timestamp = Some(ts);
                }
                ColumnBinding::Field(Field::VegetationType) => {
                    record.vegetation_type = non_empty(cell);
                }
                ColumnBinding::Field(field) => {
                    let value = match parse_numeric(cell) {
                        NumericCell::Value(v) => Some(v),
                        NumericCell::Missing => None,
                        NumericCell::Malformed => {
                            warnings.push(DataWarning::MalformedValue {
                                column: column.name.clone(),
                                row: row_idx,
                                value: cell.clone(),
                            });
                            None
                        }
                    };
                    if let Some(slot) = record.numeric_slot(field) {
                        *slot = value;
                    }
                }
                ColumnBinding::Extra(idx) => {
                    if let Some(slot) = record.extra.get_mut(idx) {
                        *slot = non_empty(cell);
                    }
                }
            }
        }

        records.push(record);
    }

    if !warnings.is_empty() {
        log::warn!(
            "{} cells in {} could not be converted and were treated as missing",
            warnings.len(),
            raw.origin()
        );
    }
    log::debug!(
        "Coerced {} rows; columns: {}",
        records.len(),
        schema.names().join(", ")
    );

    Ok(Coerced {
        table: Table { schema, records },
        warnings,
    })
}

fn non_empty(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| cell.to_owned())
}
