//! Range and category filtering of georeferenced observations.

use std::collections::BTreeSet;

use deforest_map_geography_models::{FilterControl, FilterSpec, GeoCollection, GeoRecord, Predicate};
use deforest_map_observation_models::{Column, ColumnBinding, ColumnKind, Field, Schema};

use crate::FilterError;

/// How a predicate reads its column.
enum Access<'a> {
    Number(&'a Column),
    Text(&'a Column),
}

struct Check<'a> {
    access: Access<'a>,
    predicate: &'a Predicate,
}

impl Check<'_> {
    fn matches(&self, geo: &GeoRecord) -> bool {
        match self.access {
            Access::Number(column) => geo
                .record
                .numeric_value(column)
                .is_some_and(|v| self.predicate.matches_number(v)),
            Access::Text(column) => geo
                .record
                .text_value(column)
                .is_some_and(|v| self.predicate.matches_text(v)),
        }
    }
}

const fn predicate_name(predicate: &Predicate) -> &'static str {
    match predicate {
        Predicate::Range { .. } => "range",
        Predicate::Categories { .. } => "category",
    }
}

fn resolve<'a>(schema: &'a Schema, name: &str) -> Result<&'a Column, FilterError> {
    schema
        .resolve(name)
        .ok_or_else(|| FilterError::UnknownColumn {
            column: name.to_string(),
        })
}

fn compile<'a>(
    schema: &'a Schema,
    name: &str,
    predicate: &'a Predicate,
) -> Result<Check<'a>, FilterError> {
    let column = resolve(schema, name)?;
    let mismatch = || FilterError::KindMismatch {
        column: name.to_string(),
        kind: column.kind,
        predicate: predicate_name(predicate),
    };

    let access = match (predicate, column.binding) {
        (Predicate::Range { low, high }, _) if low > high || low.is_nan() || high.is_nan() => {
            return Err(FilterError::InvertedRange {
                column: name.to_string(),
                low: *low,
                high: *high,
            });
        }
        (Predicate::Range { .. }, ColumnBinding::Extra(_)) => Access::Number(column),
        (Predicate::Categories { .. }, ColumnBinding::Extra(_)) => Access::Text(column),
        (Predicate::Range { .. }, ColumnBinding::Field(_)) if column.kind == ColumnKind::Numeric => {
            Access::Number(column)
        }
        (Predicate::Categories { .. }, ColumnBinding::Field(_))
            if column.kind == ColumnKind::Categorical =>
        {
            Access::Text(column)
        }
        _ => return Err(mismatch()),
    };

    Ok(Check { access, predicate })
}

/// Keeps the records that satisfy every predicate in `spec`.
///
/// Numeric bounds are inclusive, category sets match exactly, and a
/// missing value never matches. Extra columns accept both predicate kinds:
/// ranges parse their text, category sets compare it. Record order is
/// preserved. An empty spec returns a copy of `collection`.
///
/// # Errors
///
/// * [`FilterError::UnknownColumn`] if a column is not in the schema
/// * [`FilterError::KindMismatch`] if a predicate does not fit its column
/// * [`FilterError::InvertedRange`] if a range has `low > high`
pub fn apply(collection: &GeoCollection, spec: &FilterSpec) -> Result<GeoCollection, FilterError> {
    let checks = spec
        .predicates()
        .map(|(name, predicate)| compile(&collection.schema, name, predicate))
        .collect::<Result<Vec<_>, _>>()?;

    let records: Vec<GeoRecord> = collection
        .records
        .iter()
        .filter(|geo| checks.iter().all(|check| check.matches(geo)))
        .cloned()
        .collect();

    log::debug!(
        "Filter on {} column(s) kept {} of {} records",
        checks.len(),
        records.len(),
        collection.len()
    );

    Ok(GeoCollection {
        schema: collection.schema.clone(),
        records,
        reference: collection.reference,
    })
}

fn range_control(column: &Column, values: &[f64]) -> Option<FilterControl> {
    let low = values.iter().copied().reduce(f64::min)?;
    let high = values.iter().copied().reduce(f64::max)?;
    Some(FilterControl::Range {
        column: column.name.clone(),
        low,
        high,
    })
}

fn category_control(column: &Column, labels: BTreeSet<String>) -> Option<FilterControl> {
    (!labels.is_empty()).then(|| FilterControl::Categories {
        column: column.name.clone(),
        options: labels.into_iter().collect(),
    })
}

/// Derives the default state of a filter widget for each named column:
/// a slider over the observed numeric range, or a multiselect over the
/// observed labels. Extra columns become sliders when every value parses
/// as a number.
///
/// Columns with no values get no control. Applying the filter built from
/// the returned controls keeps every record that has a value in each of
/// those columns.
///
/// # Errors
///
/// * [`FilterError::UnknownColumn`] if a column is not in the schema
/// * [`FilterError::KindMismatch`] for the date column
pub fn filter_controls(
    collection: &GeoCollection,
    columns: &[&str],
) -> Result<Vec<FilterControl>, FilterError> {
    let mut controls = Vec::with_capacity(columns.len());

    for &name in columns {
        let column = resolve(&collection.schema, name)?;

        let control = match column.binding {
            ColumnBinding::Field(Field::Timestamp) => {
                return Err(FilterError::KindMismatch {
                    column: name.to_string(),
                    kind: column.kind,
                    predicate: "range",
                });
            }
            ColumnBinding::Field(Field::VegetationType) => {
                let labels = collection
                    .records
                    .iter()
                    .filter_map(|geo| geo.record.text_value(column))
                    .map(str::to_string)
                    .collect();
                category_control(column, labels)
            }
            ColumnBinding::Field(_) => {
                let values: Vec<f64> = collection
                    .records
                    .iter()
                    .filter_map(|geo| geo.record.numeric_value(column))
                    .collect();
                range_control(column, &values)
            }
            ColumnBinding::Extra(_) => {
                let texts: Vec<&str> = collection
                    .records
                    .iter()
                    .filter_map(|geo| geo.record.text_value(column))
                    .collect();
                let numbers: Option<Vec<f64>> = texts
                    .iter()
                    .map(|t| t.parse::<f64>().ok().filter(|v| v.is_finite()))
                    .collect();
                match numbers {
                    Some(values) if !values.is_empty() => range_control(column, &values),
                    _ => category_control(
                        column,
                        texts.into_iter().map(str::to_string).collect(),
                    ),
                }
            }
        };

        match control {
            Some(control) => controls.push(control),
            None => log::warn!("Column '{name}' has no values; no filter control"),
        }
    }

    Ok(controls)
}

/// Filter spec matching the default state of `controls`.
#[must_use]
pub fn default_spec(controls: &[FilterControl]) -> FilterSpec {
    controls.iter().map(FilterControl::to_clause).collect()
}
