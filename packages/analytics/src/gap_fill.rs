//! Missing-value repair for numeric columns.

use deforest_map_analytics_models::{FillIndex, GapFillOptions};
use deforest_map_observation_models::{DataWarning, Field, Table};

use crate::interpolate::Interpolator;

/// Result of [`fill_gaps`].
#[derive(Debug, Clone, PartialEq)]
pub struct Filled {
    /// A copy of the input with gaps repaired.
    pub table: Table,
    /// Number of cells that received a value.
    pub filled_cells: usize,
    /// Non-fatal observations (entirely missing columns, index fallback).
    pub warnings: Vec<DataWarning>,
}

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Builds the x coordinate of every row.
#[allow(clippy::cast_precision_loss)]
fn axis(table: &Table, index: FillIndex, warnings: &mut Vec<DataWarning>) -> Vec<f64> {
    let by_position = || (0..table.len()).map(|i| i as f64).collect::<Vec<_>>();

    match index {
        FillIndex::Position => by_position(),
        FillIndex::Timestamp => {
            if !table.is_time_indexed() {
                log::warn!("Timestamp index requested but the table has no date column");
                warnings.push(DataWarning::TimestampIndexUnavailable);
                return by_position();
            }

            let days: Option<Vec<f64>> = table
                .records
                .iter()
                .map(|r| {
                    r.timestamp
                        .map(|ts| ts.and_utc().timestamp() as f64 / SECONDS_PER_DAY)
                })
                .collect();

            days.unwrap_or_else(|| {
                log::warn!("Some rows have no timestamp; interpolating by row position");
                warnings.push(DataWarning::TimestampIndexUnavailable);
                by_position()
            })
        }
    }
}

/// Known `(x, y)` points of one column sorted by `x`, keeping the first
/// value seen for a duplicate `x`.
fn control_points(xs: &[f64], values: &[Option<f64>]) -> Vec<(f64, f64)> {
    let mut controls: Vec<(f64, f64)> = xs
        .iter()
        .zip(values)
        .filter_map(|(&x, v)| v.map(|y| (x, y)))
        .collect();
    controls.sort_by(|a, b| a.0.total_cmp(&b.0));
    controls.dedup_by(|later, first| later.0 == first.0);
    controls
}

/// Fills missing values in the numeric columns selected by `options`.
///
/// Known values are never touched. Interior gaps use the configured
/// method; edge gaps follow [`LimitDirection`](deforest_map_analytics_models::LimitDirection).
/// A column with no values at all is left as is and reported.
#[must_use]
pub fn fill_gaps(table: &Table, options: &GapFillOptions) -> Filled {
    let mut warnings = Vec::new();
    let mut out = table.clone();
    let mut filled_cells = 0;

    let columns: Vec<Field> = match &options.columns {
        Some(requested) => requested
            .iter()
            .copied()
            .filter(|f| f.is_numeric() && table.schema.has_field(*f))
            .collect(),
        None => table.schema.numeric_fields(),
    };

    if table.is_empty() || columns.is_empty() {
        return Filled {
            table: out,
            filled_cells,
            warnings,
        };
    }

    let xs = axis(table, options.index, &mut warnings);

    for field in columns {
        let values = table.numeric_column(field);
        let controls = control_points(&xs, &values);

        let Some((&(x_first, y_first), &(x_last, y_last))) =
            controls.first().zip(controls.last())
        else {
            let column = table.column_name(field);
            log::warn!("Column '{column}' has no values; leaving it unfilled");
            warnings.push(DataWarning::ColumnEntirelyMissing { column });
            continue;
        };

        if controls.len() == values.len() {
            continue;
        }

        let interpolator = Interpolator::new(options.method, options.order, &controls);
        let mut column_filled = 0;

        for (row, record) in out.records.iter_mut().enumerate() {
            if values[row].is_some() {
                continue;
            }
            let x = xs[row];
            let value = if x < x_first {
                options.limit_direction.fills_leading().then_some(y_first)
            } else if x > x_last {
                options.limit_direction.fills_trailing().then_some(y_last)
            } else {
                Some(interpolator.at(x))
            };

            if let Some(v) = value
                && let Some(slot) = record.numeric_slot(field)
            {
                *slot = Some(v);
                column_filled += 1;
            }
        }

        log::debug!(
            "Filled {column_filled} cells in '{}' ({})",
            table.column_name(field),
            options.method
        );
        filled_cells += column_filled;
    }

    log::info!(
        "Gap filling ({}, limit {}): {filled_cells} cells filled",
        options.method,
        options.limit_direction
    );

    Filled {
        table: out,
        filled_cells,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use deforest_map_analytics_models::{InterpolationMethod, LimitDirection};
    use deforest_map_observation_models::{Column, ColumnBinding, ColumnKind, Record, Schema};

    use super::*;

    const METHODS: &[InterpolationMethod] = &[
        InterpolationMethod::Linear,
        InterpolationMethod::Nearest,
        InterpolationMethod::ForwardFill,
        InterpolationMethod::BackwardFill,
        InterpolationMethod::Polynomial,
        InterpolationMethod::Barycentric,
        InterpolationMethod::Pchip,
        InterpolationMethod::Spline,
    ];

    fn column(name: &str, field: Field) -> Column {
        Column {
            name: name.to_string(),
            kind: field.kind(),
            binding: ColumnBinding::Field(field),
        }
    }

    fn area_table(areas: &[Option<f64>]) -> Table {
        Table {
            schema: Schema::new(vec![column("Superficie_Deforestada", Field::DeforestedArea)]),
            records: areas
                .iter()
                .map(|&a| Record {
                    deforested_area: a,
                    ..Record::default()
                })
                .collect(),
        }
    }

    fn areas(table: &Table) -> Vec<Option<f64>> {
        table.numeric_column(Field::DeforestedArea)
    }

    #[test]
    fn linear_fills_interior_gap() {
        let filled = fill_gaps(
            &area_table(&[Some(1.0), None, Some(3.0)]),
            &GapFillOptions::default(),
        );
        assert_eq!(areas(&filled.table), vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(filled.filled_cells, 1);
        assert!(filled.warnings.is_empty());
    }

    #[test]
    fn complete_table_is_unchanged_by_every_method() {
        let table = area_table(&[Some(4.0), Some(1.0), Some(7.5), Some(2.0)]);
        for &method in METHODS {
            let filled = fill_gaps(&table, &GapFillOptions::with_method(method));
            assert_eq!(filled.table, table, "{method}");
            assert_eq!(filled.filled_cells, 0);
        }
    }

    #[test]
    fn every_method_preserves_known_values_and_fills_all_gaps() {
        let input = [None, Some(2.0), None, Some(5.0), Some(4.0), None, None, Some(9.0), None];
        let table = area_table(&input);
        for &method in METHODS {
            let filled = fill_gaps(&table, &GapFillOptions::with_method(method));
            let out = areas(&filled.table);
            for (before, after) in input.iter().zip(&out) {
                assert!(after.is_some(), "{method} left a gap");
                if let Some(v) = before {
                    assert_eq!(after, &Some(*v), "{method} overwrote a known value");
                }
            }
            let again = fill_gaps(&filled.table, &GapFillOptions::with_method(method));
            assert_eq!(again.table, filled.table, "{method} is not idempotent");
        }
    }

    #[test]
    fn limit_direction_controls_edges() {
        let table = area_table(&[None, Some(1.0), None, Some(3.0), None]);

        let forward = fill_gaps(
            &table,
            &GapFillOptions {
                limit_direction: LimitDirection::Forward,
                ..GapFillOptions::default()
            },
        );
        assert_eq!(
            areas(&forward.table),
            vec![None, Some(1.0), Some(2.0), Some(3.0), Some(3.0)]
        );

        let backward = fill_gaps(
            &table,
            &GapFillOptions {
                limit_direction: LimitDirection::Backward,
                ..GapFillOptions::default()
            },
        );
        assert_eq!(
            areas(&backward.table),
            vec![Some(1.0), Some(1.0), Some(2.0), Some(3.0), None]
        );
    }

    #[test]
    fn step_methods_carry_neighbors() {
        let table = area_table(&[Some(1.0), None, None, Some(4.0)]);
        let ffill = fill_gaps(
            &table,
            &GapFillOptions::with_method(InterpolationMethod::ForwardFill),
        );
        assert_eq!(
            areas(&ffill.table),
            vec![Some(1.0), Some(1.0), Some(1.0), Some(4.0)]
        );
        let bfill = fill_gaps(
            &table,
            &GapFillOptions::with_method(InterpolationMethod::BackwardFill),
        );
        assert_eq!(
            areas(&bfill.table),
            vec![Some(1.0), Some(4.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn entirely_missing_column_is_reported_and_untouched() {
        let filled = fill_gaps(&area_table(&[None, None]), &GapFillOptions::default());
        assert_eq!(areas(&filled.table), vec![None, None]);
        assert_eq!(
            filled.warnings,
            vec![DataWarning::ColumnEntirelyMissing {
                column: "Superficie_Deforestada".to_string()
            }]
        );
    }

    #[test]
    fn timestamp_index_spaces_control_points_by_date() {
        let day = |d: u32| {
            NaiveDate::from_ymd_opt(2020, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
        };
        let table = Table {
            schema: Schema::new(vec![
                Column {
                    name: "Fecha".to_string(),
                    kind: ColumnKind::Temporal,
                    binding: ColumnBinding::Field(Field::Timestamp),
                },
                column("Superficie_Deforestada", Field::DeforestedArea),
            ]),
            records: vec![
                Record {
                    timestamp: day(1),
                    deforested_area: Some(0.0),
                    ..Record::default()
                },
                Record {
                    timestamp: day(2),
                    deforested_area: None,
                    ..Record::default()
                },
                Record {
                    timestamp: day(5),
                    deforested_area: Some(4.0),
                    ..Record::default()
                },
            ],
        };

        let by_time = fill_gaps(
            &table,
            &GapFillOptions {
                index: FillIndex::Timestamp,
                ..GapFillOptions::default()
            },
        );
        let value = areas(&by_time.table)[1].unwrap();
        assert!((value - 1.0).abs() < 1e-9);

        let by_position = fill_gaps(&table, &GapFillOptions::default());
        assert_eq!(areas(&by_position.table)[1], Some(2.0));
    }

    #[test]
    fn timestamp_index_without_dates_falls_back_to_position() {
        let filled = fill_gaps(
            &area_table(&[Some(1.0), None, Some(3.0)]),
            &GapFillOptions {
                index: FillIndex::Timestamp,
                ..GapFillOptions::default()
            },
        );
        assert_eq!(areas(&filled.table)[1], Some(2.0));
        assert_eq!(filled.warnings, vec![DataWarning::TimestampIndexUnavailable]);
    }

    #[test]
    fn only_requested_columns_are_filled() {
        let table = Table {
            schema: Schema::new(vec![
                column("Superficie_Deforestada", Field::DeforestedArea),
                column("Altitud", Field::Altitude),
            ]),
            records: vec![
                Record {
                    deforested_area: Some(1.0),
                    altitude: Some(10.0),
                    ..Record::default()
                },
                Record::default(),
                Record {
                    deforested_area: Some(3.0),
                    altitude: Some(30.0),
                    ..Record::default()
                },
            ],
        };
        let filled = fill_gaps(
            &table,
            &GapFillOptions {
                columns: Some(vec![Field::Altitude, Field::VegetationType]),
                ..GapFillOptions::default()
            },
        );
        assert_eq!(filled.table.records[1].altitude, Some(20.0));
        assert_eq!(filled.table.records[1].deforested_area, None);
        assert_eq!(table.records[1].altitude, None);
    }
}
