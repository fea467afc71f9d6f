//! Resampling of a numeric column into calendar buckets.

use std::collections::BTreeMap;

use chrono::{Datelike as _, Days, NaiveDate};
use deforest_map_analytics_models::{Aggregation, TemporalOptions, TimeBucket, TimeGranularity};
use deforest_map_observation_models::{Field, Table};

use crate::AggregateError;

/// First day of the bucket containing `date`.
fn bucket_start(date: NaiveDate, granularity: TimeGranularity) -> NaiveDate {
    match granularity {
        TimeGranularity::Daily => date,
        TimeGranularity::Weekly => date
            .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            .unwrap_or(date),
        TimeGranularity::Monthly => date.with_day(1).unwrap_or(date),
        TimeGranularity::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

/// First day of the bucket following the one starting at `start`.
fn next_bucket(start: NaiveDate, granularity: TimeGranularity) -> Option<NaiveDate> {
    match granularity {
        TimeGranularity::Daily => start.checked_add_days(Days::new(1)),
        TimeGranularity::Weekly => start.checked_add_days(Days::new(7)),
        TimeGranularity::Monthly => {
            if start.month() == 12 {
                NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
            }
        }
        TimeGranularity::Yearly => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1),
    }
}

#[derive(Default)]
struct Accumulator {
    rows: usize,
    values: usize,
    sum: f64,
}

/// Aggregates `options.column` into contiguous calendar buckets.
///
/// Buckets run from the one holding the earliest timestamp to the one
/// holding the latest, including empty buckets in between. Missing values
/// count toward a bucket's row count but not toward its value.
///
/// # Errors
///
/// * [`AggregateError::NoTemporalColumn`] if the table has no date column
/// * [`AggregateError::NotNumeric`] if the target field is not numeric
/// * [`AggregateError::MissingColumn`] if the target field is not mapped
/// * [`AggregateError::EmptyTable`] if there are no dated rows
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(
    table: &Table,
    options: &TemporalOptions,
) -> Result<Vec<TimeBucket>, AggregateError> {
    let field = options.column;

    if !table.is_time_indexed() {
        return Err(AggregateError::NoTemporalColumn);
    }
    if !field.is_numeric() {
        return Err(AggregateError::NotNumeric { field });
    }
    if !table.schema.has_field(field) {
        return Err(AggregateError::MissingColumn { field });
    }

    let mut buckets: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for record in &table.records {
        let Some(ts) = record.timestamp else {
            continue;
        };
        let acc = buckets
            .entry(bucket_start(ts.date(), options.granularity))
            .or_default();
        acc.rows += 1;
        if let Some(v) = record.numeric(field) {
            acc.values += 1;
            acc.sum += v;
        }
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Err(AggregateError::EmptyTable);
    };

    let mut out = Vec::new();
    let mut cursor = Some(first);
    while let Some(start) = cursor
        && start <= last
    {
        let bucket = buckets.get(&start);
        let rows = bucket.map_or(0, |acc| acc.rows);
        let value = match options.aggregation {
            Aggregation::Sum => Some(bucket.map_or(0.0, |acc| acc.sum)),
            Aggregation::Mean => bucket
                .filter(|acc| acc.values > 0)
                .map(|acc| acc.sum / acc.values as f64),
        };
        out.push(TimeBucket {
            start,
            value,
            count: rows,
        });
        cursor = next_bucket(start, options.granularity);
    }

    log::debug!(
        "Aggregated '{}' into {} {} buckets ({})",
        table.column_name(field),
        out.len(),
        options.granularity,
        options.aggregation
    );

    Ok(out)
}

/// Convenience for the default field of a summary chart: yearly totals of
/// deforested area.
///
/// # Errors
///
/// Same as [`aggregate`].
pub fn yearly_deforested_area(table: &Table) -> Result<Vec<TimeBucket>, AggregateError> {
    aggregate(
        table,
        &TemporalOptions {
            column: Field::DeforestedArea,
            granularity: TimeGranularity::Yearly,
            aggregation: Aggregation::Sum,
        },
    )
}
