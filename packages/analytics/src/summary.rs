//! Headline figures and per-column descriptive statistics.

use std::collections::BTreeMap;

use deforest_map_analytics_models::{
    CategoryCount, CategoryProfile, ColumnProfile, DeforestationSummary,
};
use deforest_map_observation_models::{Column, ColumnKind, Field, Table};

#[allow(clippy::cast_precision_loss)]
fn profile(table: &Table, column: &Column) -> ColumnProfile {
    let values: Vec<f64> = table
        .records
        .iter()
        .filter_map(|r| r.numeric_value(column))
        .collect();
    let count = values.len();
    let n = count as f64;

    let mean = (count > 0).then(|| values.iter().sum::<f64>() / n);
    let std_dev = mean.filter(|_| count > 1).map(|m| {
        let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    });

    ColumnProfile {
        column: column.name.clone(),
        count,
        missing: table.len() - count,
        mean,
        std_dev,
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

fn categories(table: &Table, column: &Column) -> CategoryProfile {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut missing = 0;
    for record in &table.records {
        match record.text_value(column) {
            Some(value) => *counts.entry(value).or_default() += 1,
            None => missing += 1,
        }
    }

    let mut categories: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count));

    CategoryProfile {
        column: column.name.clone(),
        categories,
        missing,
    }
}

/// Summarizes `table`.
///
/// The deforested-area total and deforestation-rate mean are `None` when
/// the column is absent or has no values. Numeric profiles cover every
/// numeric field; categorical profiles cover the vegetation type.
#[must_use]
pub fn summarize(table: &Table) -> DeforestationSummary {
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();

    for column in table.schema.columns() {
        match (column.kind, column.field()) {
            (ColumnKind::Numeric, Some(_)) => numeric.push(profile(table, column)),
            (ColumnKind::Categorical, Some(Field::VegetationType)) => {
                categorical.push(categories(table, column));
            }
            _ => {}
        }
    }

    let total_deforested_area = table.schema.column_for(Field::DeforestedArea).and_then(|c| {
        let values: Vec<f64> = table
            .records
            .iter()
            .filter_map(|r| r.numeric_value(c))
            .collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>())
    });
    let mean_deforestation_rate = table
        .schema
        .column_for(Field::DeforestationRate)
        .and_then(|c| profile(table, c).mean);

    log::debug!(
        "Summarized {} rows: {} numeric, {} categorical columns",
        table.len(),
        numeric.len(),
        categorical.len()
    );

    DeforestationSummary {
        rows: table.len(),
        total_deforested_area,
        mean_deforestation_rate,
        numeric,
        categorical,
    }
}

#[cfg(test)]
mod tests {
    use deforest_map_observation_models::{ColumnBinding, Record, Schema};

    use super::*;

    fn table() -> Table {
        let column = |name: &str, field: Field| Column {
            name: name.to_string(),
            kind: field.kind(),
            binding: ColumnBinding::Field(field),
        };
        let row = |area: Option<f64>, veg: Option<&str>| Record {
            deforested_area: area,
            vegetation_type: veg.map(str::to_string),
            ..Record::default()
        };
        Table {
            schema: Schema::new(vec![
                column("Superficie_Deforestada", Field::DeforestedArea),
                column("Tipo_Vegetacion", Field::VegetationType),
            ]),
            records: vec![
                row(Some(2.0), Some("Selva")),
                row(Some(4.0), Some("Bosque")),
                row(None, Some("Selva")),
                row(Some(6.0), None),
            ],
        }
    }

    #[test]
    fn headline_figures() {
        let summary = summarize(&table());
        assert_eq!(summary.rows, 4);
        assert!((summary.total_deforested_area.unwrap() - 12.0).abs() < 1e-12);
        assert_eq!(summary.mean_deforestation_rate, None);
    }

    #[test]
    fn numeric_profile() {
        let summary = summarize(&table());
        let p = &summary.numeric[0];
        assert_eq!(p.column, "Superficie_Deforestada");
        assert_eq!((p.count, p.missing), (3, 1));
        assert_eq!(p.mean, Some(4.0));
        assert!((p.std_dev.unwrap() - 2.0).abs() < 1e-12);
        assert_eq!((p.min, p.max), (Some(2.0), Some(6.0)));
    }

    #[test]
    fn category_counts_most_frequent_first() {
        let summary = summarize(&table());
        let veg = &summary.categorical[0];
        assert_eq!(veg.missing, 1);
        assert_eq!(
            veg.categories,
            vec![
                CategoryCount {
                    category: "Selva".to_string(),
                    count: 2
                },
                CategoryCount {
                    category: "Bosque".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn empty_table_has_no_statistics() {
        let mut t = table();
        t.records.clear();
        let summary = summarize(&t);
        assert_eq!(summary.total_deforested_area, None);
        assert_eq!(summary.numeric[0].std_dev, None);
        assert_eq!(summary.numeric[0].min, None);
    }
}
