//! Pairwise-complete Pearson correlation between numeric columns.

use deforest_map_analytics_models::CorrelationMatrix;
use deforest_map_observation_models::{ColumnKind, Table};

use crate::CorrelationError;

/// Pearson coefficient over the rows where both sides are present.
///
/// Returns the number of complete pairs and the coefficient, which is
/// `None` when either side has zero variance.
#[allow(clippy::cast_precision_loss)]
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> (usize, Option<f64>) {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| x.zip(*y))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return (n, None);
    }

    let count = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / count;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / count;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for &(x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return (n, None);
    }

    (n, Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)))
}

/// Correlates the named columns with each other.
///
/// Names resolve against header names first, then canonical field keys.
/// Each pair uses only the rows where both values are present. The
/// diagonal is exactly `1.0` and the matrix is symmetric.
///
/// # Errors
///
/// * [`CorrelationError::TooFewColumns`] if fewer than two names are given
/// * [`CorrelationError::UnknownColumn`] / [`CorrelationError::NotNumeric`]
///   for a name that does not resolve to a numeric column
/// * [`CorrelationError::InsufficientData`] if a column has no values or a
///   pair has fewer than two complete observations
pub fn correlate(table: &Table, columns: &[&str]) -> Result<CorrelationMatrix, CorrelationError> {
    if columns.len() < 2 {
        return Err(CorrelationError::TooFewColumns {
            requested: columns.len(),
        });
    }

    let mut names = Vec::with_capacity(columns.len());
    let mut series = Vec::with_capacity(columns.len());
    for &requested in columns {
        let column = table
            .schema
            .resolve(requested)
            .ok_or_else(|| CorrelationError::UnknownColumn {
                column: requested.to_string(),
            })?;
        if column.kind != ColumnKind::Numeric {
            return Err(CorrelationError::NotNumeric {
                column: requested.to_string(),
            });
        }
        names.push(column.name.clone());
        series.push(
            table
                .records
                .iter()
                .map(|r| r.numeric_value(column))
                .collect::<Vec<_>>(),
        );
    }

    let k = names.len();
    let mut values = vec![vec![None; k]; k];
    let mut observations = vec![vec![0; k]; k];

    for i in 0..k {
        let present = series[i].iter().flatten().count();
        if present == 0 {
            return Err(CorrelationError::InsufficientData {
                left: names[i].clone(),
                right: names[i].clone(),
                observations: 0,
            });
        }
        values[i][i] = Some(1.0);
        observations[i][i] = present;

        for j in i + 1..k {
            let (n, r) = pearson(&series[i], &series[j]);
            if n < 2 {
                return Err(CorrelationError::InsufficientData {
                    left: names[i].clone(),
                    right: names[j].clone(),
                    observations: n,
                });
            }
            values[i][j] = r;
            values[j][i] = r;
            observations[i][j] = n;
            observations[j][i] = n;
        }
    }

    log::debug!("Correlated {k} columns over {} rows", table.len());

    Ok(CorrelationMatrix {
        columns: names,
        values,
        observations,
    })
}

#[cfg(test)]
mod tests {
    use deforest_map_observation_models::{Column, ColumnBinding, Field, Record, Schema};

    use super::*;

    fn table(rows: &[(Option<f64>, Option<f64>, Option<f64>)]) -> Table {
        let column = |name: &str, field: Field| Column {
            name: name.to_string(),
            kind: field.kind(),
            binding: ColumnBinding::Field(field),
        };
        Table {
            schema: Schema::new(vec![
                column("Superficie_Deforestada", Field::DeforestedArea),
                column("Altitud", Field::Altitude),
                column("Temperatura", Field::Temperature),
                column("Tipo_Vegetacion", Field::VegetationType),
            ]),
            records: rows
                .iter()
                .map(|&(area, alt, temp)| Record {
                    deforested_area: area,
                    altitude: alt,
                    temperature: temp,
                    ..Record::default()
                })
                .collect(),
        }
    }

    #[test]
    fn perfect_linear_relationships() {
        let t = table(&[
            (Some(1.0), Some(10.0), Some(30.0)),
            (Some(2.0), Some(20.0), Some(20.0)),
            (Some(3.0), Some(30.0), Some(10.0)),
        ]);
        let m = correlate(&t, &["deforested_area", "Altitud", "temperature"]).unwrap();
        assert_eq!(
            m.columns,
            vec!["Superficie_Deforestada", "Altitud", "Temperatura"]
        );
        assert!((m.get("Superficie_Deforestada", "Altitud").unwrap() - 1.0).abs() < 1e-12);
        assert!((m.get("Superficie_Deforestada", "Temperatura").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn diagonal_is_one_and_matrix_is_symmetric() {
        let t = table(&[
            (Some(1.0), Some(5.0), None),
            (Some(4.0), None, Some(2.0)),
            (Some(2.0), Some(7.0), Some(3.0)),
            (Some(8.0), Some(1.0), Some(9.0)),
            (None, Some(3.0), Some(4.0)),
        ]);
        let m = correlate(&t, &["Superficie_Deforestada", "Altitud", "Temperatura"]).unwrap();
        for i in 0..3 {
            assert_eq!(m.values[i][i], Some(1.0));
            for j in 0..3 {
                assert_eq!(m.values[i][j], m.values[j][i]);
                assert_eq!(m.observations[i][j], m.observations[j][i]);
            }
        }
        assert_eq!(m.observations[0][1], 3);
        assert_eq!(m.observations[0][0], 4);
    }

    #[test]
    fn zero_variance_is_undefined() {
        let t = table(&[
            (Some(1.0), Some(5.0), Some(1.0)),
            (Some(2.0), Some(5.0), Some(2.0)),
        ]);
        let m = correlate(&t, &["Superficie_Deforestada", "Altitud"]).unwrap();
        assert_eq!(m.get("Superficie_Deforestada", "Altitud"), None);
        assert_eq!(m.get("Altitud", "Altitud"), Some(1.0));
    }

    #[test]
    fn too_few_pairs_is_insufficient_data() {
        let t = table(&[(Some(1.0), None, None), (None, Some(2.0), None)]);
        let err = correlate(&t, &["Superficie_Deforestada", "Altitud"]).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::InsufficientData {
                observations: 0,
                ..
            }
        ));
    }

    #[test]
    fn rejects_bad_column_requests() {
        let t = table(&[(Some(1.0), Some(1.0), Some(1.0))]);
        assert!(matches!(
            correlate(&t, &["Altitud"]),
            Err(CorrelationError::TooFewColumns { requested: 1 })
        ));
        assert!(matches!(
            correlate(&t, &["Altitud", "Pendiente"]),
            Err(CorrelationError::UnknownColumn { .. })
        ));
        assert!(matches!(
            correlate(&t, &["Altitud", "Tipo_Vegetacion"]),
            Err(CorrelationError::NotNumeric { .. })
        ));
    }
}
