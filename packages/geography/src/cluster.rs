//! Equal-width magnitude binning ("severity clusters").
//!
//! Bins are recomputed from the collection on every call; nothing is
//! cached between requests.

use deforest_map_geography_models::{ClusterSummary, GeoCollection};
use deforest_map_observation_models::{ColumnBinding, ColumnKind};

use crate::ClusteringError;

/// Default number of clusters.
pub const DEFAULT_BINS: usize = 3;

/// A collection with cluster labels assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustered {
    /// Copy of the input with `cluster` set on every record that has a
    /// magnitude.
    pub collection: GeoCollection,
    /// Bin edges and per-bin counts.
    pub summary: ClusterSummary,
}

/// `bins + 1` ascending edges splitting `[min, max]` into equal widths.
/// The last edge is exactly `max`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bin_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    // Divided before subtracting so a span wider than f64::MAX stays finite.
    let width = max / bins as f64 - min / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| (i as f64).mul_add(width, min)).collect();
    edges.push(max);
    edges
}

/// Bin of `value` given `edges` from [`bin_edges`]: bin `i` covers
/// `[edges[i], edges[i + 1])` and the last bin also includes the maximum.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn label_for(value: f64, edges: &[f64]) -> usize {
    let bins = edges.len().saturating_sub(1);
    if bins <= 1 {
        return 0;
    }
    let (min, max) = (edges[0], edges[bins]);
    if value >= max {
        return bins - 1;
    }
    let guess = ((value / 2.0 - min / 2.0) / (max / 2.0 - min / 2.0) * bins as f64).floor();
    let mut label = if guess.is_nan() || guess <= 0.0 {
        0
    } else {
        (guess as usize).min(bins - 1)
    };

    // Correct rounding at bin boundaries against the actual edges.
    while label > 0 && value < edges[label] {
        label -= 1;
    }
    while label + 1 < bins && value >= edges[label + 1] {
        label += 1;
    }
    label
}

/// Labels each record by the magnitude in `column`, using `bins`
/// equal-width bins between the column's minimum and maximum.
///
/// Records with no magnitude keep `cluster = None`. With at least two
/// distinct values the minimum lands in bin `0` and the maximum in bin
/// `bins - 1`.
///
/// # Errors
///
/// * [`ClusteringError::InvalidBinCount`] if `bins` is zero
/// * [`ClusteringError::UnknownColumn`] / [`ClusteringError::NotNumeric`]
///   if `column` does not resolve to a numeric column
/// * [`ClusteringError::AllMissing`] if no record has a magnitude
/// * [`ClusteringError::Degenerate`] if fewer than two distinct values exist
pub fn cluster(
    collection: &GeoCollection,
    column: &str,
    bins: usize,
) -> Result<Clustered, ClusteringError> {
    if bins == 0 {
        return Err(ClusteringError::InvalidBinCount { bins });
    }

    let resolved = collection
        .schema
        .resolve(column)
        .ok_or_else(|| ClusteringError::UnknownColumn {
            column: column.to_string(),
        })?;
    if matches!(resolved.binding, ColumnBinding::Field(_)) && resolved.kind != ColumnKind::Numeric
    {
        return Err(ClusteringError::NotNumeric {
            column: column.to_string(),
        });
    }

    let magnitudes: Vec<Option<f64>> = collection
        .records
        .iter()
        .map(|geo| geo.record.numeric_value(resolved))
        .collect();

    let mut distinct: Vec<f64> = magnitudes.iter().flatten().copied().collect();
    if distinct.is_empty() {
        return Err(ClusteringError::AllMissing {
            column: column.to_string(),
        });
    }
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(ClusteringError::Degenerate {
            column: column.to_string(),
            distinct: distinct.len(),
        });
    }

    let (min, max) = (distinct[0], distinct[distinct.len() - 1]);
    let edges = bin_edges(min, max, bins);

    let mut counts = vec![0; bins];
    let mut unlabeled = 0;
    let mut out = collection.clone();
    for (geo, magnitude) in out.records.iter_mut().zip(&magnitudes) {
        geo.cluster = magnitude.map(|v| label_for(v, &edges));
        match geo.cluster {
            Some(label) => counts[label] += 1,
            None => unlabeled += 1,
        }
    }

    log::debug!(
        "Clustered '{}' into {bins} bins over [{min}, {max}]: {counts:?} ({unlabeled} unlabeled)",
        resolved.name
    );

    Ok(Clustered {
        collection: out,
        summary: ClusterSummary {
            column: resolved.name.clone(),
            edges,
            counts,
            unlabeled,
        },
    })
}

#[cfg(test)]
mod tests {
    use deforest_map_geography_models::{GeoRecord, SpatialReference};
    use deforest_map_observation_models::{Column, Field, Record, Schema};
    use geo::Point;

    use super::*;

    fn collection(areas: &[Option<f64>]) -> GeoCollection {
        GeoCollection {
            schema: Schema::new(vec![
                Column {
                    name: "Superficie_Deforestada".to_string(),
                    kind: ColumnKind::Numeric,
                    binding: ColumnBinding::Field(Field::DeforestedArea),
                },
                Column {
                    name: "Tipo_Vegetacion".to_string(),
                    kind: ColumnKind::Categorical,
                    binding: ColumnBinding::Field(Field::VegetationType),
                },
            ]),
            records: areas
                .iter()
                .enumerate()
                .map(|(row, &area)| GeoRecord {
                    row,
                    record: Record {
                        deforested_area: area,
                        ..Record::default()
                    },
                    point: Point::new(0.0, 0.0),
                    cluster: None,
                })
                .collect(),
            reference: SpatialReference::Wgs84,
        }
    }

    fn labels(c: &Clustered) -> Vec<Option<usize>> {
        c.collection.records.iter().map(|r| r.cluster).collect()
    }

    #[test]
    fn three_areas_three_bins() {
        let c = cluster(
            &collection(&[Some(10.0), Some(20.0), Some(30.0)]),
            "deforested_area",
            DEFAULT_BINS,
        )
        .unwrap();
        assert_eq!(labels(&c), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(c.summary.counts, vec![1, 1, 1]);
        assert_eq!(c.summary.edges.len(), 4);
        assert!((c.summary.edges[3] - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn min_and_max_land_in_outer_bins() {
        let values: Vec<Option<f64>> = [0.1, 0.7, 3.3, 9.9, 2.0, 0.3]
            .iter()
            .map(|&v| Some(v))
            .collect();
        for bins in 2..=7 {
            let c = cluster(&collection(&values), "Superficie_Deforestada", bins).unwrap();
            let l = labels(&c);
            assert_eq!(l[0], Some(0), "bins={bins}");
            assert_eq!(l[3], Some(bins - 1), "bins={bins}");
            assert!(l.iter().flatten().all(|&x| x < bins));
            assert_eq!(c.summary.counts.iter().sum::<usize>(), values.len());
        }
    }

    #[test]
    fn boundary_values_go_to_upper_bin() {
        let edges = bin_edges(0.0, 1.0, 4);
        assert_eq!(label_for(0.25, &edges), 1);
        assert_eq!(label_for(0.2499, &edges), 0);
        assert_eq!(label_for(1.0, &edges), 3);
        assert_eq!(label_for(0.0, &edges), 0);
    }

    #[test]
    fn span_wider_than_f64_keeps_finite_edges() {
        let edges = bin_edges(-1e308, 1e308, 3);
        assert!(edges.iter().all(|e| e.is_finite()));
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(label_for(-1e308, &edges), 0);
        assert_eq!(label_for(0.0, &edges), 1);
        assert_eq!(label_for(1e308, &edges), 2);

        let c = cluster(
            &collection(&[Some(-1e308), Some(0.0), Some(1e308)]),
            "deforested_area",
            3,
        )
        .unwrap();
        assert_eq!(labels(&c), vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn missing_magnitudes_stay_unlabeled() {
        let c = cluster(&collection(&[Some(1.0), None, Some(2.0)]), "Superficie_Deforestada", 2)
            .unwrap();
        assert_eq!(labels(&c), vec![Some(0), None, Some(1)]);
        assert_eq!(c.summary.unlabeled, 1);
    }

    #[test]
    fn input_collection_is_unchanged() {
        let input = collection(&[Some(1.0), Some(2.0)]);
        let before = input.clone();
        let _ = cluster(&input, "deforested_area", 2).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn rejects_unusable_requests() {
        let c = collection(&[Some(5.0), Some(5.0), None]);
        assert!(matches!(
            cluster(&c, "deforested_area", 0),
            Err(ClusteringError::InvalidBinCount { bins: 0 })
        ));
        assert!(matches!(
            cluster(&c, "slope", 3),
            Err(ClusteringError::UnknownColumn { .. })
        ));
        assert!(matches!(
            cluster(&c, "Tipo_Vegetacion", 3),
            Err(ClusteringError::NotNumeric { .. })
        ));
        assert!(matches!(
            cluster(&c, "deforested_area", 3),
            Err(ClusteringError::Degenerate { distinct: 1, .. })
        ));
        assert!(matches!(
            cluster(&collection(&[None]), "deforested_area", 3),
            Err(ClusteringError::AllMissing { .. })
        ));
    }

    #[test]
    fn single_bin_labels_everything_zero() {
        let c = cluster(&collection(&[Some(1.0), Some(4.0)]), "deforested_area", 1).unwrap();
        assert_eq!(labels(&c), vec![Some(0), Some(0)]);
    }
}
