//! Serializable overview of a prepared run.

use deforest_map_analytics_models::{CorrelationMatrix, DeforestationSummary, TimeBucket};
use deforest_map_geography_models::{FilterControl, SpatialReference};
use deforest_map_observation_models::DataWarning;
use serde::Serialize;

use crate::Outcome;
use crate::prepare::Prepared;

/// One column's correlation with the configured target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Column header.
    pub column: String,
    /// Pearson correlation with the target.
    pub correlation: f64,
}

/// Overview of the map branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOverview {
    /// Projected points.
    pub points: usize,
    /// Rows without valid coordinates.
    pub dropped: usize,
    /// `[min_lon, min_lat, max_lon, max_lat]`, absent when there are no points.
    pub bounds: Option<[f64; 4]>,
    /// Coordinate reference system.
    pub reference: SpatialReference,
    /// Default filter widgets.
    pub controls: Vec<FilterControl>,
}

/// Everything [`Prepared`] computed, minus the table itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// File path or URL the table was read from.
    pub origin: String,
    /// Rows after coercion.
    pub rows: usize,
    /// Cells filled by gap filling.
    pub filled_cells: usize,
    /// Data quality warnings from every stage.
    pub warnings: Vec<DataWarning>,
    /// Headline figures and column profiles.
    pub summary: DeforestationSummary,
    /// Temporal aggregation of the configured column.
    pub temporal: Outcome<Vec<TimeBucket>>,
    /// Correlation matrix over the configured columns.
    pub correlation: Outcome<CorrelationMatrix>,
    /// Correlations against the target column, strongest first.
    pub drivers: Outcome<Vec<Driver>>,
    /// Overview of the projected points.
    pub map: Outcome<MapOverview>,
}

impl AnalysisReport {
    pub(crate) fn from_prepared(prepared: &Prepared) -> Self {
        let target = prepared
            .table
            .schema
            .resolve(&prepared.config().correlation.target)
            .map_or_else(
                || prepared.config().correlation.target.clone(),
                |c| c.name.clone(),
            );

        let drivers: Outcome<Vec<Driver>> = prepared.correlation.map(|matrix| {
            matrix
                .ranked_against(&target)
                .into_iter()
                .map(|(column, correlation)| Driver {
                    column,
                    correlation,
                })
                .collect()
        });

        let dropped = prepared
            .warnings
            .iter()
            .filter(|w| matches!(w, DataWarning::DroppedRow { .. }))
            .count();

        let map = prepared.map.map(|collection| MapOverview {
            points: collection.len(),
            dropped,
            bounds: collection
                .bounds()
                .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y]),
            reference: collection.reference,
            controls: prepared.controls.value().cloned().unwrap_or_default(),
        });

        Self {
            origin: prepared.origin.clone(),
            rows: prepared.table.len(),
            filled_cells: prepared.filled_cells,
            warnings: prepared.warnings.clone(),
            summary: prepared.summary.clone(),
            temporal: prepared.temporal.clone(),
            correlation: prepared.correlation.clone(),
            drivers,
            map,
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use deforest_map_table::loader::{LoadOptions, RawTable};

    use super::*;
    use crate::{AnalysisConfig, prepare};

    const CSV: &str = "\
Fecha,Latitud,Longitud,Superficie_Deforestada,Altitud,Pendiente
2018-06-01,-3.0,-60.0,10,100,9
2019-06-01,-3.5,-61.0,20,200,6
2020-06-01,,-62.0,30,300,4
2021-06-01,-4.0,-62.5,40,400,1
";

    fn report(text: &str) -> AnalysisReport {
        let raw = RawTable::from_bytes(text.as_bytes(), "inline", &LoadOptions::new()).unwrap();
        prepare(&raw, &AnalysisConfig::default()).unwrap().report()
    }

    #[test]
    fn drivers_rank_against_target_header() {
        let report = report(CSV);
        let drivers = report.drivers.value().unwrap();
        let names: Vec<&str> = drivers.iter().map(|d| d.column.as_str()).collect();
        assert_eq!(names, vec!["Altitud", "Pendiente", "Longitud", "Latitud"]);
        assert!((drivers[0].correlation - 1.0).abs() < 1e-9);
        assert!(drivers[1..].iter().all(|d| d.correlation < -0.95));
    }

    #[test]
    fn map_overview_counts_points() {
        let report = report(CSV);
        // The missing latitude is gap filled, so every row projects.
        let map = report.map.value().unwrap();
        assert_eq!(map.points, 4);
        assert_eq!(map.dropped, 0);
        assert_eq!(map.bounds, Some([-62.5, -4.0, -60.0, -3.0]));
        let controls: Vec<&str> = map.controls.iter().map(FilterControl::column).collect();
        assert_eq!(controls, vec!["Latitud", "Longitud", "Altitud"]);
        assert_eq!(report.filled_cells, 1);
    }

    #[test]
    fn serializes_camel_case_with_status_tags() {
        let json: serde_json::Value =
            serde_json::from_str(&report("Superficie_Deforestada\n1\n2\n").to_json().unwrap())
                .unwrap();
        assert_eq!(json["rows"], 2);
        assert_eq!(json["filledCells"], 0);
        assert_eq!(json["summary"]["totalDeforestedArea"], 3.0);
        assert_eq!(json["map"]["status"], "unavailable");
        assert_eq!(json["temporal"]["status"], "unavailable");
        assert_eq!(json["correlation"]["status"], "unavailable");
    }
}
