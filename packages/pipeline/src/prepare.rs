//! Shared preparation plus the statistics and map branches.

use deforest_map_analytics::correlation::correlate;
use deforest_map_analytics::gap_fill::fill_gaps;
use deforest_map_analytics::summary::summarize;
use deforest_map_analytics::temporal::aggregate;
use deforest_map_analytics_models::{CorrelationMatrix, DeforestationSummary, TimeBucket};
use deforest_map_geography::cluster::cluster;
use deforest_map_geography::filter::{apply, filter_controls};
use deforest_map_geography::geojson_out::to_geojson_string;
use deforest_map_geography_models::{ClusterSummary, FilterControl, FilterSpec, GeoCollection};
use deforest_map_observation_models::{DataWarning, Table};
use deforest_map_spatial::WorldOutline;
use deforest_map_table::coerce::coerce;
use deforest_map_table::loader::RawTable;

use crate::config::AnalysisConfig;
use crate::report::AnalysisReport;
use crate::{ExploreError, Outcome, PipelineError};

/// Everything derived from one input table.
///
/// Built once by [`prepare`]; later requests ([`Prepared::explore`]) read
/// it without changing it.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Where the data came from.
    pub origin: String,
    /// The coerced, gap-filled table.
    pub table: Table,
    /// Cells filled by gap filling.
    pub filled_cells: usize,
    /// Non-fatal data quality observations from every stage.
    pub warnings: Vec<DataWarning>,
    /// Headline figures and column profiles.
    pub summary: DeforestationSummary,
    /// Temporal aggregation.
    pub temporal: Outcome<Vec<TimeBucket>>,
    /// Correlation matrix.
    pub correlation: Outcome<CorrelationMatrix>,
    /// Projected points.
    pub map: Outcome<GeoCollection>,
    /// Default filter widget state.
    pub controls: Outcome<Vec<FilterControl>>,
    config: AnalysisConfig,
}

/// Result of one filter/cluster request.
#[derive(Debug, Clone)]
pub struct MapView {
    /// Filtered records, with cluster labels when clustering succeeded.
    pub collection: GeoCollection,
    /// Cluster bins and counts.
    pub clusters: Outcome<ClusterSummary>,
}

impl MapView {
    /// The records as a `GeoJSON` `FeatureCollection` string.
    #[must_use]
    pub fn to_geojson(&self) -> String {
        to_geojson_string(&self.collection)
    }
}

/// Keeps the configured names that resolve in the table, logging the rest.
fn present<'a>(table: &Table, names: &'a [String], what: &str) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|name| {
            let found = table.schema.resolve(name).is_some();
            if !found {
                log::debug!("Skipping {what} column '{name}': not in the table");
            }
            found
        })
        .collect()
}

/// Runs coercion, gap filling and both analysis branches.
///
/// # Errors
///
/// Returns [`PipelineError::Schema`] if the header row or a timestamp does
/// not satisfy the configured schema. Failures inside a branch are
/// reported through [`Outcome::Unavailable`] instead.
pub fn prepare(raw: &RawTable, config: &AnalysisConfig) -> Result<Prepared, PipelineError> {
    // ── Shared stages ───────────────────────────────────────────────────
    let coerced = coerce(raw, &config.mapping())?;
    let mut warnings = coerced.warnings;

    let filled = fill_gaps(&coerced.table, &config.gap_fill);
    warnings.extend(filled.warnings);
    let table = filled.table;

    // ── Statistics branch ───────────────────────────────────────────────
    let summary = summarize(&table);
    let temporal = Outcome::from_result(
        "Temporal aggregation",
        aggregate(&table, &config.temporal),
    );
    let correlation = Outcome::from_result(
        "Correlation",
        correlate(
            &table,
            &present(&table, &config.correlation.columns, "correlation"),
        ),
    );

    // ── Map branch ──────────────────────────────────────────────────────
    let (map, controls) = match deforest_map_geography::project::project(&table) {
        Ok(projected) => {
            warnings.extend(projected.warnings);
            let controls = Outcome::from_result(
                "Filter controls",
                filter_controls(
                    &projected.collection,
                    &present(&table, &config.filters.variables, "filter"),
                ),
            );
            (
                Outcome::Available {
                    value: projected.collection,
                },
                controls,
            )
        }
        Err(e) => {
            log::warn!("Map unavailable: {e}");
            let reason = e.to_string();
            (
                Outcome::Unavailable {
                    reason: reason.clone(),
                },
                Outcome::Unavailable { reason },
            )
        }
    };

    log::info!(
        "Prepared {} rows from {} ({} cells filled, {} warnings)",
        table.len(),
        raw.origin(),
        filled.filled_cells,
        warnings.len()
    );

    Ok(Prepared {
        origin: raw.origin().to_string(),
        table,
        filled_cells: filled.filled_cells,
        warnings,
        summary,
        temporal,
        correlation,
        map,
        controls,
        config: config.clone(),
    })
}

impl Prepared {
    /// Adds a warning for projected points outside every outline polygon.
    #[must_use]
    pub fn with_outline(mut self, outline: &WorldOutline) -> Self {
        if let Some(collection) = self.map.value() {
            let count = outline.count_outside(collection.coordinates());
            if count > 0 {
                log::warn!("{count} points fall outside the reference outline");
                self.warnings.push(DataWarning::OutsideOutline { count });
            }
        }
        self
    }

    /// Filters the map points and labels them with `bins` severity
    /// clusters on the configured magnitude column.
    ///
    /// A clustering failure only makes [`MapView::clusters`] unavailable;
    /// the filtered points are still returned.
    ///
    /// # Errors
    ///
    /// * [`ExploreError::MapUnavailable`] if projection failed earlier
    /// * [`ExploreError::Filter`] if the filter request is invalid
    pub fn explore(&self, spec: &FilterSpec, bins: usize) -> Result<MapView, ExploreError> {
        let collection = match &self.map {
            Outcome::Available { value } => value,
            Outcome::Unavailable { reason } => {
                return Err(ExploreError::MapUnavailable {
                    reason: reason.clone(),
                });
            }
        };

        let filtered = apply(collection, spec)?;

        Ok(match cluster(&filtered, &self.config.clustering.column, bins) {
            Ok(clustered) => MapView {
                collection: clustered.collection,
                clusters: Outcome::Available {
                    value: clustered.summary,
                },
            },
            Err(e) => {
                log::warn!("Clusters unavailable: {e}");
                MapView {
                    collection: filtered,
                    clusters: Outcome::Unavailable {
                        reason: e.to_string(),
                    },
                }
            }
        })
    }

    /// [`Self::explore`] with the configured bin count.
    ///
    /// # Errors
    ///
    /// Same as [`Self::explore`].
    pub fn explore_default(&self, spec: &FilterSpec) -> Result<MapView, ExploreError> {
        self.explore(spec, self.config.clustering.bins)
    }

    /// The configuration this run used.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Serializable report of the statistics branch and map overview.
    #[must_use]
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport::from_prepared(self)
    }
}
